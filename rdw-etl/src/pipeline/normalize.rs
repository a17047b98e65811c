use crate::config::InvalidRowPolicy;
use crate::observability::metrics;
use rdw_core::domain::{ProductRecord, RawBatch, RawRecord, SalesRecord, SourceTag};
use rdw_core::{EtlError, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Date formats accepted by the normalizer, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub sales: Vec<SalesRecord>,
    pub products: Vec<ProductRecord>,
    pub sales_seen: usize,
    pub products_seen: usize,
    pub sales_rejected: usize,
    pub products_rejected: usize,
    /// Rows whose stated total disagreed with quantity * unit price and were
    /// corrected to the computed value.
    pub amount_mismatches: usize,
}

/// Cleans and type-casts raw record batches into canonical records,
/// dispatching on the batch's source tag.
pub struct Normalizer {
    policy: InvalidRowPolicy,
}

impl Normalizer {
    pub fn new(policy: InvalidRowPolicy) -> Self {
        Self { policy }
    }

    pub fn normalize(&self, batches: &[RawBatch]) -> NormalizeOutcome {
        let mut outcome = NormalizeOutcome::default();
        for batch in batches {
            match batch.source {
                SourceTag::RetailCsv => self.normalize_sales_batch(batch, &mut outcome),
                SourceTag::CatalogApi => self.normalize_product_batch(batch, &mut outcome),
            }
        }
        outcome
    }

    fn normalize_sales_batch(&self, batch: &RawBatch, outcome: &mut NormalizeOutcome) {
        for record in &batch.records {
            outcome.sales_seen += 1;
            match normalize_sales_row(record) {
                Ok((row, corrected)) => {
                    if corrected {
                        outcome.amount_mismatches += 1;
                        metrics::normalize::amount_mismatch();
                    }
                    outcome.sales.push(row);
                }
                Err(e) => {
                    outcome.sales_rejected += 1;
                    self.reject(batch.source, &e);
                }
            }
        }
        metrics::normalize::rows_normalized(batch.source.as_str(), outcome.sales.len());
        debug!(
            source = batch.source.as_str(),
            seen = outcome.sales_seen,
            rejected = outcome.sales_rejected,
            "normalized sales batch"
        );
    }

    fn normalize_product_batch(&self, batch: &RawBatch, outcome: &mut NormalizeOutcome) {
        for record in &batch.records {
            outcome.products_seen += 1;
            match normalize_product_row(record) {
                Ok(row) => outcome.products.push(row),
                Err(e) => {
                    outcome.products_rejected += 1;
                    self.reject(batch.source, &e);
                }
            }
        }
        metrics::normalize::rows_normalized(batch.source.as_str(), outcome.products.len());
        debug!(
            source = batch.source.as_str(),
            seen = outcome.products_seen,
            rejected = outcome.products_rejected,
            "normalized product batch"
        );
    }

    fn reject(&self, source: SourceTag, error: &EtlError) {
        metrics::normalize::row_rejected(source.as_str());
        if self.policy == InvalidRowPolicy::Report {
            warn!(source = source.as_str(), "skipping row: {error}");
        }
    }
}

fn normalize_sales_row(record: &RawRecord) -> Result<(SalesRecord, bool)> {
    let values = &record.values;

    let transaction_id = get_i64(values, "transaction_id")?;
    let date_text = get_string(values, "date")?;
    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| chrono::NaiveDate::parse_from_str(&date_text, fmt).ok())
        .ok_or_else(|| EtlError::validation("date", format!("uncastable date '{date_text}'")))?;

    let customer_id = get_string(values, "customer_id")?;
    let gender = title_case(&get_string(values, "gender")?);
    let age = get_i64(values, "age")?.clamp(18, 100);
    let product_category = title_case(&get_string(values, "product_category")?);

    let quantity = get_i64(values, "quantity")?;
    if quantity <= 0 {
        return Err(EtlError::validation("quantity", format!("must be positive, got {quantity}")));
    }

    let price_per_unit = get_f64(values, "price_per_unit")?;
    let stated_total = get_f64(values, "total_amount")?;
    let computed_total = quantity as f64 * price_per_unit;
    let corrected = (stated_total - computed_total).abs() > 0.005;

    Ok((
        SalesRecord {
            transaction_id,
            date,
            customer_id,
            gender,
            age,
            product_category,
            quantity,
            price_per_unit,
            total_amount: if corrected { computed_total } else { stated_total },
            source: record.source,
            extracted_at: record.extracted_at,
        },
        corrected,
    ))
}

fn normalize_product_row(record: &RawRecord) -> Result<ProductRecord> {
    let values = &record.values;

    let product_id = get_i64(values, "id")?;
    let title = get_string(values, "title")?;
    let price = get_f64(values, "price")?;
    let category = title_case(&get_string(values, "category")?);

    let description: String = values
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .chars()
        .take(MAX_DESCRIPTION_LEN)
        .collect();
    let image_url = values
        .get("image")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let rating_rate = values
        .get("rating_rate")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 5.0);
    let rating_count = values
        .get("rating_count")
        .and_then(Value::as_i64)
        .unwrap_or(0)
        .max(0);

    Ok(ProductRecord {
        product_id,
        title,
        price,
        description,
        category,
        image_url,
        rating_rate,
        rating_count,
        source: record.source,
        extracted_at: record.extracted_at,
    })
}

fn get_value<'a>(values: &'a Map<String, Value>, field: &str) -> Result<&'a Value> {
    match values.get(field) {
        None | Some(Value::Null) => {
            Err(EtlError::validation(field, "missing required field"))
        }
        Some(value) => Ok(value),
    }
}

fn get_string(values: &Map<String, Value>, field: &str) -> Result<String> {
    let value = get_value(values, field)?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        return Err(EtlError::validation(field, "missing required field"));
    }
    Ok(text)
}

fn get_i64(values: &Map<String, Value>, field: &str) -> Result<i64> {
    let value = get_value(values, field)?;
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| EtlError::validation(field, format!("uncastable integer '{n}'"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| EtlError::validation(field, format!("uncastable integer '{s}'"))),
        other => Err(EtlError::validation(field, format!("uncastable integer '{other}'"))),
    }
}

fn get_f64(values: &Map<String, Value>, field: &str) -> Result<f64> {
    let value = get_value(values, field)?;
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EtlError::validation(field, format!("uncastable number '{n}'"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EtlError::validation(field, format!("uncastable number '{s}'"))),
        other => Err(EtlError::validation(field, format!("uncastable number '{other}'"))),
    }
}

/// "female" -> "Female", "men's clothing" -> "Men's Clothing".
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
