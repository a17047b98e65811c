use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifies which upstream system produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    RetailCsv,
    CatalogApi,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::RetailCsv => "retail_sales_csv",
            SourceTag::CatalogApi => "catalog_api",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One untyped input row, exactly as the extractor produced it.
/// Discarded after normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: SourceTag,
    pub values: Map<String, Value>,
    pub extracted_at: DateTime<Utc>,
}

/// A batch of raw records from one source pull.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub source: SourceTag,
    pub records: Vec<RawRecord>,
    pub extracted_at: DateTime<Utc>,
}

impl RawBatch {
    pub fn empty(source: SourceTag, extracted_at: DateTime<Utc>) -> Self {
        Self { source, records: Vec::new(), extracted_at }
    }
}

/// Cleaned and typed retail transaction. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesRecord {
    pub transaction_id: i64,
    pub date: NaiveDate,
    pub customer_id: String,
    pub gender: String,
    pub age: i64,
    pub product_category: String,
    pub quantity: i64,
    pub price_per_unit: f64,
    pub total_amount: f64,
    pub source: SourceTag,
    pub extracted_at: DateTime<Utc>,
}

/// Cleaned and typed catalog product. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: i64,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub category: String,
    pub image_url: String,
    pub rating_rate: f64,
    pub rating_count: i64,
    pub source: SourceTag,
    pub extracted_at: DateTime<Utc>,
}
