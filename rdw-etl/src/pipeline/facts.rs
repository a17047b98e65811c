use crate::observability::metrics;
use chrono::{DateTime, Utc};
use rdw_core::domain::{
    date_key_for, CategoryDimRow, CustomerDimRow, FactSalesRow, SalesRecord, UNKNOWN_KEY,
};
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct FactOutcome {
    pub rows: Vec<FactSalesRow>,
    pub unresolved_customers: usize,
    pub unresolved_categories: usize,
}

/// Resolves each normalized transaction to dimension surrogate keys.
///
/// The date key is derived arithmetically, so it can never miss. Customer and
/// category keys resolve against the current (`is_current`) dimension rows
/// only; a reference that does not resolve takes the reserved unknown key 0
/// and is counted rather than dropped.
pub fn build_fact_sales(
    sales: &[SalesRecord],
    dim_customer: &[CustomerDimRow],
    dim_category: &[CategoryDimRow],
    run_time: DateTime<Utc>,
) -> FactOutcome {
    let customer_keys: HashMap<&str, i64> = dim_customer
        .iter()
        .filter(|row| row.is_current)
        .map(|row| (row.customer_id.as_str(), row.customer_key))
        .collect();
    let category_keys: HashMap<&str, i64> = dim_category
        .iter()
        .map(|row| (row.category_name.as_str(), row.category_key))
        .collect();

    let mut outcome = FactOutcome::default();
    for (i, sale) in sales.iter().enumerate() {
        let customer_key = match customer_keys.get(sale.customer_id.as_str()) {
            Some(&key) => key,
            None => {
                warn!(customer_id = %sale.customer_id, "unresolved customer reference");
                metrics::facts::unresolved_reference("dim_customer");
                outcome.unresolved_customers += 1;
                UNKNOWN_KEY
            }
        };
        let category_key = match category_keys.get(sale.product_category.as_str()) {
            Some(&key) => key,
            None => {
                warn!(category = %sale.product_category, "unresolved category reference");
                metrics::facts::unresolved_reference("dim_product_category");
                outcome.unresolved_categories += 1;
                UNKNOWN_KEY
            }
        };

        outcome.rows.push(FactSalesRow {
            sales_key: i as i64 + 1,
            transaction_id: sale.transaction_id,
            date_key: date_key_for(sale.date),
            customer_key,
            category_key,
            quantity: sale.quantity,
            price_per_unit: sale.price_per_unit,
            total_amount: sale.total_amount,
            customer_id: sale.customer_id.clone(),
            product_category: sale.product_category.clone(),
            gender: sale.gender.clone(),
            age: sale.age,
            source: sale.source,
            extracted_at: sale.extracted_at,
            loaded_at: run_time,
        });
    }

    metrics::facts::rows_built(outcome.rows.len());
    info!(
        rows = outcome.rows.len(),
        unresolved_customers = outcome.unresolved_customers,
        unresolved_categories = outcome.unresolved_categories,
        "built fact table"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dimensions::{
        build_dim_customer, build_dim_product_category,
    };
    use crate::pipeline::keys::KeyAllocator;
    use chrono::NaiveDate;
    use rdw_core::domain::SourceTag;

    fn sale(txn: i64, customer: &str, category: &str) -> SalesRecord {
        SalesRecord {
            transaction_id: txn,
            date: NaiveDate::from_ymd_opt(2023, 5, 2).unwrap(),
            customer_id: customer.to_string(),
            gender: "Male".to_string(),
            age: 40,
            product_category: category.to_string(),
            quantity: 3,
            price_per_unit: 30.0,
            total_amount: 90.0,
            source: SourceTag::RetailCsv,
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn facts_resolve_against_current_dimension_rows() {
        let sales = vec![sale(1, "C1", "Beauty"), sale(2, "C2", "Beauty")];
        let mut keys = KeyAllocator::new();
        let run_time = Utc::now();
        let (customers, _) = build_dim_customer(Vec::new(), &sales, &mut keys, run_time);
        let categories = build_dim_product_category(&sales, &[], &[], run_time);

        let outcome = build_fact_sales(&sales, &customers.rows, &categories, run_time);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.unresolved_customers, 0);
        assert_eq!(outcome.unresolved_categories, 0);
        assert_eq!(outcome.rows[0].date_key, 20230502);
        assert!(outcome.rows.iter().all(|r| r.customer_key != UNKNOWN_KEY));
        assert!(outcome.rows.iter().all(|r| r.category_key != UNKNOWN_KEY));
        // sales_key is a dense 1..n sequence.
        assert_eq!(outcome.rows.iter().map(|r| r.sales_key).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn unresolved_references_take_the_unknown_key_and_are_counted() {
        let sales = vec![sale(1, "GHOST", "Nowhere")];
        let outcome = build_fact_sales(&sales, &[], &[], Utc::now());
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].customer_key, UNKNOWN_KEY);
        assert_eq!(outcome.rows[0].category_key, UNKNOWN_KEY);
        assert_eq!(outcome.unresolved_customers, 1);
        assert_eq!(outcome.unresolved_categories, 1);
    }

    #[test]
    fn facts_ignore_closed_dimension_versions() {
        let sales = vec![sale(1, "C1", "Beauty")];
        let mut keys = KeyAllocator::new();
        let run_time = Utc::now();
        let (first, _) = build_dim_customer(Vec::new(), &sales, &mut keys, run_time);

        // Age change opens version 2; facts must resolve to the new key.
        let mut changed = sale(2, "C1", "Beauty");
        changed.age = 41;
        let mut keys2 = KeyAllocator::new();
        let (second, _) =
            build_dim_customer(first.rows.clone(), &[changed.clone()], &mut keys2, run_time);

        let categories = build_dim_product_category(&[changed.clone()], &[], &[], run_time);
        let outcome = build_fact_sales(&[changed], &second.rows, &categories, run_time);

        let current_key = second.rows.iter().find(|r| r.is_current).unwrap().customer_key;
        assert_eq!(outcome.rows[0].customer_key, current_key);
    }
}
