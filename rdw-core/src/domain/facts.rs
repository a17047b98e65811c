use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::records::SourceTag;

/// Reserved surrogate key for references that could not be resolved against a
/// dimension. Never allocated to a real dimension row.
pub const UNKNOWN_KEY: i64 = 0;

/// One retail transaction at the grain of the source data, resolved to
/// dimension surrogate keys with degenerate attributes carried denormalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactSalesRow {
    pub sales_key: i64,
    pub transaction_id: i64,
    pub date_key: i64,
    pub customer_key: i64,
    pub category_key: i64,
    pub quantity: i64,
    pub price_per_unit: f64,
    pub total_amount: f64,
    // Degenerate dimensions.
    pub customer_id: String,
    pub product_category: String,
    pub gender: String,
    pub age: i64,
    pub source: SourceTag,
    pub extracted_at: DateTime<Utc>,
    pub loaded_at: DateTime<Utc>,
}
