use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel `effective_end_date` for a version that is still active.
pub fn open_ended_end_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap()
}

/// Smart key of the date dimension: yyyymmdd. Derived arithmetically, so the
/// fact builder never needs a lookup against `dim_date`.
pub fn date_key_for(date: NaiveDate) -> i64 {
    date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64
}

/// One calendar day. Fully derived, rebuilt wholesale each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateDimRow {
    pub date_key: i64,
    pub full_date: NaiveDate,
    pub year: i32,
    pub quarter: u32,
    pub month: u32,
    pub month_name: String,
    pub week_of_year: u32,
    pub day_of_month: u32,
    /// Monday = 0 .. Sunday = 6.
    pub day_of_week: u32,
    pub day_name: String,
    pub is_weekend: bool,
    /// Fiscal year starts in October.
    pub fiscal_year: i32,
    pub fiscal_quarter: u32,
}

/// One product category, unioned across both sources each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDimRow {
    pub category_key: i64,
    pub category_name: String,
    /// Which source(s) the category was seen in: "retail", "api" or "both".
    pub category_source: String,
    pub category_group: String,
    pub loaded_at: DateTime<Utc>,
}

/// One temporal slice of a customer (SCD Type 2).
///
/// Tracked attributes: `gender`, `age`. Everything else is refreshed in place
/// without opening a new version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDimRow {
    pub customer_key: i64,
    pub customer_id: String,
    pub gender: String,
    pub age: i64,
    pub age_group: String,
    pub customer_segment: String,
    pub first_purchase_date: NaiveDate,
    pub last_purchase_date: NaiveDate,
    pub total_transactions: i64,
    pub effective_start_date: DateTime<Utc>,
    pub effective_end_date: DateTime<Utc>,
    pub is_current: bool,
    pub version: i64,
    pub row_hash: String,
    pub loaded_at: DateTime<Utc>,
}

/// One temporal slice of a catalog product (SCD Type 2).
///
/// Tracked attributes: `product_name`, `price`, `product_category`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDimRow {
    pub product_key: i64,
    pub product_id: i64,
    pub product_name: String,
    pub price: f64,
    pub description: String,
    pub product_category: String,
    pub product_image_url: String,
    pub rating_rate: f64,
    pub rating_count: i64,
    pub effective_start_date: DateTime<Utc>,
    pub effective_end_date: DateTime<Utc>,
    pub is_current: bool,
    pub version: i64,
    pub row_hash: String,
    pub loaded_at: DateTime<Utc>,
}
