use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monthly sales performance. Disposable, recomputed wholesale each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesPerformanceRow {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub total_revenue: f64,
    pub total_transactions: i64,
    pub total_quantity: i64,
    pub avg_order_value: f64,
    pub unique_customers: i64,
    /// `None` for the first month in the sequence.
    pub revenue_prev_month: Option<f64>,
    /// Month-over-month growth percent, rounded to 2 decimals. `None` when
    /// there is no prior period to compare against.
    pub revenue_growth_pct: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

/// Per-category analytics including demographics. Disposable, recomputed
/// wholesale each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAnalysisRow {
    pub product_category: String,
    pub category_group: String,
    pub total_revenue: f64,
    pub total_transactions: i64,
    pub total_quantity: i64,
    pub avg_price: f64,
    pub avg_order_value: f64,
    pub unique_customers: i64,
    pub avg_customer_age: f64,
    pub revenue_share_pct: Option<f64>,
    pub female_revenue_pct: Option<f64>,
    pub male_revenue_pct: Option<f64>,
    pub generated_at: DateTime<Utc>,
}
