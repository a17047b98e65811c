pub mod dimensions;
pub mod facts;
pub mod keys;
pub mod load;
pub mod marts;
pub mod normalize;
pub mod orchestrator;
pub mod validate;

pub use orchestrator::{PipelineOrchestrator, RunMode, RunStatus, RunSummary};

use rdw_core::domain::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Counters surfaced in the run summary. Every skipped or corrected item
/// increments one of these; nothing is silently swallowed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformCounters {
    pub sales_rows_rejected: usize,
    pub product_rows_rejected: usize,
    pub amount_mismatches: usize,
    pub customer_conflicts_dropped: usize,
    pub product_conflicts_dropped: usize,
    pub customer_versions_created: usize,
    pub product_versions_created: usize,
    pub hash_collisions: usize,
    pub unresolved_customer_refs: usize,
    pub unresolved_category_refs: usize,
}

/// The complete table set produced by one transform pass. Each table is owned
/// by exactly one producing component; the loader only persists.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub staging_sales: Vec<SalesRecord>,
    pub staging_products: Vec<ProductRecord>,
    pub dim_date: Vec<DateDimRow>,
    pub dim_customer: Vec<CustomerDimRow>,
    pub dim_product: Vec<ProductDimRow>,
    pub dim_product_category: Vec<CategoryDimRow>,
    pub fact_sales: Vec<FactSalesRow>,
    pub mart_sales_performance: Vec<SalesPerformanceRow>,
    pub mart_category_analysis: Vec<CategoryAnalysisRow>,
    pub counters: TransformCounters,
}

impl TransformOutput {
    pub fn table_counts(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            (tables::STG_RETAIL_SALES, self.staging_sales.len()),
            (tables::STG_API_PRODUCTS, self.staging_products.len()),
            (tables::DIM_DATE, self.dim_date.len()),
            (tables::DIM_CUSTOMER, self.dim_customer.len()),
            (tables::DIM_PRODUCT, self.dim_product.len()),
            (tables::DIM_PRODUCT_CATEGORY, self.dim_product_category.len()),
            (tables::FACT_SALES, self.fact_sales.len()),
            (tables::MART_SALES_PERFORMANCE, self.mart_sales_performance.len()),
            (tables::MART_CATEGORY_ANALYSIS, self.mart_category_analysis.len()),
        ])
    }
}
