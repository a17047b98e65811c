pub mod dimensions;
pub mod facts;
pub mod marts;
pub mod records;

pub use dimensions::{
    date_key_for, open_ended_end_date, CategoryDimRow, CustomerDimRow, DateDimRow, ProductDimRow,
};
pub use facts::{FactSalesRow, UNKNOWN_KEY};
pub use marts::{CategoryAnalysisRow, SalesPerformanceRow};
pub use records::{ProductRecord, RawBatch, RawRecord, SalesRecord, SourceTag};

/// Warehouse table names, shared between the loader and the load report.
pub mod tables {
    pub const STG_RETAIL_SALES: &str = "stg_retail_sales";
    pub const STG_API_PRODUCTS: &str = "stg_api_products";
    pub const DIM_DATE: &str = "dim_date";
    pub const DIM_CUSTOMER: &str = "dim_customer";
    pub const DIM_PRODUCT: &str = "dim_product";
    pub const DIM_PRODUCT_CATEGORY: &str = "dim_product_category";
    pub const FACT_SALES: &str = "fact_sales";
    pub const MART_SALES_PERFORMANCE: &str = "mart_sales_performance";
    pub const MART_CATEGORY_ANALYSIS: &str = "mart_category_analysis";
}
