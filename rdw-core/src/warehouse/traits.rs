use crate::common::error::Result;
use crate::domain::*;
use async_trait::async_trait;

/// Table-oriented warehouse sink.
///
/// Write semantics differ per table class and the implementations must honor
/// them: staging tables are append-only, everything else is a full replace
/// that is atomic from the perspective of a concurrent reader. The two
/// `fetch_*` methods return the complete historical version set of the SCD2
/// dimensions (empty on first run); they are read fresh at the start of every
/// run, never cached in process memory.
#[async_trait]
pub trait Warehouse: Send + Sync {
    // Staging: append-only, provenance-tagged.
    async fn append_staging_sales(&self, rows: &[SalesRecord]) -> Result<usize>;
    async fn append_staging_products(&self, rows: &[ProductRecord]) -> Result<usize>;

    // Non-versioned dimensions: full replace.
    async fn replace_dim_date(&self, rows: &[DateDimRow]) -> Result<usize>;
    async fn replace_dim_product_category(&self, rows: &[CategoryDimRow]) -> Result<usize>;

    // SCD2 dimensions: full replace of the complete version set, plus the
    // prior-state fetch that seeds the next run's dimension build.
    async fn replace_dim_customer(&self, rows: &[CustomerDimRow]) -> Result<usize>;
    async fn fetch_dim_customer(&self) -> Result<Vec<CustomerDimRow>>;
    async fn replace_dim_product(&self, rows: &[ProductDimRow]) -> Result<usize>;
    async fn fetch_dim_product(&self) -> Result<Vec<ProductDimRow>>;

    // Facts and marts: full replace.
    async fn replace_fact_sales(&self, rows: &[FactSalesRow]) -> Result<usize>;
    async fn replace_mart_sales_performance(&self, rows: &[SalesPerformanceRow]) -> Result<usize>;
    async fn replace_mart_category_analysis(&self, rows: &[CategoryAnalysisRow]) -> Result<usize>;
}
