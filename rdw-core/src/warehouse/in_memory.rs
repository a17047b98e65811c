use super::traits::Warehouse;
use crate::common::error::Result;
use crate::domain::*;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-memory warehouse for tests and transform-only dry runs.
///
/// Each table lives behind its own mutex so a replace swaps the whole vector
/// at once, matching the atomic-replace contract of the trait.
#[derive(Default)]
pub struct InMemoryWarehouse {
    stg_retail_sales: Arc<Mutex<Vec<SalesRecord>>>,
    stg_api_products: Arc<Mutex<Vec<ProductRecord>>>,
    dim_date: Arc<Mutex<Vec<DateDimRow>>>,
    dim_customer: Arc<Mutex<Vec<CustomerDimRow>>>,
    dim_product: Arc<Mutex<Vec<ProductDimRow>>>,
    dim_product_category: Arc<Mutex<Vec<CategoryDimRow>>>,
    fact_sales: Arc<Mutex<Vec<FactSalesRow>>>,
    mart_sales_performance: Arc<Mutex<Vec<SalesPerformanceRow>>>,
    mart_category_analysis: Arc<Mutex<Vec<CategoryAnalysisRow>>>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    // Read accessors for assertions against replace-only tables.

    pub fn staging_sales(&self) -> Vec<SalesRecord> {
        self.stg_retail_sales.lock().unwrap().clone()
    }

    pub fn staging_products(&self) -> Vec<ProductRecord> {
        self.stg_api_products.lock().unwrap().clone()
    }

    pub fn dim_date(&self) -> Vec<DateDimRow> {
        self.dim_date.lock().unwrap().clone()
    }

    pub fn dim_product_category(&self) -> Vec<CategoryDimRow> {
        self.dim_product_category.lock().unwrap().clone()
    }

    pub fn fact_sales(&self) -> Vec<FactSalesRow> {
        self.fact_sales.lock().unwrap().clone()
    }

    pub fn mart_sales_performance(&self) -> Vec<SalesPerformanceRow> {
        self.mart_sales_performance.lock().unwrap().clone()
    }

    pub fn mart_category_analysis(&self) -> Vec<CategoryAnalysisRow> {
        self.mart_category_analysis.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn append_staging_sales(&self, rows: &[SalesRecord]) -> Result<usize> {
        let mut table = self.stg_retail_sales.lock().unwrap();
        table.extend_from_slice(rows);
        debug!(rows = rows.len(), total = table.len(), "appended to {}", tables::STG_RETAIL_SALES);
        Ok(rows.len())
    }

    async fn append_staging_products(&self, rows: &[ProductRecord]) -> Result<usize> {
        let mut table = self.stg_api_products.lock().unwrap();
        table.extend_from_slice(rows);
        debug!(rows = rows.len(), total = table.len(), "appended to {}", tables::STG_API_PRODUCTS);
        Ok(rows.len())
    }

    async fn replace_dim_date(&self, rows: &[DateDimRow]) -> Result<usize> {
        *self.dim_date.lock().unwrap() = rows.to_vec();
        Ok(rows.len())
    }

    async fn replace_dim_product_category(&self, rows: &[CategoryDimRow]) -> Result<usize> {
        *self.dim_product_category.lock().unwrap() = rows.to_vec();
        Ok(rows.len())
    }

    async fn replace_dim_customer(&self, rows: &[CustomerDimRow]) -> Result<usize> {
        *self.dim_customer.lock().unwrap() = rows.to_vec();
        Ok(rows.len())
    }

    async fn fetch_dim_customer(&self) -> Result<Vec<CustomerDimRow>> {
        Ok(self.dim_customer.lock().unwrap().clone())
    }

    async fn replace_dim_product(&self, rows: &[ProductDimRow]) -> Result<usize> {
        *self.dim_product.lock().unwrap() = rows.to_vec();
        Ok(rows.len())
    }

    async fn fetch_dim_product(&self) -> Result<Vec<ProductDimRow>> {
        Ok(self.dim_product.lock().unwrap().clone())
    }

    async fn replace_fact_sales(&self, rows: &[FactSalesRow]) -> Result<usize> {
        *self.fact_sales.lock().unwrap() = rows.to_vec();
        Ok(rows.len())
    }

    async fn replace_mart_sales_performance(&self, rows: &[SalesPerformanceRow]) -> Result<usize> {
        *self.mart_sales_performance.lock().unwrap() = rows.to_vec();
        Ok(rows.len())
    }

    async fn replace_mart_category_analysis(&self, rows: &[CategoryAnalysisRow]) -> Result<usize> {
        *self.mart_category_analysis.lock().unwrap() = rows.to_vec();
        Ok(rows.len())
    }
}
