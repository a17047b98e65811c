// Extraction adapters: producers of raw record batches.

pub mod catalog_api;
pub mod flat_file;

pub use catalog_api::CatalogApiSource;
pub use flat_file::FlatFileSource;

use crate::common::error::Result;
use async_trait::async_trait;
use rdw_core::domain::RawBatch;

/// Port for the retail sales flat-file source.
#[async_trait]
pub trait SalesSource: Send + Sync {
    async fn extract(&self) -> Result<RawBatch>;
}

/// Port for the product catalog REST source.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn extract_products(&self) -> Result<RawBatch>;
    async fn extract_categories(&self) -> Result<Vec<String>>;
    /// Pre-flight connectivity probe. A `false` here downgrades the run to
    /// CSV-only processing instead of failing it.
    async fn is_reachable(&self) -> bool;
}
