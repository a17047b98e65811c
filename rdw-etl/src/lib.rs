//! Batch ETL pipeline: retail sales flat file + product catalog API into a
//! star-schema warehouse with SCD Type 2 dimension history.

pub mod common;
pub mod config;
pub mod extract;
pub mod observability;
pub mod pipeline;

pub use pipeline::{PipelineOrchestrator, RunMode, RunStatus, RunSummary};
