//! Shared domain model and warehouse access for the retail data warehouse.

pub mod common;
pub mod domain;
pub mod warehouse;

pub use common::error::{EtlError, Result};
pub use warehouse::Warehouse;
