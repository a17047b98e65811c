use crate::common::error::Result;
use crate::extract::CatalogSource;
use async_trait::async_trait;
use chrono::Utc;
use rdw_core::domain::{RawBatch, RawRecord, SourceTag};
use rdw_core::EtlError;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// Fetches the product catalog and its category list over HTTP.
pub struct CatalogApiSource {
    client: reqwest::Client,
    products_url: String,
    categories_url: String,
}

impl CatalogApiSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base = base_url.trim_end_matches('/');
        Ok(Self {
            client,
            products_url: format!("{base}/products"),
            categories_url: format!("{base}/products/categories"),
        })
    }
}

#[async_trait]
impl CatalogSource for CatalogApiSource {
    async fn extract_products(&self) -> Result<RawBatch> {
        let extracted_at = Utc::now();
        info!(url = %self.products_url, "extracting catalog products");

        let payload: Value = self
            .client
            .get(&self.products_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let products = payload.as_array().ok_or_else(|| {
            EtlError::source_format(
                SourceTag::CatalogApi.as_str(),
                "expected a JSON array of products",
            )
        })?;

        let mut records = Vec::with_capacity(products.len());
        for product in products {
            let mut values = product
                .as_object()
                .ok_or_else(|| {
                    EtlError::source_format(
                        SourceTag::CatalogApi.as_str(),
                        "expected each product to be a JSON object",
                    )
                })?
                .clone();

            // Flatten the nested rating object.
            if let Some(rating) = values.remove("rating") {
                let rate = rating.get("rate").cloned().unwrap_or(Value::from(0.0));
                let count = rating.get("count").cloned().unwrap_or(Value::from(0));
                values.insert("rating_rate".to_string(), rate);
                values.insert("rating_count".to_string(), count);
            }

            records.push(RawRecord { source: SourceTag::CatalogApi, values, extracted_at });
        }

        info!(rows = records.len(), "extracted catalog products");
        Ok(RawBatch { source: SourceTag::CatalogApi, records, extracted_at })
    }

    async fn extract_categories(&self) -> Result<Vec<String>> {
        info!(url = %self.categories_url, "extracting catalog categories");
        let categories: Vec<String> = self
            .client
            .get(&self.categories_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!(count = categories.len(), "extracted catalog categories");
        Ok(categories)
    }

    async fn is_reachable(&self) -> bool {
        match self.client.get(&self.categories_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
