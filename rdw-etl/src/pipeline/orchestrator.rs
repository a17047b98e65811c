use crate::common::error::{PipelineError, Result};
use crate::config::EtlConfig;
use crate::extract::{CatalogSource, SalesSource};
use crate::observability::metrics;
use crate::pipeline::keys::KeyAllocator;
use crate::pipeline::load::{Loader, TableLoadResult};
use crate::pipeline::normalize::Normalizer;
use crate::pipeline::{dimensions, facts, marts, validate, TransformCounters, TransformOutput};
use chrono::{DateTime, Utc};
use rdw_core::domain::{RawBatch, SourceTag};
use rdw_core::Warehouse;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Extract, transform and load.
    Full,
    /// Extract and transform; nothing is persisted.
    TransformOnly,
    /// Extraction only.
    ExtractOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Some warehouse tables failed to load; the rest were applied.
    PartialSuccess,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub rows_in: usize,
    pub rows_out: usize,
    pub rows_rejected: usize,
    pub duration_ms: u64,
}

fn stage_summary(rows_in: usize, rows_out: usize, rows_rejected: usize, since: Instant) -> StageSummary {
    StageSummary {
        rows_in,
        rows_out,
        rows_rejected,
        duration_ms: since.elapsed().as_millis() as u64,
    }
}

/// Structured run summary, serialized for the monitoring consumer.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub stages: BTreeMap<&'static str, StageSummary>,
    pub table_counts: BTreeMap<&'static str, usize>,
    pub counters: TransformCounters,
    pub load: Vec<TableLoadResult>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl RunSummary {
    fn new(mode: RunMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            status: RunStatus::Failure,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
            stages: BTreeMap::new(),
            table_counts: BTreeMap::new(),
            counters: TransformCounters::default(),
            load: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn finish(&mut self, status: RunStatus, since: Instant) {
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.duration_ms = since.elapsed().as_millis() as u64;
        match status {
            RunStatus::Success => info!(run_id = %self.run_id, "✅ pipeline run succeeded"),
            RunStatus::PartialSuccess => {
                warn!(run_id = %self.run_id, "⚠️ pipeline run partially succeeded")
            }
            RunStatus::Failure => error!(run_id = %self.run_id, "❌ pipeline run failed"),
        }
    }
}

/// Sequences extract -> transform -> load, collects per-stage metrics and
/// decides the overall run status. One run is sequential and batch-oriented;
/// the prior dimension state is read fresh from the warehouse every run.
pub struct PipelineOrchestrator {
    config: EtlConfig,
    warehouse: Arc<dyn Warehouse>,
    sales_source: Box<dyn SalesSource>,
    catalog_source: Box<dyn CatalogSource>,
}

impl PipelineOrchestrator {
    pub fn new(
        config: EtlConfig,
        warehouse: Arc<dyn Warehouse>,
        sales_source: Box<dyn SalesSource>,
        catalog_source: Box<dyn CatalogSource>,
    ) -> Self {
        Self { config, warehouse, sales_source, catalog_source }
    }

    pub async fn run(&self, mode: RunMode) -> RunSummary {
        let since = Instant::now();
        let mut summary = RunSummary::new(mode);
        info!(run_id = %summary.run_id, ?mode, "🚀 starting pipeline run");

        // Pre-flight: the sales file is required, the catalog endpoint is not.
        let catalog_ok = match self.preflight(&mut summary).await {
            Ok(reachable) => reachable,
            Err(e) => {
                error!("pre-flight failed: {e}");
                summary.errors.push(e.to_string());
                summary.finish(RunStatus::Failure, since);
                return summary;
            }
        };

        // Extract.
        let stage_since = Instant::now();
        let (sales_batch, products_batch, api_categories) =
            match self.extract(catalog_ok, &mut summary).await {
                Ok(extracted) => extracted,
                Err(e) => {
                    error!("extraction failed: {e}");
                    summary.errors.push(e.to_string());
                    summary.finish(RunStatus::Failure, since);
                    return summary;
                }
            };
        let extracted_rows = sales_batch.records.len() + products_batch.records.len();
        summary
            .stages
            .insert("extract", stage_summary(extracted_rows, extracted_rows, 0, stage_since));

        if mode == RunMode::ExtractOnly {
            summary.finish(RunStatus::Success, since);
            return summary;
        }

        // Transform.
        let stage_since = Instant::now();
        let output = match self
            .transform(sales_batch, products_batch, &api_categories, summary.started_at)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!("transform failed: {e}");
                summary.errors.push(e.to_string());
                summary.finish(RunStatus::Failure, since);
                return summary;
            }
        };
        let rejected =
            output.counters.sales_rows_rejected + output.counters.product_rows_rejected;
        let normalized_rows = output.staging_sales.len() + output.staging_products.len();
        summary.stages.insert(
            "transform",
            stage_summary(extracted_rows, normalized_rows, rejected, stage_since),
        );
        summary.table_counts = output.table_counts();
        summary.counters = output.counters.clone();

        // Quality gate ahead of load.
        let gate_failures =
            validate::validate_transform(&output, &self.config.validation.min_rows);
        if !gate_failures.is_empty() {
            for failure in &gate_failures {
                error!("transform validation failed: {failure}");
            }
            summary.errors.extend(gate_failures);
            summary.finish(RunStatus::Failure, since);
            return summary;
        }

        if mode == RunMode::TransformOnly {
            info!("skipping load stage");
            summary.finish(RunStatus::Success, since);
            return summary;
        }

        // Load.
        let stage_since = Instant::now();
        let total_rows: usize = summary.table_counts.values().sum();
        let report = Loader::new(self.warehouse.as_ref()).load_all(&output).await;
        summary
            .stages
            .insert("load", stage_summary(total_rows, report.rows_written(), 0, stage_since));
        for failed in report.tables.iter().filter(|t| !t.ok) {
            summary.errors.push(format!(
                "{}: {}",
                failed.table,
                failed.error.as_deref().unwrap_or("load failed")
            ));
        }

        let status = if report.failed() == 0 {
            RunStatus::Success
        } else if report.loaded() > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Failure
        };
        summary.load = report.tables;
        summary.finish(status, since);
        summary
    }

    async fn preflight(&self, summary: &mut RunSummary) -> Result<bool> {
        let path = &self.config.sources.sales_csv;
        let metadata = std::fs::metadata(path).map_err(|_| {
            PipelineError::Config(format!("sales file '{}' not found", path.display()))
        })?;
        if metadata.len() == 0 {
            return Err(PipelineError::Config(format!(
                "sales file '{}' is empty",
                path.display()
            )));
        }

        let reachable = self.catalog_source.is_reachable().await;
        if !reachable {
            warn!("catalog source unreachable, continuing with CSV-only extraction");
            summary
                .warnings
                .push("catalog source unreachable, ran CSV-only".to_string());
        }
        Ok(reachable)
    }

    async fn extract(
        &self,
        catalog_ok: bool,
        summary: &mut RunSummary,
    ) -> Result<(RawBatch, RawBatch, Vec<String>)> {
        // The sales source is the pipeline's reason to exist; its failure is
        // fatal. The catalog source degrades to an empty batch, leaving prior
        // product dimension state to carry forward.
        let sales = self.sales_source.extract().await?;
        metrics::extract::records_extracted(SourceTag::RetailCsv.as_str(), sales.records.len());

        if !catalog_ok {
            return Ok((sales, RawBatch::empty(SourceTag::CatalogApi, Utc::now()), Vec::new()));
        }

        let products = match self.catalog_source.extract_products().await {
            Ok(batch) => {
                metrics::extract::records_extracted(
                    SourceTag::CatalogApi.as_str(),
                    batch.records.len(),
                );
                batch
            }
            Err(e) => {
                warn!("catalog product extraction failed: {e}");
                metrics::extract::source_error(SourceTag::CatalogApi.as_str());
                summary.warnings.push(format!("catalog product extraction failed: {e}"));
                RawBatch::empty(SourceTag::CatalogApi, Utc::now())
            }
        };
        let categories = match self.catalog_source.extract_categories().await {
            Ok(categories) => categories,
            Err(e) => {
                warn!("catalog category extraction failed: {e}");
                metrics::extract::source_error(SourceTag::CatalogApi.as_str());
                summary.warnings.push(format!("catalog category extraction failed: {e}"));
                Vec::new()
            }
        };
        Ok((sales, products, categories))
    }

    async fn transform(
        &self,
        sales_batch: RawBatch,
        products_batch: RawBatch,
        api_categories: &[String],
        run_time: DateTime<Utc>,
    ) -> Result<TransformOutput> {
        let normalizer = Normalizer::new(self.config.validation.on_invalid);
        let normalized = normalizer.normalize(&[sales_batch, products_batch]);

        // Prior SCD2 state comes from the warehouse, fetched fresh per run.
        let prior_customers = self.warehouse.fetch_dim_customer().await?;
        let prior_products = self.warehouse.fetch_dim_product().await?;

        let mut keys = KeyAllocator::new();
        let dim_date = dimensions::build_dim_date(&normalized.sales);
        let (customer_outcome, customer_conflicts) =
            dimensions::build_dim_customer(prior_customers, &normalized.sales, &mut keys, run_time);
        let (product_outcome, product_conflicts) =
            dimensions::build_dim_product(prior_products, &normalized.products, &mut keys, run_time);
        let dim_product_category = dimensions::build_dim_product_category(
            &normalized.sales,
            &normalized.products,
            api_categories,
            run_time,
        );

        let fact_outcome = facts::build_fact_sales(
            &normalized.sales,
            &customer_outcome.rows,
            &dim_product_category,
            run_time,
        );

        let mart_sales_performance =
            marts::build_mart_sales_performance(&fact_outcome.rows, run_time);
        let mart_category_analysis =
            marts::build_mart_category_analysis(&fact_outcome.rows, &dim_product_category, run_time);

        Ok(TransformOutput {
            counters: TransformCounters {
                sales_rows_rejected: normalized.sales_rejected,
                product_rows_rejected: normalized.products_rejected,
                amount_mismatches: normalized.amount_mismatches,
                customer_conflicts_dropped: customer_conflicts,
                product_conflicts_dropped: product_conflicts,
                customer_versions_created: customer_outcome.new_entities
                    + customer_outcome.new_versions,
                product_versions_created: product_outcome.new_entities
                    + product_outcome.new_versions,
                hash_collisions: customer_outcome.hash_collisions
                    + product_outcome.hash_collisions,
                unresolved_customer_refs: fact_outcome.unresolved_customers,
                unresolved_category_refs: fact_outcome.unresolved_categories,
            },
            staging_sales: normalized.sales,
            staging_products: normalized.products,
            dim_date,
            dim_customer: customer_outcome.rows,
            dim_product: product_outcome.rows,
            dim_product_category,
            fact_sales: fact_outcome.rows,
            mart_sales_performance,
            mart_category_analysis,
        })
    }
}
