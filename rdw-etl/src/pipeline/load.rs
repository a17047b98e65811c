use crate::observability::metrics;
use crate::pipeline::TransformOutput;
use rdw_core::domain::tables;
use rdw_core::{Result, Warehouse};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Serialize)]
pub struct TableLoadResult {
    pub table: String,
    pub rows: usize,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub tables: Vec<TableLoadResult>,
}

impl LoadReport {
    pub fn loaded(&self) -> usize {
        self.tables.iter().filter(|t| t.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.tables.iter().filter(|t| !t.ok).count()
    }

    pub fn rows_written(&self) -> usize {
        self.tables.iter().filter(|t| t.ok).map(|t| t.rows).sum()
    }
}

/// Applies one transform output to the warehouse, one table at a time.
///
/// A failed table is reported and does not abort sibling loads; there is no
/// automatic retry. Write policy lives in the warehouse implementation:
/// staging appends, everything else replaces atomically.
pub struct Loader<'a> {
    warehouse: &'a dyn Warehouse,
}

impl<'a> Loader<'a> {
    pub fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self { warehouse }
    }

    pub async fn load_all(&self, output: &TransformOutput) -> LoadReport {
        let mut report = LoadReport::default();

        let wh = self.warehouse;
        record(&mut report, tables::STG_RETAIL_SALES, wh.append_staging_sales(&output.staging_sales).await);
        record(&mut report, tables::STG_API_PRODUCTS, wh.append_staging_products(&output.staging_products).await);
        record(&mut report, tables::DIM_DATE, wh.replace_dim_date(&output.dim_date).await);
        record(&mut report, tables::DIM_CUSTOMER, wh.replace_dim_customer(&output.dim_customer).await);
        record(&mut report, tables::DIM_PRODUCT, wh.replace_dim_product(&output.dim_product).await);
        record(
            &mut report,
            tables::DIM_PRODUCT_CATEGORY,
            wh.replace_dim_product_category(&output.dim_product_category).await,
        );
        record(&mut report, tables::FACT_SALES, wh.replace_fact_sales(&output.fact_sales).await);
        record(
            &mut report,
            tables::MART_SALES_PERFORMANCE,
            wh.replace_mart_sales_performance(&output.mart_sales_performance).await,
        );
        record(
            &mut report,
            tables::MART_CATEGORY_ANALYSIS,
            wh.replace_mart_category_analysis(&output.mart_category_analysis).await,
        );

        info!(
            loaded = report.loaded(),
            failed = report.failed(),
            rows = report.rows_written(),
            "load finished"
        );
        report
    }
}

fn record(report: &mut LoadReport, table: &str, result: Result<usize>) {
    match result {
        Ok(rows) => {
            metrics::load::table_loaded(table, rows);
            info!(table, rows, "✅ table loaded");
            report.tables.push(TableLoadResult {
                table: table.to_string(),
                rows,
                ok: true,
                error: None,
            });
        }
        Err(e) => {
            metrics::load::table_failed(table);
            error!(table, "❌ table load failed: {e}");
            report.tables.push(TableLoadResult {
                table: table.to_string(),
                rows: 0,
                ok: false,
                error: Some(e.to_string()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdw_core::warehouse::InMemoryWarehouse;

    #[tokio::test]
    async fn empty_output_loads_every_table_successfully() {
        let warehouse = InMemoryWarehouse::new();
        let report = Loader::new(&warehouse).load_all(&TransformOutput::default()).await;
        assert_eq!(report.loaded(), 9);
        assert_eq!(report.failed(), 0);
    }
}
