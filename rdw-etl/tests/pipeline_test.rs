use async_trait::async_trait;
use chrono::Utc;
use rdw_core::domain::{tables, RawBatch, RawRecord, SourceTag, UNKNOWN_KEY};
use rdw_core::warehouse::InMemoryWarehouse;
use rdw_core::{EtlError, Warehouse};
use rdw_etl::common::error::Result as EtlResult;
use rdw_etl::config::EtlConfig;
use rdw_etl::extract::{CatalogSource, FlatFileSource};
use rdw_etl::{PipelineOrchestrator, RunMode, RunStatus};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const SALES_CSV: &str = "\
Transaction ID,Date,Customer ID,Gender,Age,Product Category,Quantity,Price per Unit,Total Amount
1,2023-05-01,CUST001,Female,34,Beauty,2,25,50
2,2023-05-02,CUST002,Male,41,Electronics,1,500,500
3,2023-05-03,CUST001,Female,34,Clothing,3,10,30
4,2023-05-04,CUST003,Female,29,Beauty,1,15,15
";

fn sales_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn product(id: i64, title: &str, price: f64) -> Value {
    json!({
        "id": id,
        "title": title,
        "price": price,
        "description": "a product",
        "category": "jewelery",
        "image": format!("https://example.com/{id}.jpg"),
        "rating_rate": 4.5,
        "rating_count": 120,
    })
}

struct FakeCatalog {
    products: Vec<Value>,
    categories: Vec<String>,
    reachable: bool,
}

impl FakeCatalog {
    fn with_products(products: Vec<Value>) -> Self {
        Self {
            products,
            categories: vec!["jewelery".to_string(), "electronics".to_string()],
            reachable: true,
        }
    }

    fn empty() -> Self {
        Self { products: Vec::new(), categories: Vec::new(), reachable: true }
    }

    fn unreachable() -> Self {
        Self { products: Vec::new(), categories: Vec::new(), reachable: false }
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn extract_products(&self) -> EtlResult<RawBatch> {
        let extracted_at = Utc::now();
        let records = self
            .products
            .iter()
            .map(|p| RawRecord {
                source: SourceTag::CatalogApi,
                values: p.as_object().unwrap().clone(),
                extracted_at,
            })
            .collect();
        Ok(RawBatch { source: SourceTag::CatalogApi, records, extracted_at })
    }

    async fn extract_categories(&self) -> EtlResult<Vec<String>> {
        Ok(self.categories.clone())
    }

    async fn is_reachable(&self) -> bool {
        self.reachable
    }
}

fn orchestrator(
    csv: &NamedTempFile,
    warehouse: Arc<dyn Warehouse>,
    catalog: FakeCatalog,
) -> PipelineOrchestrator {
    let mut config = EtlConfig::default();
    config.sources.sales_csv = csv.path().to_path_buf();
    PipelineOrchestrator::new(
        config,
        warehouse,
        Box::new(FlatFileSource::new(csv.path())),
        Box::new(catalog),
    )
}

#[tokio::test]
async fn full_run_builds_the_star_schema() {
    let csv = sales_file(SALES_CSV);
    let warehouse = Arc::new(InMemoryWarehouse::new());
    let catalog =
        FakeCatalog::with_products(vec![product(1, "Gold Ring", 19.99), product(2, "Bracelet", 45.0)]);

    let summary = orchestrator(&csv, warehouse.clone(), catalog).run(RunMode::Full).await;
    assert_eq!(summary.status, RunStatus::Success, "errors: {:?}", summary.errors);

    // Staging carries the normalized batches.
    assert_eq!(warehouse.staging_sales().len(), 4);
    assert_eq!(warehouse.staging_products().len(), 2);

    // Date dimension spans the whole of 2023.
    let dim_date = warehouse.dim_date();
    assert_eq!(dim_date.len(), 365);
    assert!(dim_date.iter().all(|d| d.year == 2023));

    // One current version per customer.
    let customers = warehouse.fetch_dim_customer().await.unwrap();
    assert_eq!(customers.len(), 3);
    assert!(customers.iter().all(|c| c.is_current && c.version == 1));

    // Categories union both sources.
    let categories = warehouse.dim_product_category();
    let names: Vec<&str> = categories.iter().map(|c| c.category_name.as_str()).collect();
    assert_eq!(names, vec!["Beauty", "Clothing", "Electronics", "Jewelery"]);

    // Every fact resolves.
    let facts = warehouse.fact_sales();
    assert_eq!(facts.len(), 4);
    assert!(facts.iter().all(|f| f.customer_key != UNKNOWN_KEY));
    assert!(facts.iter().all(|f| f.category_key != UNKNOWN_KEY));

    // Marts are recomputed and consistent.
    let performance = warehouse.mart_sales_performance();
    assert_eq!(performance.len(), 1);
    assert_eq!(performance[0].total_revenue, 595.0);
    let analysis = warehouse.mart_category_analysis();
    let share: f64 = analysis.iter().filter_map(|r| r.revenue_share_pct).sum();
    assert!((share - 100.0).abs() < 0.05, "shares summed to {share}");

    assert_eq!(summary.table_counts[tables::FACT_SALES], 4);
    assert!(summary.errors.is_empty());
}

#[tokio::test]
async fn price_change_across_runs_versions_the_product_dimension() {
    let csv = sales_file(SALES_CSV);
    let warehouse = Arc::new(InMemoryWarehouse::new());

    let first = orchestrator(
        &csv,
        warehouse.clone(),
        FakeCatalog::with_products(vec![product(1, "Gold Ring", 19.99)]),
    );
    let summary = first.run(RunMode::Full).await;
    assert_eq!(summary.status, RunStatus::Success);

    let second = orchestrator(
        &csv,
        warehouse.clone(),
        FakeCatalog::with_products(vec![product(1, "Gold Ring", 24.99)]),
    );
    let summary = second.run(RunMode::Full).await;
    assert_eq!(summary.status, RunStatus::Success);

    let products = warehouse.fetch_dim_product().await.unwrap();
    assert_eq!(products.len(), 2);

    let v1 = products.iter().find(|p| p.version == 1).unwrap();
    assert!(!v1.is_current);
    assert_eq!(v1.price, 19.99);

    let v2 = products.iter().find(|p| p.version == 2).unwrap();
    assert!(v2.is_current);
    assert_eq!(v2.price, 24.99);
    assert_eq!(v1.effective_end_date, v2.effective_start_date);
    assert_ne!(v1.product_key, v2.product_key);

    // Staging is append-only across runs; facts are replaced.
    assert_eq!(warehouse.staging_sales().len(), 8);
    assert_eq!(warehouse.fact_sales().len(), 4);
}

#[tokio::test]
async fn rerunning_identical_input_creates_no_spurious_versions() {
    let csv = sales_file(SALES_CSV);
    let warehouse = Arc::new(InMemoryWarehouse::new());

    let summary = orchestrator(
        &csv,
        warehouse.clone(),
        FakeCatalog::with_products(vec![product(1, "Gold Ring", 19.99)]),
    )
    .run(RunMode::Full)
    .await;
    assert_eq!(summary.status, RunStatus::Success);
    let first_customers = warehouse.fetch_dim_customer().await.unwrap();

    let summary = orchestrator(
        &csv,
        warehouse.clone(),
        FakeCatalog::with_products(vec![product(1, "Gold Ring", 19.99)]),
    )
    .run(RunMode::Full)
    .await;
    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.counters.customer_versions_created, 0);
    assert_eq!(summary.counters.product_versions_created, 0);

    let second_customers = warehouse.fetch_dim_customer().await.unwrap();
    assert_eq!(first_customers.len(), second_customers.len());
    for (a, b) in first_customers.iter().zip(&second_customers) {
        assert_eq!(a.customer_key, b.customer_key);
        assert_eq!(a.version, b.version);
        assert_eq!(a.row_hash, b.row_hash);
        assert_eq!(a.effective_start_date, b.effective_start_date);
    }
}

#[tokio::test]
async fn empty_input_completes_successfully_with_zero_counts() {
    let csv = sales_file(
        "Transaction ID,Date,Customer ID,Gender,Age,Product Category,Quantity,Price per Unit,Total Amount\n",
    );
    let warehouse = Arc::new(InMemoryWarehouse::new());
    let summary = orchestrator(&csv, warehouse.clone(), FakeCatalog::empty())
        .run(RunMode::Full)
        .await;

    assert_eq!(summary.status, RunStatus::Success, "errors: {:?}", summary.errors);
    assert!(summary.errors.is_empty());
    assert!(summary.table_counts.values().all(|&count| count == 0));
    assert!(warehouse.fact_sales().is_empty());
}

#[tokio::test]
async fn unreachable_catalog_downgrades_to_csv_only() {
    let csv = sales_file(SALES_CSV);
    let warehouse = Arc::new(InMemoryWarehouse::new());

    // First run ingests the catalog normally.
    let summary = orchestrator(
        &csv,
        warehouse.clone(),
        FakeCatalog::with_products(vec![product(1, "Gold Ring", 19.99)]),
    )
    .run(RunMode::Full)
    .await;
    assert_eq!(summary.status, RunStatus::Success);

    // Second run cannot reach the catalog: prior product state carries
    // forward untouched and the run still succeeds.
    let summary = orchestrator(&csv, warehouse.clone(), FakeCatalog::unreachable())
        .run(RunMode::Full)
        .await;
    assert_eq!(summary.status, RunStatus::Success);
    assert!(!summary.warnings.is_empty());

    let products = warehouse.fetch_dim_product().await.unwrap();
    assert_eq!(products.len(), 1);
    assert!(products[0].is_current);
}

#[tokio::test]
async fn transform_only_persists_nothing() {
    let csv = sales_file(SALES_CSV);
    let warehouse = Arc::new(InMemoryWarehouse::new());
    let summary = orchestrator(
        &csv,
        warehouse.clone(),
        FakeCatalog::with_products(vec![product(1, "Gold Ring", 19.99)]),
    )
    .run(RunMode::TransformOnly)
    .await;

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.table_counts[tables::FACT_SALES], 4);
    assert!(warehouse.staging_sales().is_empty());
    assert!(warehouse.fact_sales().is_empty());
    assert!(summary.load.is_empty());
}

#[tokio::test]
async fn extract_only_stops_before_transform() {
    let csv = sales_file(SALES_CSV);
    let warehouse = Arc::new(InMemoryWarehouse::new());
    let summary = orchestrator(
        &csv,
        warehouse.clone(),
        FakeCatalog::with_products(vec![product(1, "Gold Ring", 19.99)]),
    )
    .run(RunMode::ExtractOnly)
    .await;

    assert_eq!(summary.status, RunStatus::Success);
    assert!(summary.stages.contains_key("extract"));
    assert!(!summary.stages.contains_key("transform"));
    assert!(summary.table_counts.is_empty());
}

#[tokio::test]
async fn malformed_sales_schema_fails_the_run() {
    let csv = sales_file("Transaction ID,Date\n1,2023-05-01\n");
    let warehouse = Arc::new(InMemoryWarehouse::new());
    let summary = orchestrator(&csv, warehouse, FakeCatalog::with_products(Vec::new()))
        .run(RunMode::Full)
        .await;

    assert_eq!(summary.status, RunStatus::Failure);
    assert!(summary.errors.iter().any(|e| e.contains("missing required columns")));
}

#[tokio::test]
async fn bad_rows_are_counted_not_fatal() {
    let csv = sales_file(
        "Transaction ID,Date,Customer ID,Gender,Age,Product Category,Quantity,Price per Unit,Total Amount\n\
         1,2023-05-01,CUST001,Female,34,Beauty,2,25,50\n\
         2,not-a-date,CUST002,Male,41,Electronics,1,500,500\n\
         3,2023-05-03,CUST003,Female,29,Beauty,0,15,0\n",
    );
    let warehouse = Arc::new(InMemoryWarehouse::new());
    let summary = orchestrator(&csv, warehouse.clone(), FakeCatalog::with_products(Vec::new()))
        .run(RunMode::Full)
        .await;

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.counters.sales_rows_rejected, 2);
    assert_eq!(warehouse.fact_sales().len(), 1);
    let transform = &summary.stages["transform"];
    assert_eq!(transform.rows_rejected, 2);
}

// A warehouse that accepts everything except the fact table.
struct FactLoadFails {
    inner: InMemoryWarehouse,
}

#[async_trait]
impl Warehouse for FactLoadFails {
    async fn append_staging_sales(
        &self,
        rows: &[rdw_core::domain::SalesRecord],
    ) -> rdw_core::Result<usize> {
        self.inner.append_staging_sales(rows).await
    }

    async fn append_staging_products(
        &self,
        rows: &[rdw_core::domain::ProductRecord],
    ) -> rdw_core::Result<usize> {
        self.inner.append_staging_products(rows).await
    }

    async fn replace_dim_date(
        &self,
        rows: &[rdw_core::domain::DateDimRow],
    ) -> rdw_core::Result<usize> {
        self.inner.replace_dim_date(rows).await
    }

    async fn replace_dim_product_category(
        &self,
        rows: &[rdw_core::domain::CategoryDimRow],
    ) -> rdw_core::Result<usize> {
        self.inner.replace_dim_product_category(rows).await
    }

    async fn replace_dim_customer(
        &self,
        rows: &[rdw_core::domain::CustomerDimRow],
    ) -> rdw_core::Result<usize> {
        self.inner.replace_dim_customer(rows).await
    }

    async fn fetch_dim_customer(&self) -> rdw_core::Result<Vec<rdw_core::domain::CustomerDimRow>> {
        self.inner.fetch_dim_customer().await
    }

    async fn replace_dim_product(
        &self,
        rows: &[rdw_core::domain::ProductDimRow],
    ) -> rdw_core::Result<usize> {
        self.inner.replace_dim_product(rows).await
    }

    async fn fetch_dim_product(&self) -> rdw_core::Result<Vec<rdw_core::domain::ProductDimRow>> {
        self.inner.fetch_dim_product().await
    }

    async fn replace_fact_sales(
        &self,
        _rows: &[rdw_core::domain::FactSalesRow],
    ) -> rdw_core::Result<usize> {
        Err(EtlError::load(tables::FACT_SALES, "schema mismatch"))
    }

    async fn replace_mart_sales_performance(
        &self,
        rows: &[rdw_core::domain::SalesPerformanceRow],
    ) -> rdw_core::Result<usize> {
        self.inner.replace_mart_sales_performance(rows).await
    }

    async fn replace_mart_category_analysis(
        &self,
        rows: &[rdw_core::domain::CategoryAnalysisRow],
    ) -> rdw_core::Result<usize> {
        self.inner.replace_mart_category_analysis(rows).await
    }
}

#[tokio::test]
async fn failed_table_load_reports_partial_success() {
    let csv = sales_file(SALES_CSV);
    let warehouse = Arc::new(FactLoadFails { inner: InMemoryWarehouse::new() });
    let summary = orchestrator(&csv, warehouse, FakeCatalog::with_products(Vec::new()))
        .run(RunMode::Full)
        .await;

    assert_eq!(summary.status, RunStatus::PartialSuccess);
    let fact = summary.load.iter().find(|t| t.table == tables::FACT_SALES).unwrap();
    assert!(!fact.ok);
    assert!(summary.errors.iter().any(|e| e.contains(tables::FACT_SALES)));
    // Sibling tables still loaded.
    assert!(summary.load.iter().filter(|t| t.ok).count() >= 8);
}

#[cfg(feature = "db")]
#[tokio::test]
async fn sqlite_warehouse_carries_state_between_processes() {
    use rdw_core::warehouse::SqliteWarehouse;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("retail_dw.sqlite");
    let csv = sales_file(SALES_CSV);

    let warehouse = Arc::new(SqliteWarehouse::open(&db_path).unwrap());
    let summary = orchestrator(
        &csv,
        warehouse,
        FakeCatalog::with_products(vec![product(1, "Gold Ring", 19.99)]),
    )
    .run(RunMode::Full)
    .await;
    assert_eq!(summary.status, RunStatus::Success, "errors: {:?}", summary.errors);

    // A fresh connection sees the prior state, as a new process would.
    let warehouse = Arc::new(SqliteWarehouse::open(&db_path).unwrap());
    let summary = orchestrator(
        &csv,
        warehouse.clone(),
        FakeCatalog::with_products(vec![product(1, "Gold Ring", 24.99)]),
    )
    .run(RunMode::Full)
    .await;
    assert_eq!(summary.status, RunStatus::Success, "errors: {:?}", summary.errors);

    let products = warehouse.fetch_dim_product().await.unwrap();
    assert_eq!(products.len(), 2);
    assert!(products.iter().any(|p| p.version == 2 && p.is_current && p.price == 24.99));
}

#[tokio::test]
async fn missing_sales_file_fails_preflight() {
    let warehouse: Arc<dyn Warehouse> = Arc::new(InMemoryWarehouse::new());
    let mut config = EtlConfig::default();
    config.sources.sales_csv = std::path::PathBuf::from("/nonexistent/sales.csv");
    let orchestrator = PipelineOrchestrator::new(
        config,
        warehouse,
        Box::new(FlatFileSource::new("/nonexistent/sales.csv")),
        Box::new(FakeCatalog::with_products(Vec::new())),
    );

    let summary = orchestrator.run(RunMode::Full).await;
    assert_eq!(summary.status, RunStatus::Failure);
    assert!(summary.errors.iter().any(|e| e.contains("not found")));
}
