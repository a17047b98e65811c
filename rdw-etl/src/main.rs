use clap::{Parser, Subcommand};
use rdw_core::Warehouse;
use rdw_etl::config::EtlConfig;
use rdw_etl::extract::{CatalogApiSource, FlatFileSource};
use rdw_etl::observability::logging::init_logging;
use rdw_etl::{PipelineOrchestrator, RunMode, RunStatus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rdw-etl")]
#[command(about = "Retail data warehouse ETL pipeline")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file (defaults to ./etl.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full run: extract, transform and load into the warehouse
    Run,
    /// Extract and transform only; nothing is persisted
    Transform,
    /// Extraction only
    Extract,
}

#[cfg(feature = "db")]
fn build_warehouse(config: &EtlConfig) -> anyhow::Result<Arc<dyn Warehouse>> {
    use rdw_core::warehouse::SqliteWarehouse;
    Ok(Arc::new(SqliteWarehouse::open(&config.warehouse.db_path)?))
}

#[cfg(not(feature = "db"))]
fn build_warehouse(_config: &EtlConfig) -> anyhow::Result<Arc<dyn Warehouse>> {
    use rdw_core::warehouse::InMemoryWarehouse;
    tracing::warn!("built without the db feature; warehouse state will not survive this process");
    Ok(Arc::new(InMemoryWarehouse::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = EtlConfig::load(cli.config.as_deref())?;

    let mode = match cli.command {
        Commands::Run => RunMode::Full,
        Commands::Transform => RunMode::TransformOnly,
        Commands::Extract => RunMode::ExtractOnly,
    };

    let warehouse = build_warehouse(&config)?;
    let sales_source = Box::new(FlatFileSource::new(&config.sources.sales_csv));
    let catalog_source = Box::new(CatalogApiSource::new(
        &config.sources.catalog_base_url,
        Duration::from_secs(config.sources.timeout_seconds),
    )?);

    let orchestrator =
        PipelineOrchestrator::new(config, warehouse, sales_source, catalog_source);
    let summary = orchestrator.run(mode).await;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.status == RunStatus::Failure {
        std::process::exit(1);
    }
    Ok(())
}
