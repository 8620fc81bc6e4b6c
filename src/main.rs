use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use atlas_lakehouse::config::Config;
use atlas_lakehouse::logging;
use atlas_lakehouse::metrics;
use atlas_lakehouse::pipeline::Pipeline;
use atlas_lakehouse::storage::{LocalStorage, StorageClient};
use atlas_lakehouse::SourceReport;

#[derive(Parser)]
#[command(name = "atlas_lakehouse")]
#[command(about = "Consolidates country-level statistical extracts into a master fact table and catalog")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./lakehouse.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage root, overriding the config file and LAKEHOUSE_ROOT
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize copper extracts into iron segments
    Normalize {
        /// Specific sources to normalize (comma-separated)
        #[arg(long)]
        sources: Option<String>,
    },
    /// Consolidate iron segments into the titanium master tables
    Smelt,
    /// Reconcile the presentation catalog with the dataset metadata
    Reconcile,
    /// Run normalize, smelt and reconcile in order
    Run {
        /// Specific sources to normalize (comma-separated)
        #[arg(long)]
        sources: Option<String>,
    },
    /// List the registered sources
    Sources,
    /// Empty the copper, iron and titanium tiers, keeping the curated catalog
    Clean,
}

fn parse_sources(sources: Option<String>) -> Vec<String> {
    sources
        .map(|list| {
            list.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn print_source_reports(reports: &[SourceReport]) {
    for report in reports {
        println!("\n📊 Normalization results for {}:", report.source_id);
        println!("   Tables read: {}", report.tables_read);
        println!("   Tables skipped: {}", report.tables_skipped_total());
        for (reason, count) in &report.tables_skipped {
            println!("     - {}: {}", reason, count);
        }
        println!("   Rows dropped: {}", report.rows_dropped.values().sum::<usize>());
        println!("   Rows below coverage: {}", report.rows_gated);
        println!("   Rows written: {}", report.rows_written);
        println!("   Segments: {}", report.segments);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging(Path::new("logs"));
    if metrics::init_metrics() {
        info!("Prometheus exporter enabled");
    }

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.storage.root = root;
    }
    info!("Using storage root {}", config.storage.root.display());

    let storage: Arc<dyn StorageClient> = Arc::new(LocalStorage::new(config.storage.root.clone()));
    let pipeline = Pipeline::new(storage, config);

    match cli.command {
        Commands::Normalize { sources } => {
            println!("🔄 Normalizing copper extracts...");
            match pipeline.run_normalize(&parse_sources(sources)).await {
                Ok(reports) => {
                    print_source_reports(&reports);
                    println!("\n✅ Normalization completed successfully");
                }
                Err(e) => {
                    error!("Normalization failed: {}", e);
                    println!("❌ Normalization failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Smelt => {
            println!("🔥 Smelting iron segments...");
            match pipeline.run_smelt().await {
                Ok(summary) => {
                    println!("   Segments read: {}", summary.segments_read);
                    println!("   Groups below coverage: {}", summary.coverage.groups_dropped());
                    println!("   Master rows: {}", summary.master_rows);
                    println!("   Datasets: {}", summary.datasets);
                    println!("✅ Smelt completed successfully");
                }
                Err(e) => {
                    error!("Smelt failed: {}", e);
                    println!("❌ Smelt failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Reconcile => {
            println!("📚 Reconciling catalog...");
            match pipeline.run_reconcile().await {
                Ok(report) => {
                    println!("   Stubs inserted: {}", report.stubs_inserted);
                    println!("   Rows without key removed: {}", report.rows_without_key);
                    println!("   Orphans retired: {}", report.orphaned_keys.len());
                    for key in &report.orphaned_keys {
                        println!("     - {}", key);
                    }
                    println!("   Catalog rows: {}", report.rows);
                    println!("✅ Catalog reconciled");
                }
                Err(e) => {
                    error!("Reconciliation failed: {}", e);
                    println!("❌ Reconciliation failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Run { sources } => {
            println!("🚀 Running full pipeline (normalize + smelt + reconcile)...");
            match pipeline.run_all(&parse_sources(sources)).await {
                Ok(summary) => {
                    print_source_reports(&summary.sources);
                    println!("\n🔥 Master rows: {}", summary.master_rows);
                    println!("   Datasets: {}", summary.datasets);
                    println!("📚 Catalog rows: {}", summary.catalog_rows);
                    println!("   Stubs inserted: {}", summary.stubs_inserted);
                    println!("   Orphans retired: {}", summary.orphans_retired);
                    println!("✅ Full pipeline completed successfully!");
                }
                Err(e) => {
                    error!("Pipeline failed: {}", e);
                    println!("❌ Pipeline failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Clean => {
            println!("🧹 Cleaning lakehouse tiers...");
            match pipeline.clean().await {
                Ok(removed) => {
                    println!("   Objects removed: {}", removed);
                    println!("✅ Lakehouse cleaned, catalog kept");
                }
                Err(e) => {
                    error!("Clean failed: {}", e);
                    println!("❌ Clean failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Sources => {
            println!("📋 Registered sources:");
            for source in pipeline.registry().list_sources() {
                println!("   - {}", source);
            }
        }
    }
    Ok(())
}
