// Lakehouse pipeline: copper → iron → titanium

pub mod ingestion;
pub mod processing;
pub mod tier;

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::constants::{COUNTRY_LOOKUP_PATH, MASTER_CONFIG_PATH};
use crate::error::{LakehouseError, Result, SkipReason};
use crate::metrics::NormalizeMetrics;
use crate::storage::StorageClient;
use ingestion::{RawExtractLoader, StorageExtractLoader, TableHandle};
use processing::catalog::{reconcile_catalog, ReconcileReport};
use processing::materialize::{BatchWriter, StorageSegmentSink};
use processing::normalize::{AdapterRegistry, ConceptTable, SourceAdapter};
use processing::quality_gate::filter_coverage;
use processing::smelt::{smelt, SmeltSummary};
use processing::taxonomy::CountryTaxonomy;
use tier::Tier;

/// Knobs of the normalization stage, copied into each source task.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeSettings {
    pub min_countries: usize,
    pub batch_size: usize,
    pub max_attempts: usize,
}

impl From<&Config> for NormalizeSettings {
    fn from(config: &Config) -> Self {
        Self {
            min_countries: config.quality_gate.min_countries,
            batch_size: config.materializer.batch_size,
            max_attempts: config.materializer.max_attempts,
        }
    }
}

/// Outcome of normalizing one source
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    pub tables_read: usize,
    pub tables_skipped: BTreeMap<&'static str, usize>,
    pub rows_dropped: BTreeMap<&'static str, usize>,
    /// Rows removed by the coverage filter
    pub rows_gated: usize,
    pub rows_written: usize,
    pub segments: usize,
}

impl SourceReport {
    pub fn tables_skipped_total(&self) -> usize {
        self.tables_skipped.values().sum()
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub sources: Vec<SourceReport>,
    pub master_rows: usize,
    pub datasets: usize,
    pub catalog_rows: usize,
    pub stubs_inserted: usize,
    pub orphans_retired: usize,
}

fn record_skip(report: &mut SourceReport, key: &str, reason: &SkipReason) {
    warn!(table = %key, reason = reason.label(), "Skipping table: {}", reason);
    NormalizeMetrics::record_table_skipped(&report.source_id, reason.label());
    *report.tables_skipped.entry(reason.label()).or_insert(0) += 1;
}

/// Normalize every data table of one source into its segment-set.
///
/// The previous segment-set is cleared first, so a rerun over the same
/// extracts produces the same segments. Until the run seals the manifest the
/// set is marked incomplete. Tables that cannot be parsed are skipped.
#[instrument(skip_all, fields(source = %adapter.source_id()))]
pub async fn normalize_source(
    adapter: Arc<dyn SourceAdapter>,
    loader: Arc<dyn RawExtractLoader>,
    storage: Arc<dyn StorageClient>,
    taxonomy: Arc<CountryTaxonomy>,
    settings: NormalizeSettings,
) -> Result<SourceReport> {
    let source_id = adapter.source_id().to_string();
    let folder = format!("statistics/{}", adapter.copper_folder());
    let mut report = SourceReport {
        source_id: source_id.clone(),
        ..Default::default()
    };

    let sink = StorageSegmentSink::new(storage, source_id.clone());
    sink.begin().await?;

    let concepts = match adapter.concept_file() {
        Some(file) => {
            let handle = TableHandle::new(Tier::Copper.key(&format!("{}/{}", folder, file)))
                .with_encoding(adapter.encoding());
            let table = ConceptTable::new(loader.read_table(&handle).await?);
            debug!(concepts = table.len(), "Loaded concept table");
            Some(table)
        }
        None => None,
    };

    let handles: Vec<TableHandle> = loader
        .list_sources(Tier::Copper, &folder)
        .await?
        .into_iter()
        .filter(|h| adapter.is_data_table(h.file_name()))
        .map(|h| h.with_encoding(adapter.encoding()))
        .collect();
    info!(tables = handles.len(), "Normalizing source");

    let mut writer = BatchWriter::new(&sink, settings.batch_size, settings.max_attempts);
    for handle in &handles {
        let read = loader.read_table(handle).await;
        report.tables_read += 1;
        NormalizeMetrics::record_table_read(&source_id);
        let raw = match read {
            Ok(raw) => raw,
            Err(LakehouseError::Unreadable { message, .. }) => {
                record_skip(&mut report, &handle.key, &SkipReason::Unreadable { message });
                continue;
            }
            Err(e) => return Err(e),
        };

        let normalized = match adapter.normalize(&raw, &taxonomy, concepts.as_ref()) {
            Ok(normalized) => normalized,
            Err(reason) => {
                record_skip(&mut report, &handle.key, &reason);
                continue;
            }
        };

        for (reason, count) in &normalized.dropped {
            NormalizeMetrics::record_rows_dropped(&source_id, *reason, *count);
            *report.rows_dropped.entry(*reason).or_insert(0) += count;
        }

        let (rows, coverage) = filter_coverage(normalized.rows, settings.min_countries);
        report.rows_gated += coverage.rows_dropped();
        report.rows_written += rows.len();
        NormalizeMetrics::record_rows_emitted(&source_id, rows.len());
        writer.extend(rows).await?;
    }

    let segments = writer.finish().await?;
    report.segments = segments.len();
    sink.write_manifest(segments).await?;

    info!(
        tables_read = report.tables_read,
        tables_skipped = report.tables_skipped_total(),
        rows_written = report.rows_written,
        segments = report.segments,
        "Source normalized"
    );
    Ok(report)
}

/// The lakehouse pipeline, holding the collaborators every stage shares.
pub struct Pipeline {
    storage: Arc<dyn StorageClient>,
    loader: Arc<dyn RawExtractLoader>,
    registry: AdapterRegistry,
    config: Config,
}

impl Pipeline {
    pub fn new(storage: Arc<dyn StorageClient>, config: Config) -> Self {
        Self {
            loader: Arc::new(StorageExtractLoader::new(storage.clone())),
            storage,
            registry: AdapterRegistry::new(),
            config,
        }
    }

    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn RawExtractLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the canonical country registry from the copper tier.
    pub async fn load_taxonomy(&self) -> Result<CountryTaxonomy> {
        let raw = self.loader.read_table(&TableHandle::new(COUNTRY_LOOKUP_PATH)).await?;
        CountryTaxonomy::from_table(&raw)
    }

    fn requested_sources(&self, sources: &[String]) -> Vec<String> {
        if sources.is_empty() {
            self.config.pipeline.sources.clone()
        } else {
            sources.to_vec()
        }
    }

    /// Copper → iron for the requested sources (all enabled sources when empty).
    ///
    /// Sources run concurrently when `pipeline.parallel_sources` is set; each
    /// task owns its own segment-set. Any source failure fails the stage once
    /// every task has finished.
    #[instrument(skip(self))]
    pub async fn run_normalize(&self, sources: &[String]) -> Result<Vec<SourceReport>> {
        let adapters = self.registry.select(&self.requested_sources(sources))?;
        let taxonomy = Arc::new(self.load_taxonomy().await?);
        let settings = NormalizeSettings::from(&self.config);
        let started = Instant::now();

        let mut results: Vec<(usize, Result<SourceReport>)> = Vec::with_capacity(adapters.len());
        if self.config.pipeline.parallel_sources {
            let mut tasks = JoinSet::new();
            for (position, adapter) in adapters.iter().cloned().enumerate() {
                let loader = self.loader.clone();
                let storage = self.storage.clone();
                let taxonomy = taxonomy.clone();
                tasks.spawn(async move {
                    let result = normalize_source(adapter, loader, storage, taxonomy, settings).await;
                    (position, result)
                });
            }
            while let Some(joined) = tasks.join_next().await {
                let (position, result) =
                    joined.map_err(|e| LakehouseError::transport("normalize", e))?;
                results.push((position, result));
            }
            results.sort_by_key(|(position, _)| *position);
        } else {
            for (position, adapter) in adapters.iter().cloned().enumerate() {
                let result = normalize_source(
                    adapter,
                    self.loader.clone(),
                    self.storage.clone(),
                    taxonomy.clone(),
                    settings,
                )
                .await;
                results.push((position, result));
            }
        }

        let mut reports = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (position, result) in results {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(source = adapters[position].source_id(), "Normalization failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        info!(
            sources = reports.len(),
            rows = reports.iter().map(|r| r.rows_written).sum::<usize>(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Normalization finished"
        );
        Ok(reports)
    }

    /// Iron → titanium: master fact table and metadata.
    pub async fn run_smelt(&self) -> Result<SmeltSummary> {
        smelt(self.storage.clone(), self.config.quality_gate.min_countries).await
    }

    /// Reconcile the catalog against the current metadata.
    pub async fn run_reconcile(&self) -> Result<ReconcileReport> {
        reconcile_catalog(self.storage.clone(), &self.config.catalog.allow_list).await
    }

    /// Reset the copper, iron and titanium tiers for a rebuild from staging.
    ///
    /// The curated catalog is kept. Returns the number of objects removed.
    #[instrument(skip(self))]
    pub async fn clean(&self) -> Result<usize> {
        let mut removed = 0;
        for tier in [Tier::Copper, Tier::Iron, Tier::Titanium] {
            for key in self.storage.list(tier.as_str()).await? {
                if key == MASTER_CONFIG_PATH {
                    continue;
                }
                self.storage.delete(&key).await?;
                removed += 1;
            }
        }
        info!(removed, "Lakehouse cleaned, catalog kept at {}", MASTER_CONFIG_PATH);
        Ok(removed)
    }

    /// All stages in order; each fully completes before the next starts.
    pub async fn run_all(&self, sources: &[String]) -> Result<RunSummary> {
        let reports = self.run_normalize(sources).await?;
        let smelted = self.run_smelt().await?;
        let reconciled = self.run_reconcile().await?;

        Ok(RunSummary {
            sources: reports,
            master_rows: smelted.master_rows,
            datasets: smelted.datasets,
            catalog_rows: reconciled.rows,
            stubs_inserted: reconciled.stubs_inserted,
            orphans_retired: reconciled.orphaned_keys.len(),
        })
    }
}
