//! Consolidation ("smelt"): merges every source's segments into the master
//! fact table and derives per-dataset metadata.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, instrument};

use crate::constants::{MASTER_META_PATH, MASTER_STATS_PATH, SEGMENT_MANIFEST};
use crate::error::{LakehouseError, Result};
use crate::metrics::SmeltMetrics;
use crate::pipeline::processing::materialize::{
    decode_rows, encode_rows, sha256_hex, SegmentInfo, SegmentManifest,
};
use crate::pipeline::processing::quality_gate::{filter_coverage, CoverageReport};
use crate::pipeline::tier::Tier;
use crate::storage::StorageClient;
use crate::types::{DatasetMetadata, FactRow, MasterFactRow};

/// Summary of one consolidation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmeltSummary {
    pub segments_read: usize,
    pub coverage: CoverageReport,
    pub master_rows: usize,
    pub datasets: usize,
}

/// Every normalized segment across all sources, in a stable order.
///
/// Only sealed segment-sets are accepted: each source folder needs a complete
/// `_manifest.json` whose segment keys are exactly the segments present.
pub async fn list_segments(storage: &dyn StorageClient) -> Result<Vec<SegmentInfo>> {
    let prefix = Tier::Iron.key("statistics");
    let mut folders: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for key in storage.list(&prefix).await? {
        let Some((folder, _)) = key.rsplit_once('/') else {
            continue;
        };
        let entry = folders.entry(folder.to_string()).or_default();
        if key.ends_with(".csv") {
            entry.insert(key);
        }
    }

    let mut segments = Vec::new();
    for (folder, present) in folders {
        let manifest_key = format!("{}/{}", folder, SEGMENT_MANIFEST);
        if !storage.exists(&manifest_key).await? {
            return Err(LakehouseError::invalid_segment_set(folder, "no segment manifest"));
        }
        let manifest: SegmentManifest = serde_json::from_slice(&storage.read(&manifest_key).await?)?;
        if !manifest.complete {
            return Err(LakehouseError::invalid_segment_set(
                folder,
                format!("run {} did not finish", manifest.run_id),
            ));
        }

        let listed: BTreeSet<String> = manifest.segments.iter().map(|s| s.key.clone()).collect();
        if listed != present {
            let missing: Vec<&String> = listed.difference(&present).collect();
            let unexpected: Vec<&String> = present.difference(&listed).collect();
            return Err(LakehouseError::invalid_segment_set(
                folder,
                format!("missing segments {:?}, unlisted segments {:?}", missing, unexpected),
            ));
        }

        let mut sealed = manifest.segments;
        sealed.sort_by_key(|s| s.index);
        segments.extend(sealed);
    }

    if segments.is_empty() {
        return Err(LakehouseError::NoSegments(prefix));
    }
    Ok(segments)
}

fn verify_segment(info: &SegmentInfo, bytes: &[u8], rows: usize) -> Result<()> {
    let folder = info.key.rsplit_once('/').map(|(f, _)| f).unwrap_or(info.key.as_str());
    if sha256_hex(bytes) != info.sha256 {
        return Err(LakehouseError::invalid_segment_set(
            folder,
            format!("{} does not match its manifest digest", info.key),
        ));
    }
    if rows != info.rows {
        return Err(LakehouseError::invalid_segment_set(
            folder,
            format!("{} holds {} rows, manifest lists {}", info.key, rows, info.rows),
        ));
    }
    Ok(())
}

/// Read, verify and concatenate segments. Reads run concurrently; the result
/// keeps the order of `segments`.
pub async fn read_segments(storage: Arc<dyn StorageClient>, segments: &[SegmentInfo]) -> Result<Vec<FactRow>> {
    let mut tasks = JoinSet::new();
    for (position, info) in segments.iter().cloned().enumerate() {
        let storage = storage.clone();
        tasks.spawn(async move {
            let bytes = storage.read(&info.key).await?;
            let rows: Vec<FactRow> = decode_rows(&bytes)?;
            verify_segment(&info, &bytes, rows.len())?;
            Ok::<_, LakehouseError>((position, rows))
        });
    }

    let mut parts: Vec<(usize, Vec<FactRow>)> = Vec::with_capacity(segments.len());
    while let Some(joined) = tasks.join_next().await {
        let part = joined.map_err(|e| LakehouseError::transport("iron/statistics", e))??;
        parts.push(part);
    }
    parts.sort_by_key(|(position, _)| *position);

    Ok(parts.into_iter().flat_map(|(_, rows)| rows).collect())
}

/// One metadata row per dataset key, taken from the first row seen for it.
pub fn derive_metadata(rows: &[FactRow]) -> Vec<DatasetMetadata> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| seen.insert(row.dataset_key.as_str()))
        .map(DatasetMetadata::from)
        .collect()
}

/// Fail unless both key sets are identical.
pub fn check_key_agreement(fact_keys: &BTreeSet<String>, metadata_keys: &BTreeSet<String>) -> Result<()> {
    if fact_keys == metadata_keys {
        return Ok(());
    }
    Err(LakehouseError::ReconciliationInvariant {
        missing_in_metadata: fact_keys.difference(metadata_keys).cloned().collect(),
        missing_in_facts: metadata_keys.difference(fact_keys).cloned().collect(),
    })
}

/// Distinct dataset keys of the persisted master fact table, read without
/// materializing the rows.
pub async fn read_master_keys(storage: &dyn StorageClient) -> Result<BTreeSet<String>> {
    let bytes = storage.read(MASTER_STATS_PATH).await?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let Some(idx) = reader.headers()?.iter().position(|h| h == "dataset_key") else {
        // An empty master table has no header row
        return Ok(BTreeSet::new());
    };

    let mut keys = BTreeSet::new();
    for record in reader.records() {
        if let Some(key) = record?.get(idx) {
            if !keys.contains(key) {
                keys.insert(key.to_string());
            }
        }
    }
    Ok(keys)
}

pub async fn read_metadata(storage: &dyn StorageClient) -> Result<Vec<DatasetMetadata>> {
    let bytes = storage.read(MASTER_META_PATH).await?;
    decode_rows(&bytes)
}

/// Consolidate all segments into the master fact table and metadata table.
///
/// Nothing is written unless the dataset keys of both outputs agree.
#[instrument(skip(storage))]
pub async fn smelt(storage: Arc<dyn StorageClient>, min_countries: usize) -> Result<SmeltSummary> {
    let segments = list_segments(storage.as_ref()).await?;
    let rows = read_segments(storage.clone(), &segments).await?;
    info!(segments = segments.len(), rows = rows.len(), "Concatenated normalized segments");

    let (rows, coverage) = filter_coverage(rows, min_countries);

    let metadata = derive_metadata(&rows);
    let master: Vec<MasterFactRow> = rows.into_iter().map(MasterFactRow::from).collect();

    let fact_keys: BTreeSet<String> = master.iter().map(|r| r.dataset_key.clone()).collect();
    let metadata_keys: BTreeSet<String> = metadata.iter().map(|m| m.dataset_key.clone()).collect();
    check_key_agreement(&fact_keys, &metadata_keys)?;

    storage.write(MASTER_STATS_PATH, &encode_rows(&master)?).await?;
    storage.write(MASTER_META_PATH, &encode_rows(&metadata)?).await?;

    let summary = SmeltSummary {
        segments_read: segments.len(),
        coverage,
        master_rows: master.len(),
        datasets: metadata.len(),
    };
    SmeltMetrics::record_consolidated(summary.segments_read, summary.master_rows, summary.datasets);
    info!(
        master_rows = summary.master_rows,
        datasets = summary.datasets,
        "Wrote {} and {}",
        MASTER_STATS_PATH,
        MASTER_META_PATH
    );
    Ok(summary)
}
