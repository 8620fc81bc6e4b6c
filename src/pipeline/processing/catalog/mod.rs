//! Catalog Reconciler
//!
//! Merges freshly derived dataset metadata into the human-curated catalog.
//! Citation fields are always taken from the metadata; curated fields are
//! never touched once a human has filled them in.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::constants::{MASTER_CONFIG_PATH, NOTE_NOT_AVAILABLE, TODO_SENTINEL};
use crate::error::{LakehouseError, Result};
use crate::metrics::CatalogMetrics;
use crate::pipeline::processing::materialize::encode_rows;
use crate::pipeline::processing::smelt::{check_key_agreement, read_master_keys, read_metadata};
use crate::storage::StorageClient;
use crate::types::{CatalogEntry, DatasetMetadata};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys whose rows were removed
    pub orphaned_keys: Vec<String>,
    /// Rows removed, orphans and keyless rows together
    pub rows_removed: usize,
    /// Hand-edited rows without a `dataset_key`
    pub rows_without_key: usize,
    pub stubs_inserted: usize,
    pub rows: usize,
}

fn stub(meta: &DatasetMetadata) -> CatalogEntry {
    CatalogEntry {
        dataset_id: 0,
        dataset_key: meta.dataset_key.clone(),
        display_label: TODO_SENTINEL.to_string(),
        source_citation: meta.source_citation.clone(),
        source_link: meta.source_link.clone(),
        variable_type: TODO_SENTINEL.to_string(),
        nav_category: TODO_SENTINEL.to_string(),
        color: TODO_SENTINEL.to_string(),
        nav_subcategory: TODO_SENTINEL.to_string(),
        note: meta.note.clone(),
    }
}

/// Reconcile `catalog` against `metadata`.
///
/// Rows without a key are removed. Rows whose key left the metadata are
/// removed unless allow-listed. Every
/// surviving row gets its citation fields refreshed. Each new key gets one
/// stub row, placed before the existing rows. Rows sharing a key are kept
/// and treated independently. Ids are reassigned as `1..=N`.
pub fn reconcile(
    catalog: Vec<CatalogEntry>,
    metadata: &[DatasetMetadata],
    allow_list: &[String],
) -> (Vec<CatalogEntry>, ReconcileReport) {
    let by_key: HashMap<&str, &DatasetMetadata> = metadata
        .iter()
        .map(|m| (m.dataset_key.as_str(), m))
        .rev() // first metadata row wins
        .collect();
    let allowed: HashSet<&str> = allow_list.iter().map(|s| s.as_str()).collect();

    let rows_before = catalog.len();
    let catalog: Vec<CatalogEntry> = catalog
        .into_iter()
        .filter(|e| !e.dataset_key.trim().is_empty())
        .collect();
    let rows_without_key = rows_before - catalog.len();
    if rows_without_key > 0 {
        warn!(rows = rows_without_key, "Removing catalog rows without dataset_key");
    }

    let orphaned_keys: BTreeSet<String> = catalog
        .iter()
        .map(|e| e.dataset_key.as_str())
        .filter(|key| !by_key.contains_key(key) && !allowed.contains(key))
        .map(|key| key.to_string())
        .collect();

    let mut survivors: Vec<CatalogEntry> = catalog
        .into_iter()
        .filter(|e| !orphaned_keys.contains(&e.dataset_key))
        .collect();
    let rows_removed = rows_before - survivors.len();

    for entry in &mut survivors {
        if let Some(meta) = by_key.get(entry.dataset_key.as_str()) {
            entry.source_citation = meta.source_citation.clone();
            entry.source_link = meta.source_link.clone();
            entry.note = meta.note.clone();
        }
    }

    let present: HashSet<&str> = survivors.iter().map(|e| e.dataset_key.as_str()).collect();
    let mut stubbed = HashSet::new();
    let stubs: Vec<CatalogEntry> = metadata
        .iter()
        .filter(|m| !present.contains(m.dataset_key.as_str()))
        .filter(|m| stubbed.insert(m.dataset_key.as_str()))
        .map(stub)
        .collect();
    let stubs_inserted = stubs.len();
    drop(present);

    let mut entries = stubs;
    entries.extend(survivors);
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.dataset_id = position + 1;
        if entry.note.trim().is_empty() {
            entry.note = NOTE_NOT_AVAILABLE.to_string();
        }
    }

    let report = ReconcileReport {
        orphaned_keys: orphaned_keys.into_iter().collect(),
        rows_removed,
        rows_without_key,
        stubs_inserted,
        rows: entries.len(),
    };
    (entries, report)
}

/// `dataset_id` must run `1..=N` over the row order.
pub fn check_dense_ids(entries: &[CatalogEntry]) -> Result<()> {
    for (position, entry) in entries.iter().enumerate() {
        if entry.dataset_id != position + 1 {
            return Err(LakehouseError::Catalog(format!(
                "dataset_id {} at row {} breaks the 1..N sequence",
                entry.dataset_id,
                position + 1
            )));
        }
    }
    Ok(())
}

/// Catalog row as found on disk. Humans edit this file, so every column is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredCatalogRow {
    dataset_id: String,
    dataset_key: String,
    display_label: String,
    source_citation: String,
    source_link: String,
    variable_type: String,
    nav_category: String,
    color: String,
    nav_subcategory: String,
    note: String,
}

impl From<StoredCatalogRow> for CatalogEntry {
    fn from(row: StoredCatalogRow) -> Self {
        CatalogEntry {
            dataset_id: row.dataset_id.trim().parse().unwrap_or(0),
            dataset_key: row.dataset_key,
            display_label: row.display_label,
            source_citation: row.source_citation,
            source_link: row.source_link,
            variable_type: row.variable_type,
            nav_category: row.nav_category,
            color: row.color,
            nav_subcategory: row.nav_subcategory,
            note: row.note,
        }
    }
}

pub fn parse_catalog(bytes: &[u8]) -> Result<Vec<CatalogEntry>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let mut entries = Vec::new();
    for row in reader.deserialize::<StoredCatalogRow>() {
        entries.push(row?.into());
    }
    Ok(entries)
}

/// The persisted catalog, or an empty one on the first run.
pub async fn read_catalog(storage: &dyn StorageClient) -> Result<Vec<CatalogEntry>> {
    if !storage.exists(MASTER_CONFIG_PATH).await? {
        info!("No catalog at {}, starting from an empty one", MASTER_CONFIG_PATH);
        return Ok(Vec::new());
    }
    parse_catalog(&storage.read(MASTER_CONFIG_PATH).await?)
}

pub async fn write_catalog(storage: &dyn StorageClient, entries: &[CatalogEntry]) -> Result<()> {
    storage.write(MASTER_CONFIG_PATH, &encode_rows(entries)?).await
}

/// Reconcile the persisted catalog against the persisted metadata.
///
/// The catalog is written only after the fact table and metadata agree on
/// their dataset keys and the reconciled ids are dense.
#[instrument(skip(storage, allow_list))]
pub async fn reconcile_catalog(
    storage: Arc<dyn StorageClient>,
    allow_list: &[String],
) -> Result<ReconcileReport> {
    let fact_keys = read_master_keys(storage.as_ref()).await?;
    let metadata = read_metadata(storage.as_ref()).await?;
    let metadata_keys: BTreeSet<String> = metadata.iter().map(|m| m.dataset_key.clone()).collect();
    check_key_agreement(&fact_keys, &metadata_keys)?;

    let catalog = read_catalog(storage.as_ref()).await?;
    let (entries, report) = reconcile(catalog, &metadata, allow_list);
    check_dense_ids(&entries)?;
    write_catalog(storage.as_ref(), &entries).await?;

    CatalogMetrics::record_reconciled(report.stubs_inserted, report.orphaned_keys.len(), report.rows);
    info!(
        rows = report.rows,
        stubs_inserted = report.stubs_inserted,
        orphans_retired = report.orphaned_keys.len(),
        rows_removed = report.rows_removed,
        "Catalog reconciled"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MASTER_META_PATH, MASTER_STATS_PATH};
    use crate::storage::InMemoryStorage;
    use crate::types::MasterFactRow;

    fn meta(key: &str, citation: &str, note: &str) -> DatasetMetadata {
        DatasetMetadata {
            dataset_key: key.to_string(),
            source_citation: citation.to_string(),
            source_link: format!("https://example.org/{}", key),
            note: note.to_string(),
        }
    }

    fn entry(id: usize, key: &str, label: &str, category: &str) -> CatalogEntry {
        CatalogEntry {
            dataset_id: id,
            dataset_key: key.to_string(),
            display_label: label.to_string(),
            source_citation: "old citation".to_string(),
            source_link: "https://old.example".to_string(),
            variable_type: "continuous".to_string(),
            nav_category: category.to_string(),
            color: "#123456".to_string(),
            nav_subcategory: "Sub".to_string(),
            note: "old note".to_string(),
        }
    }

    fn no_allow_list() -> Vec<String> {
        Vec::new()
    }

    #[test]
    fn test_orphaned_key_is_removed() {
        let catalog = vec![entry(1, "X", "Foo", "Economy"), entry(2, "K", "Keep", "Economy")];
        let (out, report) = reconcile(catalog, &[meta("K", "c", "n")], &no_allow_list());

        assert!(out.iter().all(|e| e.dataset_key != "X"));
        assert_eq!(report.orphaned_keys, vec!["X"]);
        assert_eq!(report.rows_removed, 1);
    }

    #[test]
    fn test_new_key_gets_exactly_one_stub() {
        let catalog = vec![entry(1, "K", "Keep", "Economy")];
        let metadata = vec![meta("K", "c", "n"), meta("Y", "y citation", "y note")];

        let (out, report) = reconcile(catalog, &metadata, &no_allow_list());

        let y: Vec<&CatalogEntry> = out.iter().filter(|e| e.dataset_key == "Y").collect();
        assert_eq!(y.len(), 1);
        assert_eq!(y[0].display_label, "TODO");
        assert_eq!(y[0].nav_category, "TODO");
        assert_eq!(y[0].source_citation, "y citation");
        assert_eq!(report.stubs_inserted, 1);
        // stubs come first
        assert_eq!(out[0].dataset_key, "Y");
        assert_eq!(out[0].dataset_id, 1);
    }

    #[test]
    fn test_duplicate_rows_survive_and_are_refreshed_independently() {
        let catalog = vec![
            entry(7, "Z", "Z in economy", "Economy"),
            entry(3, "Z", "Z in health", "Health"),
        ];
        let (out, _) = reconcile(catalog, &[meta("Z", "new citation", "new note")], &no_allow_list());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].nav_category, "Economy");
        assert_eq!(out[1].nav_category, "Health");
        assert!(out.iter().all(|e| e.source_citation == "new citation" && e.note == "new note"));
        assert_eq!(out.iter().map(|e| e.dataset_id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_curated_fields_are_preserved() {
        let before = entry(5, "K", "Curated label", "Health");
        let (out, _) = reconcile(vec![before.clone()], &[meta("K", "fresh", "")], &no_allow_list());

        let after = &out[0];
        assert_eq!(after.display_label, before.display_label);
        assert_eq!(after.variable_type, before.variable_type);
        assert_eq!(after.nav_category, before.nav_category);
        assert_eq!(after.color, before.color);
        assert_eq!(after.nav_subcategory, before.nav_subcategory);
        assert_eq!(after.source_citation, "fresh");
        assert_eq!(after.note, "Not available.");
    }

    #[test]
    fn test_allow_listed_orphan_keeps_its_row() {
        let catalog = vec![entry(1, "Global power stations of the world", "Power", "Energy")];
        let allow = vec!["Global power stations of the world".to_string()];

        let (out, report) = reconcile(catalog, &[], &allow);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_citation, "old citation");
        assert!(report.orphaned_keys.is_empty());
    }

    #[test]
    fn test_ids_are_dense_after_removals() {
        let catalog = vec![
            entry(10, "A", "a", "c"),
            entry(20, "Gone", "g", "c"),
            entry(30, "B", "b", "c"),
        ];
        let metadata = vec![meta("A", "", ""), meta("B", "", ""), meta("C", "", "")];

        let (out, _) = reconcile(catalog, &metadata, &no_allow_list());

        assert_eq!(out.iter().map(|e| e.dataset_id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(check_dense_ids(&out).is_ok());
    }

    #[test]
    fn test_check_dense_ids_rejects_gaps() {
        let entries = vec![entry(1, "A", "a", "c"), entry(3, "B", "b", "c")];
        assert!(matches!(check_dense_ids(&entries), Err(LakehouseError::Catalog(_))));
    }

    #[test]
    fn test_parse_catalog_tolerates_hand_edits() {
        let csv = "dataset_id,dataset_key,display_label,nav_category\n\
                   ,Population,People,Demography\n\
                   2,,orphan row,Nowhere\n";
        let entries = parse_catalog(csv.as_bytes()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].dataset_id, 0);
        assert_eq!(entries[0].display_label, "People");
        assert_eq!(entries[0].color, "");
        assert_eq!(entries[1].dataset_key, "");
    }

    #[test]
    fn test_rows_without_key_are_reported_removals() {
        let catalog = vec![
            entry(1, "K", "Keep", "Economy"),
            entry(2, "  ", "Blank", "Nowhere"),
            entry(3, "", "Empty", "Nowhere"),
        ];

        let (out, report) = reconcile(catalog, &[meta("K", "c", "n")], &no_allow_list());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].dataset_key, "K");
        assert_eq!(report.rows_without_key, 2);
        assert_eq!(report.rows_removed, 2);
        assert!(report.orphaned_keys.is_empty());
    }

    async fn seed_titanium(storage: &dyn StorageClient, fact_keys: &[&str], meta_keys: &[&str]) {
        let master: Vec<MasterFactRow> = fact_keys
            .iter()
            .map(|key| MasterFactRow {
                country_m49: "004".to_string(),
                country_name: "Afghanistan".to_string(),
                period: "2020".to_string(),
                dataset_key: key.to_string(),
                value: "1".to_string(),
                continent: "Asia".to_string(),
                un_region: "Southern Asia".to_string(),
                world_bank_region: "South Asia".to_string(),
            })
            .collect();
        let metadata: Vec<DatasetMetadata> = meta_keys.iter().map(|key| meta(key, "c", "n")).collect();
        storage.write(MASTER_STATS_PATH, &encode_rows(&master).unwrap()).await.unwrap();
        storage.write(MASTER_META_PATH, &encode_rows(&metadata).unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_key_disagreement_leaves_catalog_untouched() {
        let storage = Arc::new(InMemoryStorage::new());
        seed_titanium(storage.as_ref(), &["A", "B"], &["A", "C"]).await;
        let catalog = encode_rows(&[entry(4, "B", "Curated B", "Economy")]).unwrap();
        storage.write(MASTER_CONFIG_PATH, &catalog).await.unwrap();

        let result = reconcile_catalog(storage.clone(), &no_allow_list()).await;

        match result {
            Err(LakehouseError::ReconciliationInvariant {
                missing_in_metadata,
                missing_in_facts,
            }) => {
                assert_eq!(missing_in_metadata, vec!["B"]);
                assert_eq!(missing_in_facts, vec!["C"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(storage.read(MASTER_CONFIG_PATH).await.unwrap(), catalog);
    }

    #[tokio::test]
    async fn test_reconcile_catalog_writes_dense_catalog() {
        let storage = Arc::new(InMemoryStorage::new());
        seed_titanium(storage.as_ref(), &["A"], &["A"]).await;

        let report = reconcile_catalog(storage.clone(), &no_allow_list()).await.unwrap();

        assert_eq!(report.stubs_inserted, 1);
        let written = parse_catalog(&storage.read(MASTER_CONFIG_PATH).await.unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].dataset_id, 1);
        assert_eq!(written[0].display_label, TODO_SENTINEL);
    }
}
