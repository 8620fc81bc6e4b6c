//! Raw Extract Loader: enumerates raw tables in a tier and reads them as text tables.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{LakehouseError, Result};
use crate::pipeline::tier::Tier;
use crate::storage::StorageClient;
use crate::types::RawTable;

/// Text encoding a source's extracts are stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
}

/// Decode raw bytes according to the declared encoding. A UTF-8 BOM is stripped.
pub fn decode_content(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => encoding_rs::UTF_8.decode(bytes).0.into_owned(),
        TextEncoding::Latin1 => encoding_rs::WINDOWS_1252
            .decode_without_bom_handling(bytes)
            .0
            .into_owned(),
    }
}

/// Reference to one raw table in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    pub key: String,
    pub encoding: TextEncoding,
}

impl TableHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            encoding: TextEncoding::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

#[async_trait]
pub trait RawExtractLoader: Send + Sync {
    /// Handles for every table under `path` in `tier`, in key order.
    async fn list_sources(&self, tier: Tier, path: &str) -> Result<Vec<TableHandle>>;
    async fn read_table(&self, handle: &TableHandle) -> Result<RawTable>;
}

/// Loader reading CSV extracts through a [`StorageClient`].
pub struct StorageExtractLoader {
    storage: Arc<dyn StorageClient>,
}

impl StorageExtractLoader {
    pub fn new(storage: Arc<dyn StorageClient>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RawExtractLoader for StorageExtractLoader {
    async fn list_sources(&self, tier: Tier, path: &str) -> Result<Vec<TableHandle>> {
        let prefix = tier.key(path);
        let handles: Vec<TableHandle> = self
            .storage
            .list(&prefix)
            .await?
            .into_iter()
            .filter(|key| key.to_ascii_lowercase().ends_with(".csv"))
            .map(TableHandle::new)
            .collect();
        debug!("Found {} raw tables under {}", handles.len(), prefix);
        Ok(handles)
    }

    async fn read_table(&self, handle: &TableHandle) -> Result<RawTable> {
        let bytes = self.storage.read(&handle.key).await?;
        let content = decode_content(&bytes, handle.encoding);
        parse_csv(&handle.key, &content)
    }
}

/// Parse CSV text with a header row into a [`RawTable`]. Ragged rows are allowed.
///
/// Content that is not a table fails with [`LakehouseError::Unreadable`].
pub fn parse_csv(name: &str, content: &str) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LakehouseError::unreadable(name, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(LakehouseError::unreadable(name, "table has no header row"));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LakehouseError::unreadable(name, e))?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }

    Ok(RawTable::new(name, headers, rows))
}
