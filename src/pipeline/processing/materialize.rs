//! Tier Materializer: writes normalized rows as numbered, immutable segments.
//!
//! Rows are buffered up to the batch size and flushed as one segment, so peak
//! memory is bounded by the batch and not by the size of the source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::SEGMENT_MANIFEST;
use crate::error::{LakehouseError, Result};
use crate::metrics::MaterializeMetrics;
use crate::pipeline::tier::{segment_folder, segment_key};
use crate::storage::StorageClient;
use crate::types::FactRow;

/// What was persisted for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub index: usize,
    pub key: String,
    pub rows: usize,
    /// Hex SHA-256 of the segment bytes
    pub sha256: String,
}

/// Record of one materialization run of a source.
///
/// A manifest with `complete == false` marks a segment-set whose run started
/// but never finished. Consolidation refuses such sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentManifest {
    pub source_id: String,
    pub run_id: Uuid,
    pub written_at: DateTime<Utc>,
    #[serde(default)]
    pub complete: bool,
    pub segments: Vec<SegmentInfo>,
}

impl SegmentManifest {
    pub fn total_rows(&self) -> usize {
        self.segments.iter().map(|s| s.rows).sum()
    }
}

/// Destination for numbered segments.
#[async_trait]
pub trait SegmentSink: Send + Sync {
    /// Persist segment `index` (1-based). Writing the same index twice replaces it.
    async fn write_segment(&self, index: usize, rows: &[FactRow]) -> Result<SegmentInfo>;
}

/// Serialize rows as CSV with a header row.
pub fn encode_rows<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| LakehouseError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
}

pub fn decode_rows<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(rows)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Segment sink writing one source's segment-set through a [`StorageClient`].
pub struct StorageSegmentSink {
    storage: Arc<dyn StorageClient>,
    source_id: String,
}

impl StorageSegmentSink {
    pub fn new(storage: Arc<dyn StorageClient>, source_id: impl Into<String>) -> Self {
        Self {
            storage,
            source_id: source_id.into(),
        }
    }

    pub fn manifest_key(&self) -> String {
        format!("{}/{}", segment_folder(&self.source_id), SEGMENT_MANIFEST)
    }

    /// Start a new run: mark the segment-set incomplete, then remove the
    /// previous segments. Returns the number of segments removed.
    pub async fn begin(&self) -> Result<usize> {
        self.store_manifest(Vec::new(), false).await?;

        let manifest_key = self.manifest_key();
        let keys: Vec<String> = self
            .storage
            .list(&segment_folder(&self.source_id))
            .await?
            .into_iter()
            .filter(|key| *key != manifest_key)
            .collect();
        for key in &keys {
            self.storage.delete(key).await?;
        }
        if !keys.is_empty() {
            debug!(source = %self.source_id, removed = keys.len(), "Cleared previous segment-set");
        }
        Ok(keys.len())
    }

    /// Seal the run with the segments it wrote.
    pub async fn write_manifest(&self, segments: Vec<SegmentInfo>) -> Result<SegmentManifest> {
        self.store_manifest(segments, true).await
    }

    async fn store_manifest(&self, segments: Vec<SegmentInfo>, complete: bool) -> Result<SegmentManifest> {
        let manifest = SegmentManifest {
            source_id: self.source_id.clone(),
            run_id: Uuid::new_v4(),
            written_at: Utc::now(),
            complete,
            segments,
        };
        let bytes = serde_json::to_vec_pretty(&manifest)?;
        self.storage.write(&self.manifest_key(), &bytes).await?;
        Ok(manifest)
    }

    pub async fn read_manifest(&self) -> Result<Option<SegmentManifest>> {
        let key = self.manifest_key();
        if !self.storage.exists(&key).await? {
            return Ok(None);
        }
        let bytes = self.storage.read(&key).await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

#[async_trait]
impl SegmentSink for StorageSegmentSink {
    async fn write_segment(&self, index: usize, rows: &[FactRow]) -> Result<SegmentInfo> {
        let key = segment_key(&self.source_id, index);
        let bytes = encode_rows(rows)?;
        let sha256 = sha256_hex(&bytes);
        self.storage.write(&key, &bytes).await?;
        Ok(SegmentInfo {
            index,
            key,
            rows: rows.len(),
            sha256,
        })
    }
}

/// Streaming accumulator in front of a [`SegmentSink`].
pub struct BatchWriter<'s, S: SegmentSink + ?Sized> {
    sink: &'s S,
    batch_size: usize,
    max_attempts: usize,
    buffer: Vec<FactRow>,
    segments: Vec<SegmentInfo>,
}

impl<'s, S: SegmentSink + ?Sized> BatchWriter<'s, S> {
    pub fn new(sink: &'s S, batch_size: usize, max_attempts: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            batch_size,
            max_attempts: max_attempts.max(1),
            buffer: Vec::with_capacity(batch_size),
            segments: Vec::new(),
        }
    }

    pub async fn push(&mut self, row: FactRow) -> Result<()> {
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn extend(&mut self, rows: impl IntoIterator<Item = FactRow>) -> Result<()> {
        for row in rows {
            self.push(row).await?;
        }
        Ok(())
    }

    /// Write the buffered rows as the next segment. The batch stays buffered
    /// until a write succeeds, so a retry redoes exactly this batch.
    async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let index = self.segments.len() + 1;

        let mut attempt = 1;
        let info = loop {
            match self.sink.write_segment(index, &self.buffer).await {
                Ok(info) => break info,
                Err(e) if attempt < self.max_attempts => {
                    warn!(segment = index, attempt, "Segment write failed, retrying: {}", e);
                    MaterializeMetrics::record_batch_retry();
                    tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        debug!(segment = index, rows = info.rows, key = %info.key, "Segment written");
        MaterializeMetrics::record_segment_written(info.rows);
        self.segments.push(info);
        self.buffer.clear();
        Ok(())
    }

    /// Flush the final partial batch and return every segment written.
    pub async fn finish(mut self) -> Result<Vec<SegmentInfo>> {
        self.flush().await?;
        Ok(self.segments)
    }
}

/// Write `rows` to `sink` in segments of at most `batch_size` rows.
pub async fn write_batched<S>(
    rows: impl IntoIterator<Item = FactRow>,
    batch_size: usize,
    max_attempts: usize,
    sink: &S,
) -> Result<Vec<SegmentInfo>>
where
    S: SegmentSink + ?Sized,
{
    let mut writer = BatchWriter::new(sink, batch_size, max_attempts);
    writer.extend(rows).await?;
    let segments = writer.finish().await?;
    info!(
        segments = segments.len(),
        rows = segments.iter().map(|s| s.rows).sum::<usize>(),
        "Materialized rows"
    );
    Ok(segments)
}
