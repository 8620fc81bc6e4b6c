use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{LakehouseError, Result};

/// Byte-level object storage shared by every stage.
///
/// Keys are `/`-separated paths relative to the lakehouse root, e.g.
/// `iron/statistics/undata/undata_1.csv`. Whether they live on local disk or
/// in a remote object store is up to the backend.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;
    /// All object keys below `prefix`, recursively, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
    async fn delete(&self, path: &str) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
}

fn folder_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Local-disk storage rooted at a directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.resolve(path))
            .await
            .map_err(|e| LakehouseError::transport(path, e))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LakehouseError::transport(path, e))?;
        }

        // Write beside the target and rename, so readers never see a torn object
        let mut tmp = target.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| LakehouseError::transport(path, e))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| LakehouseError::transport(path, e))?;

        debug!("Wrote {} bytes to {}", bytes.len(), target.display());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.resolve(prefix);
        if !base.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&base) {
            let entry = entry.map_err(|e| LakehouseError::transport(prefix, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| LakehouseError::transport(prefix, e))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if key.ends_with(".tmp") {
                continue;
            }
            keys.push(key);
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(self.resolve(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LakehouseError::transport(path, e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path).is_file())
    }
}

/// In-memory storage implementation for tests and dry runs
#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &str) -> String {
        path.trim_start_matches('/').to_string()
    }

    fn objects(&self, path: &str) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.objects
            .lock()
            .map_err(|_| LakehouseError::transport(path, "in-memory storage lock poisoned"))
    }
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.objects(path)?
            .get(&Self::key(path))
            .cloned()
            .ok_or_else(|| LakehouseError::transport(path, "object not found"))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.objects(path)?.insert(Self::key(path), bytes.to_vec());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = folder_prefix(prefix);
        Ok(self
            .objects(&prefix)?
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects(path)?.remove(&Self::key(path));
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects(path)?.contains_key(&Self::key(path)))
    }
}
