//! Asynchronous bulk tier for question chunks.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use quizdeck_core::error::StorageError;
use quizdeck_core::store::BulkStore;

use crate::{decode_key, encode_key};

/// Bulk tier backed by a directory, with an optional byte quota.
///
/// The quota covers the total size of stored values; a write that would
/// exceed it fails with [`StorageError::QuotaExceeded`] and leaves the
/// previous value in place.
#[derive(Debug, Clone)]
pub struct DirBulkStore {
    dir: PathBuf,
    quota_bytes: Option<u64>,
}

impl DirBulkStore {
    pub fn open(dir: impl Into<PathBuf>, quota_bytes: Option<u64>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory: {}", dir.display()))?;
        Ok(Self { dir, quota_bytes })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(encode_key(key))
    }

    /// Total size of stored values, skipping `except`.
    pub async fn used_bytes(&self, except: Option<&str>) -> Result<u64, StorageError> {
        let read_err = |e: std::io::Error| StorageError::Read {
            key: self.dir.display().to_string(),
            reason: e.to_string(),
        };
        let skip = except.map(encode_key);

        let mut total = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(read_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if decode_key(&name).is_none() || skip.as_deref() == Some(&*name) {
                continue;
            }
            total += entry.metadata().await.map_err(read_err)?.len();
        }
        Ok(total)
    }
}

#[async_trait]
impl BulkStore for DirBulkStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            let used = self.used_bytes(Some(key)).await?;
            if used + value.len() as u64 > quota {
                tracing::debug!(key, used, quota, "bulk store quota reached");
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }

        let write_err = |e: std::io::Error| StorageError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        };
        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.tmp", encode_key(key)));
        tokio::fs::write(&tmp, value).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &target).await.map_err(write_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let read_err = |e: std::io::Error| StorageError::Read {
            key: prefix.to_string(),
            reason: e.to_string(),
        };

        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(read_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let name = entry.file_name();
            if let Some(key) = decode_key(&name.to_string_lossy()) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
