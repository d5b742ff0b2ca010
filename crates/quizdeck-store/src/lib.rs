//! quizdeck-store: Filesystem durable tiers and corpus sources.
//!
//! Implements the storage traits from `quizdeck-core` on top of a data
//! directory: a synchronous key-value tier for session records and an
//! asynchronous bulk tier with a byte quota for question chunks.

pub mod bulk;
pub mod corpus;
pub mod kv;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use quizdeck_core::clock::{Clock, SystemClock};
use quizdeck_core::store::PersistentStore;

pub use bulk::DirBulkStore;
pub use corpus::{corpus_source, FileCorpus, HttpCorpus};
pub use kv::FileKvStore;

/// Layout of a quizdeck data directory.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the synchronous tier.
    pub fn kv_dir(&self) -> PathBuf {
        self.root.join("kv")
    }

    /// Directory of the bulk tier.
    pub fn chunk_dir(&self) -> PathBuf {
        self.root.join("chunks")
    }

    /// Open both tiers, creating directories as needed.
    pub fn open(&self, quota_bytes: Option<u64>) -> Result<PersistentStore> {
        self.open_with_clock(quota_bytes, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        &self,
        quota_bytes: Option<u64>,
        clock: Arc<dyn Clock>,
    ) -> Result<PersistentStore> {
        let kv = FileKvStore::open(self.kv_dir())
            .with_context(|| format!("failed to open store in {}", self.root.display()))?;
        let bulk = DirBulkStore::open(self.chunk_dir(), quota_bytes)
            .with_context(|| format!("failed to open chunk store in {}", self.root.display()))?;
        Ok(PersistentStore::new(Arc::new(kv), Arc::new(bulk), clock))
    }
}

/// Encode a store key as a file name. `/` and `%` are escaped.
pub(crate) fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 8);
    for c in key.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            c => out.push(c),
        }
    }
    out.push_str(".json");
    out
}

/// Inverse of [`encode_key`]. `None` for files this crate did not write.
pub(crate) fn decode_key(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(".json")?;
    let mut out = String::with_capacity(stem.len());
    let mut rest = stem;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3)?;
        out.push(match code {
            "25" => '%',
            "2F" => '/',
            "5C" => '\\',
            _ => return None,
        });
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizdeck_core::store::{CONFIG_KEY, SESSION_STATE_KEY};

    #[test]
    fn key_encoding_round_trips() {
        for key in ["quizdeck/v1/chunk-0003", "100%/done", "plain", "a\\b"] {
            let encoded = encode_key(key);
            assert!(!encoded.contains('/'));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
        assert_eq!(decode_key("notes.txt"), None);
        assert_eq!(decode_key("bad%zz.json"), None);
    }

    #[tokio::test]
    async fn data_dir_opens_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataDir::new(dir.path().join("data"));
        let store = data.open(None).unwrap();

        store.save(CONFIG_KEY, &"hello").unwrap();
        assert!(data.kv_dir().join(encode_key("quizdeck/v1/config")).exists());

        // Reopening sees the same records
        let reopened = data.open(None).unwrap();
        let value = reopened.load::<String>(CONFIG_KEY).unwrap().unwrap();
        assert_eq!(value.value, "hello");
        assert!(reopened.load::<String>(SESSION_STATE_KEY).unwrap().is_none());
    }
}
