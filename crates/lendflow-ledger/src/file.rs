//! File-backed ledger: one JSON array per channel under a root directory

use crate::error::{LedgerError, LedgerResult};
use crate::record::{LedgerRecord, ZERO_HASH};
use crate::{validate_channel, Ledger};
use dashmap::DashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Stores `<root>/<channel>.json`.
///
/// Appends to the same channel are serialized through a per-channel async
/// mutex. Different channels proceed independently. Each write goes to a
/// temp file which is synced and renamed over the channel file, then the
/// directory is synced, so a crash leaves either the old or the new state.
pub struct FileLedger {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileLedger {
    pub fn open(root: impl Into<PathBuf>) -> LedgerResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn channel_path(&self, channel: &str) -> PathBuf {
        self.root.join(format!("{}.json", channel))
    }

    fn lock_for(&self, channel: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(channel.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, channel: &str) -> LedgerResult<Vec<LedgerRecord>> {
        let path = self.channel_path(channel);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            error!(channel, path = %path.display(), "unreadable ledger file: {}", e);
            LedgerError::corruption(channel, format!("unparsable channel file: {}", e))
        })
    }

    async fn persist(&self, channel: &str, records: &[LedgerRecord]) -> LedgerResult<()> {
        let path = self.channel_path(channel);
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(records)?;

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &path).await?;
        sync_dir(&self.root).await
    }
}

/// Flush directory metadata so a completed rename survives a crash.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> LedgerResult<()> {
    tokio::fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> LedgerResult<()> {
    Ok(())
}

#[async_trait::async_trait]
impl Ledger for FileLedger {
    async fn append(&self, channel: &str, payload: Value) -> LedgerResult<LedgerRecord> {
        validate_channel(channel)?;
        let lock = self.lock_for(channel);
        let _guard = lock.lock().await;

        let mut records = self.load(channel).await?;
        let previous = match records.last() {
            Some(tail) if !tail.is_intact() => {
                error!(channel, index = records.len() - 1, "tail record fails hash check");
                return Err(LedgerError::corruption(
                    channel,
                    format!("tail record {} fails hash check", records.len() - 1),
                ));
            }
            Some(tail) => tail.hash.clone(),
            None => ZERO_HASH.to_string(),
        };

        let record = LedgerRecord::seal(payload, previous);
        records.push(record.clone());
        self.persist(channel, &records).await?;

        debug!(channel, len = records.len(), hash = %record.hash, "ledger append");
        Ok(record)
    }

    async fn read(&self, channel: &str) -> LedgerResult<Vec<LedgerRecord>> {
        validate_channel(channel)?;
        self.load(channel).await
    }

    async fn channels(&self) -> LedgerResult<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_channel(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
