//! File-backed store: one pretty-printed JSON document per record.
//!
//! Writes go to `<name>.json.tmp`, are synced, then renamed over
//! `<name>.json`, so a crash leaves either the old record or the new one.
//! The whole table is loaded into memory on open and the indices are rebuilt
//! from it; the files are the source of truth.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ContentStore, IndexQuery, RecordTable, StoreError};
use crate::models::ContentRecord;

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";
const CORRUPT_EXTENSION: &str = "corrupt";

/// Longest encoded id used directly as a file name. Longer ids are named by
/// their SHA-256 instead; the id itself is always read back from the file.
const MAX_ENCODED_NAME_LEN: usize = 128;

/// Marks digest-named files. Not in the URL-safe base64 alphabet, so it
/// cannot collide with a directly encoded id.
const DIGEST_NAME_PREFIX: char = '~';

pub struct FileStore {
    dir: PathBuf,
    /// Held across file I/O so writes are applied in call order.
    table: Mutex<RecordTable>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// Leftover temp files from an interrupted write are removed. Files that
    /// no longer parse are renamed to `*.corrupt` and skipped.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let mut table = RecordTable::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&dir, e))?
        {
            let path = entry.path();
            match path.extension().and_then(|ext| ext.to_str()) {
                Some(TEMP_EXTENSION) => {
                    debug!(path = %path.display(), "Removing interrupted write");
                    tokio::fs::remove_file(&path)
                        .await
                        .map_err(|e| StoreError::io(&path, e))?;
                }
                Some(RECORD_EXTENSION) => match Self::read_record(&path).await? {
                    Some(record) => {
                        table.upsert(record);
                    }
                    None => Self::quarantine(&path).await?,
                },
                _ => {}
            }
        }

        info!(dir = %dir.display(), records = table.len(), "File store opened");
        Ok(Self {
            dir,
            table: Mutex::new(table),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", file_stem(id), RECORD_EXTENSION))
    }

    async fn read_record(path: &Path) -> Result<Option<ContentRecord>, StoreError> {
        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        match serde_json::from_slice(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse record file");
                Ok(None)
            }
        }
    }

    async fn quarantine(path: &Path) -> Result<(), StoreError> {
        let target = path.with_extension(CORRUPT_EXTENSION);
        warn!(from = %path.display(), to = %target.display(), "Quarantining unreadable record");
        tokio::fs::rename(path, &target)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    async fn write_atomic(&self, record: &ContentRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.id);
        let temp = path.with_extension(format!("{}.{}", RECORD_EXTENSION, TEMP_EXTENSION));
        let contents = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Serialize {
            id: record.id.clone(),
            source,
        })?;

        let result = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(&contents).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp, &path).await
        }
        .await;

        if let Err(e) = result {
            // Best effort; a stale temp file is also swept on the next open.
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StoreError::io(&path, e));
        }
        Ok(())
    }

    async fn remove_file(&self, id: &str) -> Result<(), StoreError> {
        let path = self.record_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

fn file_stem(id: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(id);
    if encoded.len() <= MAX_ENCODED_NAME_LEN {
        encoded
    } else {
        format!("{}{:x}", DIGEST_NAME_PREFIX, Sha256::digest(id.as_bytes()))
    }
}

#[async_trait]
impl ContentStore for FileStore {
    async fn put(&self, record: ContentRecord) -> Result<(), StoreError> {
        record.validate().map_err(|reason| StoreError::InvalidRecord {
            id: record.id.clone(),
            reason,
        })?;
        let mut table = self.table.lock().await;
        self.write_atomic(&record).await?;
        table.upsert(record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ContentRecord>, StoreError> {
        Ok(self.table.lock().await.get(id).cloned())
    }

    async fn get_all_by_index(&self, query: IndexQuery) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(self.table.lock().await.query(query))
    }

    async fn get_all(&self) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(self.table.lock().await.all())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut table = self.table.lock().await;
        self.remove_file(id).await?;
        table.remove(id);
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table.lock().await.len())
    }

    async fn total_bytes(&self) -> Result<u64, StoreError> {
        Ok(self.table.lock().await.total_bytes())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize, StoreError> {
        let mut table = self.table.lock().await;
        let mut removed = 0;
        for id in ids {
            self.remove_file(id).await?;
            if table.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
