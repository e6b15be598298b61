//! Durable record of in-flight downloads.
//!
//! A record is appended the moment a download starts — before the subprocess
//! even exists — and removed only when that download completes. Whatever is
//! in the file therefore either is running right now or was interrupted
//! (crash, kill, power loss) and can be offered for resume. It is a recovery
//! aid, not a history: read failures degrade to an empty list and write
//! failures are logged and swallowed, they never block a download.

use crate::core::error::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

/// URL stored on the marker record of a queue run.
pub const QUEUE_MARKER_URL: &str = "queue";

/// Identity of one video inside a queued batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnfinishedVideo {
    pub id: String,
    pub title: String,
}

/// One crash-recovery record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnfinishedDownload {
    /// Primary URL, or [`QUEUE_MARKER_URL`] for a queue run
    pub url: String,
    /// URLs of the whole batch (queue runs only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    /// Videos of the batch (queue runs only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<UnfinishedVideo>,
    pub format_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// File-backed list of [`UnfinishedDownload`] records.
///
/// The file is read wholesale and rewritten wholesale on every mutation,
/// through a temp file + rename so a crash mid-write can never leave a
/// half-written list behind. A mutex serializes mutations because a queue
/// marker and a per-item record can be written near-simultaneously.
pub struct UnfinishedStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl UnfinishedStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Store at the default per-user data location.
    pub fn default_location() -> Self {
        Self::new(crate::core::config::data_dir().join("unfinished.json"))
    }

    /// Loads all records. Missing or corrupt files yield an empty list.
    pub async fn load(&self) -> Vec<UnfinishedDownload> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    log::warn!(
                        "Unfinished-download file {} is corrupt ({}), treating as empty",
                        self.path.display(),
                        e
                    );
                    Vec::new()
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to read unfinished-download file: {}", e);
                }
                Vec::new()
            }
        }
    }

    /// Appends a record. Errors are logged, never propagated.
    pub async fn add(&self, record: UnfinishedDownload) {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await;
        records.push(record);
        if let Err(e) = self.write_all(&records).await {
            log::warn!("Failed to persist unfinished-download record: {}", e);
        }
    }

    /// Removes every record whose URL matches. Errors are logged, never propagated.
    pub async fn remove(&self, url: &str) {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await;
        let before = records.len();
        records.retain(|r| r.url != url);
        if records.len() == before {
            return;
        }
        if let Err(e) = self.write_all(&records).await {
            log::warn!("Failed to update unfinished-download file: {}", e);
        }
    }

    async fn write_all(&self, records: &[UnfinishedDownload]) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(records)?;

        // Atomic replace: never leave the file partially written.
        let temp_path = self.path.with_extension(format!("tmp.{}", std::process::id()));
        tokio::fs::write(&temp_path, content).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> UnfinishedDownload {
        UnfinishedDownload {
            url: url.to_string(),
            urls: Vec::new(),
            videos: Vec::new(),
            format_id: "best".to_string(),
            title: "A Video".to_string(),
            description: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = UnfinishedStore::new(dir.path().join("unfinished.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unfinished.json");
        tokio::fs::write(&path, "][ nope").await.unwrap();
        let store = UnfinishedStore::new(path);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_append_then_remove_is_a_noop_on_the_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = UnfinishedStore::new(dir.path().join("unfinished.json"));
        store.add(record("https://example.com/a")).await;
        let baseline = store.load().await.len();

        store.add(record("https://example.com/b")).await;
        store.remove("https://example.com/b").await;

        assert_eq!(store.load().await.len(), baseline);
    }

    #[tokio::test]
    async fn test_remove_only_matching_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = UnfinishedStore::new(dir.path().join("unfinished.json"));
        store.add(record("https://example.com/a")).await;
        store.add(record("https://example.com/b")).await;
        store.remove("https://example.com/a").await;

        let records = store.load().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://example.com/b");
    }

    #[tokio::test]
    async fn test_queue_marker_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = UnfinishedStore::new(dir.path().join("unfinished.json"));
        let mut marker = record(QUEUE_MARKER_URL);
        marker.urls = vec!["https://example.com/a".to_string(), "https://example.com/b".to_string()];
        marker.videos = vec![
            UnfinishedVideo {
                id: "a".to_string(),
                title: "A".to_string(),
            },
            UnfinishedVideo {
                id: "b".to_string(),
                title: "B".to_string(),
            },
        ];
        store.add(marker.clone()).await;

        let loaded = store.load().await;
        assert_eq!(loaded, vec![marker]);

        store.remove(QUEUE_MARKER_URL).await;
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unfinished.json");
        {
            let store = UnfinishedStore::new(path.clone());
            store.add(record("https://example.com/a")).await;
        }
        let store = UnfinishedStore::new(path);
        assert_eq!(store.load().await.len(), 1);
    }
}
