use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::types::{CycleRecord, DetectorError, DetectorResult};

/// Append-only destination for completed cycle records
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: &CycleRecord) -> DetectorResult<()>;
}

/// Keeps every record in a single pretty-printed JSON array on disk.
///
/// A missing file, or one that doesn't hold a JSON array, is treated as an
/// empty log. Any other read failure fails the append so existing history is
/// never overwritten. Each append rewrites the array through a temporary file
/// that is synced and then renamed over the log.
pub struct JsonLogSink {
    path: Mutex<PathBuf>,
}

impl JsonLogSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Mutex::new(path.as_ref().to_path_buf()),
        }
    }

    pub async fn path(&self) -> PathBuf {
        self.path.lock().await.clone()
    }

    /// Point later appends at another file; the current append finishes first
    pub async fn set_path<P: AsRef<Path>>(&self, path: P) {
        let mut current = self.path.lock().await;
        if current.as_path() != path.as_ref() {
            info!("Cycle log moved to {}", path.as_ref().display());
            *current = path.as_ref().to_path_buf();
        }
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("log.json"));
        name.push(".tmp");
        path.with_file_name(name)
    }

    async fn read_entries(path: &Path) -> DetectorResult<Vec<Value>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(entries)) => Ok(entries),
            Ok(_) => {
                warn!("{} does not hold a JSON array, starting a new log", path.display());
                Ok(Vec::new())
            }
            Err(e) => {
                warn!("{} is not valid JSON, starting a new log: {}", path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    /// Every record currently in the log, skipping entries that don't parse
    pub async fn load(&self) -> DetectorResult<Vec<CycleRecord>> {
        let path = self.path.lock().await;
        Ok(Self::read_entries(&path)
            .await?
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect())
    }
}

#[async_trait]
impl RecordSink for JsonLogSink {
    async fn append(&self, record: &CycleRecord) -> DetectorResult<()> {
        let path = self.path.lock().await;

        let mut entries = Self::read_entries(&path).await?;
        entries.push(serde_json::to_value(record)?);

        let content = serde_json::to_string_pretty(&Value::Array(entries))?;
        let temp_path = Self::temp_path(&path);

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &*path)
            .await
            .map_err(|e| DetectorError::sink(format!("failed to replace {}: {}", path.display(), e)))?;

        debug!("Appended cycle record to {}", path.display());
        Ok(())
    }
}

/// In-memory sink, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySink {
    records: RwLock<Vec<CycleRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<CycleRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append(&self, record: &CycleRecord) -> DetectorResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ViewerEstimate, WindowSummary};
    use tempfile::tempdir;

    fn record(viewers: u64) -> CycleRecord {
        CycleRecord {
            timestamp: "2024-05-01 10:00:00".to_string(),
            channel_id: "UC1".to_string(),
            video_id: "v1".to_string(),
            concurrent_viewers: viewers,
            summary: WindowSummary {
                unique_authors: 4,
                total_messages: 9,
                average_messages_per_author: 2.25,
                suspicious_authors: 0,
                automated_authors: 1,
            },
            estimate: ViewerEstimate {
                estimated_real: 12,
                estimated_bot: viewers - 12,
                raw_ratio: 4.0 / viewers as f64,
                adjusted_ratio: 3.0 / viewers as f64,
            },
        }
    }

    #[tokio::test]
    async fn test_appends_to_json_array() {
        let temp_dir = tempdir().unwrap();
        let sink = JsonLogSink::new(temp_dir.path().join("log.json"));

        sink.append(&record(100)).await.unwrap();
        sink.append(&record(200)).await.unwrap();

        let loaded = sink.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].concurrent_viewers, 100);
        assert_eq!(loaded[1].concurrent_viewers, 200);

        let raw = std::fs::read_to_string(sink.path().await).unwrap();
        assert!(raw.starts_with("[\n  {"));
        assert!(raw.contains("\"estimatedRealViewers\": 12"));
        assert!(!temp_dir.path().join("log.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_non_array_log_is_replaced() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("log.json");
        std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();

        let sink = JsonLogSink::new(&path);
        sink.append(&record(50)).await.unwrap();
        assert_eq!(sink.load().await.unwrap().len(), 1);

        std::fs::write(&path, "garbage").unwrap();
        sink.append(&record(60)).await.unwrap();
        let loaded = sink.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].concurrent_viewers, 60);
    }

    #[tokio::test]
    async fn test_unreadable_log_fails_append() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("log.json");
        std::fs::create_dir(&path).unwrap();

        let sink = JsonLogSink::new(&path);
        let result = sink.append(&record(100)).await;
        assert!(matches!(result, Err(DetectorError::Io(_))));
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_set_path_redirects_appends() {
        let temp_dir = tempdir().unwrap();
        let first = temp_dir.path().join("first.json");
        let second = temp_dir.path().join("second.json");

        let sink = JsonLogSink::new(&first);
        sink.append(&record(100)).await.unwrap();
        sink.set_path(&second).await;
        sink.append(&record(200)).await.unwrap();

        assert_eq!(sink.path().await, second);
        let loaded = sink.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].concurrent_viewers, 200);
        assert_eq!(JsonLogSink::new(&first).load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemorySink::new();
        sink.append(&record(100)).await.unwrap();
        assert_eq!(sink.records().await, vec![record(100)]);
    }
}
