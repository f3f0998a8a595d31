//! JSONL-based conversation history — append-only, one entry per line.

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{HearsayError, Result};
use crate::types::ConversationEntry;

/// Durable, ordered conversation log.
///
/// Entries are appended as single JSON lines under a mutex so concurrent
/// appends never interleave or truncate each other. Reading back an empty
/// or nonexistent log yields an empty sequence.
pub struct ConversationLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConversationLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Default log location: `<data dir>/history.jsonl`
    pub fn default_path() -> PathBuf {
        crate::config::data_dir().join("history.jsonl")
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append one entry. The whole line is written and flushed under the
    /// lock, so N concurrent appends produce exactly N intact lines.
    pub async fn append(&self, entry: &ConversationEntry) -> Result<()> {
        let line = serde_json::to_string(entry)?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        debug!(path = %self.path.display(), "Appended history entry");
        Ok(())
    }

    /// Read the full history in file order (oldest first).
    pub async fn read_all(&self) -> Result<Vec<ConversationEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&self.path).await?;
        let mut entries = Vec::new();
        for line in data.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: ConversationEntry = serde_json::from_str(line).map_err(|e| {
                HearsayError::Validation(format!("corrupt history line: {e}"))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = ConversationLog::new(dir.path().join("history.jsonl"));
        assert!(log.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_then_read_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let log = ConversationLog::new(dir.path().join("history.jsonl"));

        let entry = ConversationEntry::now("hello?", "hi there");
        log.append(&entry).await.unwrap();

        let all = log.read_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], entry);
    }

    #[tokio::test]
    async fn test_ordering_is_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = ConversationLog::new(dir.path().join("history.jsonl"));

        for i in 0..5 {
            log.append(&ConversationEntry::now(format!("q{i}"), format!("a{i}")))
                .await
                .unwrap();
        }

        let all = log.read_all().await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].question, "q0");
        assert_eq!(all[4].question, "q4");
        // Timestamps monotonically non-decreasing
        for pair in all.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_concurrent_appends_no_loss() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(ConversationLog::new(dir.path().join("history.jsonl")));

        let mut handles = Vec::new();
        for i in 0..32 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append(&ConversationEntry::now(format!("q{i}"), "a"))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let all = log.read_all().await.unwrap();
        assert_eq!(all.len(), 32);
        // Every line parsed back intact — no interleaved writes
        let mut questions: Vec<_> = all.iter().map(|e| e.question.clone()).collect();
        questions.sort();
        questions.dedup();
        assert_eq!(questions.len(), 32);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        tokio::fs::write(&path, "not json\n").await.unwrap();

        let log = ConversationLog::new(path);
        assert!(log.read_all().await.is_err());
    }
}
