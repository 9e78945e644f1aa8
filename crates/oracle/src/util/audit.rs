use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

/// Append-only JSONL sink for reputation events and slash records.
///
/// Mirrors the delivered-message logger pattern: a background task owns the
/// file handle, callers hand it lines over an unbounded channel so logging
/// never blocks the caller on disk I/O.
#[derive(Clone)]
pub struct AuditLogger {
    sender: mpsc::UnboundedSender<LogMessage>,
    seq: Arc<AtomicU64>,
}

enum LogMessage {
    Entry(String),
    Shutdown,
}

impl AuditLogger {
    pub fn new(log_dir: impl Into<PathBuf>, file_name: &str) -> std::io::Result<Self> {
        let log_dir = log_dir.into();
        fs::create_dir_all(&log_dir)?;
        let path = log_dir.join(file_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let seq = Arc::new(AtomicU64::new(0));

        let path_for_task = path.clone();
        tokio::spawn(async move {
            writer_task(receiver, file, path_for_task).await;
        });

        Ok(Self { sender, seq })
    }

    pub fn log<T: Serialize>(&self, entry: &T) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let line = match serde_json::to_string(entry) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(seq, error = %e, "failed to serialize audit entry");
                return;
            }
        };
        if self.sender.send(LogMessage::Entry(line)).is_err() {
            tracing::warn!(seq, "audit log channel closed, entry dropped");
        }
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(LogMessage::Shutdown);
    }
}

async fn writer_task(mut receiver: mpsc::UnboundedReceiver<LogMessage>, file: File, path: PathBuf) {
    let mut writer = BufWriter::new(file);

    while let Some(msg) = receiver.recv().await {
        match msg {
            LogMessage::Entry(line) => {
                if let Err(e) = writeln!(writer, "{}", line) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to write audit entry");
                }
                if let Err(e) = writer.flush() {
                    tracing::warn!(path = %path.display(), error = %e, "failed to flush audit log");
                }
            }
            LogMessage::Shutdown => {
                let _ = writer.flush();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Entry {
        node_id: String,
        impact: f64,
    }

    #[tokio::test]
    async fn test_audit_logger_writes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path(), "reputation.jsonl").unwrap();

        logger.log(&Entry { node_id: "node-a".into(), impact: -0.1 });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        logger.shutdown();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let contents = std::fs::read_to_string(dir.path().join("reputation.jsonl")).unwrap();
        assert!(contents.contains("node-a"));
        assert!(contents.contains("-0.1"));
    }
}
