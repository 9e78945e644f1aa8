use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_max_size_mb() -> u64 {
    10
}

fn default_max_files() -> usize {
    5
}

fn default_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            max_size_mb: default_max_size_mb(),
            max_files: default_max_files(),
            level: default_level(),
        }
    }
}

#[cfg(feature = "cli")]
mod init {
    use std::fs;

    use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};
    use tracing_subscriber::{
        fmt::{self, MakeWriter},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        EnvFilter, Layer,
    };

    use super::LogConfig;

    fn make_rotating_writer(
        path: std::path::PathBuf,
        max_size_mb: u64,
        max_files: usize,
    ) -> FileRotate<AppendCount> {
        FileRotate::new(
            path,
            AppendCount::new(max_files),
            ContentLimit::Bytes((max_size_mb * 1024 * 1024) as usize),
            Compression::None,
            #[cfg(unix)]
            None,
        )
    }

    struct RotatingWriter {
        writer: std::sync::Arc<std::sync::Mutex<FileRotate<AppendCount>>>,
    }

    impl RotatingWriter {
        fn new(rotate: FileRotate<AppendCount>) -> Self {
            Self { writer: std::sync::Arc::new(std::sync::Mutex::new(rotate)) }
        }
    }

    impl<'a> MakeWriter<'a> for RotatingWriter {
        type Writer = RotatingWriterGuard<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            RotatingWriterGuard { guard: self.writer.lock().unwrap() }
        }
    }

    struct RotatingWriterGuard<'a> {
        guard: std::sync::MutexGuard<'a, FileRotate<AppendCount>>,
    }

    impl<'a> std::io::Write for RotatingWriterGuard<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.guard.flush()
        }
    }

    /// Layered tracing setup: a human-readable console layer plus two JSON
    /// file layers, one for consensus/aggregation events and one for the
    /// peer/ledger protocol traffic.
    pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
        fs::create_dir_all(&config.log_dir)?;

        let consensus_writer = RotatingWriter::new(make_rotating_writer(
            config.log_dir.join("consensus.jsonl"),
            config.max_size_mb,
            config.max_files,
        ));

        let protocol_writer = RotatingWriter::new(make_rotating_writer(
            config.log_dir.join("protocol.jsonl"),
            config.max_size_mb,
            config.max_files,
        ));

        let console_filter =
            EnvFilter::try_new(format!("oracle={}", config.level)).unwrap_or_else(|_| EnvFilter::new("oracle=info"));
        let console_layer = fmt::layer().with_target(true).with_level(true).with_filter(console_filter);

        let consensus_layer = fmt::layer()
            .json()
            .with_writer(consensus_writer)
            .with_filter(EnvFilter::new("oracle::aggregator=trace,oracle::reputation=trace"));

        let protocol_layer = fmt::layer()
            .json()
            .with_writer(protocol_writer)
            .with_filter(EnvFilter::new("oracle::network=trace,oracle::ledger=trace"));

        tracing_subscriber::registry()
            .with(console_layer)
            .with(consensus_layer)
            .with(protocol_layer)
            .init();

        tracing::info!(
            log_dir = %config.log_dir.display(),
            max_size_mb = config.max_size_mb,
            max_files = config.max_files,
            "logging initialized"
        );

        Ok(())
    }
}

#[cfg(feature = "cli")]
pub use init::init_logging;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_config() {
        let cfg = LogConfig::default();
        assert_eq!(cfg.max_files, 5);
        assert_eq!(cfg.level, "info");
    }
}
