//! ==============================================================================
//! sink.rs - console output and the append-only log file
//! ==============================================================================
//!
//! purpose:
//!     every record (report, shutdown, echoed command) is written as ONE
//!     complete line with a single write_all under a lock, so appends from the
//!     sampling loop and the command listener never interleave mid-record.
//!
//!     any failure to open, write or close the log is returned as an error;
//!     the daemon treats it as fatal.
//!
//! relationships:
//!     - used by: sampler.rs (Reporter: console + log)
//!     - used by: commands.rs (LogSink::append for received command lines)
//!     - closed by: daemon.rs, after every activity has finished
//!
//! ==============================================================================

use crate::domain::Record;
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogSink {
    /// open for appending, creating the file if needed
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut opts = OpenOptions::new();
        opts.create(true).append(true);
        #[cfg(unix)]
        opts.mode(0o666);

        let file = opts
            .open(&path)
            .await
            .with_context(|| format!("couldn't open log file {}", path.display()))?;

        Ok(Self { path, file: Mutex::new(Some(file)) })
    }

    /// append one complete record
    pub async fn append(&self, record: &[u8]) -> Result<()> {
        let mut guard = self.file.lock().await;
        let file = guard
            .as_mut()
            .ok_or_else(|| anyhow!("log file {} is already closed", self.path.display()))?;

        file.write_all(record)
            .await
            .with_context(|| format!("couldn't write to log file {}", self.path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("couldn't write to log file {}", self.path.display()))?;
        Ok(())
    }

    /// flush, sync and release the file; later appends fail
    pub async fn close(&self) -> Result<()> {
        let file = self.file.lock().await.take();
        if let Some(mut file) = file {
            file.flush()
                .await
                .and(file.sync_all().await)
                .with_context(|| format!("couldn't close log file {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// writes records to the console and, when configured, the log sink
pub struct Reporter {
    console: Box<dyn Write + Send>,
    log: Option<std::sync::Arc<LogSink>>,
}

impl Reporter {
    pub fn new(console: Box<dyn Write + Send>, log: Option<std::sync::Arc<LogSink>>) -> Self {
        Self { console, log }
    }

    pub async fn emit(&mut self, record: &Record) -> Result<()> {
        let line = record.to_string();

        self.console
            .write_all(line.as_bytes())
            .and_then(|_| self.console.flush())
            .context("couldn't write to console")?;

        if let Some(log) = &self.log {
            log.append(line.as_bytes()).await?;
        }
        Ok(())
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::Report;
    use chrono::NaiveTime;
    use std::sync::{Arc, Mutex as StdMutex};

    /// console stand-in that keeps everything written to it
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<StdMutex<Vec<u8>>>);

    impl SharedBuf {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn temp_log(name: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("thermo-monitor-{}-{}.log", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn appends_whole_records_in_order() {
        let path = temp_log("sink-order");
        let sink = LogSink::open(&path).await.unwrap();
        sink.append(b"STOP\n").await.unwrap();
        sink.append(b"12:00:00 SHUTDOWN\n").await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "STOP\n12:00:00 SHUTDOWN\n");
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn reopening_appends_instead_of_truncating() {
        let path = temp_log("sink-reopen");
        let first = LogSink::open(&path).await.unwrap();
        first.append(b"one\n").await.unwrap();
        first.close().await.unwrap();

        let second = LogSink::open(&path).await.unwrap();
        second.append(b"two\n").await.unwrap();
        second.close().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn append_after_close_fails() {
        let path = temp_log("sink-closed");
        let sink = LogSink::open(&path).await.unwrap();
        sink.close().await.unwrap();
        assert!(sink.append(b"late\n").await.is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn open_in_missing_directory_fails() {
        let path = std::env::temp_dir().join("thermo-monitor-no-such-dir").join("x.log");
        let err = LogSink::open(&path).await.unwrap_err();
        assert!(format!("{:#}", err).contains("couldn't open log file"));
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_interleave() {
        let path = temp_log("sink-concurrent");
        let sink = Arc::new(LogSink::open(&path).await.unwrap());
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let sink = sink.clone();
                tokio::spawn(async move {
                    for _ in 0..25 {
                        let line = format!("writer-{} {}\n", i, "x".repeat(40));
                        sink.append(line.as_bytes()).await.unwrap();
                    }
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        sink.close().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 200);
        for line in text.lines() {
            assert!(line.starts_with("writer-"));
            assert!(line.ends_with(&"x".repeat(40)));
        }
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn reporter_writes_identical_bytes_to_both() {
        let path = temp_log("sink-reporter");
        let sink = Arc::new(LogSink::open(&path).await.unwrap());
        let console = SharedBuf::default();
        let mut reporter = Reporter::new(Box::new(console.clone()), Some(sink.clone()));

        let ts = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        reporter
            .emit(&Record::Report(Report { timestamp: ts, temperature: 71.26 }))
            .await
            .unwrap();
        reporter.emit(&Record::Shutdown(ts)).await.unwrap();
        sink.close().await.unwrap();

        let expected = "08:30:00 71.3\n08:30:00 SHUTDOWN\n";
        assert_eq!(console.contents(), expected);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
        let _ = std::fs::remove_file(&path);
    }
}
