//! Per-run JSON export log
//!
//! The log is a JSON array of committed records in commit order. It is opened
//! when the run starts and finalized (closing bracket written, file synced)
//! when the run stops, whatever happened to individual items.

use crate::pipeline::CandidateRecord;
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors raised while writing the export log
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Export log {0} is not open")]
    NotOpen(PathBuf),
}

struct Writer {
    out: BufWriter<File>,
    written: u64,
}

/// Append-only JSON array of the run's committed records
pub struct ExportLog {
    path: PathBuf,
    writer: Mutex<Option<Writer>>,
}

impl ExportLog {
    /// Creates a log at `<dir>/<prefix>_<YYYYmmddHHMMSS>.json`
    ///
    /// Nothing touches the disk until [`ExportLog::open`].
    pub fn new(dir: impl AsRef<Path>, prefix: &str, started_at: DateTime<Local>) -> Self {
        let file_name = format!("{}_{}.json", prefix, started_at.format("%Y%m%d%H%M%S"));
        Self::at_path(dir.as_ref().join(file_name))
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the file and writes the opening bracket
    pub fn open(&self) -> Result<(), ExportError> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let file = File::create(&self.path).map_err(|e| self.io_error(e))?;
        let mut out = BufWriter::new(file);
        out.write_all(b"[").map_err(|e| self.io_error(e))?;
        out.flush().map_err(|e| self.io_error(e))?;

        tracing::info!("Export log opened at {}", self.path.display());
        *guard = Some(Writer { out, written: 0 });
        Ok(())
    }

    /// Appends one record and flushes it to the file
    pub fn append(&self, record: &CandidateRecord) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(record)?;

        let mut guard = self.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| ExportError::NotOpen(self.path.clone()))?;

        let separator: &[u8] = if writer.written == 0 { b"\n" } else { b",\n" };
        writer
            .out
            .write_all(separator)
            .and_then(|_| writer.out.write_all(json.as_bytes()))
            .and_then(|_| writer.out.flush())
            .map_err(|e| self.io_error(e))?;
        writer.written += 1;
        Ok(())
    }

    /// Writes the closing bracket and syncs the file
    ///
    /// Returns the number of records written. Finishing an unopened or already
    /// finished log is a no-op returning 0.
    pub fn finish(&self) -> Result<u64, ExportError> {
        let Some(mut writer) = self.lock().take() else {
            return Ok(0);
        };

        let closing: &[u8] = if writer.written == 0 { b"]\n" } else { b"\n]\n" };
        writer
            .out
            .write_all(closing)
            .and_then(|_| writer.out.flush())
            .and_then(|_| writer.out.get_ref().sync_all())
            .map_err(|e| self.io_error(e))?;

        tracing::info!(
            "Export log finalized with {} records: {}",
            writer.written,
            self.path.display()
        );
        Ok(writer.written)
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Writer>> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn io_error(&self, source: std::io::Error) -> ExportError {
        ExportError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Renders records as a pretty-printed JSON array
pub fn render_records(records: &[CandidateRecord]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(records)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(url: &str) -> CandidateRecord {
        CandidateRecord {
            url: url.to_string(),
            headline: "Headline".to_string(),
            author: "Ann Lee".to_string(),
            text: "Body".to_string(),
            countries_mentioned: vec!["Spain".to_string()],
        }
    }

    #[test]
    fn test_file_name_uses_prefix_and_timestamp() {
        let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let log = ExportLog::new("/tmp/out", "bbc", started);
        assert_eq!(log.path(), Path::new("/tmp/out/bbc_20240309140507.json"));
    }

    #[test]
    fn test_records_form_json_array_in_order() {
        let dir = TempDir::new().unwrap();
        let log = ExportLog::at_path(dir.path().join("news.json"));

        log.open().unwrap();
        log.append(&record("https://site.example/1")).unwrap();
        log.append(&record("https://site.example/2")).unwrap();
        assert_eq!(log.finish().unwrap(), 2);

        let content = fs::read_to_string(log.path()).unwrap();
        let parsed: Vec<CandidateRecord> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].url, "https://site.example/1");
        assert_eq!(parsed[1].countries_mentioned, vec!["Spain"]);
    }

    #[test]
    fn test_empty_run_is_empty_array() {
        let dir = TempDir::new().unwrap();
        let log = ExportLog::at_path(dir.path().join("out").join("news.json"));

        log.open().unwrap();
        assert_eq!(log.finish().unwrap(), 0);

        let parsed: Vec<CandidateRecord> =
            serde_json::from_str(&fs::read_to_string(log.path()).unwrap()).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_append_before_open_fails() {
        let dir = TempDir::new().unwrap();
        let log = ExportLog::at_path(dir.path().join("news.json"));
        assert!(matches!(
            log.append(&record("https://site.example/1")),
            Err(ExportError::NotOpen(_))
        ));
    }

    #[test]
    fn test_finish_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let log = ExportLog::at_path(dir.path().join("news.json"));
        log.open().unwrap();
        log.append(&record("https://site.example/1")).unwrap();

        assert_eq!(log.finish().unwrap(), 1);
        assert_eq!(log.finish().unwrap(), 0);
        assert!(!log.is_open());
    }
}
