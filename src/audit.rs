//! Append-only audit trail of pipeline phases.
//!
//! One line per event: `2023-Sep-02-18:53:26 : Extract phase Started`.
//! The file is never truncated, so it accumulates across runs.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::{EtlError, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%b-%d-%H:%M:%S";

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AuditLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, message: &str) -> Result<()> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let line = format!("{} : {}\n", timestamp, message);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| EtlError::io(self.path.display().to_string(), e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| EtlError::io(self.path.display().to_string(), e))?;

        info!(phase = message, "audit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl_log.txt");
        std::fs::write(&path, "previous run\n").unwrap();

        let log = AuditLog::new(&path);
        log.log("ETL Job Started").unwrap();
        log.log("Extract phase Started").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "previous run");

        let re = Regex::new(r"^\d{4}-[A-Z][a-z]{2}-\d{2}-\d{2}:\d{2}:\d{2} : (.+)$").unwrap();
        let messages: Vec<&str> = lines[1..]
            .iter()
            .map(|l| re.captures(l).unwrap().get(1).unwrap().as_str())
            .collect();
        assert_eq!(messages, vec!["ETL Job Started", "Extract phase Started"]);
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("missing").join("log.txt"));
        assert!(matches!(log.log("x"), Err(EtlError::Io { .. })));
    }
}
