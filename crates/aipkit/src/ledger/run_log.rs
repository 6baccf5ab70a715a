use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::LedgerError;
use crate::pipeline::log::LogRecord;

pub const RUN_LOG_NAME: &str = "aip_log.csv";

/// Append-only CSV with one row per processed AIP.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row, writing the header first if the file is new or empty.
    pub fn append(&self, record: &LogRecord) -> Result<(), LedgerError> {
        let is_new = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LedgerError::Write {
                path: self.path.clone(),
                source: e,
            })?;

        let csv_err = |e: csv::Error| LedgerError::Csv {
            path: self.path.clone(),
            source: e,
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(LogRecord::headers()).map_err(csv_err)?;
        }
        writer.write_record(record.row()).map_err(csv_err)?;
        writer.flush().map_err(|e| LedgerError::Write {
            path: self.path.clone(),
            source: e,
        })
    }
}
