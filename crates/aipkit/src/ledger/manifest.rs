use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::LedgerError;

/// `manifest_<department>.txt` inside the ingest folder.
pub fn manifest_path(ingest_dir: &Path, department: &str) -> PathBuf {
    ingest_dir.join(format!("manifest_{}.txt", department))
}

/// One manifest line: digest, two spaces, file name.
pub fn manifest_line(digest: &str, file_name: &str) -> String {
    format!("{}  {}\n", digest, file_name.replace('\r', ""))
}

/// Appends an entry to the department's manifest, creating it if needed.
pub fn append_entry(
    ingest_dir: &Path,
    department: &str,
    digest: &str,
    file_name: &str,
) -> Result<(), LedgerError> {
    let path = manifest_path(ingest_dir, department);
    let write_err = |e: std::io::Error| LedgerError::Write {
        path: path.clone(),
        source: e,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(write_err)?;
    file.write_all(manifest_line(digest, file_name).as_bytes())
        .map_err(write_err)
}
