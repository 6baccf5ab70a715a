//! Removes operating-system and editor junk before the AIP is structured.
//! Junk left in place would be bagged and later break fixity checks on other
//! systems that regenerate or strip these files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, info};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::StorageError;
use crate::pipeline::context::Aip;
use crate::pipeline::error::StepResult;
use crate::pipeline::log::LogField;
use crate::storage::filesystem::remove_file;

pub const DELETED: &str = "Successfully deleted temporary files";
pub const NOTHING_DELETED: &str = "No temporary files to delete";

const DENY_LIST: &[&str] = &[".DS_Store", "._.DS_Store", "Thumbs.db"];

/// One row of the deletion log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedFile {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "File Name")]
    pub name: String,
    #[serde(rename = "Size (Bytes)")]
    pub size: u64,
    #[serde(rename = "Date Last Modified")]
    pub modified: String,
}

pub fn is_temp_file(name: &str) -> bool {
    DENY_LIST.contains(&name) || name.ends_with(".tmp") || name.starts_with('.')
}

/// Name of the CSV written into the AIP when anything was deleted.
pub fn deletion_log_name(aip_id: &str, date: DateTime<Local>) -> String {
    format!("{}_files-deleted_{}_del.csv", aip_id, date.format("%Y-%m-%d"))
}

pub fn delete_temp_files(aip: &mut Aip) -> StepResult {
    let deleted = scrub_directory(&aip.directory)?;

    if deleted.is_empty() {
        aip.log.record(LogField::FilesDeleted, NOTHING_DELETED);
        return Ok(());
    }

    let log_path = aip
        .directory
        .join(deletion_log_name(&aip.id, Local::now()));
    write_deletion_log(&log_path, &deleted)?;

    info!("Deleted {} temporary file(s) from {}", deleted.len(), aip.id);
    aip.log.record(LogField::FilesDeleted, DELETED);
    Ok(())
}

/// Deletes every junk file below `dir` and reports what was removed.
pub fn scrub_directory(dir: &Path) -> Result<Vec<DeletedFile>, StorageError> {
    let mut doomed: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| StorageError::Walk {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_file() && is_temp_file(&entry.file_name().to_string_lossy()) {
            doomed.push(entry.into_path());
        }
    }

    let mut deleted = Vec::with_capacity(doomed.len());
    for path in doomed {
        let metadata = std::fs::metadata(&path).map_err(|e| StorageError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        let modified = metadata
            .modified()
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        remove_file(&path)?;
        debug!("Deleted temporary file {}", path.display());

        deleted.push(DeletedFile {
            path: path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            size: metadata.len(),
            modified,
        });
    }

    Ok(deleted)
}

fn write_deletion_log(path: &Path, deleted: &[DeletedFile]) -> Result<(), StorageError> {
    let write_err = |e: csv::Error| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e.into(),
    };

    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
    for row in deleted {
        writer.serialize(row).map_err(write_err)?;
    }
    writer.flush().map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}
