use std::path::{Path, PathBuf};

use chrono::Local;

use crate::batch::sheet::SheetRow;
use crate::pipeline::log::LogRecord;

/// One package under construction.
#[derive(Debug, Clone)]
pub struct Aip {
    pub id: String,
    pub department: String,
    pub collection_id: String,
    pub version: u32,
    pub title: String,
    /// Folder name the batch sheet listed for this AIP.
    pub folder: String,
    /// Current location of the unit of work. Follows the renames to `<id>`
    /// and `<id>_bag`.
    pub directory: PathBuf,
    pub zip: bool,
    /// Uncompressed size, set by packaging.
    pub size: Option<u64>,
    pub log: LogRecord,
}

impl Aip {
    pub fn from_row(row: &SheetRow, batch_dir: &Path, default_zip: bool) -> Self {
        Self {
            id: row.aip_id.clone(),
            department: row.department.clone(),
            collection_id: row.collection.clone(),
            version: row.version,
            title: row.title.clone(),
            folder: row.folder.clone(),
            directory: batch_dir.join(&row.folder),
            zip: row.zip.unwrap_or(default_zip),
            size: None,
            log: LogRecord::new(&row.aip_id, Local::now()),
        }
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.directory.join("objects")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.directory.join("metadata")
    }

    pub fn bag_name(&self) -> String {
        format!("{}_bag", self.id)
    }

    /// Final artifact name, known once the size has been computed.
    pub fn package_name(&self) -> Option<String> {
        let size = self.size?;
        let ext = if self.zip { "tar.bz2" } else { "tar" };
        Some(format!("{}.{}.{}", self.bag_name(), size, ext))
    }
}
