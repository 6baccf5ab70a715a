use std::path::{Path, PathBuf};

use log::warn;

use crate::error::StorageError;
use crate::pipeline::error::{Diagnostic, ErrorCategory};
use crate::storage::filesystem::{available_path, ensure_directory, move_path, write_file};

/// Relocates failed AIPs into `errors/<category>/` for manual review.
#[derive(Debug, Clone)]
pub struct ErrorRouter {
    errors_dir: PathBuf,
}

impl ErrorRouter {
    pub fn new<P: AsRef<Path>>(errors_dir: P) -> Self {
        Self {
            errors_dir: errors_dir.as_ref().to_path_buf(),
        }
    }

    pub fn errors_dir(&self) -> &Path {
        &self.errors_dir
    }

    pub fn category_dir(&self, category: ErrorCategory) -> PathBuf {
        self.errors_dir.join(category.folder_name())
    }

    /// Moves `aip_dir` into the category folder and writes the diagnostic,
    /// if any, beside it as `<aip_id>_<suffix>.txt`. Existing entries are
    /// never overwritten; a numbered name is used instead.
    ///
    /// Returns where the AIP now lives.
    pub fn quarantine(
        &self,
        aip_dir: &Path,
        aip_id: &str,
        category: ErrorCategory,
        diagnostic: Option<&Diagnostic>,
    ) -> Result<PathBuf, StorageError> {
        let category_dir = self.category_dir(category);
        ensure_directory(&category_dir)?;

        let dir_name = aip_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| aip_id.to_string());
        let destination = available_path(&category_dir, &dir_name)?;

        if aip_dir.exists() {
            move_path(aip_dir, &destination)?;
        } else {
            warn!(
                "AIP {} has no directory at {} to quarantine",
                aip_id,
                aip_dir.display()
            );
        }

        if let Some(diagnostic) = diagnostic {
            let file_name = format!("{}_{}.txt", aip_id, diagnostic.suffix);
            let path = available_path(&category_dir, &file_name)?;
            write_file(&path, diagnostic.text.as_bytes())?;
        }

        Ok(destination)
    }
}
