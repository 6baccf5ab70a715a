use log::info;

use crate::pipeline::context::Aip;
use crate::pipeline::error::{ErrorCategory, Halt, StepResult};
use crate::storage::filesystem::move_path;

/// Renames the batch folder to the AIP identifier when the sheet maps a
/// differently named folder onto it.
pub fn rename_folder(aip: &mut Aip) -> StepResult {
    let Some(parent) = aip.directory.parent() else {
        return Ok(());
    };
    let target = parent.join(&aip.id);
    if target == aip.directory {
        return Ok(());
    }

    if std::fs::symlink_metadata(&target).is_ok() {
        return Err(Halt::quarantine(
            ErrorCategory::FolderRenameConflict,
            format!("Could not rename folder to {}: name already in use", aip.id),
        ));
    }

    move_path(&aip.directory, &target)?;
    info!("Renamed folder '{}' to '{}'", aip.folder, aip.id);
    aip.directory = target;
    Ok(())
}
