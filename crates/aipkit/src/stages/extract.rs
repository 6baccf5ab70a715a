use std::ffi::{OsStr, OsString};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::context::Aip;
use crate::pipeline::error::StepResult;
use crate::pipeline::log::LogField;
use crate::storage::filesystem::{list_names, move_path, write_file};
use crate::tools::ToolRunner;

pub const NO_TOOL_ERRORS: &str = "No FITS tool errors";

pub fn tool_errors_file_name(aip_id: &str) -> String {
    format!("{}_fits-tool-errors_fitserr.txt", aip_id)
}

/// Runs the characterization tool over `objects`, writing one document per
/// file into `metadata`, then normalizes the output names.
///
/// Diagnostics on stderr are kept in the metadata folder and do not stop
/// processing; a timeout or a tool that cannot be started does.
pub fn characterize(aip: &mut Aip, config: &PipelineConfig, runner: &dyn ToolRunner) -> StepResult {
    let metadata = aip.metadata_dir();
    let args = vec![
        "-r".to_string(),
        "-i".to_string(),
        aip.objects_dir().display().to_string(),
        "-o".to_string(),
        metadata.display().to_string(),
    ];

    info!(aip_id = %aip.id, "Running characterization");
    let output = runner.run(&config.tools.fits, &args, None)?;

    if output.has_diagnostics() {
        let file_name = tool_errors_file_name(&aip.id);
        write_file(&metadata.join(&file_name), output.stderr.as_bytes())?;
        warn!(aip_id = %aip.id, file = %file_name, "Characterization reported errors");
        aip.log.record(
            LogField::FitsToolErrors,
            format!("FITS tool errors occurred; see {}", file_name),
        );
    } else {
        aip.log.record(LogField::FitsToolErrors, NO_TOOL_ERRORS);
    }

    rename_fits_outputs(&metadata)?;
    Ok(())
}

/// Renames `name.fits.xml` to `name_fits.xml`. Returns how many were renamed.
pub fn rename_fits_outputs(metadata_dir: &Path) -> Result<usize, StorageError> {
    let mut renamed = 0;
    for name in list_names(metadata_dir)? {
        if let Some(stem) = fits_output_stem(&name) {
            let mut target = stem.to_os_string();
            target.push("_fits.xml");
            move_path(&metadata_dir.join(&name), &metadata_dir.join(&target))?;
            debug!(from = ?name, to = ?target, "Renamed characterization output");
            renamed += 1;
        }
    }
    Ok(renamed)
}

/// `photo.jpg` for `photo.jpg.fits.xml`.
fn fits_output_stem(name: &OsString) -> Option<&OsStr> {
    let outer = Path::new(name);
    if outer.extension()? != "xml" {
        return None;
    }
    let inner = Path::new(outer.file_stem()?);
    if inner.extension()? != "fits" {
        return None;
    }
    inner.file_stem()
}
