//! Turns a validated bag into the tar (optionally bzip2) artifact that is
//! handed to the ingest system.
//!
//! Failures here are recorded but do not quarantine: the manifest step finds
//! the artifact missing and stops the AIP there.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::bag::read_payload_oxum;
use crate::error::StorageError;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::context::Aip;
use crate::pipeline::error::StepResult;
use crate::pipeline::log::LogField;
use crate::storage::filesystem::{list_names, move_path, remove_file};
use crate::tools::{ToolOutput, ToolRunner};

pub const PACKAGE_OK: &str = "Successfully made package";

pub fn make_package(aip: &mut Aip, config: &PipelineConfig, runner: &dyn ToolRunner) -> StepResult {
    match build_package(aip, config, runner) {
        Ok(artifact) => {
            info!(aip_id = %aip.id, artifact = %artifact.display(), "Package ready for ingest");
            aip.log.record(LogField::PackageErrors, PACKAGE_OK);
        }
        Err(detail) => {
            warn!(aip_id = %aip.id, %detail, "Packaging failed");
            aip.log.record(
                LogField::PackageErrors,
                format!("Issue when making package: {}", detail),
            );
        }
    }
    Ok(())
}

/// Payload-Oxum bytes plus the regular files at the top of the bag.
pub fn package_size(bag_dir: &Path) -> Result<u64, String> {
    let oxum = read_payload_oxum(bag_dir)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "bag-info.txt has no Payload-Oxum".to_string())?;

    let mut size = oxum.bytes;
    for name in list_names(bag_dir).map_err(|e| e.to_string())? {
        let metadata = std::fs::metadata(bag_dir.join(&name)).map_err(|e| e.to_string())?;
        if metadata.is_file() {
            size += metadata.len();
        }
    }
    Ok(size)
}

fn build_package(
    aip: &mut Aip,
    config: &PipelineConfig,
    runner: &dyn ToolRunner,
) -> Result<PathBuf, String> {
    let size = package_size(&aip.directory)?;
    aip.size = Some(size);

    let parent = aip
        .directory
        .parent()
        .ok_or_else(|| format!("{} has no parent directory", aip.directory.display()))?
        .to_path_buf();
    let bag_name = aip.bag_name();
    let tar_path = parent.join(format!("{}.tar", bag_name));

    let output = runner
        .run(
            &config.tools.tar,
            &[
                "-cf".to_string(),
                tar_path.display().to_string(),
                "-C".to_string(),
                parent.display().to_string(),
                bag_name.clone(),
            ],
            None,
        )
        .map_err(|e| e.to_string())?;
    check("tar", &output)?;

    let sized_tar = parent.join(format!("{}.{}.tar", bag_name, size));
    move_path(&tar_path, &sized_tar).map_err(describe)?;

    let artifact = if aip.zip {
        let output = runner
            .run(
                &config.tools.bzip2,
                &[sized_tar.display().to_string()],
                None,
            )
            .map_err(|e| e.to_string())?;
        check("bzip2", &output)?;

        let compressed = PathBuf::from(format!("{}.bz2", sized_tar.display()));
        if !compressed.is_file() {
            return Err(format!("bzip2 did not produce {}", display_name(&compressed)));
        }
        if sized_tar.exists() {
            remove_file(&sized_tar).map_err(describe)?;
        }
        compressed
    } else {
        sized_tar
    };

    let file_name = display_name(&artifact);
    let destination = config.ingest_dir.join(&file_name);
    move_path(&artifact, &destination).map_err(describe)?;
    Ok(destination)
}

fn check(tool: &str, output: &ToolOutput) -> Result<(), String> {
    if output.success() {
        return Ok(());
    }
    let stderr = output.stderr.trim();
    Err(if stderr.is_empty() {
        format!("{} exited with status {:?}", tool, output.exit_code)
    } else {
        format!("{}: {}", tool, stderr)
    })
}

fn describe(e: StorageError) -> String {
    e.to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
