use chrono::Local;
use log::{info, warn};

use crate::bag::{self, Algorithm};
use crate::error::StorageError;
use crate::pipeline::context::Aip;
use crate::pipeline::error::{ErrorCategory, Halt, StepResult};
use crate::pipeline::log::LogField;
use crate::storage::filesystem::move_path;

pub const BAG_NOT_VALID: &str = "Bag not valid (see log in bag_not_valid error folder)";
pub const VALIDATION_SUFFIX: &str = "bag_validation";

pub const ALGORITHMS: [Algorithm; 2] = [Algorithm::Md5, Algorithm::Sha256];

fn not_valid(diagnostic: impl Into<String>) -> Halt {
    Halt::quarantine(ErrorCategory::BagNotValid, BAG_NOT_VALID)
        .with_diagnostic(VALIDATION_SUFFIX, diagnostic)
}

/// Bags the AIP in place and renames it to `<id>_bag`.
pub fn make_bag(aip: &mut Aip) -> StepResult {
    bag::make_bag(&aip.directory, &ALGORITHMS).map_err(|e| not_valid(e.to_string()))?;

    let Some(parent) = aip.directory.parent() else {
        return Ok(());
    };
    let target = parent.join(aip.bag_name());
    if std::fs::symlink_metadata(&target).is_ok() {
        return Err(StorageError::FileExists(target).into());
    }
    move_path(&aip.directory, &target)?;
    aip.directory = target;
    Ok(())
}

pub fn validate_bag(aip: &mut Aip) -> StepResult {
    let findings = bag::validate(&aip.directory).map_err(|e| not_valid(e.to_string()))?;

    if findings.is_empty() {
        info!("Bag for {} is valid", aip.id);
        aip.log.record(
            LogField::BagValid,
            format!("Bag valid on {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
        );
        return Ok(());
    }

    warn!("Bag for {} has {} problem(s)", aip.id, findings.len());
    let report: Vec<String> = findings.iter().map(|f| f.to_string()).collect();
    Err(not_valid(report.join("\n") + "\n"))
}
