use log::info;

use crate::bag::{digest_file, Algorithm};
use crate::ledger::LedgerHandle;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::context::Aip;
use crate::pipeline::error::{Halt, StepResult};
use crate::pipeline::log::LogField;

pub const NOT_IN_INGEST: &str = "Tar/zip file not in aips-to-ingest";
pub const MANIFEST_OK: &str = "Successfully added AIP to manifest";

/// Records the packaged artifact's MD5 in the department manifest.
pub fn add_to_manifest(aip: &mut Aip, config: &PipelineConfig, ledger: &LedgerHandle) -> StepResult {
    let Some(file_name) = aip.package_name() else {
        return Err(Halt::stop(NOT_IN_INGEST));
    };
    let artifact = config.ingest_dir.join(&file_name);
    if !artifact.is_file() {
        return Err(Halt::stop(NOT_IN_INGEST));
    }

    let digest = digest_file(&artifact, &[Algorithm::Md5])?.concat();
    ledger
        .append_manifest(&aip.department, &digest, &file_name)
        .map_err(|e| Halt::stop(format!("Could not update manifest: {}", e)))?;

    info!("Added {} to manifest_{}.txt", file_name, aip.department);
    aip.log.record(LogField::ManifestErrors, MANIFEST_OK);
    Ok(())
}
