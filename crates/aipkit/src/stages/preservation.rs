//! Builds, files and validates the preservation document.

use chrono::Local;
use tracing::{info, warn};

use crate::pipeline::config::PipelineConfig;
use crate::pipeline::context::Aip;
use crate::pipeline::error::{ErrorCategory, Halt, StepResult};
use crate::pipeline::log::LogField;
use crate::stages::merge::combined_file_name;
use crate::storage::filesystem::{copy_file, count_files, remove_file};
use crate::tools::{classify_validation, transform_failure, ToolRunner, ValidationVerdict};

pub const RECORD_MADE: &str = "Successfully made preservation.xml";
pub const NO_FILES: &str = "No files in objects folder";
pub const RECORD_NOT_FOUND: &str = "Preservation.xml was not found";
pub const RECORD_NOT_VALID: &str = "Preservation.xml is not valid";
pub const RECORD_UNCLASSIFIED: &str = "Unrecognized error when validating preservation.xml";

/// Quarantine diagnostic suffix for validator output.
pub const VALIDATION_SUFFIX: &str = "presxml_validation";

pub fn cleaned_file_name(aip_id: &str) -> String {
    format!("{}_cleaned-fits.xml", aip_id)
}

pub fn record_file_name(aip_id: &str) -> String {
    format!("{}_preservation.xml", aip_id)
}

/// Cleans the combined characterization document and converts it into the
/// preservation document.
pub fn build_record(aip: &mut Aip, config: &PipelineConfig, runner: &dyn ToolRunner) -> StepResult {
    let metadata = aip.metadata_dir();
    let combined = metadata.join(combined_file_name(&aip.id));
    let cleaned = metadata.join(cleaned_file_name(&aip.id));
    let record = metadata.join(record_file_name(&aip.id));

    let output = runner.run(
        &config.tools.saxon,
        &[
            format!("-s:{}", combined.display()),
            format!("-xsl:{}", config.stylesheets.cleanup.display()),
            format!("-o:{}", cleaned.display()),
        ],
        None,
    )?;
    if let Some(detail) = transform_failure(&output) {
        return Err(Halt::quarantine(
            ErrorCategory::CleanedFitsSaxonError,
            format!("Issue when making cleaned-fits.xml. Saxon error: {}", detail),
        ));
    }

    let file_count = count_files(&aip.objects_dir())?;
    if file_count == 0 {
        return Err(Halt::quarantine(ErrorCategory::NoFiles, NO_FILES));
    }

    let stylesheet = config.stylesheets.for_file_count(file_count);
    info!(aip_id = %aip.id, files = file_count, stylesheet = %stylesheet.display(), "Making preservation.xml");
    let output = runner.run(
        &config.tools.saxon,
        &[
            format!("-s:{}", cleaned.display()),
            format!("-xsl:{}", stylesheet.display()),
            format!("-o:{}", record.display()),
            format!("aip-id={}", aip.id),
            format!("aip-title={}", aip.title),
            format!("department={}", aip.department),
            format!("collection-id={}", aip.collection_id),
            format!("version={}", aip.version),
            format!("ns={}", config.namespace_uri),
        ],
        None,
    )?;
    if let Some(detail) = transform_failure(&output) {
        return Err(Halt::quarantine(
            ErrorCategory::PresXmlSaxonError,
            format!("Issue when making preservation.xml. Saxon error: {}", detail),
        ));
    }

    if cleaned.exists() {
        remove_file(&cleaned)?;
    }
    aip.log.record(LogField::PresXmlMade, RECORD_MADE);
    Ok(())
}

/// Files copies of the preservation and combined documents in the batch's
/// collection folders. The combined document leaves the package.
pub fn organize_xml(aip: &mut Aip, config: &PipelineConfig) -> StepResult {
    let metadata = aip.metadata_dir();
    let record_name = record_file_name(&aip.id);
    let combined_name = combined_file_name(&aip.id);

    copy_file(
        &metadata.join(&record_name),
        &config.preservation_xml_dir.join(&record_name),
    )?;
    copy_file(
        &metadata.join(&combined_name),
        &config.fits_xml_dir.join(&combined_name),
    )?;
    remove_file(&metadata.join(&combined_name))?;
    Ok(())
}

pub fn validate_record(
    aip: &mut Aip,
    config: &PipelineConfig,
    runner: &dyn ToolRunner,
) -> StepResult {
    let record = aip.metadata_dir().join(record_file_name(&aip.id));
    let output = runner.run(
        &config.tools.xmllint,
        &[
            "--noout".to_string(),
            "--schema".to_string(),
            config.schema.display().to_string(),
            record.display().to_string(),
        ],
        None,
    )?;

    match classify_validation(&output) {
        ValidationVerdict::Valid => {
            aip.log.record(
                LogField::PresXmlValid,
                format!(
                    "Preservation.xml valid on {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S")
                ),
            );
            Ok(())
        }
        ValidationVerdict::NotFound => Err(Halt::quarantine(
            ErrorCategory::PreservationXmlNotFound,
            RECORD_NOT_FOUND,
        )),
        ValidationVerdict::NotValid => Err(Halt::quarantine(
            ErrorCategory::PreservationXmlNotValid,
            RECORD_NOT_VALID,
        )
        .with_diagnostic(VALIDATION_SUFFIX, output.stderr)),
        ValidationVerdict::Unclassified => {
            warn!(
                aip_id = %aip.id,
                exit_code = ?output.exit_code,
                "Validator output matched no known pattern"
            );
            Err(Halt::quarantine(
                ErrorCategory::PreservationXmlUnclassified,
                RECORD_UNCLASSIFIED,
            )
            .with_diagnostic(VALIDATION_SUFFIX, output.stderr))
        }
    }
}
