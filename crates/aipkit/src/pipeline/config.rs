use std::path::{Path, PathBuf};

use crate::config::schema::{MetadataPrefixRule, StylesheetsConfig, ToolsConfig};
use crate::config::Config;
use crate::error::StorageError;
use crate::ledger::RUN_LOG_NAME;
use crate::storage::filesystem::ensure_directory;

pub const INGEST_DIR: &str = "aips-to-ingest";
pub const FITS_XML_DIR: &str = "fits-xml";
pub const PRESERVATION_XML_DIR: &str = "preservation-xml";
pub const ERRORS_DIR: &str = "errors";

/// Everything a pipeline needs to process AIPs from one batch directory.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_dir: PathBuf,
    pub ingest_dir: PathBuf,
    pub fits_xml_dir: PathBuf,
    pub preservation_xml_dir: PathBuf,
    pub errors_dir: PathBuf,
    pub run_log_path: PathBuf,
    pub namespace_uri: String,
    pub zip: bool,
    pub workers: usize,
    pub tools: ToolsConfig,
    pub stylesheets: StylesheetsConfig,
    pub schema: PathBuf,
    pub metadata_rules: Vec<MetadataPrefixRule>,
}

impl PipelineConfig {
    pub fn from_config(config: &Config, batch_dir: &Path) -> Self {
        Self {
            batch_dir: batch_dir.to_path_buf(),
            ingest_dir: batch_dir.join(INGEST_DIR),
            fits_xml_dir: batch_dir.join(FITS_XML_DIR),
            preservation_xml_dir: batch_dir.join(PRESERVATION_XML_DIR),
            errors_dir: batch_dir.join(ERRORS_DIR),
            run_log_path: batch_dir.join(RUN_LOG_NAME),
            namespace_uri: config.namespace_uri.clone(),
            zip: config.zip,
            workers: config.workers,
            tools: config.tools.clone(),
            stylesheets: config.stylesheets.clone(),
            schema: config.schema.clone(),
            metadata_rules: config.metadata_rules.clone(),
        }
    }

    pub fn create_output_dirs(&self) -> Result<(), StorageError> {
        for dir in [
            &self.ingest_dir,
            &self.fits_xml_dir,
            &self.preservation_xml_dir,
            &self.errors_dir,
        ] {
            ensure_directory(dir)?;
        }
        Ok(())
    }
}
