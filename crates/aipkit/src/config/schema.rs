use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Department (owning group) codes accepted in the batch metadata sheet.
    pub departments: Vec<String>,
    /// Controlled namespace URI handed to the preservation stylesheet.
    pub namespace_uri: String,
    /// Compress the tar artifact with bzip2 unless the sheet row says otherwise.
    #[serde(default = "default_true")]
    pub zip: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
    pub tools: ToolsConfig,
    pub stylesheets: StylesheetsConfig,
    /// XML schema the preservation document is validated against.
    pub schema: PathBuf,
    #[serde(default)]
    pub metadata_rules: Vec<MetadataPrefixRule>,
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "ToolSpec::fits")]
    pub fits: ToolSpec,
    #[serde(default = "ToolSpec::saxon")]
    pub saxon: ToolSpec,
    #[serde(default = "ToolSpec::xmllint")]
    pub xmllint: ToolSpec,
    #[serde(default = "ToolSpec::tar")]
    pub tar: ToolSpec,
    #[serde(default = "ToolSpec::bzip2")]
    pub bzip2: ToolSpec,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fits: ToolSpec::fits(),
            saxon: ToolSpec::saxon(),
            xmllint: ToolSpec::xmllint(),
            tar: ToolSpec::tar(),
            bzip2: ToolSpec::bzip2(),
        }
    }
}

/// One external program: what to run, fixed leading arguments, and how long
/// to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Filled in from the `tools` key; not part of the file format.
    #[serde(skip)]
    pub name: String,
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    600
}

impl ToolSpec {
    pub fn new(name: &str, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            program: program.into(),
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn fits() -> Self {
        Self {
            timeout_secs: 3600,
            ..Self::new("fits", "fits.sh")
        }
    }

    fn saxon() -> Self {
        Self::new("saxon", "saxon")
    }

    fn xmllint() -> Self {
        Self::new("xmllint", "xmllint")
    }

    fn tar() -> Self {
        Self::new("tar", "tar")
    }

    fn bzip2() -> Self {
        Self::new("bzip2", "bzip2")
    }
}

impl ToolsConfig {
    /// Serde skips `name`, so stamp each tool with its key after loading.
    pub(crate) fn assign_names(&mut self) {
        self.fits.name = "fits".to_string();
        self.saxon.name = "saxon".to_string();
        self.xmllint.name = "xmllint".to_string();
        self.tar.name = "tar".to_string();
        self.bzip2.name = "bzip2".to_string();
    }

    pub fn all(&self) -> [&ToolSpec; 5] {
        [&self.fits, &self.saxon, &self.xmllint, &self.tar, &self.bzip2]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesheetsConfig {
    /// Normalizes the combined characterization output.
    pub cleanup: PathBuf,
    /// Converts a cleaned document describing exactly one file.
    pub single_file: PathBuf,
    /// Converts a cleaned document describing several files.
    pub multi_file: PathBuf,
}

impl StylesheetsConfig {
    pub fn for_file_count(&self, count: usize) -> &Path {
        if count == 1 {
            &self.single_file
        } else {
            &self.multi_file
        }
    }
}

/// Top-level files owned by a department that belong in `metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPrefixRule {
    pub department: String,
    pub prefix: String,
}
