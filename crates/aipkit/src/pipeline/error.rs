use std::fmt;

use crate::error::{StorageError, ToolError};
use crate::pipeline::log::LogField;

/// Quarantine folders under `errors/`, one per fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    FolderRenameConflict,
    ObjectsFolderExists,
    MetadataFolderExists,
    CombiningFits,
    CleanedFitsSaxonError,
    NoFiles,
    PresXmlSaxonError,
    PreservationXmlNotFound,
    PreservationXmlNotValid,
    PreservationXmlUnclassified,
    BagNotValid,
    ToolTimeout,
    ToolFailed,
    Filesystem,
}

impl ErrorCategory {
    pub fn folder_name(&self) -> &'static str {
        match self {
            Self::FolderRenameConflict => "folder_rename_conflict",
            Self::ObjectsFolderExists => "objects_folder_exists",
            Self::MetadataFolderExists => "metadata_folder_exists",
            Self::CombiningFits => "combining_fits",
            Self::CleanedFitsSaxonError => "cleaned_fits_saxon_error",
            Self::NoFiles => "no_files",
            Self::PresXmlSaxonError => "pres_xml_saxon_error",
            Self::PreservationXmlNotFound => "preservationxml_not_found",
            Self::PreservationXmlNotValid => "preservationxml_not_valid",
            Self::PreservationXmlUnclassified => "preservationxml_unclassified_error",
            Self::BagNotValid => "bag_not_valid",
            Self::ToolTimeout => "tool_timeout",
            Self::ToolFailed => "tool_failed",
            Self::Filesystem => "filesystem_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Text saved next to a quarantined AIP as `<id>_<suffix>.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub suffix: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quarantine {
    pub category: ErrorCategory,
    /// Written to the run log.
    pub message: String,
    pub diagnostic: Option<Diagnostic>,
    /// Log column to write `message` into when it differs from the stage's.
    pub field: Option<LogField>,
}

/// Why an AIP left the pipeline before completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// Move the AIP into `errors/<category>`.
    Quarantine(Quarantine),
    /// Stop without moving anything; the log row is the only record.
    Stop { message: String },
}

impl Halt {
    pub fn quarantine(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::Quarantine(Quarantine {
            category,
            message: message.into(),
            diagnostic: None,
            field: None,
        })
    }

    pub fn stop(message: impl Into<String>) -> Self {
        Self::Stop {
            message: message.into(),
        }
    }

    pub fn with_diagnostic(mut self, suffix: &'static str, text: impl Into<String>) -> Self {
        if let Self::Quarantine(q) = &mut self {
            q.diagnostic = Some(Diagnostic {
                suffix,
                text: text.into(),
            });
        }
        self
    }

    pub fn in_field(mut self, field: LogField) -> Self {
        if let Self::Quarantine(q) = &mut self {
            q.field = Some(field);
        }
        self
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Quarantine(q) => &q.message,
            Self::Stop { message } => message,
        }
    }

    pub fn field(&self) -> Option<LogField> {
        match self {
            Self::Quarantine(q) => q.field,
            Self::Stop { .. } => None,
        }
    }
}

impl From<StorageError> for Halt {
    fn from(e: StorageError) -> Self {
        Halt::quarantine(ErrorCategory::Filesystem, format!("Filesystem error: {}", e))
    }
}

impl From<ToolError> for Halt {
    fn from(e: ToolError) -> Self {
        let category = match e {
            ToolError::Timeout { .. } => ErrorCategory::ToolTimeout,
            ToolError::Spawn { .. } | ToolError::Wait { .. } => ErrorCategory::ToolFailed,
        };
        Halt::quarantine(category, e.to_string())
    }
}

pub type StepResult = Result<(), Halt>;
