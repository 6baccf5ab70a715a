use std::fmt;

use crate::pipeline::log::LogField;

/// Pipeline steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RenameFolder,
    Scrub,
    Structure,
    Extract,
    Merge,
    BuildRecord,
    OrganizeXml,
    ValidateRecord,
    Bag,
    ValidateBag,
    Package,
    Manifest,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::RenameFolder,
        Stage::Scrub,
        Stage::Structure,
        Stage::Extract,
        Stage::Merge,
        Stage::BuildRecord,
        Stage::OrganizeXml,
        Stage::ValidateRecord,
        Stage::Bag,
        Stage::ValidateBag,
        Stage::Package,
        Stage::Manifest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::RenameFolder => "rename_folder",
            Self::Scrub => "scrub",
            Self::Structure => "structure",
            Self::Extract => "extract",
            Self::Merge => "merge",
            Self::BuildRecord => "build_record",
            Self::OrganizeXml => "organize_xml",
            Self::ValidateRecord => "validate_record",
            Self::Bag => "bag",
            Self::ValidateBag => "validate_bag",
            Self::Package => "package",
            Self::Manifest => "manifest",
        }
    }

    /// Run log column that receives this stage's halting message.
    pub fn log_field(&self) -> LogField {
        match self {
            Self::RenameFolder => LogField::Complete,
            Self::Scrub => LogField::FilesDeleted,
            Self::Structure => LogField::ObjectsFolder,
            Self::Extract => LogField::FitsToolErrors,
            Self::Merge => LogField::FitsCombination,
            Self::BuildRecord | Self::OrganizeXml => LogField::PresXmlMade,
            Self::ValidateRecord => LogField::PresXmlValid,
            Self::Bag | Self::ValidateBag => LogField::BagValid,
            Self::Package => LogField::PackageErrors,
            Self::Manifest => LogField::ManifestErrors,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
