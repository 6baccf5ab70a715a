//! The per-AIP outcome record that becomes one run log row.

use chrono::{DateTime, Local};

pub const NOT_REACHED: &str = "n/a";
pub const COMPLETE_OK: &str = "Successfully completed processing";
pub const COMPLETE_ERROR: &str = "Error during processing";

/// Run log columns, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogField {
    Started,
    AipId,
    FilesDeleted,
    ObjectsFolder,
    MetadataFolder,
    FitsToolErrors,
    FitsCombination,
    PresXmlMade,
    PresXmlValid,
    BagValid,
    PackageErrors,
    ManifestErrors,
    Complete,
}

impl LogField {
    pub const ALL: [LogField; 13] = [
        LogField::Started,
        LogField::AipId,
        LogField::FilesDeleted,
        LogField::ObjectsFolder,
        LogField::MetadataFolder,
        LogField::FitsToolErrors,
        LogField::FitsCombination,
        LogField::PresXmlMade,
        LogField::PresXmlValid,
        LogField::BagValid,
        LogField::PackageErrors,
        LogField::ManifestErrors,
        LogField::Complete,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Self::Started => "Time Started",
            Self::AipId => "AIP ID",
            Self::FilesDeleted => "Files Deleted",
            Self::ObjectsFolder => "Objects Folder",
            Self::MetadataFolder => "Metadata Folder",
            Self::FitsToolErrors => "FITS Tool Errors",
            Self::FitsCombination => "FITS Combination Errors",
            Self::PresXmlMade => "Preservation.xml Made",
            Self::PresXmlValid => "Preservation.xml Valid",
            Self::BagValid => "Bag Valid",
            Self::PackageErrors => "Package Errors",
            Self::ManifestErrors => "Manifest Errors",
            Self::Complete => "Processing Complete",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Outcome strings for one AIP, keyed by [`LogField`].
///
/// The first [`halt`](LogRecord::halt) freezes the record, so the row always
/// describes the first fatal condition no matter what runs afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    values: [String; 13],
    halted: bool,
}

impl LogRecord {
    pub fn new(aip_id: &str, started: DateTime<Local>) -> Self {
        let mut values: [String; 13] = std::array::from_fn(|_| NOT_REACHED.to_string());
        values[LogField::Started.index()] = started.format("%Y-%m-%d %H:%M:%S").to_string();
        values[LogField::AipId.index()] = aip_id.to_string();
        Self {
            values,
            halted: false,
        }
    }

    pub fn get(&self, field: LogField) -> &str {
        &self.values[field.index()]
    }

    /// Sets `field` unless the record has already been halted.
    pub fn record(&mut self, field: LogField, outcome: impl Into<String>) {
        if !self.halted {
            self.values[field.index()] = outcome.into();
        }
    }

    /// Records the fatal outcome and marks processing as failed. Later calls
    /// to `record` or `halt` are ignored.
    pub fn halt(&mut self, field: LogField, outcome: impl Into<String>) {
        if self.halted {
            return;
        }
        self.values[field.index()] = outcome.into();
        if field != LogField::Complete {
            self.values[LogField::Complete.index()] = COMPLETE_ERROR.to_string();
        }
        self.halted = true;
    }

    pub fn complete(&mut self) {
        self.record(LogField::Complete, COMPLETE_OK);
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn headers() -> [&'static str; 13] {
        LogField::ALL.map(|f| f.header())
    }

    pub fn row(&self) -> &[String; 13] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> LogRecord {
        LogRecord::new("har-ua01-001-001", Local::now())
    }

    #[test]
    fn test_new_record_is_all_sentinels() {
        let log = record();
        assert_eq!(log.get(LogField::AipId), "har-ua01-001-001");
        assert_ne!(log.get(LogField::Started), NOT_REACHED);
        for field in &LogField::ALL[2..] {
            assert_eq!(log.get(*field), NOT_REACHED);
        }
    }

    #[test]
    fn test_halt_freezes_record() {
        let mut log = record();
        log.record(LogField::FilesDeleted, "No temporary files to delete");
        log.halt(LogField::ObjectsFolder, "Objects folder already exists");
        log.record(LogField::MetadataFolder, "Successfully created metadata folder");
        log.halt(LogField::BagValid, "second failure");
        log.complete();

        assert!(log.is_halted());
        assert_eq!(log.get(LogField::ObjectsFolder), "Objects folder already exists");
        assert_eq!(log.get(LogField::MetadataFolder), NOT_REACHED);
        assert_eq!(log.get(LogField::BagValid), NOT_REACHED);
        assert_eq!(log.get(LogField::Complete), COMPLETE_ERROR);
    }

    #[test]
    fn test_halt_on_complete_keeps_message() {
        let mut log = record();
        log.halt(LogField::Complete, "Folder could not be renamed");
        assert_eq!(log.get(LogField::Complete), "Folder could not be renamed");
    }

    #[test]
    fn test_headers_match_columns() {
        let headers = LogRecord::headers();
        assert_eq!(headers.len(), 13);
        assert_eq!(headers[0], "Time Started");
        assert_eq!(headers[6], "FITS Combination Errors");
        assert_eq!(headers[12], "Processing Complete");
    }
}
