//! The batch metadata sheet: one row per folder to turn into an AIP.

use std::collections::HashSet;
use std::path::Path;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::SheetError;
use crate::storage::filesystem::list_names;

pub const SHEET_NAME: &str = "metadata.csv";

pub const REQUIRED_COLUMNS: [&str; 6] =
    ["Department", "Collection", "Folder", "AIP_ID", "Title", "Version"];

/// Output folders the pipeline creates inside the batch directory.
pub const RESERVED_FOLDERS: [&str; 4] =
    ["aips-to-ingest", "errors", "fits-xml", "preservation-xml"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Collection")]
    pub collection: String,
    #[serde(rename = "Folder")]
    pub folder: String,
    #[serde(rename = "AIP_ID")]
    pub aip_id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Version")]
    pub version: u32,
    /// Per-row override of the configured compression default.
    #[serde(rename = "Zip", default, deserialize_with = "deserialize_zip")]
    pub zip: Option<bool>,
}

fn deserialize_zip<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "yes" | "y" | "1" => Ok(Some(true)),
        "false" | "no" | "n" | "0" => Ok(Some(false)),
        other => Err(de::Error::custom(format!("invalid Zip value '{}'", other))),
    }
}

/// Reads `<batch_dir>/metadata.csv`. Rows that fail to parse are all
/// reported together.
pub fn load_sheet(batch_dir: &Path) -> Result<Vec<SheetRow>, SheetError> {
    let path = batch_dir.join(SHEET_NAME);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(&path)
        .map_err(|e| SheetError::Read {
            path: path.clone(),
            source: e,
        })?;

    let headers = reader
        .headers()
        .map_err(|e| SheetError::Read {
            path: path.clone(),
            source: e,
        })?
        .clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(SheetError::MissingColumn(column.to_string()));
        }
    }

    let mut rows = Vec::new();
    let mut problems = Vec::new();
    for (index, record) in reader.deserialize::<SheetRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        match record {
            Ok(row) => rows.push(row),
            Err(e) => problems.push(format!("Row {}: {}", line, e)),
        }
    }

    if problems.is_empty() {
        Ok(rows)
    } else {
        Err(SheetError::Invalid(problems))
    }
}

/// Checks the sheet against the configured departments and the folders
/// actually present in the batch directory.
pub fn validate_sheet(
    rows: &[SheetRow],
    departments: &[String],
    batch_dir: &Path,
) -> Result<(), SheetError> {
    let mut problems = Vec::new();

    if rows.is_empty() {
        problems.push("Sheet lists no AIPs".to_string());
    }

    let mut ids = HashSet::new();
    let mut folders = HashSet::new();
    for row in rows {
        let label = if row.aip_id.is_empty() {
            format!("folder '{}'", row.folder)
        } else {
            format!("AIP {}", row.aip_id)
        };

        if !departments.iter().any(|d| d == &row.department) {
            problems.push(format!("{}: unknown department '{}'", label, row.department));
        }
        if row.aip_id.is_empty() {
            problems.push(format!("{}: AIP_ID is empty", label));
        } else if row.aip_id.contains(['/', '\\']) {
            problems.push(format!("{}: AIP_ID contains a path separator", label));
        } else if !ids.insert(row.aip_id.as_str()) {
            problems.push(format!("{}: duplicate AIP_ID", label));
        }
        if row.title.is_empty() {
            problems.push(format!("{}: Title is empty", label));
        }
        if row.version == 0 {
            problems.push(format!("{}: Version must be positive", label));
        }
        if row.folder.is_empty() {
            problems.push(format!("{}: Folder is empty", label));
        } else {
            if !folders.insert(row.folder.as_str()) {
                problems.push(format!("{}: folder '{}' listed twice", label, row.folder));
            }
            if !batch_dir.join(&row.folder).is_dir() {
                problems.push(format!(
                    "{}: folder '{}' not found in batch directory",
                    label, row.folder
                ));
            }
        }
    }

    let names = list_names(batch_dir).map_err(|e| SheetError::Invalid(vec![e.to_string()]))?;
    for raw in names {
        if !batch_dir.join(&raw).is_dir() {
            continue;
        }
        let name = raw.to_string_lossy();
        if RESERVED_FOLDERS.contains(&&*name) || name.starts_with('.') {
            continue;
        }
        if !folders.contains(&*name) {
            problems.push(format!("Folder '{}' is not listed in {}", name, SHEET_NAME));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(SheetError::Invalid(problems))
    }
}
