//! Combines the per-file characterization documents into one.

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::Writer;
use tracing::debug;

use crate::pipeline::context::Aip;
use crate::pipeline::error::{ErrorCategory, Halt, StepResult};
use crate::pipeline::log::LogField;
use crate::storage::filesystem::{list_names, remove_file, write_file};

pub const FITS_NAMESPACE: &str = "http://hul.harvard.edu/ois/xml/ns/fits/fits_output";
pub const COMBINED_ROOT: &str = "combined-fits";
pub const COMBINED_OK: &str = "Successfully made combined-fits.xml";

pub fn combined_file_name(aip_id: &str) -> String {
    format!("{}_combined-fits.xml", aip_id)
}

pub fn combine_fits(aip: &mut Aip) -> StepResult {
    let metadata = aip.metadata_dir();
    let inputs: Vec<PathBuf> = list_names(&metadata)?
        .into_iter()
        .filter(|name| name.to_string_lossy().ends_with("_fits.xml"))
        .map(|name| metadata.join(name))
        .collect();

    let combined = merge_documents(&inputs).map_err(|detail| {
        Halt::quarantine(
            ErrorCategory::CombiningFits,
            format!("Issue when creating combined-fits.xml: {}", detail),
        )
    })?;

    write_file(&metadata.join(combined_file_name(&aip.id)), &combined)?;
    for input in &inputs {
        remove_file(input)?;
    }

    debug!(aip_id = %aip.id, documents = inputs.len(), "Combined characterization output");
    aip.log.record(LogField::FitsCombination, COMBINED_OK);
    Ok(())
}

/// Builds `<combined-fits>` with the root element of each input copied in
/// unchanged, in the order given. Returns a description of the first
/// unusable input.
pub fn merge_documents(paths: &[PathBuf]) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(describe)?;
    writer
        .write_event(Event::Text(BytesText::new("\n")))
        .map_err(describe)?;
    writer
        .write_event(Event::Start(BytesStart::new(COMBINED_ROOT)))
        .map_err(describe)?;

    for path in paths {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("{}: {}", display_name(path), e))?;
        copy_root(content.trim_start_matches('\u{feff}'), &mut writer)
            .map_err(|detail| format!("{}: {}", display_name(path), detail))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(COMBINED_ROOT)))
        .map_err(describe)?;
    Ok(writer.into_inner())
}

/// Copies the single `fits` root of `content` into `writer`.
fn copy_root(content: &str, writer: &mut Writer<Vec<u8>>) -> Result<(), String> {
    let mut reader = NsReader::from_str(content);
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        let (ns, event) = match reader.read_resolved_event() {
            Ok(pair) => pair,
            Err(e) => return Err(format!("malformed XML: {}", e)),
        };

        let is_fits_root = match &event {
            Event::Start(e) | Event::Empty(e) if depth == 0 => {
                e.local_name().as_ref() == b"fits"
                    && matches!(ns, ResolveResult::Bound(Namespace(n)) if n == FITS_NAMESPACE.as_bytes())
            }
            _ => false,
        };

        match event {
            Event::Eof => break,
            Event::Start(_) | Event::Empty(_) if depth == 0 => {
                if roots > 0 {
                    return Err("more than one root element".to_string());
                }
                if !is_fits_root {
                    return Err(format!(
                        "root element is not fits in namespace {}",
                        FITS_NAMESPACE
                    ));
                }
                roots += 1;
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
                writer.write_event(event).map_err(describe)?;
            }
            Event::Start(_) => {
                depth += 1;
                writer.write_event(event).map_err(describe)?;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                writer.write_event(event).map_err(describe)?;
            }
            Event::Text(ref text) if depth == 0 => {
                if !text.iter().all(|b| b.is_ascii_whitespace()) {
                    return Err("text outside the root element".to_string());
                }
            }
            Event::CData(_) | Event::GeneralRef(_) if depth == 0 => {
                return Err("content outside the root element".to_string());
            }
            Event::Decl(_) | Event::DocType(_) | Event::PI(_) | Event::Comment(_)
                if depth == 0 => {}
            other => writer.write_event(other).map_err(describe)?,
        }
    }

    if depth != 0 {
        return Err("unexpected end of document".to_string());
    }
    if roots == 0 {
        return Err("document has no root element".to_string());
    }
    Ok(())
}

fn describe(e: impl std::fmt::Display) -> String {
    e.to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
