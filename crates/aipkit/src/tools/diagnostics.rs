//! Classification of free-text tool diagnostics into a closed set of
//! outcomes.
//!
//! The tools report failures only as prose on stderr, so every pattern the
//! pipeline depends on is kept in this one table. When a tool upgrade changes
//! its wording, this is the only place that needs to change.

use std::sync::LazyLock;

use regex::Regex;

use crate::tools::command::ToolOutput;

/// Outcome of running the schema validator over a preservation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationVerdict {
    Valid,
    /// The document could not be loaded at all.
    NotFound,
    /// The document loaded but does not conform to the schema.
    NotValid,
    /// The validator failed for a reason none of the patterns recognise.
    Unclassified,
}

/// Ordered: the first matching pattern wins. A missing document is checked
/// before non-conformance because a validator that cannot load the file may
/// also print a trailing "fails to validate" line.
static VALIDATION_PATTERNS: LazyLock<[(Regex, ValidationVerdict); 2]> = LazyLock::new(|| {
    [
        (
            Regex::new(r#"(?i)failed to load (external entity|"[^"]*"|\S+ resource)"#).unwrap(),
            ValidationVerdict::NotFound,
        ),
        (
            Regex::new(r"(?i)fails to validate").unwrap(),
            ValidationVerdict::NotValid,
        ),
    ]
});

pub fn classify_validation(output: &ToolOutput) -> ValidationVerdict {
    for (pattern, verdict) in VALIDATION_PATTERNS.iter() {
        if pattern.is_match(&output.stderr) {
            return verdict.clone();
        }
    }

    if output.success() {
        ValidationVerdict::Valid
    } else {
        ValidationVerdict::Unclassified
    }
}

/// A transform fails if it exits non-zero or says anything on stderr; the
/// output document may be partially written in either case.
pub fn transform_failure(output: &ToolOutput) -> Option<String> {
    if output.has_diagnostics() {
        return Some(output.stderr.trim().to_string());
    }
    if !output.success() {
        return Some(match output.exit_code {
            Some(code) => format!("exited with status {} and no diagnostics", code),
            None => "terminated by signal".to_string(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: i32, stderr: &str) -> ToolOutput {
        ToolOutput {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_pattern_table_compiles_in_order() {
        let verdicts: Vec<&ValidationVerdict> =
            VALIDATION_PATTERNS.iter().map(|(_, verdict)| verdict).collect();
        assert_eq!(
            verdicts,
            [&ValidationVerdict::NotFound, &ValidationVerdict::NotValid]
        );
    }

    #[test]
    fn test_validator_success() {
        let verdict = classify_validation(&output(0, "aip_preservation.xml validates\n"));
        assert_eq!(verdict, ValidationVerdict::Valid);
    }

    #[test]
    fn test_validator_missing_document() {
        let stderr = "warning: failed to load external entity \"x_preservation.xml\"\n";
        assert_eq!(
            classify_validation(&output(1, stderr)),
            ValidationVerdict::NotFound
        );
    }

    #[test]
    fn test_validator_missing_document_newer_wording() {
        let stderr = "I/O error : failed to load \"x_preservation.xml\": No such file\n";
        assert_eq!(
            classify_validation(&output(1, stderr)),
            ValidationVerdict::NotFound
        );
        let stderr = "failed to load HTTP resource\n";
        assert_eq!(
            classify_validation(&output(1, stderr)),
            ValidationVerdict::NotFound
        );
    }

    #[test]
    fn test_validator_invalid_document() {
        let stderr = "x.xml:3: element title: Schemas validity error : missing child\n\
                      x.xml fails to validate\n";
        assert_eq!(
            classify_validation(&output(3, stderr)),
            ValidationVerdict::NotValid
        );
    }

    #[test]
    fn test_not_found_wins_when_both_patterns_match() {
        let stderr = "failed to load external entity \"x.xml\"\nx.xml fails to validate\n";
        assert_eq!(
            classify_validation(&output(1, stderr)),
            ValidationVerdict::NotFound
        );
    }

    #[test]
    fn test_unrecognised_failure_is_not_success() {
        assert_eq!(
            classify_validation(&output(5, "Segmentation fault\n")),
            ValidationVerdict::Unclassified
        );
        assert_eq!(
            classify_validation(&output(5, "")),
            ValidationVerdict::Unclassified
        );
    }

    #[test]
    fn test_transform_failure_on_stderr() {
        let failure = transform_failure(&output(0, "  Error at char 12 in xsl:value-of\n"));
        assert_eq!(failure.as_deref(), Some("Error at char 12 in xsl:value-of"));
    }

    #[test]
    fn test_transform_failure_on_exit_code() {
        let failure = transform_failure(&output(2, "")).unwrap();
        assert!(failure.contains("status 2"));
    }

    #[test]
    fn test_transform_clean_run() {
        assert!(transform_failure(&output(0, " \n")).is_none());
    }
}
