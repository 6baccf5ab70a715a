//! A `ToolRunner` that emulates the external tools on the filesystem.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aipkit::config::ToolSpec;
use aipkit::stages::merge::FITS_NAMESPACE;
use aipkit::tools::{ToolOutput, ToolRunner};
use aipkit::ToolError;
use walkdir::WalkDir;

#[derive(Default)]
pub struct FakeRunner {
    fits_stderr: Option<String>,
    corrupt_output_for: Option<String>,
    cleanup_error: Option<String>,
    transform_error: Option<String>,
    validator_output: Option<(i32, String)>,
    bzip2_fails: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Characterization succeeds but complains on stderr.
    pub fn with_fits_stderr(mut self, stderr: &str) -> Self {
        self.fits_stderr = Some(stderr.to_string());
        self
    }

    /// Characterization writes malformed XML for the named object file.
    pub fn with_corrupt_output_for(mut self, file_name: &str) -> Self {
        self.corrupt_output_for = Some(file_name.to_string());
        self
    }

    pub fn with_cleanup_error(mut self, stderr: &str) -> Self {
        self.cleanup_error = Some(stderr.to_string());
        self
    }

    pub fn with_transform_error(mut self, stderr: &str) -> Self {
        self.transform_error = Some(stderr.to_string());
        self
    }

    pub fn with_validator_output(mut self, exit_code: i32, stderr: &str) -> Self {
        self.validator_output = Some((exit_code, stderr.to_string()));
        self
    }

    pub fn with_failing_bzip2(mut self) -> Self {
        self.bzip2_fails = true;
        self
    }

    /// Names of the tools run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, tool: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == tool).count()
    }

    fn characterize(&self, args: &[String]) -> ToolOutput {
        let input = PathBuf::from(value_after(args, "-i"));
        let output = PathBuf::from(value_after(args, "-o"));

        for entry in WalkDir::new(&input).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let body = if self.corrupt_output_for.as_deref() == Some(name.as_str()) {
                "<fits xmlns=\"broken\"><identification>".to_string()
            } else {
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<fits xmlns=\"{}\"><fileinfo><filename>{}</filename></fileinfo></fits>\n",
                    FITS_NAMESPACE, name
                )
            };
            let mut file_name = entry.file_name().to_os_string();
            file_name.push(".fits.xml");
            std::fs::write(output.join(file_name), body).unwrap();
        }

        match &self.fits_stderr {
            Some(stderr) => done(0, stderr),
            None => done(0, ""),
        }
    }

    fn transform(&self, args: &[String]) -> ToolOutput {
        let source = prefixed(args, "-s:");
        let target = prefixed(args, "-o:");
        let converting = args.iter().any(|a| a.starts_with("aip-id="));

        if converting {
            if let Some(stderr) = &self.transform_error {
                return done(2, stderr);
            }
            let id = prefixed(args, "aip-id=");
            std::fs::write(
                &target,
                format!("<preservation><id>{}</id></preservation>\n", id),
            )
            .unwrap();
        } else {
            if let Some(stderr) = &self.cleanup_error {
                return done(2, stderr);
            }
            std::fs::copy(&source, &target).unwrap();
        }
        done(0, "")
    }

    fn validate(&self, args: &[String]) -> ToolOutput {
        if let Some((code, stderr)) = &self.validator_output {
            return done(*code, stderr);
        }
        let document = args.last().cloned().unwrap_or_default();
        if Path::new(&document).is_file() {
            done(0, &format!("{} validates\n", document))
        } else {
            done(
                1,
                &format!("warning: failed to load external entity \"{}\"\n", document),
            )
        }
    }

    fn archive(&self, args: &[String]) -> ToolOutput {
        let tar_path = PathBuf::from(value_after(args, "-cf"));
        let parent = PathBuf::from(value_after(args, "-C"));
        let bag = args.last().cloned().unwrap_or_default();

        let mut listing = String::new();
        for entry in WalkDir::new(parent.join(&bag))
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_file() {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                listing.push_str(&format!("{} {}\n", entry.path().display(), size));
            }
        }
        std::fs::write(&tar_path, listing).unwrap();
        done(0, "")
    }

    fn compress(&self, args: &[String]) -> ToolOutput {
        if self.bzip2_fails {
            return done(1, "bzip2: I/O or other error, bailing out.");
        }
        let path = PathBuf::from(args.last().cloned().unwrap_or_default());
        let mut body = b"BZh9".to_vec();
        body.extend(std::fs::read(&path).unwrap());
        std::fs::write(format!("{}.bz2", path.display()), body).unwrap();
        std::fs::remove_file(&path).unwrap();
        done(0, "")
    }
}

impl ToolRunner for FakeRunner {
    fn run(
        &self,
        tool: &ToolSpec,
        args: &[String],
        _current_dir: Option<&Path>,
    ) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(tool.name.clone());
        Ok(match tool.name.as_str() {
            "fits" => self.characterize(args),
            "saxon" => self.transform(args),
            "xmllint" => self.validate(args),
            "tar" => self.archive(args),
            "bzip2" => self.compress(args),
            other => done(127, &format!("{}: command not found", other)),
        })
    }
}

fn done(code: i32, stderr: &str) -> ToolOutput {
    ToolOutput {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

fn value_after(args: &[String], flag: &str) -> String {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_default()
}

fn prefixed(args: &[String], prefix: &str) -> String {
    args.iter()
        .find_map(|a| a.strip_prefix(prefix))
        .unwrap_or_default()
        .to_string()
}
