//! Isolated batch directories for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_fs::prelude::*;
use assert_fs::TempDir;

use aipkit::config::load_config_from_str;
use aipkit::{BatchRunner, BatchSummary, PipelineConfig, SheetRow, ToolRunner};

pub struct TestHarness {
    temp_dir: TempDir,
    pub batch_dir: PathBuf,
    workers: usize,
    zip: bool,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let batch_dir = temp_dir.child("batch");
        batch_dir.create_dir_all().expect("Failed to create batch dir");
        let batch_dir = batch_dir.path().to_path_buf();

        Self {
            temp_dir,
            batch_dir,
            workers: 1,
            zip: true,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn zip(mut self, zip: bool) -> Self {
        self.zip = zip;
        self
    }

    /// Creates `<batch>/<folder>/<relative>` for every file given.
    pub fn add_folder(&self, folder: &str, files: &[(&str, &str)]) {
        let dir = self.temp_dir.child("batch").child(folder);
        dir.create_dir_all().expect("Failed to create AIP folder");
        for (relative, contents) in files {
            dir.child(relative)
                .write_str(contents)
                .expect("Failed to write AIP file");
        }
    }

    pub fn config(&self) -> PipelineConfig {
        let json = format!(
            r#"{{
                "version": "1.0",
                "departments": ["hargrett", "magil", "russell", "emory"],
                "namespace_uri": "http://archive.example.edu",
                "zip": {},
                "workers": {},
                "tools": {{}},
                "stylesheets": {{
                    "cleanup": "/xsl/fits-cleanup.xsl",
                    "single_file": "/xsl/fits-to-preservation-single.xsl",
                    "multi_file": "/xsl/fits-to-preservation-multi.xsl"
                }},
                "schema": "/xsd/preservation.xsd"
            }}"#,
            self.zip, self.workers
        );
        let config = load_config_from_str(&json).expect("Test config is valid");
        PipelineConfig::from_config(&config, &self.batch_dir)
    }

    pub fn run(&self, runner: Arc<dyn ToolRunner>, rows: &[SheetRow]) -> BatchSummary {
        BatchRunner::new(Arc::new(self.config()), runner)
            .run(rows)
            .expect("Batch run failed")
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.batch_dir.join(relative)
    }

    pub fn ingest_files(&self) -> Vec<String> {
        list(&self.path("aips-to-ingest"))
    }

    /// Data rows of the run log as string records.
    pub fn log_rows(&self) -> Vec<csv::StringRecord> {
        let mut reader =
            csv::Reader::from_path(self.path("aip_log.csv")).expect("Run log exists");
        reader.records().map(|r| r.expect("Run log row")).collect()
    }

    pub fn manifest_lines(&self, department: &str) -> Vec<String> {
        let path = self
            .path("aips-to-ingest")
            .join(format!("manifest_{}.txt", department));
        std::fs::read_to_string(path)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

pub fn row(department: &str, folder: &str, aip_id: &str) -> SheetRow {
    SheetRow {
        department: department.to_string(),
        collection: "ms3000".to_string(),
        folder: folder.to_string(),
        aip_id: aip_id.to_string(),
        title: "Correspondence & \"Notes\", 1962".to_string(),
        version: 1,
        zip: None,
    }
}

pub fn list(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
