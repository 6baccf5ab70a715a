//! Fixtures shared by unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use crate::batch::sheet::SheetRow;
use crate::config::{load_config_from_str, ToolSpec};
use crate::error::ToolError;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::context::Aip;
use crate::tools::{ToolOutput, ToolRunner};

pub(crate) fn sheet_row(department: &str, id: &str) -> SheetRow {
    SheetRow {
        department: department.to_string(),
        collection: "ms1".to_string(),
        folder: id.to_string(),
        aip_id: id.to_string(),
        title: "Minutes, 1950".to_string(),
        version: 1,
        zip: None,
    }
}

/// An AIP whose directory exists under `batch`.
pub(crate) fn aip_in(batch: &Path, department: &str, id: &str) -> Aip {
    let aip = Aip::from_row(&sheet_row(department, id), batch, true);
    std::fs::create_dir_all(&aip.directory).unwrap();
    aip
}

pub(crate) fn pipeline_config(batch: &Path) -> PipelineConfig {
    let config = load_config_from_str(
        r#"{
            "version": "1.0",
            "departments": ["hargrett", "magil", "emory"],
            "namespace_uri": "http://archive.example.edu",
            "tools": {},
            "stylesheets": {
                "cleanup": "/xsl/cleanup.xsl",
                "single_file": "/xsl/single.xsl",
                "multi_file": "/xsl/multi.xsl"
            },
            "schema": "/xsd/preservation.xsd"
        }"#,
    )
    .unwrap();
    let pipeline = PipelineConfig::from_config(&config, batch);
    pipeline.create_output_dirs().unwrap();
    pipeline
}

pub(crate) fn output(code: i32, stderr: &str) -> ToolOutput {
    ToolOutput {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Returns queued outputs in order, then clean successes, and records
/// every call.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    outputs: Mutex<VecDeque<Result<ToolOutput, ToolError>>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedRunner {
    pub(crate) fn then(self, result: Result<ToolOutput, ToolError>) -> Self {
        self.outputs.lock().unwrap().push_back(result);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(
        &self,
        tool: &ToolSpec,
        args: &[String],
        _current_dir: Option<&Path>,
    ) -> Result<ToolOutput, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((tool.name.clone(), args.to_vec()));
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(output(0, "")))
    }
}
