use std::path::Path;

use crate::config::ToolSpec;
use crate::error::ToolError;
use crate::tools::command::{ToolCommand, ToolOutput};

/// Seam between the pipeline and the external tools it drives.
///
/// `args` are appended after the tool's configured leading arguments. Tests
/// swap in a runner that emulates the tools on the filesystem.
pub trait ToolRunner: Send + Sync {
    fn run(
        &self,
        tool: &ToolSpec,
        args: &[String],
        current_dir: Option<&Path>,
    ) -> Result<ToolOutput, ToolError>;
}

/// Runs tools as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(
        &self,
        tool: &ToolSpec,
        args: &[String],
        current_dir: Option<&Path>,
    ) -> Result<ToolOutput, ToolError> {
        let mut cmd = ToolCommand::new(&tool.program);
        cmd.label(&tool.name)
            .args(tool.args.iter().cloned())
            .args(args.iter().cloned())
            .timeout(tool.timeout());
        if let Some(dir) = current_dir {
            cmd.current_dir(dir);
        }
        cmd.execute()
    }
}
