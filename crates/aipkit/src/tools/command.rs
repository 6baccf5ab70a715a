//! Builder for running external tools with captured output and a deadline.
//!
//! Arguments are passed as an argv vector, never through a shell, so AIP
//! titles and identifiers can contain any characters.
//!
//! Each call drives the child on a current-thread tokio runtime. On unix the
//! child leads its own process group, so a timeout also stops anything a
//! wrapper script started.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::error::ToolError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Output captured from a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// True when the tool wrote anything other than whitespace to stderr.
    pub fn has_diagnostics(&self) -> bool {
        !self.stderr.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    label: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let label = program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| program.to_string_lossy().to_string());
        Self {
            program,
            label,
            args: Vec::new(),
            current_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Name used in errors and logs instead of the program file name.
    pub fn label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = label.into();
        self
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(&mut self, dir: &Path) -> &mut Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Runs the command to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`ToolOutput::exit_code`] because several tools report partial
    /// failure that way. The child is killed when the timeout expires.
    pub fn execute(&self) -> Result<ToolOutput, ToolError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(|e| ToolError::Spawn {
                tool: self.label.clone(),
                source: e,
            })?;
        runtime.block_on(self.run())
    }

    async fn run(&self) -> Result<ToolOutput, ToolError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        log::debug!("Running {} {:?}", self.label, self.args);

        let mut child = cmd.spawn().map_err(|e| ToolError::Spawn {
            tool: self.label.clone(),
            source: e,
        })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Pipes are drained alongside the wait so a chatty tool cannot block.
        let finished = tokio::time::timeout(self.timeout, async {
            tokio::try_join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
        })
        .await;

        match finished {
            Ok(Ok((status, stdout, stderr))) => Ok(ToolOutput {
                exit_code: status.code(),
                stdout: String::from_utf8_lossy(&stdout).to_string(),
                stderr: String::from_utf8_lossy(&stderr).to_string(),
            }),
            Ok(Err(e)) => Err(ToolError::Wait {
                tool: self.label.clone(),
                source: e,
            }),
            Err(_elapsed) => {
                log::warn!("{} timed out after {:?}", self.label, self.timeout);
                if let Err(e) = terminate(&mut child).await {
                    log::error!("Failed to stop {}: {}", self.label, e);
                }
                Err(ToolError::Timeout {
                    tool: self.label.clone(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kills the child and its process group, then reaps the child.
async fn terminate(child: &mut Child) -> std::io::Result<()> {
    kill_group(child)?;
    child.wait().await.map(|_| ())
}

#[cfg(unix)]
fn kill_group(child: &mut Child) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        // Already reaped.
        return Ok(());
    };
    // The child was spawned with `process_group(0)`, so its pid is the pgid.
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        let err = std::io::Error::last_os_error();
        // ESRCH: the whole group already exited.
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(err)
        }
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_execute_captures_stdout_and_stderr_separately() {
        let output = ToolCommand::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2")
            .execute()
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(output.has_diagnostics());
    }

    #[test]
    fn test_execute_reports_nonzero_exit_without_error() {
        let output = ToolCommand::new("sh")
            .arg("-c")
            .arg("exit 3")
            .execute()
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.has_diagnostics());
    }

    #[test]
    fn test_arguments_are_not_shell_interpreted() {
        let output = ToolCommand::new("echo")
            .arg("title with $HOME; rm -rf / `and` quotes'\"")
            .execute()
            .unwrap();

        assert_eq!(
            output.stdout.trim(),
            "title with $HOME; rm -rf / `and` quotes'\""
        );
    }

    #[test]
    fn test_execute_nonexistent_tool() {
        let result = ToolCommand::new("nonexistent_tool_xyz_12345").execute();
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[test]
    fn test_timeout_fires() {
        let result = ToolCommand::new("sleep")
            .arg("10")
            .label("sleeper")
            .timeout(Duration::from_millis(100))
            .execute();

        match result {
            Err(ToolError::Timeout { tool, .. }) => assert_eq!(tool, "sleeper"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_stops_the_whole_process_group() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("late.txt");
        let script = format!("(sleep 1; echo late > '{}') & wait", marker.display());

        let started = std::time::Instant::now();
        let result = ToolCommand::new("sh")
            .arg("-c")
            .arg(script)
            .timeout(Duration::from_millis(200))
            .execute();

        assert!(matches!(result, Err(ToolError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(1));
        std::thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn test_current_dir_is_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), b"x").unwrap();

        let output = ToolCommand::new("ls")
            .current_dir(dir.path())
            .execute()
            .unwrap();

        assert!(output.stdout.contains("marker.txt"));
    }
}
