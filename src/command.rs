//! Builder for invoking the external engine binaries.

use crate::error::{CompressError, Result};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};

/// Output captured from a bounded engine run
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Result of [`EngineCommand::output_with_timeout`]
#[derive(Debug)]
pub enum BoundedRun {
    Finished(EngineOutput),
    TimedOut,
}

/// A builder for one engine invocation
#[derive(Debug, Clone)]
pub struct EngineCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl EngineCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl AsRef<OsStr>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Shell-like rendering for debug logs; arguments are passed to the
    /// engine as raw `OsStr`, only this rendering is lossy
    pub fn display(&self) -> String {
        let mut rendered = self.program.display().to_string();
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            rendered.push(' ');
            if arg.contains(' ') {
                rendered.push_str(&format!("\"{}\"", arg));
            } else {
                rendered.push_str(&arg);
            }
        }
        rendered
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> CompressError {
        if err.kind() == std::io::ErrorKind::NotFound {
            CompressError::EngineNotFound(self.program.display().to_string())
        } else {
            CompressError::Io(err)
        }
    }

    /// Spawn with piped stdout/stderr; the child is killed if dropped
    pub fn spawn(&self) -> Result<Child> {
        self.command().spawn().map_err(|e| self.spawn_error(e))
    }

    /// Run to completion, killing the process if it outlives `timeout`
    pub async fn output_with_timeout(&self, timeout: Duration) -> Result<BoundedRun> {
        let child = self.spawn()?;

        // dropping the wait future on timeout drops the child, which kills it
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(BoundedRun::Finished(EngineOutput {
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })),
            Ok(Err(e)) => Err(CompressError::Io(e)),
            Err(_elapsed) => Ok(BoundedRun::TimedOut),
        }
    }
}
