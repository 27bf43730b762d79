//! Subprocess runner for external converter tools.
//!
//! Commands are an explicit program plus an argument vector. Placeholders
//! such as `{input}` are substituted inside individual arguments; nothing is
//! ever joined into a shell string, so paths with spaces or quotes pass
//! through unchanged.
//!
//! The child is spawned with `kill_on_drop`, so when the pipeline's stage
//! timeout drops the future the tool is killed rather than left running.

use crate::error::ConverterError;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// A program and its argument template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Substitute `{key}` placeholders.
    ///
    /// An argument that is exactly one placeholder receives the value as-is
    /// (non-UTF-8 paths survive); placeholders embedded in a longer argument
    /// are substituted lossily.
    pub fn render_args(&self, vars: &[(&str, &OsStr)]) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| {
                for (key, value) in vars {
                    if arg == &format!("{{{key}}}") {
                        return value.to_os_string();
                    }
                }
                let mut rendered = arg.clone();
                for (key, value) in vars {
                    let placeholder = format!("{{{key}}}");
                    if rendered.contains(&placeholder) {
                        rendered = rendered.replace(&placeholder, &value.to_string_lossy());
                    }
                }
                OsString::from(rendered)
            })
            .collect()
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit is `ToolFailed` carrying the exit code and stderr.
    pub async fn run(&self, vars: &[(&str, &OsStr)]) -> Result<ToolOutput, ConverterError> {
        let args = self.render_args(vars);
        let program = self.program.display().to_string();
        debug!("Running {} {:?}", program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ConverterError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "terminated by signal".to_string());
            return Err(ConverterError::ToolFailed {
                program,
                code,
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}
