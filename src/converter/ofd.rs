//! Stage-1 adapter: OFD → PDF through an external command-line tool.

use super::command::ToolCommand;
use super::Stage1Converter;
use crate::error::{BatchError, ConverterError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Program used when none is configured.
pub const DEFAULT_PROGRAM: &str = "ofd2pdf";

/// `{input} {output}`
pub fn default_args() -> Vec<String> {
    vec!["{input}".to_string(), "{output}".to_string()]
}

/// Runs a configured converter command once per document.
///
/// The run fails if the tool exits non-zero, or exits zero without writing
/// the intermediate.
#[derive(Debug, Clone)]
pub struct CommandStage1 {
    name: String,
    command: ToolCommand,
}

impl CommandStage1 {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        let name = program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        Self {
            name,
            command: ToolCommand::new(program, args),
        }
    }

    /// Resolve `program` on `PATH` (or as a path) before building the adapter.
    pub fn locate(program: &str, args: Vec<String>) -> Result<Self, BatchError> {
        let resolved =
            converter_locate::locate_program(program).map_err(|e| BatchError::ConverterNotFound {
                converter: program.to_string(),
                detail: e.to_string(),
            })?;
        debug!("Stage-1 tool resolved to {}", resolved.display());
        Ok(Self::new(resolved, args))
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }
}

#[async_trait]
impl Stage1Converter for CommandStage1 {
    fn name(&self) -> &str {
        &self.name
    }

    async fn to_intermediate(
        &self,
        source: &Path,
        intermediate: &Path,
    ) -> Result<(), ConverterError> {
        self.command
            .run(&[
                ("input", source.as_os_str()),
                ("output", intermediate.as_os_str()),
            ])
            .await?;

        if !tokio::fs::try_exists(intermediate).await.unwrap_or(false) {
            return Err(ConverterError::MissingOutput {
                path: intermediate.to_path_buf(),
            });
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> CommandStage1 {
        CommandStage1::new(
            "sh",
            vec![
                "-c".into(),
                script.into(),
                "sh".into(),
                "{input}".into(),
                "{output}".into(),
            ],
        )
    }

    #[tokio::test]
    async fn copies_through_a_tool() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in put.ofd");
        let out = dir.path().join("in put.pdf");
        std::fs::write(&src, b"%OFD").unwrap();

        sh("cp \"$1\" \"$2\"").to_intermediate(&src, &out).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"%OFD");
    }

    #[tokio::test]
    async fn zero_exit_without_output_is_missing_output() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.ofd");
        std::fs::write(&src, b"x").unwrap();

        let err = sh("true").to_intermediate(&src, &dir.path().join("a.pdf")).await;
        assert!(matches!(err, Err(ConverterError::MissingOutput { .. })));
    }

    #[tokio::test]
    async fn non_zero_exit_fails() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.ofd");
        let err = sh("echo 'not an OFD archive' >&2; exit 2")
            .to_intermediate(&src, &dir.path().join("a.pdf"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not an OFD archive"), "got: {err}");
    }

    #[test]
    fn missing_program_is_converter_not_found() {
        let err = CommandStage1::locate("definitely-not-an-ofd-tool-xyz", default_args()).unwrap_err();
        assert!(matches!(err, BatchError::ConverterNotFound { .. }));
    }

    #[test]
    fn name_is_program_stem() {
        assert_eq!(CommandStage1::new("/opt/bin/ofd2pdf", default_args()).name(), "ofd2pdf");
    }
}
