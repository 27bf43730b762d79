//! Stage-2 adapter: PDF → DOCX through LibreOffice (`y2`).
//!
//! LibreOffice writes `<input stem>.docx` into `--outdir`. Because the
//! intermediate and final names share their ordinal, that is the reserved
//! output path.
//!
//! Each call gets its own throwaway user profile. Concurrent `soffice`
//! processes sharing one profile block on its lock file and exit with
//! nothing written.

use super::command::ToolCommand;
use super::Stage2Converter;
use crate::error::{BatchError, ConverterError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Final extension written by this adapter.
pub const DOCX_EXTENSION: &str = ".docx";

#[derive(Debug, Clone)]
pub struct SofficeStage2 {
    program: PathBuf,
}

impl SofficeStage2 {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Resolve the executable via `converter-locate`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, BatchError> {
        let program =
            converter_locate::locate_soffice(explicit).map_err(|e| BatchError::ConverterNotFound {
                converter: "LibreOffice (soffice)".to_string(),
                detail: e.to_string(),
            })?;
        debug!("LibreOffice resolved to {}", program.display());
        Ok(Self::new(program))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(profile_url: String) -> Vec<String> {
        vec![
            format!("-env:UserInstallation={profile_url}"),
            "--headless".to_string(),
            "--infilter=writer_pdf_import".to_string(),
            "--convert-to".to_string(),
            "docx".to_string(),
            "{input}".to_string(),
            "--outdir".to_string(),
            "{outdir}".to_string(),
        ]
    }
}

#[async_trait]
impl Stage2Converter for SofficeStage2 {
    fn name(&self) -> &str {
        "soffice"
    }

    fn final_extension(&self) -> &str {
        DOCX_EXTENSION
    }

    async fn to_final(&self, intermediate: &Path, output: &Path) -> Result<(), ConverterError> {
        let outdir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let profile = tempfile::Builder::new()
            .prefix("ofd2docx-lo-")
            .tempdir()
            .map_err(|e| ConverterError::Io {
                path: std::env::temp_dir(),
                source: e,
            })?;

        let command = ToolCommand::new(&self.program, Self::command(file_url(profile.path())));
        let result = command
            .run(&[
                ("input", intermediate.as_os_str()),
                ("outdir", outdir.as_os_str()),
            ])
            .await?;

        if tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Ok(());
        }

        if !result.stderr.is_empty() {
            debug!("soffice stderr: {}", result.stderr);
        }
        Err(ConverterError::MissingOutput {
            path: output.to_path_buf(),
        })
    }
}

/// `file://` URL accepted by `-env:UserInstallation`.
fn file_url(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_forms() {
        assert_eq!(file_url(Path::new("/tmp/p")), "file:///tmp/p");
        assert_eq!(file_url(Path::new(r"C:\Temp\p")), "file:///C:/Temp/p");
    }

    #[test]
    fn argument_vector_uses_pdf_import_filter() {
        let args = SofficeStage2::command("file:///tmp/p".into());
        assert_eq!(args[0], "-env:UserInstallation=file:///tmp/p");
        let rest: Vec<&str> = args[1..].iter().map(String::as_str).collect();
        assert_eq!(
            rest,
            [
                "--headless",
                "--infilter=writer_pdf_import",
                "--convert-to",
                "docx",
                "{input}",
                "--outdir",
                "{outdir}"
            ]
        );
    }

    #[test]
    fn explicit_missing_executable_is_converter_not_found() {
        let err = SofficeStage2::locate(Some(Path::new("/no/such/soffice"))).unwrap_err();
        assert!(matches!(err, BatchError::ConverterNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fake_tool_output_is_accepted() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::TempDir::new().unwrap();
        // Fake soffice: copy $6 ({input}) to $8/<stem>.docx.
        let tool = dir.path().join("fake-soffice");
        std::fs::write(
            &tool,
            "#!/bin/sh\nstem=$(basename \"$6\" .pdf)\ncp \"$6\" \"$8/$stem.docx\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let pdf = dir.path().join("a_1.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();
        let out = dir.path().join("a_1.docx");

        SofficeStage2::new(&tool).to_final(&pdf, &out).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_tool_is_missing_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let pdf = dir.path().join("a.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();
        let err = SofficeStage2::new("true")
            .to_final(&pdf, &dir.path().join("a.docx"))
            .await;
        assert!(matches!(err, Err(ConverterError::MissingOutput { .. })));
    }
}
