//! Converter adapters for the two pipeline stages.
//!
//! The pipeline only sees the two traits below; which adapter sits behind
//! them is decided once, at setup, by [`Converters::for_mode`].
//!
//! ```text
//! source.ofd ──Stage1Converter──▶ name.pdf ──Stage2Converter──▶ name.docx / name.txt
//!             (command)                      (pdfium | soffice)
//! ```
//!
//! * [`command`]: argument-vector subprocess runner shared by the external
//!   adapters; never goes through a shell
//! * [`ofd`]: Stage-1 via a configurable OFD→PDF command-line tool
//! * [`soffice`]: Stage-2 via LibreOffice in headless mode
//! * [`pdfium`]: Stage-2 in-process (layout, text, text-docx modes)
//! * [`docx`]: minimal WordprocessingML package writer
//! * [`text`]: cleanup of extracted page text

pub mod command;
pub mod docx;
pub mod ofd;
pub mod pdfium;
pub mod soffice;
pub mod text;

use crate::config::ConversionMode;
use crate::error::{BatchError, ConverterError};
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Source → intermediate (OFD → PDF).
#[async_trait]
pub trait Stage1Converter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Write the intermediate for `source` at exactly `intermediate`.
    async fn to_intermediate(&self, source: &Path, intermediate: &Path)
        -> Result<(), ConverterError>;
}

/// Intermediate → final (PDF → DOCX/TXT).
#[async_trait]
pub trait Stage2Converter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Extension of the files this converter writes, with the dot.
    fn final_extension(&self) -> &str;

    /// Write the final document for `intermediate` at exactly `output`.
    async fn to_final(&self, intermediate: &Path, output: &Path) -> Result<(), ConverterError>;
}

/// The pair of converters a batch runs with.
#[derive(Clone)]
pub struct Converters {
    pub stage1: Arc<dyn Stage1Converter>,
    pub stage2: Arc<dyn Stage2Converter>,
}

impl Converters {
    pub fn new(stage1: Arc<dyn Stage1Converter>, stage2: Arc<dyn Stage2Converter>) -> Self {
        Self { stage1, stage2 }
    }

    /// Build the shipped adapters for `mode`.
    ///
    /// Every external dependency is resolved here, so a missing LibreOffice,
    /// PDFium or Stage-1 tool is reported as `ConverterNotFound` before any
    /// input is scanned.
    pub fn for_mode(mode: ConversionMode, options: &ConverterOptions) -> Result<Self, BatchError> {
        let stage1 = ofd::CommandStage1::locate(&options.stage1_program, options.stage1_args.clone())?;

        let stage2: Arc<dyn Stage2Converter> = match mode {
            ConversionMode::External => {
                Arc::new(soffice::SofficeStage2::locate(options.soffice.as_deref())?)
            }
            in_process => Arc::new(pdfium::PdfiumStage2::bind(
                in_process,
                options.pdfium_library.as_deref(),
            )?),
        };

        info!(
            "Converters ready: stage 1 = {}, stage 2 = {} ({})",
            stage1.name(),
            stage2.name(),
            mode
        );

        Ok(Self {
            stage1: Arc::new(stage1),
            stage2,
        })
    }
}

/// Where to find the external converters.
#[derive(Debug, Clone)]
pub struct ConverterOptions {
    /// Stage-1 executable, bare name (looked up on `PATH`) or path.
    pub stage1_program: String,
    /// Stage-1 argument template; `{input}` and `{output}` are substituted.
    pub stage1_args: Vec<String>,
    /// Explicit LibreOffice executable.
    pub soffice: Option<PathBuf>,
    /// Explicit PDFium shared library.
    pub pdfium_library: Option<PathBuf>,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            stage1_program: ofd::DEFAULT_PROGRAM.to_string(),
            stage1_args: ofd::default_args(),
            soffice: None,
            pdfium_library: None,
        }
    }
}

/// Raised when the async side of a blocking conversion stops waiting.
///
/// Checking the flag and publishing the output happen under one lock, so
/// once [`CancelFlag::cancel`] returns no output can appear any more.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelFlag(Arc<Mutex<bool>>);

impl CancelFlag {
    pub(crate) fn is_cancelled(&self) -> bool {
        *self.lock()
    }

    pub(crate) fn cancel(&self) {
        *self.lock() = true;
    }

    /// Run `publish` unless cancelled, holding the lock throughout.
    pub(crate) fn publish<F>(&self, publish: F) -> Result<(), ConverterError>
    where
        F: FnOnce() -> Result<(), ConverterError>,
    {
        let cancelled = self.lock();
        if *cancelled {
            return Err(ConverterError::Cancelled);
        }
        publish()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Run `job` on the blocking pool.
///
/// Dropping the returned future (timeout, aborted task) cancels the flag
/// handed to `job`. The thread itself keeps running until `job` notices.
pub(crate) async fn run_blocking<F>(job: F) -> Result<(), ConverterError>
where
    F: FnOnce(&CancelFlag) -> Result<(), ConverterError> + Send + 'static,
{
    let flag = CancelFlag::default();
    let _guard = CancelOnDrop(flag.clone());
    tokio::task::spawn_blocking(move || job(&flag))
        .await
        .map_err(|e| ConverterError::Library(format!("conversion task panicked: {e}")))?
}

/// Write `output` via a temp file in the same directory, then rename.
///
/// A failed or interrupted write never leaves a partial file at `output`,
/// so the pipeline's skip check cannot mistake it for a finished conversion.
/// The rename is skipped once `cancel` is set.
pub(crate) fn write_atomically<F>(
    output: &Path,
    cancel: &CancelFlag,
    write: F,
) -> Result<(), ConverterError>
where
    F: FnOnce(&mut File) -> Result<(), ConverterError>,
{
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".ofd2docx-")
        .tempfile_in(dir)
        .map_err(|e| ConverterError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

    write(tmp.as_file_mut())?;

    tmp.as_file().sync_all().map_err(|e| ConverterError::Io {
        path: tmp.path().to_path_buf(),
        source: e,
    })?;

    cancel
        .publish(|| {
            tmp.persist(output).map(drop).map_err(|e| ConverterError::Io {
                path: output.to_path_buf(),
                source: e.error,
            })
        })
        .inspect_err(|e| {
            if matches!(e, ConverterError::Cancelled) {
                debug!("{}: dropped, caller gave up", output.display());
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_lands_at_output() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a.txt");
        write_atomically(&out, &CancelFlag::default(), |f| {
            f.write_all(b"hello").map_err(|e| ConverterError::Io {
                path: PathBuf::new(),
                source: e,
            })
        })
        .unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_atomic_write_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a.txt");
        let err = write_atomically(&out, &CancelFlag::default(), |_| {
            Err(ConverterError::Library("no text".into()))
        });
        assert!(err.is_err());
        assert!(!out.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn cancelled_write_is_not_published() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a.txt");
        let cancel = CancelFlag::default();
        cancel.cancel();
        let err = write_atomically(&out, &cancel, |f| {
            f.write_all(b"late").map_err(|e| ConverterError::Io {
                path: PathBuf::new(),
                source: e,
            })
        })
        .unwrap_err();
        assert!(matches!(err, ConverterError::Cancelled));
        assert!(!out.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn dropping_blocking_job_cancels_it() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a.docx");
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let target = out.clone();
        let job = run_blocking(move |cancel| {
            started_tx.send(()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(300));
            let res = write_atomically(&target, cancel, |f| {
                f.write_all(b"late").map_err(|e| ConverterError::Io {
                    path: PathBuf::new(),
                    source: e,
                })
            });
            done_tx.send(res.is_err()).unwrap();
            res
        });

        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(50), job).await;
        assert!(timed_out.is_err());
        started_rx.recv().unwrap();
        let refused = tokio::task::spawn_blocking(move || done_rx.recv().unwrap())
            .await
            .unwrap();
        assert!(refused);
        assert!(!out.exists());
    }

    #[test]
    fn default_options_use_stage1_template() {
        let opts = ConverterOptions::default();
        assert_eq!(opts.stage1_program, ofd::DEFAULT_PROGRAM);
        assert!(opts.stage1_args.iter().any(|a| a.contains("{input}")));
        assert!(opts.stage1_args.iter().any(|a| a.contains("{output}")));
    }
}
