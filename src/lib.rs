//! # ofd2docx
//!
//! Batch-convert OFD documents into editable DOCX (or plain TXT) through a
//! PDF intermediate.
//!
//! Every `.ofd` file under the input root is converted in two stages, OFD →
//! PDF → final, by pluggable converters. Items run concurrently on a bounded
//! worker pool, outputs land flat in one directory with collision-safe
//! names, and intermediates are deleted once the whole batch has finished.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ofds/**/*.ofd
//!  │
//!  ├─ 1. Scan      recursive, sorted, case-insensitive extension match
//!  ├─ 2. Reserve   a.docx, a_1.docx, … in scan order
//!  ├─ 3. Stage 1   OFD → PDF      (external command)
//!  ├─ 4. Stage 2   PDF → DOCX/TXT (pdfium in-process, or LibreOffice)
//!  ├─ 5. Cleanup   delete intermediates and partial outputs
//!  └─ 6. Summary   counts, failure reasons, elapsed time
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ofd2docx::{convert_batch, BatchConfig, ConversionMode, ConverterOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder()
//!         .input_dir("ofds")
//!         .output_dir("out")
//!         .mode(ConversionMode::External)
//!         .build()?;
//!     let summary = convert_batch(&config, &ConverterOptions::default()).await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! ## Conversion Modes
//!
//! | Token | Mode       | Output | Stage 2                                  |
//! |-------|------------|--------|------------------------------------------|
//! | `y1`  | `Layout`   | DOCX   | pdfium, one rendered picture per page    |
//! | `y1x` | `Text`     | TXT    | pdfium text, spaces removed              |
//! | `y1d` | `TextDocx` | DOCX   | pdfium text, one paragraph per line      |
//! | `y2`  | `External` | DOCX   | LibreOffice `writer_pdf_import`          |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ofd2docx` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod cleanup;
pub mod config;
pub mod converter;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod progress;
pub mod scan;
pub mod scheduler;
pub mod summary;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{convert_batch, run_batch, run_batch_sync, run_batch_until};
pub use cleanup::{ArtifactLedger, CleanupManager, CleanupReport};
pub use config::{BatchConfig, BatchConfigBuilder, ConversionMode};
pub use converter::{ConverterOptions, Converters, Stage1Converter, Stage2Converter};
pub use error::{BatchError, CleanupDeleteError, ConverterError, ItemError};
pub use naming::{NameRegistry, NameReservation};
pub use pipeline::{ConversionOutcome, Pipeline, PipelineState};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use scan::{Scanner, WorkItem};
pub use scheduler::Scheduler;
pub use summary::{Aggregator, BatchSummary};
