//! Configuration types for a batch conversion run.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. The converters themselves are not configuration:
//! they are passed to [`crate::batch::run_batch`] separately so tests can
//! inject fakes without touching any of the knobs below.

use crate::error::BatchError;
use crate::progress::{BatchProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a batch conversion.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use ofd2docx::{BatchConfig, ConversionMode};
///
/// let config = BatchConfig::builder()
///     .input_dir("ofds")
///     .output_dir("out")
///     .mode(ConversionMode::Text)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.mode.final_extension(), ".txt");
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Root scanned recursively for source documents. Default: `ofds`.
    pub input_dir: PathBuf,

    /// Flat output directory for finals and intermediates. Created if absent.
    /// Default: `out`.
    pub output_dir: PathBuf,

    /// Source extension without the dot, matched case-insensitively.
    /// Default: `ofd`.
    pub source_extension: String,

    /// Extension (with dot) of the Stage-1 intermediate. Default: `.pdf`.
    pub intermediate_extension: String,

    /// Stage-2 conversion mode. Default: [`ConversionMode::Layout`].
    pub mode: ConversionMode,

    /// Maximum number of items converted at once. Default: logical CPU count.
    pub concurrency: usize,

    /// Per-stage timeout in seconds; `0` disables it. Default: 300.
    ///
    /// A hung converter otherwise holds its worker slot for the rest of the
    /// batch. When it fires the stage fails like any other converter error.
    pub convert_timeout_secs: u64,

    /// Pause before the cleanup pass, in milliseconds. Default: 0.
    ///
    /// Best-effort only: some converter libraries finalise file handles after
    /// returning. Cleanup tolerates delete failures regardless of this value.
    pub settle_delay_ms: u64,

    /// Optional per-item progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("ofds"),
            output_dir: PathBuf::from("out"),
            source_extension: "ofd".to_string(),
            intermediate_extension: ".pdf".to_string(),
            mode: ConversionMode::default(),
            concurrency: num_cpus::get().max(1),
            convert_timeout_secs: 300,
            settle_delay_ms: 0,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("source_extension", &self.source_extension)
            .field("intermediate_extension", &self.intermediate_extension)
            .field("mode", &self.mode)
            .field("concurrency", &self.concurrency)
            .field("convert_timeout_secs", &self.convert_timeout_secs)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    /// The per-stage timeout, or `None` when disabled.
    pub fn convert_timeout(&self) -> Option<Duration> {
        (self.convert_timeout_secs > 0).then(|| Duration::from_secs(self.convert_timeout_secs))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Accepts `ofd` or `.ofd`.
    pub fn source_extension(mut self, ext: impl AsRef<str>) -> Self {
        self.config.source_extension = ext.as_ref().trim_start_matches('.').to_string();
        self
    }

    /// Accepts `pdf` or `.pdf`.
    pub fn intermediate_extension(mut self, ext: impl AsRef<str>) -> Self {
        self.config.intermediate_extension = format!(".{}", ext.as_ref().trim_start_matches('.'));
        self
    }

    pub fn mode(mut self, mode: ConversionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Not clamped: `0` is rejected by [`build`](Self::build).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn convert_timeout_secs(mut self, secs: u64) -> Self {
        self.config.convert_timeout_secs = secs;
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(BatchError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.source_extension.is_empty() {
            return Err(BatchError::InvalidConfig(
                "Source extension must not be empty".into(),
            ));
        }
        if c.intermediate_extension.len() < 2 {
            return Err(BatchError::InvalidConfig(
                "Intermediate extension must not be empty".into(),
            ));
        }
        if c.intermediate_extension == c.mode.final_extension() {
            return Err(BatchError::InvalidConfig(format!(
                "Intermediate and final extension are both '{}'",
                c.intermediate_extension
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How Stage-2 turns the intermediate PDF into the final document.
///
/// Each mode has a short token, which is what the interactive prompt and
/// the `--mode` flag accept:
///
/// | Token | Mode | Output | Requires |
/// |-------|------|--------|----------|
/// | `y1`  | [`Layout`](Self::Layout)     | DOCX, page layout preserved | PDFium |
/// | `y1x` | [`Text`](Self::Text)         | TXT, text only              | PDFium |
/// | `y1d` | [`TextDocx`](Self::TextDocx) | DOCX, text only             | PDFium |
/// | `y2`  | [`External`](Self::External) | DOCX, via LibreOffice       | LibreOffice |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionMode {
    /// In-process, each page kept as it looks. (default)
    #[default]
    Layout,
    /// In-process plain-text extraction to `.txt`.
    Text,
    /// In-process plain-text extraction into a `.docx`.
    TextDocx,
    /// LibreOffice subprocess.
    External,
}

impl ConversionMode {
    pub const ALL: [ConversionMode; 4] = [
        ConversionMode::Layout,
        ConversionMode::Text,
        ConversionMode::TextDocx,
        ConversionMode::External,
    ];

    /// Parse a prompt token (`y1`, `y1x`, `y1d`, `y2`), case-insensitively.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "y1" => Some(ConversionMode::Layout),
            "y1x" => Some(ConversionMode::Text),
            "y1d" => Some(ConversionMode::TextDocx),
            "y2" => Some(ConversionMode::External),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            ConversionMode::Layout => "y1",
            ConversionMode::Text => "y1x",
            ConversionMode::TextDocx => "y1d",
            ConversionMode::External => "y2",
        }
    }

    /// Final-output extension, including the dot.
    pub fn final_extension(self) -> &'static str {
        match self {
            ConversionMode::Text => ".txt",
            _ => ".docx",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConversionMode::Layout => "DOCX with page layout preserved (PDFium)",
            ConversionMode::Text => "plain TXT, text only (PDFium)",
            ConversionMode::TextDocx => "DOCX with text only (PDFium)",
            ConversionMode::External => "DOCX via LibreOffice",
        }
    }

    /// Whether Stage-2 runs inside this process rather than in a subprocess.
    pub fn is_in_process(self) -> bool {
        !matches!(self, ConversionMode::External)
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip() {
        for mode in ConversionMode::ALL {
            assert_eq!(ConversionMode::from_token(mode.token()), Some(mode));
        }
        assert_eq!(ConversionMode::from_token(" Y1X "), Some(ConversionMode::Text));
        assert_eq!(ConversionMode::from_token("n"), None);
        assert_eq!(ConversionMode::from_token(""), None);
    }

    #[test]
    fn text_mode_writes_txt() {
        assert_eq!(ConversionMode::Text.final_extension(), ".txt");
        assert_eq!(ConversionMode::TextDocx.final_extension(), ".docx");
        assert_eq!(ConversionMode::External.final_extension(), ".docx");
        assert!(!ConversionMode::External.is_in_process());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = BatchConfig::builder().concurrency(0).build().unwrap_err();
        assert!(matches!(err, BatchError::InvalidConfig(_)));
    }

    #[test]
    fn extensions_normalised() {
        let c = BatchConfig::builder()
            .source_extension(".OFD")
            .intermediate_extension("pdf")
            .build()
            .unwrap();
        assert_eq!(c.source_extension, "OFD");
        assert_eq!(c.intermediate_extension, ".pdf");
    }

    #[test]
    fn intermediate_must_differ_from_final() {
        let err = BatchConfig::builder()
            .mode(ConversionMode::Text)
            .intermediate_extension("txt")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains(".txt"));
    }

    #[test]
    fn timeout_zero_disables() {
        let c = BatchConfig::builder().convert_timeout_secs(0).build().unwrap();
        assert!(c.convert_timeout().is_none());
        let c = BatchConfig::builder().convert_timeout_secs(5).build().unwrap();
        assert_eq!(c.convert_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn default_concurrency_positive() {
        assert!(BatchConfig::default().concurrency >= 1);
    }
}
