//! Result aggregation and the end-of-run report.

use crate::error::CleanupDeleteError;
use crate::pipeline::{ConversionOutcome, PipelineState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Aggregated result of one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items converted, including those skipped as already converted.
    pub succeeded: usize,
    pub failed: usize,
    /// Subset of `succeeded` that were skipped because the output existed.
    pub already_converted: usize,
    /// One `"<fileName> - reason: <message>"` line per failure.
    pub failures: Vec<String>,
    pub elapsed_ms: u64,
    pub output_dir: PathBuf,
    /// Artifacts the cleanup pass could not delete.
    pub cleanup_failures: Vec<CleanupDeleteError>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========== Conversion finished ==========")?;
        writeln!(f, "Succeeded: {}", self.succeeded)?;
        if self.already_converted > 0 {
            writeln!(f, "  (already converted: {})", self.already_converted)?;
        }
        writeln!(f, "Failed:    {}", self.failed)?;
        if !self.failures.is_empty() {
            writeln!(f, "Failed files:")?;
            for line in &self.failures {
                writeln!(f, "  {line}")?;
            }
        }
        if !self.cleanup_failures.is_empty() {
            writeln!(f, "Cleanup problems:")?;
            for c in &self.cleanup_failures {
                writeln!(f, "  {c}")?;
            }
        }
        writeln!(f, "Elapsed:   {:.3} s", self.elapsed_ms as f64 / 1000.0)?;
        write!(f, "Output:    {}", self.output_dir.display())
    }
}

/// Fold over [`ConversionOutcome`]s.
#[derive(Debug, Default)]
pub struct Aggregator {
    succeeded: usize,
    failed: usize,
    already_converted: usize,
    failures: Vec<String>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: &ConversionOutcome) {
        if outcome.success {
            self.succeeded += 1;
            if outcome.state == PipelineState::AlreadyDone {
                self.already_converted += 1;
            }
        } else {
            self.failed += 1;
            self.failures.push(format!(
                "{} - reason: {}",
                outcome.file_name,
                outcome.message.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    pub fn finish(
        self,
        elapsed: Duration,
        output_dir: PathBuf,
        cleanup_failures: Vec<CleanupDeleteError>,
    ) -> BatchSummary {
        BatchSummary {
            succeeded: self.succeeded,
            failed: self.failed,
            already_converted: self.already_converted,
            failures: self.failures,
            elapsed_ms: elapsed.as_millis() as u64,
            output_dir,
            cleanup_failures,
        }
    }
}

impl<'a> Extend<&'a ConversionOutcome> for Aggregator {
    fn extend<T: IntoIterator<Item = &'a ConversionOutcome>>(&mut self, iter: T) {
        for outcome in iter {
            self.push(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcomes() -> Vec<ConversionOutcome> {
        vec![
            ConversionOutcome::succeeded("a.ofd", "out/a.docx".into()),
            ConversionOutcome::already_done("b.ofd", "out/b.docx".into()),
            ConversionOutcome::failed(
                "c.ofd",
                "out/c.docx".into(),
                PipelineState::Stage1Failed,
                "failed converting to PDF: truncated".into(),
            ),
        ]
    }

    #[test]
    fn counts_add_up() {
        let mut agg = Aggregator::new();
        agg.extend(&outcomes());
        let s = agg.finish(Duration::from_millis(1500), "out".into(), vec![]);

        assert_eq!(s.succeeded, 2);
        assert_eq!(s.already_converted, 1);
        assert_eq!(s.failed, 1);
        assert_eq!(s.total(), 3);
        assert_eq!(
            s.failures,
            vec!["c.ofd - reason: failed converting to PDF: truncated".to_string()]
        );
        assert!(!s.is_clean());
    }

    #[test]
    fn display_lists_failures_and_output_dir() {
        let mut agg = Aggregator::new();
        agg.extend(&outcomes());
        let s = agg.finish(Duration::from_millis(2250), "/data/out".into(), vec![]);
        let text = s.to_string();

        assert!(text.contains("Succeeded: 2"), "got: {text}");
        assert!(text.contains("Failed:    1"), "got: {text}");
        assert!(text.contains("c.ofd - reason:"), "got: {text}");
        assert!(text.contains("2.250 s"), "got: {text}");
        assert!(text.contains("/data/out"), "got: {text}");
    }

    #[test]
    fn empty_batch_summary() {
        let s = Aggregator::new().finish(Duration::ZERO, "out".into(), vec![]);
        assert_eq!(s.total(), 0);
        assert!(s.is_clean());
        assert!(!s.to_string().contains("Failed files"));
    }

    #[test]
    fn summary_serialises_to_json() {
        let s = Aggregator::new().finish(Duration::from_millis(7), "out".into(), vec![]);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"elapsed_ms\":7"));
    }
}
