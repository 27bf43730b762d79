//! Per-item conversion state machine.
//!
//! ```text
//! Reserved ─┬─ output exists ──────────────────────────────────▶ AlreadyDone
//!           └▶ Stage1Running ─┬─ err ─────────────────────────▶ Stage1Failed
//!                             └▶ Stage1Done ▶ Stage2Running ─┬─ err ▶ Stage2Failed
//!                                                            └▶ Succeeded
//! ```
//!
//! Each run ends in exactly one [`ConversionOutcome`]. Converter errors
//! stop here: they are turned into an [`ItemError`] message on the outcome
//! and never escalate to the scheduler.
//!
//! Artifacts are recorded in the shared [`ArtifactLedger`], not deleted:
//!
//! | Terminal state | Recorded                       |
//! |----------------|--------------------------------|
//! | Succeeded      | intermediate                   |
//! | Stage1Failed   | intermediate                   |
//! | Stage2Failed   | intermediate and final output  |
//! | Aborted        | intermediate and final output  |
//! | AlreadyDone    | nothing                        |

use crate::cleanup::ArtifactLedger;
use crate::converter::Converters;
use crate::error::{ConverterError, ItemError};
use crate::naming::{NameRegistry, NameReservation};
use crate::scan::WorkItem;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Message carried by [`PipelineState::AlreadyDone`] outcomes.
pub const ALREADY_CONVERTED: &str = "already converted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Reserved,
    Stage1Running,
    Stage1Done,
    Stage2Running,
    Succeeded,
    Stage1Failed,
    Stage2Failed,
    AlreadyDone,
    /// The run panicked or was torn down before reaching another terminal
    /// state.
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded
                | Self::Stage1Failed
                | Self::Stage2Failed
                | Self::AlreadyDone
                | Self::Aborted
        )
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub success: bool,
    /// Source file name (with extension), as shown in the summary.
    pub file_name: String,
    pub message: Option<String>,
    pub state: PipelineState,
    /// Reserved final output path.
    pub output: PathBuf,
}

impl ConversionOutcome {
    pub fn succeeded(file_name: impl Into<String>, output: PathBuf) -> Self {
        Self {
            success: true,
            file_name: file_name.into(),
            message: None,
            state: PipelineState::Succeeded,
            output,
        }
    }

    pub fn already_done(file_name: impl Into<String>, output: PathBuf) -> Self {
        Self {
            success: true,
            file_name: file_name.into(),
            message: Some(ALREADY_CONVERTED.to_string()),
            state: PipelineState::AlreadyDone,
            output,
        }
    }

    pub fn failed(
        file_name: impl Into<String>,
        output: PathBuf,
        state: PipelineState,
        message: String,
    ) -> Self {
        Self {
            success: false,
            file_name: file_name.into(),
            message: Some(message),
            state,
            output,
        }
    }
}

/// A work item paired with its name reservation, ready to run.
#[derive(Debug, Clone)]
pub struct ReservedItem {
    pub item: WorkItem,
    pub reservation: NameReservation,
    pub intermediate: PathBuf,
    pub output: PathBuf,
}

impl ReservedItem {
    pub fn file_name(&self) -> String {
        self.item.file_name()
    }
}

/// Shared, immutable context for every run in a batch.
pub struct Pipeline {
    converters: Converters,
    registry: Arc<NameRegistry>,
    ledger: Arc<ArtifactLedger>,
    output_dir: PathBuf,
    intermediate_ext: String,
    final_ext: String,
    timeout: Option<Duration>,
}

impl Pipeline {
    /// `intermediate_ext` includes the dot. The final extension comes from
    /// the Stage-2 converter.
    pub fn new(
        converters: Converters,
        output_dir: impl Into<PathBuf>,
        intermediate_ext: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let final_ext = converters.stage2.final_extension().to_string();
        Self {
            converters,
            registry: Arc::new(NameRegistry::new()),
            ledger: Arc::new(ArtifactLedger::new()),
            output_dir: output_dir.into(),
            intermediate_ext: intermediate_ext.into(),
            final_ext,
            timeout,
        }
    }

    pub fn ledger(&self) -> &Arc<ArtifactLedger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<NameRegistry> {
        &self.registry
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn final_extension(&self) -> &str {
        &self.final_ext
    }

    /// Claim output names for `item`. Call in dispatch order.
    pub fn reserve(&self, item: WorkItem) -> ReservedItem {
        let reservation = self
            .registry
            .reserve(&item.base_name, &self.final_ext, &self.intermediate_ext);
        ReservedItem {
            intermediate: reservation.intermediate_path(&self.output_dir),
            output: reservation.final_path(&self.output_dir),
            item,
            reservation,
        }
    }

    /// Drive one item to a terminal state.
    pub async fn run(&self, reserved: ReservedItem) -> ConversionOutcome {
        let file_name = reserved.file_name();
        let ReservedItem {
            item,
            intermediate,
            output,
            ..
        } = reserved;
        let mut state = PipelineState::Reserved;

        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            info!("{}: {} exists, skipping", file_name, output.display());
            return ConversionOutcome::already_done(file_name, output);
        }

        // ── Stage 1 ─────────────────────────────────────────────────────
        transition(&file_name, &mut state, PipelineState::Stage1Running);
        let stage1 = self
            .bounded(
                self.converters
                    .stage1
                    .to_intermediate(&item.source, &intermediate),
            )
            .await;

        if let Err(e) = stage1 {
            self.ledger.record(&intermediate);
            let err = ItemError::Stage1ConversionError(e.to_string());
            warn!("{}: {}", file_name, err);
            return ConversionOutcome::failed(
                file_name,
                output,
                PipelineState::Stage1Failed,
                err.to_string(),
            );
        }
        transition(&file_name, &mut state, PipelineState::Stage1Done);

        // ── Stage 2 ─────────────────────────────────────────────────────
        transition(&file_name, &mut state, PipelineState::Stage2Running);
        let stage2 = self
            .bounded(self.converters.stage2.to_final(&intermediate, &output))
            .await;

        self.ledger.record(&intermediate);

        match stage2 {
            Ok(()) => {
                transition(&file_name, &mut state, PipelineState::Succeeded);
                info!("{}: converted to {}", file_name, output.display());
                ConversionOutcome::succeeded(file_name, output)
            }
            Err(e) => {
                self.ledger.record(&output);
                let err = ItemError::Stage2ConversionError {
                    extension: self.final_ext.clone(),
                    detail: e.to_string(),
                };
                warn!("{}: {}", file_name, err);
                ConversionOutcome::failed(
                    file_name,
                    output,
                    PipelineState::Stage2Failed,
                    err.to_string(),
                )
            }
        }
    }

    /// Record both paths of a run that never reached a terminal state.
    pub fn record_aborted(&self, reserved: &ReservedItem) {
        self.ledger.record(&reserved.intermediate);
        self.ledger.record(&reserved.output);
    }

    async fn bounded<F>(&self, stage: F) -> Result<(), ConverterError>
    where
        F: Future<Output = Result<(), ConverterError>>,
    {
        match self.timeout {
            None => stage.await,
            Some(limit) => match tokio::time::timeout(limit, stage).await {
                Ok(res) => res,
                Err(_) => Err(ConverterError::Timeout {
                    secs: limit.as_secs(),
                }),
            },
        }
    }
}

fn transition(file_name: &str, state: &mut PipelineState, next: PipelineState) {
    debug!("{}: {:?} → {:?}", file_name, state, next);
    *state = next;
}
