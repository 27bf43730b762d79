//! Bounded worker pool.
//!
//! Items are turned into pipeline runs lazily, through a
//! `stream::iter(..).buffer_unordered(n)` pipeline, so at most `n` runs are
//! in flight. Name reservation happens at dispatch, inside the lazy map, so
//! ordinals follow the scanner's order even though completions do not.
//!
//! Each run is its own spawned task. A panic inside a converter therefore
//! costs one item, not the batch: the item becomes an
//! [`PipelineState::Aborted`] failure and both of its paths are recorded for
//! cleanup.
//!
//! [`Scheduler::run_until`] also takes a shutdown future. Once it resolves,
//! no further item is dispatched, in-flight tasks are aborted and awaited,
//! and their paths are recorded before the call returns `BatchInterrupted`.

use crate::error::BatchError;
use crate::pipeline::{ConversionOutcome, Pipeline, PipelineState};
use crate::progress::ProgressCallback;
use crate::scan::WorkItem;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How one dispatched slot ended.
enum Slot {
    Done(ConversionOutcome),
    Cancelled,
    NotStarted,
}

pub struct Scheduler {
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl Scheduler {
    pub fn new(concurrency: usize) -> Result<Self, BatchError> {
        if concurrency == 0 {
            return Err(BatchError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        Ok(Self {
            concurrency,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every item to completion.
    ///
    /// Returns one outcome per item, in completion order.
    pub async fn run(
        &self,
        pipeline: Arc<Pipeline>,
        items: Vec<WorkItem>,
    ) -> Result<Vec<ConversionOutcome>, BatchError> {
        self.run_until(pipeline, items, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stop early when `shutdown` resolves.
    ///
    /// On shutdown every in-flight task is aborted and awaited, so by the
    /// time this returns no conversion is still writing and every path it
    /// may have produced is in the pipeline's ledger.
    pub async fn run_until<S>(
        &self,
        pipeline: Arc<Pipeline>,
        items: Vec<WorkItem>,
        shutdown: S,
    ) -> Result<Vec<ConversionOutcome>, BatchError>
    where
        S: Future<Output = ()>,
    {
        let total = items.len();
        info!(
            "Dispatching {} item(s) with concurrency {}",
            total, self.concurrency
        );

        let (stop_tx, stop_rx) = watch::channel(false);

        let pool = stream::iter(items.into_iter().map(|item| {
            let pipeline = Arc::clone(&pipeline);
            let progress = self.progress.clone();
            let stop = stop_rx.clone();
            let reserved = (!*stop_rx.borrow()).then(|| pipeline.reserve(item));
            async move {
                let Some(reserved) = reserved else {
                    return Slot::NotStarted;
                };
                let file_name = reserved.file_name();
                if let Some(cb) = &progress {
                    cb.on_item_start(&file_name);
                }

                let mut task = {
                    let pipeline = Arc::clone(&pipeline);
                    let reserved = reserved.clone();
                    tokio::spawn(async move { pipeline.run(reserved).await })
                };

                let joined = tokio::select! {
                    joined = &mut task => joined,
                    _ = stopped(stop) => {
                        task.abort();
                        task.await
                    }
                };

                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_panic() => {
                        let reason = panic_message(e.into_panic());
                        error!("{}: conversion task panicked: {}", file_name, reason);
                        pipeline.record_aborted(&reserved);
                        ConversionOutcome::failed(
                            file_name,
                            reserved.output.clone(),
                            PipelineState::Aborted,
                            format!("conversion aborted: {reason}"),
                        )
                    }
                    Err(e) => {
                        debug!("{}: task cancelled: {}", file_name, e);
                        pipeline.record_aborted(&reserved);
                        return Slot::Cancelled;
                    }
                };

                if let Some(cb) = &progress {
                    cb.on_item_complete(&outcome);
                }
                Slot::Done(outcome)
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect::<Vec<Slot>>();

        tokio::pin!(pool);
        tokio::pin!(shutdown);

        let slots = tokio::select! {
            slots = &mut pool => slots,
            _ = &mut shutdown => {
                warn!("Shutdown requested, stopping dispatch and aborting running conversions");
                let _ = stop_tx.send(true);
                pool.await
            }
        };

        let mut outcomes = Vec::with_capacity(total);
        let mut interrupted = false;
        for slot in slots {
            match slot {
                Slot::Done(outcome) => outcomes.push(outcome),
                Slot::Cancelled | Slot::NotStarted => interrupted = true,
            }
        }

        if interrupted {
            return Err(BatchError::BatchInterrupted {
                completed: outcomes.len(),
                total,
                detail: "shutdown requested".to_string(),
            });
        }
        Ok(outcomes)
    }
}

async fn stopped(mut stop: watch::Receiver<bool>) {
    // The sender outlives the pool, so an error cannot come before a stop.
    let _ = stop.wait_for(|stopped| *stopped).await;
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
