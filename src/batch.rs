//! Batch driver: scan, convert, clean up, summarise.
//!
//! Phases run strictly in sequence. Cleanup only starts after every
//! pipeline run has finished, and it runs even when the pool was
//! interrupted, so intermediates never outlive a batch that got that far.
//! [`run_batch`] treats Ctrl-C as the interruption signal;
//! [`run_batch_until`] takes any future instead.

use crate::cleanup::CleanupManager;
use crate::config::BatchConfig;
use crate::converter::{ConverterOptions, Converters};
use crate::error::BatchError;
use crate::pipeline::Pipeline;
use crate::scan::Scanner;
use crate::scheduler::Scheduler;
use crate::summary::{Aggregator, BatchSummary};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Resolve the shipped converters for `config.mode`, then run the batch.
///
/// A missing converter fails with `ConverterNotFound` before the input
/// directory is read.
pub async fn convert_batch(
    config: &BatchConfig,
    options: &ConverterOptions,
) -> Result<BatchSummary, BatchError> {
    let converters = Converters::for_mode(config.mode, options)?;
    run_batch(config, converters).await
}

/// Run one batch with the given converters, stopping early on Ctrl-C.
///
/// # Errors
/// Only fatal conditions: missing input directory, uncreatable output
/// directory, scan failure, interrupted pool. Per-item failures are counted
/// in the returned [`BatchSummary`].
pub async fn run_batch(
    config: &BatchConfig,
    converters: Converters,
) -> Result<BatchSummary, BatchError> {
    run_batch_until(config, converters, ctrl_c()).await
}

/// Run one batch, stopping early once `shutdown` resolves.
///
/// An interrupted batch still deletes what its started items recorded,
/// then fails with `BatchInterrupted`.
pub async fn run_batch_until<S>(
    config: &BatchConfig,
    converters: Converters,
    shutdown: S,
) -> Result<BatchSummary, BatchError>
where
    S: Future<Output = ()>,
{
    let start = Instant::now();
    info!(
        "Starting batch: {} → {} (mode {})",
        config.input_dir.display(),
        config.output_dir.display(),
        config.mode
    );

    // ── Step 1: Directories ──────────────────────────────────────────────
    if !config.input_dir.is_dir() {
        return Err(BatchError::InvalidInputDirectory {
            path: config.input_dir.clone(),
        });
    }
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| BatchError::OutputDirUncreatable {
            path: config.output_dir.clone(),
            source: e,
        })?;

    let final_ext = converters.stage2.final_extension();
    if final_ext.eq_ignore_ascii_case(&config.intermediate_extension) {
        return Err(BatchError::InvalidConfig(format!(
            "intermediate and final extension are both '{final_ext}'"
        )));
    }
    if final_ext != config.mode.final_extension() {
        warn!(
            "Stage-2 converter '{}' writes {} files, mode {} expects {}",
            converters.stage2.name(),
            final_ext,
            config.mode,
            config.mode.final_extension()
        );
    }

    // ── Step 2: Scan ─────────────────────────────────────────────────────
    let scanner = Scanner::new(&config.input_dir, &config.source_extension);
    let items = tokio::task::spawn_blocking(move || scanner.scan())
        .await
        .map_err(|e| BatchError::Internal(format!("Scan task panicked: {e}")))??;

    if items.is_empty() {
        warn!(
            "No *.{} files found under {}",
            config.source_extension,
            config.input_dir.display()
        );
    }

    if let Some(cb) = &config.progress_callback {
        cb.on_batch_start(items.len());
    }

    // ── Step 3: Convert ──────────────────────────────────────────────────
    let pipeline = Arc::new(Pipeline::new(
        converters,
        &config.output_dir,
        &config.intermediate_extension,
        config.convert_timeout(),
    ));
    let scheduled = Scheduler::new(config.concurrency)?
        .with_progress(config.progress_callback.clone())
        .run_until(Arc::clone(&pipeline), items, shutdown)
        .await;

    // ── Step 4: Cleanup ──────────────────────────────────────────────────
    if let Some(cb) = &config.progress_callback {
        cb.on_cleanup_start(pipeline.ledger().len());
    }
    let cleanup = CleanupManager::new(config.settle_delay())
        .run(pipeline.ledger())
        .await;
    info!(
        "Cleanup: {} deleted, {} already gone, {} failed",
        cleanup.deleted,
        cleanup.missing,
        cleanup.failures.len()
    );

    let outcomes = scheduled?;

    // ── Step 5: Summary ──────────────────────────────────────────────────
    let mut aggregator = Aggregator::new();
    aggregator.extend(&outcomes);

    let output_dir = std::fs::canonicalize(&config.output_dir)
        .unwrap_or_else(|_| config.output_dir.clone());
    let summary = aggregator.finish(start.elapsed(), output_dir, cleanup.failures);

    info!(
        "Batch finished: {} succeeded, {} failed in {:.1}s",
        summary.succeeded,
        summary.failed,
        summary.elapsed().as_secs_f64()
    );

    if let Some(cb) = &config.progress_callback {
        cb.on_batch_complete(&summary);
    }
    Ok(summary)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C, batch is not interruptible: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Blocking wrapper around [`run_batch`] for non-async callers.
pub fn run_batch_sync(
    config: &BatchConfig,
    converters: Converters,
) -> Result<BatchSummary, BatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(config, converters))
}
