//! Progress-callback trait for per-item batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive events
//! as the scheduler works through the batch.
//!
//! # Example
//!
//! ```rust
//! use ofd2docx::{BatchConfig, BatchProgressCallback, ConversionOutcome};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, outcome: &ConversionOutcome) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}: {} ok={}", outcome.file_name, outcome.success);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::ConversionOutcome;
use crate::summary::BatchSummary;
use std::sync::Arc;

/// Called by the batch driver and the worker pool.
///
/// Implementations must be `Send + Sync`: item events arrive concurrently
/// from different worker tasks, in no particular order. All methods have
/// default no-op implementations so callers only override what they care
/// about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after scanning, before any item is dispatched.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called when a worker picks up an item.
    fn on_item_start(&self, file_name: &str) {
        let _ = file_name;
    }

    /// Called exactly once per item with its terminal outcome.
    fn on_item_complete(&self, outcome: &ConversionOutcome) {
        let _ = outcome;
    }

    /// Called after the pool drains, before artifacts are deleted.
    fn on_cleanup_start(&self, artifacts: usize) {
        let _ = artifacts;
    }

    /// Called once with the final summary.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
