//! End-of-batch artifact cleanup.
//!
//! Workers append to an [`ArtifactLedger`] while the pool runs; the
//! [`CleanupManager`] drains it once the pool has finished. Nothing is
//! deleted while any pipeline is still in flight.
//!
//! Deletion failures are expected occasionally (a converter library may
//! still hold the file for a moment after returning). Each one is logged,
//! reported as a [`CleanupDeleteError`], and the pass moves on.

use crate::error::CleanupDeleteError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Append-only list of paths to delete after the batch.
#[derive(Debug, Default)]
pub struct ArtifactLedger {
    paths: Mutex<Vec<PathBuf>>,
}

impl ArtifactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!("Recorded artifact for cleanup: {}", path.display());
        self.lock().push(path);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the recorded paths, in recording order.
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.lock().clone()
    }

    fn take(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
        // Pushing a PathBuf cannot leave the Vec half-updated.
        self.paths.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// What the cleanup pass did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deleted: usize,
    /// Recorded but never created, or already gone.
    pub missing: usize,
    pub failures: Vec<CleanupDeleteError>,
}

/// Deletes every recorded artifact, tolerating individual failures.
#[derive(Debug, Clone, Default)]
pub struct CleanupManager {
    settle_delay: Duration,
}

impl CleanupManager {
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }

    /// Drain `ledger` and delete each distinct path once.
    ///
    /// Must only be called after every pipeline run has finished.
    pub async fn run(&self, ledger: &ArtifactLedger) -> CleanupReport {
        if !self.settle_delay.is_zero() {
            debug!("Waiting {:?} before cleanup", self.settle_delay);
            tokio::time::sleep(self.settle_delay).await;
        }

        let mut seen = HashSet::new();
        let paths: Vec<PathBuf> = ledger
            .take()
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect();

        info!("Deleting {} intermediate/failed artifacts", paths.len());

        let mut report = CleanupReport::default();
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Deleted {}", path.display());
                    report.deleted += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    report.missing += 1;
                }
                Err(e) => {
                    let failure = CleanupDeleteError {
                        file_name: path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| path.display().to_string()),
                        path,
                        reason: e.to_string(),
                    };
                    warn!("{}", failure);
                    report.failures.push(failure);
                }
            }
        }

        report
    }
}
