//! Progress reporting trait.
//!
//! This module defines the CycleObserver trait, which lets a front end
//! (the daemon's logger, a test, a future UI) follow poll cycles without
//! the engine knowing about it.

use uuid::Uuid;

use crate::batch::CycleReport;
use crate::model::{FileHandle, Outcome};

/// How a single file ended in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Valid; queued for the success sink
    Accepted { records: usize },
    /// Rejected; queued for the failure sink
    Rejected { errors: usize },
    /// I/O failure; the pair stays in Input for a later cycle
    IoFailed,
}

impl FileStatus {
    pub fn of(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success { records, .. } => FileStatus::Accepted {
                records: records.len(),
            },
            Outcome::Failure { errors, .. } => FileStatus::Rejected {
                errors: errors.len(),
            },
        }
    }
}

/// Receives progress updates from the orchestrator.
///
/// `on_file_completed` is called from worker threads, concurrently.
pub trait CycleObserver: Sync {
    /// Called once the files of a cycle are known.
    fn on_cycle_started(&self, _cycle_id: Uuid, _files: &[FileHandle]) {}

    /// Called when a file's outcome has been queued (or its processing failed).
    fn on_file_completed(&self, _file: &FileHandle, _status: FileStatus) {}

    /// Called when every file of the cycle has been handled.
    fn on_cycle_completed(&self, _report: &CycleReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CycleObserver for NoopObserver {}
