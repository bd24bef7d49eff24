//! Outcome routing: the two sinks that finalize processed files.
//!
//! Each sink is a dedicated thread draining its own FIFO queue:
//! - the success sink writes the result file, its checksum, and moves the
//!   input pair to `Done`
//! - the failure sink writes the error report and moves the input pair to
//!   `Errors`
//!
//! Workers only enqueue, so filesystem writes never hold up parsing. The
//! [`FileRegistry`] remembers which ids a cycle has taken, through
//! processing and finalization, so that no other cycle picks up a file
//! still sitting in `Input`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::checksums::{compute_file_checksum, ChecksumAlgorithm};
use crate::error::EngineError;
use crate::fs_ops::{FileStore, Folder};
use crate::model::{
    EventRecord, FileHandle, Outcome, DETAILS_HEADER, EVENT_ID_HEADER, SEPARATOR, TIMESTAMP_HEADER,
};
use crate::row::format_record;
use crate::validation::ValidationErrors;

/// File ids currently owned by a sink.
///
/// A cycle claims an id before processing the file; the sink releases it
/// once finalized. An id whose
/// finalization failed is never released, which keeps it out of later
/// cycles until the process restarts.
#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    claimed: Arc<Mutex<HashSet<String>>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked.
        self.claimed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim an id; false if it was already claimed.
    pub fn claim(&self, file_id: &str) -> bool {
        self.lock().insert(file_id.to_string())
    }

    pub fn release(&self, file_id: &str) {
        self.lock().remove(file_id);
    }

    pub fn is_claimed(&self, file_id: &str) -> bool {
        self.lock().contains(file_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Counters for one sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Files fully finalized
    pub finalized: usize,
    /// Files whose finalization failed part way
    pub failed: usize,
}

/// Counters for both sinks, returned on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub success: SinkStats,
    pub failure: SinkStats,
}

/// Write `Output/<id>.result.dat` and `.result.md5`, then move the input
/// pair to `Done`.
pub fn finalize_success(
    store: &dyn FileStore,
    file: &FileHandle,
    records: &[EventRecord],
    algorithm: ChecksumAlgorithm,
) -> Result<(), EngineError> {
    let result_name = file.result_data_file_name();
    let header = format!(
        "{}{sep}{}{sep}{}",
        TIMESTAMP_HEADER,
        EVENT_ID_HEADER,
        DETAILS_HEADER,
        sep = SEPARATOR
    );
    let mut lines = std::iter::once(header).chain(records.iter().map(format_record));
    store.write_lines(Folder::Output, &result_name, &mut lines)?;

    let checksum = compute_file_checksum(store, Folder::Output, &result_name, algorithm)?;
    store.write_lines(
        Folder::Output,
        &file.result_checksum_file_name(),
        &mut std::iter::once(checksum.hex().to_string()),
    )?;

    move_pair(store, file, Folder::Done)
}

/// Write `Errors/<id>.error.txt`, then move the input pair to `Errors`.
pub fn finalize_failure(
    store: &dyn FileStore,
    file: &FileHandle,
    errors: &ValidationErrors,
) -> Result<(), EngineError> {
    let mut lines = errors.messages().iter().cloned();
    store.write_lines(Folder::Errors, &file.error_report_file_name(), &mut lines)?;
    move_pair(store, file, Folder::Errors)
}

fn move_pair(store: &dyn FileStore, file: &FileHandle, to: Folder) -> Result<(), EngineError> {
    store.move_between(Folder::Input, to, &file.data_file_name())?;
    store.move_between(Folder::Input, to, &file.checksum_file_name())
}

struct SuccessJob {
    file: FileHandle,
    records: Vec<EventRecord>,
}

struct FailureJob {
    file: FileHandle,
    errors: ValidationErrors,
}

/// Fans outcomes out to the success and failure sinks.
pub struct OutcomeRouter {
    success_tx: Sender<SuccessJob>,
    failure_tx: Sender<FailureJob>,
    success_handle: JoinHandle<SinkStats>,
    failure_handle: JoinHandle<SinkStats>,
    registry: FileRegistry,
}

impl OutcomeRouter {
    /// Start both sink threads.
    pub fn spawn(
        store: Arc<dyn FileStore>,
        algorithm: ChecksumAlgorithm,
        registry: FileRegistry,
    ) -> Result<Self, EngineError> {
        let (success_tx, success_rx) = unbounded::<SuccessJob>();
        let (failure_tx, failure_rx) = unbounded::<FailureJob>();

        let success_handle = {
            let store = Arc::clone(&store);
            let registry = registry.clone();
            spawn_sink("success-sink", move || {
                run_success_sink(success_rx, store.as_ref(), algorithm, &registry)
            })?
        };

        let failure_handle = {
            let registry = registry.clone();
            spawn_sink("failure-sink", move || {
                run_failure_sink(failure_rx, store.as_ref(), &registry)
            })?
        };

        Ok(OutcomeRouter {
            success_tx,
            failure_tx,
            success_handle,
            failure_handle,
            registry,
        })
    }

    /// Registry shared with the sinks.
    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    /// Queue an outcome on the matching sink. Never blocks.
    ///
    /// The file's id must already be claimed in the registry. The claim
    /// passes to the sink; if the sink is gone it is released here.
    pub fn dispatch(&self, outcome: Outcome) -> Result<(), EngineError> {
        let file_id = outcome.file().file_id.clone();
        if !self.registry.is_claimed(&file_id) {
            return Err(EngineError::NotClaimed { file_id });
        }

        let sent = match outcome {
            Outcome::Success { file, records } => self
                .success_tx
                .send(SuccessJob { file, records })
                .map_err(|_| "success"),
            Outcome::Failure { file, errors } => self
                .failure_tx
                .send(FailureJob { file, errors })
                .map_err(|_| "failure"),
        };

        sent.map_err(|sink| {
            self.registry.release(&file_id);
            EngineError::SinkClosed { sink }
        })
    }

    /// Stop accepting outcomes, drain both queues and join the sinks.
    pub fn shutdown(self) -> SinkReport {
        let OutcomeRouter {
            success_tx,
            failure_tx,
            success_handle,
            failure_handle,
            ..
        } = self;

        drop(success_tx);
        drop(failure_tx);

        SinkReport {
            success: join_sink("success-sink", success_handle),
            failure: join_sink("failure-sink", failure_handle),
        }
    }
}

fn spawn_sink<F>(name: &str, body: F) -> Result<JoinHandle<SinkStats>, EngineError>
where
    F: FnOnce() -> SinkStats + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| EngineError::WorkerSpawn {
            name: name.to_string(),
            source: e,
        })
}

fn join_sink(name: &str, handle: JoinHandle<SinkStats>) -> SinkStats {
    handle.join().unwrap_or_else(|_| {
        tracing::error!(sink = name, "Sink thread panicked");
        SinkStats {
            finalized: 0,
            failed: 1,
        }
    })
}

fn run_success_sink(
    rx: Receiver<SuccessJob>,
    store: &dyn FileStore,
    algorithm: ChecksumAlgorithm,
    registry: &FileRegistry,
) -> SinkStats {
    let mut stats = SinkStats::default();

    for job in rx.iter() {
        let span = tracing::info_span!("success_sink", file_id = %job.file.file_id);
        let _enter = span.enter();

        match finalize_success(store, &job.file, &job.records, algorithm) {
            Ok(()) => {
                tracing::info!(records = job.records.len(), "File processed and moved to Done");
                registry.release(&job.file.file_id);
                stats.finalized += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, os_error = ?e.raw_os_error(), "Failed to finalize valid file; it stays held until restart");
                stats.failed += 1;
            }
        }
    }

    stats
}

fn run_failure_sink(rx: Receiver<FailureJob>, store: &dyn FileStore, registry: &FileRegistry) -> SinkStats {
    let mut stats = SinkStats::default();

    for job in rx.iter() {
        let span = tracing::info_span!("failure_sink", file_id = %job.file.file_id);
        let _enter = span.enter();

        match finalize_failure(store, &job.file, &job.errors) {
            Ok(()) => {
                tracing::info!(errors = ?job.errors.messages(), "File rejected and moved to Errors");
                registry.release(&job.file.file_id);
                stats.finalized += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, os_error = ?e.raw_os_error(), "Failed to finalize rejected file; it stays held until restart");
                stats.failed += 1;
            }
        }
    }

    stats
}
