//! Batch orchestration: one poll cycle over the `Input` folder.
//!
//! A cycle discovers the complete pairs, claims every one that no other
//! cycle or sink owns, and hands each claimed file to exactly one worker of
//! a bounded pool.
//! Workers run the per-file pipeline and queue the outcome on the router.
//! A cycle returns once every file has been processed and queued; the
//! sinks keep finalizing in the background.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::discovery;
use crate::error::EngineError;
use crate::fs_ops::{FileStore, LocalFileStore};
use crate::model::FileHandle;
use crate::pipeline;
use crate::progress::{CycleObserver, FileStatus};
use crate::router::{FileRegistry, OutcomeRouter, SinkReport};

/// Summary of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle_id: Uuid,

    /// Complete pairs found in Input
    pub discovered: usize,

    /// Pairs skipped because another cycle or a sink owns them
    pub skipped_in_flight: usize,

    /// Files queued for the success sink
    pub succeeded: usize,

    /// Files queued for the failure sink
    pub failed: usize,

    /// Files left in Input after an I/O failure
    pub io_errors: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
struct WorkerStats {
    succeeded: usize,
    failed: usize,
    io_errors: usize,
}

impl WorkerStats {
    fn record(&mut self, status: FileStatus) {
        match status {
            FileStatus::Accepted { .. } => self.succeeded += 1,
            FileStatus::Rejected { .. } => self.failed += 1,
            FileStatus::IoFailed => self.io_errors += 1,
        }
    }

    fn merge(mut self, other: WorkerStats) -> Self {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.io_errors += other.io_errors;
        self
    }
}

/// Runs poll cycles and owns the outcome router.
pub struct Orchestrator {
    config: EngineConfig,
    store: Arc<dyn FileStore>,
    router: OutcomeRouter,
}

impl Orchestrator {
    /// Validate the configuration and start the sinks.
    pub fn new(config: EngineConfig, store: Arc<dyn FileStore>) -> Result<Self, EngineError> {
        config.validate()?;
        let router = OutcomeRouter::spawn(Arc::clone(&store), config.algorithm, FileRegistry::new())?;
        Ok(Orchestrator {
            config,
            store,
            router,
        })
    }

    /// Orchestrator over the local directory `config.root`, creating the
    /// folder layout if needed.
    pub fn with_local_store(config: EngineConfig) -> Result<Self, EngineError> {
        let store = LocalFileStore::new(&config.root);
        store.ensure_layout()?;
        Self::new(config, Arc::new(store))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &FileRegistry {
        self.router.registry()
    }

    /// Discover and process every pending file once.
    pub fn process_cycle(&self, observer: &dyn CycleObserver) -> Result<CycleReport, EngineError> {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = tracing::info_span!("cycle", %cycle_id);
        let _enter = span.enter();

        tracing::info!("Starting to process files");

        let discovered = discovery::discover(self.store.as_ref(), self.config.starting_at_row)?;
        let discovered_count = discovered.len();

        // Claiming is the only check: a file another cycle took between our
        // listing and this loop is skipped.
        let mut pending = Vec::with_capacity(discovered_count);
        let mut held = 0;
        for file in discovered {
            if self.registry().claim(&file.file_id) {
                pending.push(file);
            } else {
                held += 1;
            }
        }

        if held > 0 {
            tracing::debug!(held, "Skipping files owned by another cycle or a sink");
        }

        observer.on_cycle_started(cycle_id, &pending);
        let stats = self.run_workers(cycle_id, pending, observer)?;

        let report = CycleReport {
            cycle_id,
            discovered: discovered_count,
            skipped_in_flight: held,
            succeeded: stats.succeeded,
            failed: stats.failed,
            io_errors: stats.io_errors,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            discovered = report.discovered,
            succeeded = report.succeeded,
            failed = report.failed,
            io_errors = report.io_errors,
            skipped = report.skipped_in_flight,
            "Cycle complete"
        );
        observer.on_cycle_completed(&report);
        Ok(report)
    }

    /// Fan files out to a bounded pool; each file goes to exactly one worker.
    fn run_workers(
        &self,
        cycle_id: Uuid,
        files: Vec<FileHandle>,
        observer: &dyn CycleObserver,
    ) -> Result<WorkerStats, EngineError> {
        if files.is_empty() {
            return Ok(WorkerStats::default());
        }

        let worker_count = self.config.workers.min(files.len()).max(1);
        let parent = tracing::Span::current();

        thread::scope(|scope| -> Result<WorkerStats, EngineError> {
            let (file_tx, file_rx) = bounded::<FileHandle>(worker_count * 2);

            let mut handles = Vec::with_capacity(worker_count);
            for worker_idx in 0..worker_count {
                let rx = file_rx.clone();
                let parent = parent.clone();
                let handle = thread::Builder::new()
                    .name(format!("ingest-worker-{worker_idx}"))
                    .spawn_scoped(scope, move || {
                        let _enter = parent.enter();
                        let mut stats = WorkerStats::default();
                        for file in rx.iter() {
                            let status = self.run_file(cycle_id, &file);
                            stats.record(status);
                            observer.on_file_completed(&file, status);
                        }
                        stats
                    })
                    .map_err(|e| EngineError::WorkerSpawn {
                        name: format!("ingest-worker-{worker_idx}"),
                        source: e,
                    })?;
                handles.push(handle);
            }

            // Workers see a closed channel once the last file is taken.
            drop(file_rx);

            let mut files = files.into_iter();
            for file in files.by_ref() {
                if let Err(unsent) = file_tx.send(file) {
                    // Every worker is gone; nothing else will run these.
                    self.registry().release(&unsent.0.file_id);
                    break;
                }
            }
            for file in files {
                self.registry().release(&file.file_id);
            }
            drop(file_tx);

            let mut total = WorkerStats::default();
            for handle in handles {
                match handle.join() {
                    Ok(stats) => total = total.merge(stats),
                    Err(_) => tracing::error!("Worker thread panicked"),
                }
            }
            Ok(total)
        })
    }

    fn run_file(&self, cycle_id: Uuid, file: &FileHandle) -> FileStatus {
        let span = tracing::info_span!(
            "file",
            %cycle_id,
            file_id = %file.file_id,
            starting_at_row = file.starting_at_row
        );
        let _enter = span.enter();

        match pipeline::process_file(self.store.as_ref(), file, self.config.pipeline_settings()) {
            Ok(outcome) => {
                let status = FileStatus::of(&outcome);
                match self.router.dispatch(outcome) {
                    Ok(()) => status,
                    Err(e) => {
                        tracing::error!(error = %e, "Could not queue outcome; the file stays in Input");
                        self.registry().release(&file.file_id);
                        FileStatus::IoFailed
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    os_error = ?e.raw_os_error(),
                    "Processing failed; the file stays in Input"
                );
                self.registry().release(&file.file_id);
                FileStatus::IoFailed
            }
        }
    }

    /// Stop the sinks after draining their queues.
    pub fn shutdown(self) -> SinkReport {
        self.router.shutdown()
    }
}
