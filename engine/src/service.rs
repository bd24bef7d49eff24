//! The periodic driver loop and its cooperative stop signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::batch::{CycleReport, Orchestrator};
use crate::error::EngineError;
use crate::progress::CycleObserver;

/// Cooperative stop request shared between the driver loop and whoever
/// wants it to end (signal handler, test, embedding application).
///
/// A stop never interrupts a running cycle; it only prevents the next one
/// and cuts the wait between cycles short.
#[derive(Debug, Clone)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        StopSignal {
            requested: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
        // A full channel already holds a wake-up.
        let _ = self.wake_tx.try_send(());
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout`; returns true if a stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_stop_requested() {
            return true;
        }
        match self.wake_rx.recv_timeout(timeout) {
            Ok(()) => {
                // Leave a wake-up for any other waiter sharing this signal.
                let _ = self.wake_tx.try_send(());
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.is_stop_requested()
            }
        }
    }
}

/// Run a single cycle and log how it went.
///
/// Unlike [`run_service`], a failing cycle is returned to the caller. The
/// sinks may still be finalizing when this returns.
pub fn run_once(
    orchestrator: &Orchestrator,
    observer: &dyn CycleObserver,
) -> Result<CycleReport, EngineError> {
    tracing::info!(
        root = %orchestrator.config().root.display(),
        workers = orchestrator.config().workers,
        "Running a single cycle"
    );

    match orchestrator.process_cycle(observer) {
        Ok(report) => {
            if report.io_errors > 0 {
                tracing::warn!(io_errors = report.io_errors, "Some files stay in Input after I/O failures");
            }
            tracing::info!(
                accepted = report.succeeded,
                rejected = report.failed,
                skipped = report.skipped_in_flight,
                "Single cycle finished"
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!(error = %e, os_error = ?e.raw_os_error(), "Single cycle failed");
            Err(e)
        }
    }
}

/// Run cycles every `poll_interval` until a stop is requested.
///
/// The first cycle starts immediately. A failing cycle is logged and the
/// loop carries on with the next one. Returns the number of cycles run.
pub fn run_service(orchestrator: &Orchestrator, stop: &StopSignal, observer: &dyn CycleObserver) -> usize {
    let interval = orchestrator.config().poll_interval;
    let mut cycles = 0;

    tracing::info!(
        root = %orchestrator.config().root.display(),
        interval_secs = interval.as_secs_f64(),
        workers = orchestrator.config().workers,
        "Driver loop started"
    );

    while !stop.is_stop_requested() {
        if let Err(e) = orchestrator.process_cycle(observer) {
            tracing::error!(error = %e, "Cycle failed");
        }
        cycles += 1;

        if stop.wait(interval) {
            break;
        }
    }

    tracing::info!(cycles, "Stop requested; driver loop exiting");
    cycles
}
