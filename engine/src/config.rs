//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::checksums::ChecksumAlgorithm;
use crate::error::EngineError;
use crate::model::DedupPolicy;
use crate::pipeline::PipelineSettings;

/// Default time between two poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Everything the orchestrator and the driver loop need to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding Input/Output/Errors/Done
    pub root: PathBuf,

    /// Maximum number of files processed in parallel
    pub workers: usize,

    /// Digest used to verify inputs and to sign outputs
    pub algorithm: ChecksumAlgorithm,

    /// Which duplicate row survives
    pub dedup: DedupPolicy,

    /// Body rows to skip in every discovered file
    pub starting_at_row: usize,

    /// Time between two poll cycles
    pub poll_interval: Duration,
}

impl EngineConfig {
    /// Configuration with defaults for everything but the root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        EngineConfig {
            root: root.into(),
            workers: default_workers(),
            algorithm: ChecksumAlgorithm::default(),
            dedup: DedupPolicy::default(),
            starting_at_row: 0,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_starting_at_row(mut self, starting_at_row: usize) -> Self {
        self.starting_at_row = starting_at_row;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            algorithm: self.algorithm,
            dedup: self.dedup,
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.root.as_os_str().is_empty() {
            return Err(EngineError::InvalidConfig {
                reason: "root path is empty".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "workers must be at least 1".to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(EngineError::InvalidConfig {
                reason: "poll interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
