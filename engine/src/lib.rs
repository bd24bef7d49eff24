//! # Ingest Engine - Event File Validation Library
//!
//! A headless engine that picks up paired data/checksum files dropped into
//! an `Input` folder, validates them, writes a canonical result file and
//! moves every input pair into exactly one terminal folder.
//!
//! ## Overview
//!
//! For each `<id>.dat` / `<id>.md5` pair the engine:
//! - verifies the checksum
//! - resolves the `EventId|Details|Timestamp` header (any column order)
//! - parses every row, reporting all problems of the first bad row
//! - deduplicates by event id and sorts by (timestamp, event id)
//! - writes `Output/<id>.result.dat` plus its checksum and moves the pair
//!   to `Done`, or writes `Errors/<id>.error.txt` and moves it to `Errors`
//!
//! Files are processed in parallel and in isolation; finalization happens
//! on two dedicated sink threads.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use ingest_engine::{EngineConfig, NoopObserver, Orchestrator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::with_local_store(EngineConfig::new("/srv/events"))?;
//!
//! // One poll cycle over Input
//! let report = orchestrator.process_cycle(&NoopObserver)?;
//! println!("{} accepted, {} rejected", report.succeeded, report.failed);
//!
//! // Drain the sinks before exiting
//! let sinks = orchestrator.shutdown();
//! println!("{} files finalized", sinks.success.finalized + sinks.failure.finalized);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: FileHandle, EventRecord, Outcome and the naming convention
//! - **validation**: accumulated validation errors
//! - **error**: EngineError for I/O and setup failures
//! - **fs_ops**: the FileStore trait and its local implementation
//! - **checksums**: digest computation and verification
//! - **header** / **row** / **rows** / **reader**: parsing
//! - **pipeline**: the per-file state machine
//! - **discovery**: finding complete pairs
//! - **router**: success and failure sinks
//! - **batch**: the poll cycle and worker pool
//! - **service**: the periodic driver loop
//! - **progress**: cycle observer trait
//! - **config**: EngineConfig

pub mod batch;
pub mod checksums;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fs_ops;
pub mod header;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod router;
pub mod row;
pub mod rows;
pub mod service;
pub mod validation;

// Re-export main types and functions
pub use batch::{CycleReport, Orchestrator};
pub use checksums::{ChecksumAlgorithm, ChecksumValue};
pub use config::EngineConfig;
pub use error::EngineError;
pub use fs_ops::{FileStore, Folder, LocalFileStore};
pub use header::resolve_header;
pub use model::{DedupPolicy, EventRecord, FileHandle, HeaderIndexes, Outcome};
pub use pipeline::{process_file, PipelineSettings};
pub use progress::{CycleObserver, FileStatus, NoopObserver};
pub use router::{FileRegistry, OutcomeRouter, SinkReport, SinkStats};
pub use row::parse_row;
pub use rows::materialize;
pub use service::{run_once, run_service, StopSignal};
pub use validation::{Validation, ValidationErrors};
