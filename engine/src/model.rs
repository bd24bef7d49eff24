//! Core data model for the ingest pipeline.
//!
//! This module defines:
//! - FileHandle: one paired data + checksum file waiting in `Input`
//! - HeaderIndexes: where each required column sits in a data file
//! - EventRecord: a parsed, validated row
//! - Outcome: the terminal result of processing one file
//! - the persisted naming convention (extensions, headers, separator)

use chrono::NaiveDateTime;
use std::fmt;
use std::path::PathBuf;

use crate::validation::ValidationErrors;

/// Field separator for every delimited file the engine reads or writes.
pub const SEPARATOR: char = '|';

/// UTF-8 byte-order mark some producers put at the start of a text file.
pub const BYTE_ORDER_MARK: char = '\u{FEFF}';

/// Input data file extension.
pub const DATA_EXTENSION: &str = "dat";
/// Checksum file extension (input and output).
pub const CHECKSUM_EXTENSION: &str = "md5";

/// Required column names.
pub const EVENT_ID_HEADER: &str = "EventId";
pub const DETAILS_HEADER: &str = "Details";
pub const TIMESTAMP_HEADER: &str = "Timestamp";

/// One data file and its companion checksum under a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// Root containing the Input/Output/Errors/Done folders
    pub root_path: PathBuf,

    /// Logical id shared by `<id>.dat` and `<id>.md5`
    pub file_id: String,

    /// Number of body rows to skip (already processed)
    pub starting_at_row: usize,
}

impl FileHandle {
    pub fn new(root_path: impl Into<PathBuf>, file_id: impl Into<String>, starting_at_row: usize) -> Self {
        FileHandle {
            root_path: root_path.into(),
            file_id: file_id.into(),
            starting_at_row,
        }
    }

    /// `<id>.dat`
    pub fn data_file_name(&self) -> String {
        format!("{}.{}", self.file_id, DATA_EXTENSION)
    }

    /// `<id>.md5`
    pub fn checksum_file_name(&self) -> String {
        format!("{}.{}", self.file_id, CHECKSUM_EXTENSION)
    }

    /// `<id>.result.dat`
    pub fn result_data_file_name(&self) -> String {
        format!("{}.result.{}", self.file_id, DATA_EXTENSION)
    }

    /// `<id>.result.md5`
    pub fn result_checksum_file_name(&self) -> String {
        format!("{}.result.{}", self.file_id, CHECKSUM_EXTENSION)
    }

    /// `<id>.error.txt`
    pub fn error_report_file_name(&self) -> String {
        format!("{}.error.txt", self.file_id)
    }
}

/// Zero-based column positions resolved from a header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderIndexes {
    pub event_id_index: usize,
    pub details_index: usize,
    pub timestamp_index: usize,
}

/// A validated event row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub event_id: i64,
    pub details: String,
    pub timestamp: NaiveDateTime,
}

impl EventRecord {
    /// Ordering key used for output files.
    pub fn sort_key(&self) -> (NaiveDateTime, i64) {
        (self.timestamp, self.event_id)
    }
}

/// Which occurrence survives when several rows share an event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    /// First row in file order wins
    KeepFirst,
    /// Last row in file order wins
    #[default]
    KeepLast,
}

impl DedupPolicy {
    /// Parse policy from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "first" | "keep-first" => Some(Self::KeepFirst),
            "last" | "keep-last" => Some(Self::KeepLast),
            _ => None,
        }
    }
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupPolicy::KeepFirst => write!(f, "keep-first"),
            DedupPolicy::KeepLast => write!(f, "keep-last"),
        }
    }
}

/// Terminal result of processing one file in a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Unique records sorted by (timestamp, event id)
    Success {
        file: FileHandle,
        records: Vec<EventRecord>,
    },
    /// Every problem that rejected the file
    Failure {
        file: FileHandle,
        errors: ValidationErrors,
    },
}

impl Outcome {
    pub fn file(&self) -> &FileHandle {
        match self {
            Outcome::Success { file, .. } | Outcome::Failure { file, .. } => file,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}
