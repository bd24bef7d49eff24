//! Per-file processing: verify, resolve header, parse rows, dedup and sort.
//!
//! Every step runs in order and the first failing step decides the
//! outcome. Content problems become `Outcome::Failure`; only I/O failures
//! escape as `EngineError`.

use std::collections::HashMap;

use crate::checksums::{self, ChecksumAlgorithm};
use crate::error::EngineError;
use crate::fs_ops::FileStore;
use crate::model::{DedupPolicy, EventRecord, FileHandle, Outcome};
use crate::reader::open_raw_event_data;
use crate::rows::parse_body;
use crate::validation::ValidationErrors;

/// Message recorded when the stored checksum does not match the data file.
pub const CHECKSUM_MISMATCH: &str = "MD5 doesnt match";

/// Knobs that change how a single file is processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSettings {
    pub algorithm: ChecksumAlgorithm,
    pub dedup: DedupPolicy,
}

/// Run the whole validation-and-transform pipeline for one file.
pub fn process_file(
    store: &dyn FileStore,
    file: &FileHandle,
    settings: PipelineSettings,
) -> Result<Outcome, EngineError> {
    tracing::debug!("Checking checksum");
    if !checksums::verify(store, file, settings.algorithm)? {
        tracing::warn!("Checksum mismatch");
        return Ok(failure(file, ValidationErrors::single(CHECKSUM_MISMATCH)));
    }

    let raw = match open_raw_event_data(store, file)? {
        Ok(raw) => raw,
        Err(errors) => {
            tracing::warn!(errors = %errors, "Errors found on the headers");
            return Ok(failure(file, errors));
        }
    };
    tracing::debug!(header = ?raw.header, "Headers parsed");

    let records = match parse_body(&raw.header, raw.rows)? {
        Ok(records) => records,
        Err(errors) => {
            tracing::warn!(errors = %errors, "Errors found on the body");
            return Ok(failure(file, errors));
        }
    };

    let parsed = records.len();
    let records = dedup_and_sort(records, settings.dedup);
    tracing::debug!(parsed, unique = records.len(), "Body parsed");

    Ok(Outcome::Success {
        file: file.clone(),
        records,
    })
}

fn failure(file: &FileHandle, errors: ValidationErrors) -> Outcome {
    Outcome::Failure {
        file: file.clone(),
        errors,
    }
}

/// Keep one record per event id, then order by (timestamp, event id).
pub fn dedup_and_sort(records: Vec<EventRecord>, policy: DedupPolicy) -> Vec<EventRecord> {
    let mut winners: HashMap<i64, EventRecord> = HashMap::with_capacity(records.len());

    for record in records {
        match policy {
            DedupPolicy::KeepFirst => {
                winners.entry(record.event_id).or_insert(record);
            }
            DedupPolicy::KeepLast => {
                winners.insert(record.event_id, record);
            }
        }
    }

    let mut unique: Vec<EventRecord> = winners.into_values().collect();
    unique.sort_by_key(EventRecord::sort_key);
    unique
}
