//! Row parsing and the timestamp format shared by input and output files.
//!
//! Timestamps use the pattern `M/d/yyyy h:mm:ss tt`: month, day and hour
//! take one or two digits, the year exactly four, minutes and seconds
//! exactly two, followed by an `AM`/`PM` designator.

use chrono::NaiveDateTime;

use crate::model::{EventRecord, HeaderIndexes, SEPARATOR};
use crate::validation::{zip, Validation, ValidationErrors};

/// chrono equivalent of `M/d/yyyy h:mm:ss tt` for parsing
const PARSE_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";
/// chrono equivalent of `M/d/yyyy h:mm:ss tt` for rendering
const RENDER_FORMAT: &str = "%-m/%-d/%Y %-I:%M:%S %p";

/// Parse one body line into an event record.
///
/// Field count problems stop parsing immediately. The event id and
/// timestamp checks both run and both are reported when both fail.
pub fn parse_row(header: &HeaderIndexes, raw_line: Option<&str>) -> Validation<EventRecord> {
    let raw_line = match raw_line {
        Some(line) if !line.is_empty() => line,
        _ => return Err(ValidationErrors::single("Empty Row")),
    };

    let fields: Vec<&str> = raw_line.split(SEPARATOR).collect();
    if fields.len() > 3 {
        return Err(ValidationErrors::single("Extra field"));
    }
    if fields.len() < 3 {
        return Err(ValidationErrors::single("Missing a field"));
    }

    let event_id = fields[header.event_id_index]
        .parse::<i64>()
        .map_err(|_| ValidationErrors::single("Not a valid event Id"));
    let timestamp = parse_timestamp(fields[header.timestamp_index])
        .ok_or_else(|| ValidationErrors::single("Not a valid timestamp"));

    zip(event_id, timestamp).map(|(event_id, timestamp)| EventRecord {
        event_id,
        details: fields[header.details_index].to_string(),
        timestamp,
    })
}

/// Parse a timestamp written as `M/d/yyyy h:mm:ss tt`.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if !has_timestamp_shape(text) {
        return None;
    }
    NaiveDateTime::parse_from_str(text, PARSE_FORMAT).ok()
}

/// Render a timestamp as `M/d/yyyy h:mm:ss tt`.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(RENDER_FORMAT).to_string()
}

/// Digit-width check chrono's parser is too lenient for.
fn has_timestamp_shape(text: &str) -> bool {
    fn digits(part: &str, min: usize, max: usize) -> bool {
        (min..=max).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
    }

    let mut pieces = text.split(' ');
    let (date, time, designator) = match (pieces.next(), pieces.next(), pieces.next(), pieces.next()) {
        (Some(date), Some(time), Some(designator), None) => (date, time, designator),
        _ => return false,
    };

    let date: Vec<&str> = date.split('/').collect();
    let time: Vec<&str> = time.split(':').collect();

    date.len() == 3
        && digits(date[0], 1, 2)
        && digits(date[1], 1, 2)
        && digits(date[2], 4, 4)
        && time.len() == 3
        && digits(time[0], 1, 2)
        && digits(time[1], 2, 2)
        && digits(time[2], 2, 2)
        && (designator.eq_ignore_ascii_case("AM") || designator.eq_ignore_ascii_case("PM"))
}

/// Render a record as an output line: `timestamp|eventId|details`.
pub fn format_record(record: &EventRecord) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        format_timestamp(&record.timestamp),
        record.event_id,
        record.details,
        sep = SEPARATOR
    )
}
