//! Turning a stream of parsed rows into a file-level result.

use crate::error::EngineError;
use crate::model::{EventRecord, HeaderIndexes};
use crate::row::parse_row;
use crate::validation::Validation;

/// Collect row results in order, stopping at the first invalid row.
///
/// Nothing after the first `Err` is pulled from `rows`, so a malformed file
/// is never read to the end.
pub fn materialize<I>(rows: I) -> Validation<Vec<EventRecord>>
where
    I: IntoIterator<Item = Validation<EventRecord>>,
{
    rows.into_iter().collect()
}

/// Parse every body line, tagging row errors with their row number.
///
/// A read failure ends the stream and is returned as the outer error,
/// taking precedence over whatever was parsed before it.
pub fn parse_body<I>(header: &HeaderIndexes, lines: I) -> Result<Validation<Vec<EventRecord>>, EngineError>
where
    I: IntoIterator<Item = Result<(usize, String), EngineError>>,
{
    let mut read_error = None;

    let parsed = lines
        .into_iter()
        .map_while(|line| match line {
            Ok(line) => Some(line),
            Err(e) => {
                read_error = Some(e);
                None
            }
        })
        .map(|(row_number, line)| {
            parse_row(header, Some(&line)).map_err(|errors| errors.on_row(row_number))
        });

    let records = materialize(parsed);

    match read_error {
        Some(e) => Err(e),
        None => Ok(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrors;
    use chrono::NaiveDate;
    use std::cell::Cell;
    use std::io;
    use std::path::PathBuf;

    const STANDARD: HeaderIndexes = HeaderIndexes {
        event_id_index: 0,
        details_index: 1,
        timestamp_index: 2,
    };

    fn record(event_id: i64) -> EventRecord {
        EventRecord {
            event_id,
            details: format!("event {}", event_id),
            timestamp: NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_materialize_keeps_row_order() {
        let rows = vec![Ok(record(3)), Ok(record(1)), Ok(record(2))];
        let records = materialize(rows).expect("all rows valid");
        let ids: Vec<i64> = records.iter().map(|r| r.event_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_materialize_empty_is_success() {
        let records = materialize(Vec::new()).expect("no rows is valid");
        assert!(records.is_empty());
    }

    #[test]
    fn test_materialize_stops_at_first_error() {
        let pulled = Cell::new(0);
        let rows = (0..10).map(|i| {
            pulled.set(pulled.get() + 1);
            match i {
                2 => Err(ValidationErrors::single("bad row")),
                3.. => panic!("row {} should never be evaluated", i),
                _ => Ok(record(i)),
            }
        });

        let errors = materialize(rows).unwrap_err();
        assert_eq!(errors.messages(), &["bad row".to_string()]);
        assert_eq!(pulled.get(), 3);
    }

    #[test]
    fn test_parse_body_enriches_errors() {
        let lines = vec![
            Ok((0, "1|a|1/1/2020 1:00:00 AM".to_string())),
            Ok((1, "x|b|nope".to_string())),
        ];
        let errors = parse_body(&STANDARD, lines)
            .expect("no read errors")
            .unwrap_err();
        assert_eq!(
            errors.messages(),
            &[
                "Not a valid event Id, on Row number 1".to_string(),
                "Not a valid timestamp, on Row number 1".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_body_empty_row_number() {
        let lines = (0..6).map(|i| {
            let line = if i == 5 { String::new() } else { format!("{}|d|1/1/2020 1:00:00 AM", i) };
            Ok((i, line))
        });
        let errors = parse_body(&STANDARD, lines)
            .expect("no read errors")
            .unwrap_err();
        assert_eq!(errors.messages(), &["Empty Row, on Row number 5".to_string()]);
        assert!(errors.messages()[0].ends_with(" on Row number 5"));
    }

    #[test]
    fn test_parse_body_read_error_wins() {
        let lines = vec![
            Ok((0, "1|a|1/1/2020 1:00:00 AM".to_string())),
            Err(EngineError::ReadError {
                path: PathBuf::from("Input/A.dat"),
                source: io::Error::new(io::ErrorKind::Other, "disk gone"),
            }),
        ];
        assert!(matches!(
            parse_body(&STANDARD, lines),
            Err(EngineError::ReadError { .. })
        ));
    }
}
