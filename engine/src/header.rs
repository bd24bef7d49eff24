//! Header line resolution.

use crate::model::{HeaderIndexes, DETAILS_HEADER, EVENT_ID_HEADER, SEPARATOR, TIMESTAMP_HEADER};
use crate::validation::{zip, Validation, ValidationErrors};

/// Resolve the positions of the three required columns.
///
/// A wrong column count is reported on its own; otherwise every missing
/// column name is reported together, in EventId, Details, Timestamp order.
pub fn resolve_header(raw_line: Option<&str>) -> Validation<HeaderIndexes> {
    let raw_line = match raw_line {
        Some(line) if !line.is_empty() => line,
        _ => return Err(ValidationErrors::single("Empty headers")),
    };

    let fields: Vec<&str> = raw_line.split(SEPARATOR).collect();
    if fields.len() != 3 {
        return Err(ValidationErrors::single("Extra or missing headers"));
    }

    let position = |name: &'static str| {
        fields
            .iter()
            .position(|field| *field == name)
            .ok_or_else(|| ValidationErrors::single(format!("Missing {} header", name)))
    };

    zip(
        zip(position(EVENT_ID_HEADER), position(DETAILS_HEADER)),
        position(TIMESTAMP_HEADER),
    )
    .map(|((event_id_index, details_index), timestamp_index)| HeaderIndexes {
        event_id_index,
        details_index,
        timestamp_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_standard_order() {
        let indexes = resolve_header(Some("EventId|Details|Timestamp")).expect("valid header");
        assert_eq!(
            indexes,
            HeaderIndexes {
                event_id_index: 0,
                details_index: 1,
                timestamp_index: 2,
            }
        );
    }

    #[test]
    fn test_resolves_any_order() {
        let indexes = resolve_header(Some("Details|EventId|Timestamp")).expect("valid header");
        assert_eq!(indexes.details_index, 0);
        assert_eq!(indexes.event_id_index, 1);
        assert_eq!(indexes.timestamp_index, 2);

        let indexes = resolve_header(Some("Timestamp|Details|EventId")).expect("valid header");
        assert_eq!(indexes.timestamp_index, 0);
        assert_eq!(indexes.details_index, 1);
        assert_eq!(indexes.event_id_index, 2);
    }

    #[test]
    fn test_empty_header() {
        for input in [None, Some("")] {
            let errors = resolve_header(input).unwrap_err();
            assert_eq!(errors.messages(), &["Empty headers".to_string()]);
        }
    }

    #[test]
    fn test_wrong_field_count_is_single_error() {
        for input in ["EventId|Details|Timestamp|Extra", "EventId|Details", "Foo|Bar|Baz|Qux"] {
            let errors = resolve_header(Some(input)).unwrap_err();
            assert_eq!(errors.messages(), &["Extra or missing headers".to_string()]);
        }
    }

    #[test]
    fn test_one_missing_field() {
        let errors = resolve_header(Some("EventId|Detail|Timestamp")).unwrap_err();
        assert_eq!(errors.messages(), &["Missing Details header".to_string()]);
    }

    #[test]
    fn test_two_missing_fields() {
        let errors = resolve_header(Some("eventid|Details|time")).unwrap_err();
        assert_eq!(
            errors.messages(),
            &[
                "Missing EventId header".to_string(),
                "Missing Timestamp header".to_string(),
            ]
        );
    }

    #[test]
    fn test_all_fields_missing() {
        let errors = resolve_header(Some("a|b|c")).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.messages(),
            &[
                "Missing EventId header".to_string(),
                "Missing Details header".to_string(),
                "Missing Timestamp header".to_string(),
            ]
        );
    }

    #[test]
    fn test_duplicate_name_reports_missing_one() {
        let errors = resolve_header(Some("EventId|EventId|Timestamp")).unwrap_err();
        assert_eq!(errors.messages(), &["Missing Details header".to_string()]);
    }
}
