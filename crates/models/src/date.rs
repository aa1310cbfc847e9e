use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// A parsed date cell, normalized to the remote API's date payload: a
/// `YYYY-MM-DD` string for whole days, RFC 3339 when a time is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateValue {
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("could not parse '{0}' as a date or date-time")]
pub struct DateParseError(pub String);

/// The separator of a date range cell, `A .. B`.
const RANGE_SEPARATOR: &str = " .. ";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%B %d, %Y %H:%M",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d.%m.%Y",
];

/// Parses one cell of a `date`-typed column. `A .. B` denotes a range whose
/// endpoints are parsed independently.
pub fn parse_date_cell(raw: &str) -> Result<DateValue, DateParseError> {
    let raw = raw.trim();
    match raw.split_once(RANGE_SEPARATOR) {
        Some((start, end)) => Ok(DateValue {
            start: parse_single(start.trim())?,
            end: Some(parse_single(end.trim())?),
        }),
        None => Ok(DateValue {
            start: parse_single(raw)?,
            end: None,
        }),
    }
}

fn parse_single(raw: &str) -> Result<String, DateParseError> {
    // Offset-carrying timestamps keep their offset; everything else is
    // normalized without assuming a zone.
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.to_rfc3339());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(d.format("%Y-%m-%d").to_string());
        }
    }
    Err(DateParseError(raw.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn common_formats_are_parsed() {
        for (input, expect) in [
            ("2023-01-15", "2023-01-15"),
            ("2023/01/15", "2023-01-15"),
            ("15 January 2023", "2023-01-15"),
            ("15 Jan 2023", "2023-01-15"),
            ("January 15, 2023", "2023-01-15"),
            ("15.01.2023", "2023-01-15"),
            ("2023-01-15T10:30:00", "2023-01-15T10:30:00"),
            ("2023-01-15 10:30", "2023-01-15T10:30:00"),
        ] {
            let parsed = parse_date_cell(input).expect(input);
            assert_eq!(expect, parsed.start, "input: {input}");
            assert!(parsed.end.is_none());
        }
    }

    #[test]
    fn offsets_are_preserved() {
        let parsed = parse_date_cell("2023-01-15T10:30:00+02:00").unwrap();
        assert_eq!("2023-01-15T10:30:00+02:00", parsed.start);
    }

    #[test]
    fn ranges_are_parsed() {
        let parsed = parse_date_cell("2023-01-15 .. 16 January 2023").unwrap();
        assert_eq!("2023-01-15", parsed.start);
        assert_eq!(Some("2023-01-16".to_string()), parsed.end);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_date_cell("not a date").is_err());
        assert!(parse_date_cell("2023-01-15 .. never").is_err());
        assert!(parse_date_cell("").is_err());
    }
}
