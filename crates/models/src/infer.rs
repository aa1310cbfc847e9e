use lazy_static::lazy_static;
use regex::Regex;

use crate::date::parse_date_cell;
use crate::types::ColumnType;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Parses a checkbox cell. Case-insensitive `true`/`false`; the empty cell is
/// handled by the caller (it converts to unchecked).
pub fn parse_checkbox(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parses a number cell as a decimal literal. Grouping characters are not
/// stripped: `1,000` and `1_000` are not numbers.
pub fn parse_number(value: &str) -> Option<f64> {
    if value.contains(',') || value.contains('_') {
        return None;
    }
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => None,
    }
}

pub fn is_url(value: &str) -> bool {
    match url::Url::parse(value.trim()) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value.trim())
}

/// Predicates are tested in order against every non-empty cell of the column;
/// the first type that accepts all of them wins. Mirrors the fixed parse
/// order of tabular-to-typed conversion: never proposes select, multi-select,
/// relation, or file types, which only make sense when declared.
const DETECTORS: &[(ColumnType, fn(&str) -> bool)] = &[
    (ColumnType::Checkbox, |v| parse_checkbox(v).is_some()),
    (ColumnType::Number, |v| parse_number(v).is_some()),
    (ColumnType::Url, is_url),
    (ColumnType::Email, is_email),
    (ColumnType::Date, |v| parse_date_cell(v).is_ok()),
];

/// Detects the column type from its non-empty cell values. Columns with no
/// content, or content matching no detector, are text.
pub fn infer_column_type<'v>(values: impl Iterator<Item = &'v str> + Clone) -> ColumnType {
    let mut non_empty = values.filter(|v| !v.trim().is_empty()).peekable();
    if non_empty.peek().is_none() {
        return ColumnType::Text;
    }
    for (column_type, accepts) in DETECTORS {
        if non_empty.clone().all(|v| accepts(v)) {
            return *column_type;
        }
    }
    ColumnType::Text
}

#[cfg(test)]
mod test {
    use super::*;

    fn infer(values: &[&str]) -> ColumnType {
        infer_column_type(values.iter().copied())
    }

    #[test]
    fn detector_order_is_respected() {
        assert_eq!(ColumnType::Checkbox, infer(&["true", "FALSE", "True"]));
        assert_eq!(ColumnType::Number, infer(&["1", "2.5", "-3e2"]));
        assert_eq!(
            ColumnType::Url,
            infer(&["https://example.com", "http://example.org/x"])
        );
        assert_eq!(ColumnType::Email, infer(&["a@b.co", "x.y@z.dev"]));
        assert_eq!(ColumnType::Date, infer(&["2023-01-15", "16 January 2023"]));
        assert_eq!(ColumnType::Text, infer(&["1", "two"]));
    }

    #[test]
    fn empty_cells_are_ignored() {
        assert_eq!(ColumnType::Number, infer(&["1", "", "  ", "2"]));
        assert_eq!(ColumnType::Text, infer(&[]));
        assert_eq!(ColumnType::Text, infer(&["", ""]));
    }

    #[test]
    fn grouping_characters_are_not_numbers() {
        assert_eq!(ColumnType::Text, infer(&["1,000"]));
        assert_eq!(ColumnType::Text, infer(&["1_000"]));
        assert!(parse_number("nan").is_none());
        assert!(parse_number("inf").is_none());
    }

    #[test]
    fn url_detection_requires_http_scheme_and_host() {
        assert!(!is_url("example.com"));
        assert!(!is_url("mailto:a@b.co"));
        assert!(!is_url("ftp://example.com"));
        assert!(is_url("https://example.com/page?v=1"));
    }
}
