mod character_separated;
mod json;

use std::io;
use std::path::Path;

use indexmap::IndexMap;

use crate::config::ReadConfig;

/// A raw cell value: a JSON string for CSV input, any JSON scalar or array
/// for JSON input. No type coercion happens in this crate.
pub type Cell = serde_json::Value;

/// One input row: the ordered mapping from column name to raw cell value,
/// plus the 1-based data row number used in error reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub index: u64,
    pub cells: IndexMap<String, Cell>,
}

impl Row {
    /// The cell of `column`, rendered as a trimmed string; None when absent,
    /// null, or blank. Arrays are not flattened here.
    pub fn text(&self, column: &str) -> Option<String> {
        match self.cells.get(column) {
            Some(Cell::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Some(Cell::Number(n)) => Some(n.to_string()),
            Some(Cell::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Lazily yields rows; an `Err` item is a malformed or invariant-violating
/// row, and iteration may continue past it.
pub type RowStream = Box<dyn Iterator<Item = Result<Row, ReadError>> + Send>;

/// The output of reading one input file.
pub struct Table {
    /// Ordered, deduplicated column names. The first column is the key
    /// column.
    pub header: Vec<String>,
    pub rows: RowStream,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("header", &self.header)
            .field("rows", &"RowStream")
            .finish()
    }
}

/// Error type returned by all read operations.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("unsupported input file extension: '{0}'. expected .csv or .json")]
    UnsupportedExtension(String),

    #[error("failed to read input file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse CSV content: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to parse JSON content: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON input must be an array of objects")]
    JsonNotAnArray,

    #[error("JSON row {0} is not an object")]
    JsonRowNotAnObject(u64),

    #[error("a payload key column is required for JSON input")]
    MissingPayloadKey,

    #[error("JSON row {0} is missing the payload key column '{1}'")]
    JsonRowMissingKey(u64, String),

    #[error("input file has a header but no data rows")]
    EmptyInput,

    #[error("duplicate column '{0}' in the CSV header")]
    DuplicateColumn(String),

    #[error("mandatory column '{0}' is missing from the header")]
    MissingMandatoryColumn(String),

    #[error("row {0}: mandatory column '{1}' is empty")]
    EmptyMandatoryCell(u64, String),

    #[error("row {0}: the key column '{1}' is empty")]
    EmptyKeyCell(u64, String),
}

impl ReadError {
    /// Row-scoped errors are recorded against the row and skipped; anything
    /// else aborts the read.
    pub fn row_index(&self) -> Option<u64> {
        match self {
            ReadError::EmptyMandatoryCell(row, _) | ReadError::EmptyKeyCell(row, _) => Some(*row),
            _ => None,
        }
    }
}

/// Reads `path` according to its extension and returns the ordered header
/// plus a lazy row stream. Validates header-level invariants (duplicates,
/// mandatory columns, at least one data row) before returning.
pub fn read_file(config: &ReadConfig, path: &Path) -> Result<Table, ReadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let table = match extension.as_str() {
        "csv" => character_separated::read_csv(config, path)?,
        "json" => json::read_json(config, path)?,
        other => return Err(ReadError::UnsupportedExtension(other.to_string())),
    };

    for mandatory in &config.mandatory_columns {
        if !table.header.contains(mandatory) {
            return Err(ReadError::MissingMandatoryColumn(mandatory.clone()));
        }
    }

    tracing::debug!(columns = table.header.len(), format = %extension, "resolved input header");
    Ok(table)
}

/// Wraps a row stream with the per-row invariant checks: non-empty key
/// column, non-empty mandatory columns. Violations become `Err` items.
pub(crate) fn check_row_invariants(
    key_column: String,
    mandatory_columns: Vec<String>,
    rows: RowStream,
) -> RowStream {
    Box::new(rows.map(move |item| {
        let row = item?;
        if row.text(&key_column).is_none() {
            return Err(ReadError::EmptyKeyCell(row.index, key_column.clone()));
        }
        for column in &mandatory_columns {
            let empty = match row.cells.get(column) {
                None | Some(Cell::Null) => true,
                Some(Cell::String(s)) => s.trim().is_empty(),
                Some(Cell::Array(a)) => a.is_empty(),
                Some(_) => false,
            };
            if empty {
                return Err(ReadError::EmptyMandatoryCell(row.index, column.clone()));
            }
        }
        Ok(row)
    }))
}
