//! Reader for character-separated input, typically comma-separated.

use std::fs;
use std::path::Path;

use csv::StringRecord;
use indexmap::IndexMap;

use super::{check_row_invariants, Cell, ReadError, Row, Table};
use crate::config::ReadConfig;

pub fn read_csv(config: &ReadConfig, path: &Path) -> Result<Table, ReadError> {
    let file = fs::File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        // Rows may have fewer columns than the header; padding with empty
        // cells happens below.
        .flexible(true)
        .from_reader(file);

    let raw_header: Vec<String> = reader
        .headers()?
        .into_iter()
        .map(|h| h.to_string())
        .collect();

    // Deduplicate the header keeping first-occurrence position. Positions of
    // every occurrence are kept so that the last occurrence's value wins when
    // a row is mapped.
    let mut columns: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (position, name) in raw_header.into_iter().enumerate() {
        let occurrences = columns.entry(name.clone()).or_default();
        if !occurrences.is_empty() {
            if config.fail_on_duplicate_columns {
                return Err(ReadError::DuplicateColumn(name));
            }
            tracing::warn!(column = %name, "duplicate CSV column, the last occurrence wins");
        }
        occurrences.push(position);
    }
    let header: Vec<String> = columns.keys().cloned().collect();

    let mut records = reader.into_records();

    // The stream is lazy, but the one-data-row minimum is validated now by
    // pulling the first record and chaining it back in front of the rest.
    let first = match records.next() {
        Some(record) => record,
        None => return Err(ReadError::EmptyInput),
    };

    let columns: Vec<(String, Vec<usize>)> = columns.into_iter().collect();
    let rows = std::iter::once(first)
        .chain(records)
        .enumerate()
        .map(move |(offset, record)| to_row(offset as u64 + 1, record?, &columns));

    let key_column = header[0].clone();
    Ok(Table {
        header,
        rows: check_row_invariants(
            key_column,
            config.mandatory_columns.clone(),
            Box::new(rows),
        ),
    })
}

fn to_row(
    index: u64,
    record: StringRecord,
    columns: &[(String, Vec<usize>)],
) -> Result<Row, ReadError> {
    let mut cells = IndexMap::with_capacity(columns.len());
    for (name, occurrences) in columns {
        // With duplicate headers the value read is the last occurrence's;
        // short records fall back to earlier occurrences, then empty.
        let value = occurrences
            .iter()
            .rev()
            .find_map(|position| record.get(*position))
            .unwrap_or_default();
        cells.insert(name.clone(), Cell::String(value.to_string()));
    }
    Ok(Row { index, cells })
}
