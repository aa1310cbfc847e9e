//! Reader for JSON input: a single array of objects.

use std::fs;
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;

use super::{check_row_invariants, Cell, ReadError, Row, Table};
use crate::config::ReadConfig;

pub fn read_json(config: &ReadConfig, path: &Path) -> Result<Table, ReadError> {
    let payload_key = config
        .payload_key_column
        .clone()
        .ok_or(ReadError::MissingPayloadKey)?;

    let file = fs::File::open(path)?;
    let content: Value = serde_json::from_reader(io::BufReader::new(file))?;
    let objects = match content {
        Value::Array(objects) => objects,
        _ => return Err(ReadError::JsonNotAnArray),
    };
    if objects.is_empty() {
        return Err(ReadError::EmptyInput);
    }

    // The header is the union of keys across all objects: the payload key
    // column first, the rest in first-occurrence order. Every object must
    // carry the payload key.
    let mut header: Vec<String> = vec![payload_key.clone()];
    let mut maps = Vec::with_capacity(objects.len());
    for (offset, object) in objects.into_iter().enumerate() {
        let index = offset as u64 + 1;
        let map = match object {
            Value::Object(map) => map,
            _ => return Err(ReadError::JsonRowNotAnObject(index)),
        };
        if !map.contains_key(&payload_key) {
            return Err(ReadError::JsonRowMissingKey(index, payload_key));
        }
        for key in map.keys() {
            if *key != payload_key && !header.contains(key) {
                header.push(key.clone());
            }
        }
        maps.push(map);
    }

    let columns = header.clone();
    let rows = maps.into_iter().enumerate().map(move |(offset, mut map)| {
        let mut cells = IndexMap::with_capacity(columns.len());
        for column in &columns {
            let value = map.remove(column).unwrap_or(Cell::Null);
            cells.insert(column.clone(), value);
        }
        Ok(Row {
            index: offset as u64 + 1,
            cells,
        })
    });

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
