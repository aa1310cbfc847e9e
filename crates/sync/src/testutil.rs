//! In-memory remote used by the crate's tests. Behaves like the hosted API
//! for the operations the pipeline exercises: pagination at 100 rows, page
//! creation with generated ids, upload slots, and archive.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;
use models::{ColumnType, Property, Schema};
use notion_client::{Error, FileUploadHandle, PageObject, QueryPage, UserObject};
use parser::{Cell, Row};
use serde_json::{json, Value};

use crate::ops::NotionOps;
use crate::reconcile::{EffectiveColumn, EffectiveSchema};

const PAGE_SIZE: usize = 100;

#[derive(Default)]
pub struct MockOps {
    state: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    pages: HashMap<String, Vec<PageObject>>,
    users: Vec<UserObject>,
    updated: HashMap<String, serde_json::Map<String, Value>>,
    next_id: u64,
    uploads: u64,
    queries: u64,
    database_patches: u64,
    appended_blocks: u64,
    archived: u64,
}

fn wire_page(id: &str, title: &str) -> PageObject {
    serde_json::from_value(json!({
        "id": id,
        "archived": false,
        "properties": {
            "Name": {
                "id": "title",
                "type": "title",
                "title": [{"plain_text": title, "text": {"content": title}}],
            },
        },
    }))
    .expect("mock pages deserialize")
}

/// The title content of a create-page payload, used to store the new page in
/// a queryable shape.
fn payload_title(properties: &Value) -> String {
    properties
        .as_object()
        .and_then(|map| {
            map.values().find_map(|value| {
                value.get("title").and_then(Value::as_array).map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| {
                            p.pointer("/text/content").and_then(Value::as_str)
                        })
                        .collect::<String>()
                })
            })
        })
        .unwrap_or_default()
}

impl MockOps {
    pub fn seed_linked_database(&self, database_id: &str, rows: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        let pages = state.pages.entry(database_id.to_string()).or_default();
        for (id, title) in rows {
            pages.push(wire_page(id, title));
        }
    }

    pub fn seed_users(&self, users: Vec<UserObject>) {
        self.state.lock().unwrap().users = users;
    }

    pub fn upload_count(&self) -> u64 {
        self.state.lock().unwrap().uploads
    }

    pub fn query_calls(&self) -> u64 {
        self.state.lock().unwrap().queries
    }

    pub fn database_patch_count(&self) -> u64 {
        self.state.lock().unwrap().database_patches
    }

    pub fn appended_block_count(&self) -> u64 {
        self.state.lock().unwrap().appended_blocks
    }

    pub fn archived_count(&self) -> u64 {
        self.state.lock().unwrap().archived
    }

    pub fn page_count(&self, database_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .pages
            .get(database_id)
            .map_or(0, Vec::len)
    }

    pub fn last_updated_properties(
        &self,
        page_id: &str,
    ) -> Option<serde_json::Map<String, Value>> {
        self.state.lock().unwrap().updated.get(page_id).cloned()
    }
}

#[async_trait]
impl NotionOps for MockOps {
    async fn get_schema(&self, database_id: &str) -> Result<Schema, Error> {
        Ok(Schema {
            database_id: database_id.to_string(),
            properties: vec![Property {
                id: "title".to_string(),
                name: "Name".to_string(),
                column_type: ColumnType::Title,
                options: Vec::new(),
                relation_database_id: None,
            }],
        })
    }

    async fn update_database(&self, _database_id: &str, _patch: Value) -> Result<(), Error> {
        self.state.lock().unwrap().database_patches += 1;
        Ok(())
    }

    async fn query_page(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<QueryPage, Error> {
        let mut state = self.state.lock().unwrap();
        state.queries += 1;
        let pages = state.pages.get(database_id).cloned().unwrap_or_default();

        let offset: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let slice: Vec<PageObject> = pages.iter().skip(offset).take(PAGE_SIZE).cloned().collect();
        let has_more = offset + slice.len() < pages.len();
        Ok(QueryPage {
            results: slice,
            next_cursor: has_more.then(|| (offset + PAGE_SIZE).to_string()),
            has_more,
        })
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
        _icon: Option<Value>,
        _cover: Option<Value>,
    ) -> Result<PageObject, Error> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("gen-{}", state.next_id);
        let page = wire_page(&id, &payload_title(&properties));
        state
            .pages
            .entry(database_id.to_string())
            .or_default()
            .push(page.clone());
        Ok(page)
    }

    async fn update_page(
        &self,
        page_id: &str,
        properties: Value,
        _icon: Option<Value>,
        _cover: Option<Value>,
    ) -> Result<PageObject, Error> {
        let mut state = self.state.lock().unwrap();
        let map = properties
            .as_object()
            .cloned()
            .unwrap_or_default();
        state.updated.insert(page_id.to_string(), map);
        Ok(wire_page(page_id, ""))
    }

    async fn archive_page(&self, _page_id: &str) -> Result<(), Error> {
        self.state.lock().unwrap().archived += 1;
        Ok(())
    }

    async fn append_blocks(&self, _page_id: &str, _children: Value) -> Result<(), Error> {
        self.state.lock().unwrap().appended_blocks += 1;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserObject>, Error> {
        Ok(self.state.lock().unwrap().users.clone())
    }

    async fn upload_file(&self, path: &Path) -> Result<FileUploadHandle, Error> {
        let mut state = self.state.lock().unwrap();
        state.uploads += 1;
        Ok(FileUploadHandle {
            id: format!("upload-{}", state.uploads),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }
}

pub fn effective(name: &str, column_type: ColumnType) -> EffectiveColumn {
    EffectiveColumn {
        input_name: name.to_string(),
        property_name: name.to_string(),
        column_type,
        options: Vec::new(),
        default_status: None,
        relation_database_id: None,
    }
}

pub fn effective_schema(columns: Vec<EffectiveColumn>) -> EffectiveSchema {
    EffectiveSchema {
        database_id: "db-1".to_string(),
        columns,
    }
}

pub fn schema_with(properties: &[(&str, ColumnType)]) -> Schema {
    Schema {
        database_id: "db-1".to_string(),
        properties: properties
            .iter()
            .map(|(name, column_type)| Property {
                id: name.to_lowercase(),
                name: name.to_string(),
                column_type: *column_type,
                options: Vec::new(),
                relation_database_id: None,
            })
            .collect(),
    }
}

pub fn row_of(cells: &[(&str, &str)]) -> Row {
    Row {
        index: 1,
        cells: cells
            .iter()
            .map(|(name, value)| (name.to_string(), Cell::String(value.to_string())))
            .collect::<IndexMap<String, Cell>>(),
    }
}

pub fn table_rows(cells: &[(&str, &str)]) -> (Vec<String>, Vec<Row>) {
    let header = cells.iter().map(|(name, _)| name.to_string()).collect();
    (header, vec![row_of(cells)])
}
