//! End-to-end scenarios driven through the crate's public API against an
//! in-memory remote.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use models::{ColumnType, Property, Schema};
use notion_client::{Error, FileUploadHandle, PageObject, QueryPage, UserObject};
use serde_json::{json, Value};
use sync::{FailFlags, NotionOps, SyncConfig};
use tokio_util::sync::CancellationToken;

const PAGE_SIZE: usize = 100;

/// A self-contained remote: one schema per database, pages stored in wire
/// shape, counters for the interactions the scenarios assert on.
#[derive(Default)]
struct Remote {
    state: Mutex<RemoteState>,
}

#[derive(Default)]
struct RemoteState {
    schemas: HashMap<String, Vec<(String, ColumnType)>>,
    pages: HashMap<String, Vec<PageObject>>,
    updates: Vec<(String, Value)>,
    next_id: u64,
    uploads: u64,
    archived: u64,
    patches: u64,
}

fn page_json(id: &str, title: &str) -> PageObject {
    serde_json::from_value(json!({
        "id": id,
        "properties": {
            "Name": {
                "id": "title",
                "type": "title",
                "title": [{"plain_text": title, "text": {"content": title}}],
            },
        },
    }))
    .unwrap()
}

fn title_of(properties: &Value) -> String {
    properties
        .as_object()
        .into_iter()
        .flat_map(|map| map.values())
        .find_map(|value| value.get("title").and_then(Value::as_array))
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.pointer("/text/content").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

impl Remote {
    fn with_schema(database_id: &str, properties: &[(&str, ColumnType)]) -> Arc<Self> {
        let remote = Remote::default();
        remote.state.lock().unwrap().schemas.insert(
            database_id.to_string(),
            properties
                .iter()
                .map(|(name, ct)| (name.to_string(), *ct))
                .collect(),
        );
        Arc::new(remote)
    }

    fn seed_page(&self, database_id: &str, id: &str, title: &str) {
        self.state
            .lock()
            .unwrap()
            .pages
            .entry(database_id.to_string())
            .or_default()
            .push(page_json(id, title));
    }

    fn seed_pages(&self, database_id: &str, count: usize) {
        for i in 0..count {
            self.seed_page(database_id, &format!("p{i:03}"), &format!("k{i:03}"));
        }
    }

    fn pages(&self, database_id: &str) -> Vec<PageObject> {
        self.state
            .lock()
            .unwrap()
            .pages
            .get(database_id)
            .cloned()
            .unwrap_or_default()
    }

    fn updates(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().updates.clone()
    }

    fn uploads(&self) -> u64 {
        self.state.lock().unwrap().uploads
    }

    fn archived(&self) -> u64 {
        self.state.lock().unwrap().archived
    }
}

#[async_trait]
impl NotionOps for Remote {
    async fn get_schema(&self, database_id: &str) -> Result<Schema, Error> {
        let state = self.state.lock().unwrap();
        let properties = state
            .schemas
            .get(database_id)
            .cloned()
            .unwrap_or_else(|| vec![("Name".to_string(), ColumnType::Title)]);
        Ok(Schema {
            database_id: database_id.to_string(),
            properties: properties
                .into_iter()
                .map(|(name, column_type)| Property {
                    id: name.to_lowercase(),
                    name,
                    column_type,
                    options: Vec::new(),
                    relation_database_id: None,
                })
                .collect(),
        })
    }

    async fn update_database(&self, database_id: &str, patch: Value) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.patches += 1;
        // Added properties become part of the schema, in catalogue terms.
        if let Some(additions) = patch.get("properties").and_then(Value::as_object) {
            let added: Vec<(String, ColumnType)> = additions
                .iter()
                .filter_map(|(name, definition)| {
                    let api_name = definition.as_object()?.keys().next()?.clone();
                    let column_type = ColumnType::from_api_name(&api_name).ok()?;
                    Some((name.clone(), column_type))
                })
                .collect();
            state
                .schemas
                .entry(database_id.to_string())
                .or_insert_with(|| vec![("Name".to_string(), ColumnType::Title)])
                .extend(added);
        }
        Ok(())
    }

    async fn query_page(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<QueryPage, Error> {
        let state = self.state.lock().unwrap();
        let pages = state.pages.get(database_id).cloned().unwrap_or_default();
        let offset: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let results: Vec<PageObject> =
            pages.iter().skip(offset).take(PAGE_SIZE).cloned().collect();
        let has_more = offset + results.len() < pages.len();
        Ok(QueryPage {
            results,
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
        let page = page_json(&format!("new-{}", state.next_id), &title_of(&properties));
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
        state.updates.push((page_id.to_string(), properties));
        Ok(page_json(page_id, ""))
    }

    async fn archive_page(&self, _page_id: &str) -> Result<(), Error> {
        self.state.lock().unwrap().archived += 1;
        Ok(())
    }

    async fn append_blocks(&self, _page_id: &str, _children: Value) -> Result<(), Error> {
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserObject>, Error> {
        Ok(Vec::new())
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

fn table(content: &str) -> parser::Table {
    use std::io::Write;
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    let table = parser::read_file(&parser::ReadConfig::default(), file.path()).unwrap();
    // Drain eagerly so the tempfile may be dropped.
    parser::Table {
        header: table.header,
        rows: Box::new(table.rows.collect::<Vec<_>>().into_iter()),
    }
}

async fn run(
    remote: Arc<Remote>,
    table: parser::Table,
    config: SyncConfig,
) -> Result<sync::RunSummary, sync::SyncError> {
    sync::run(
        remote,
        None,
        table,
        ".".into(),
        "db-1",
        config,
        CancellationToken::new(),
    )
    .await
}

#[tokio::test]
async fn fresh_database_gets_two_text_rows() {
    let remote = Remote::with_schema("db-1", &[("Name", ColumnType::Title)]);
    let config = SyncConfig {
        add_missing_columns: true,
        ..Default::default()
    };

    let summary = run(remote.clone(), table("a,b\n1,x\n2,y\n"), config)
        .await
        .unwrap();
    assert_eq!(2, summary.inserted);
    assert_eq!(0, summary.failed());

    let pages = remote.pages("db-1");
    assert_eq!(2, pages.len());
    // Workers race, so arrival order is not guaranteed.
    let mut titles: Vec<String> = pages.iter().filter_map(|p| p.title_text()).collect();
    titles.sort();
    assert_eq!(vec!["1".to_string(), "2".to_string()], titles);
    // Column b held strings, so it was created as text.
    let schema = remote.get_schema("db-1").await.unwrap();
    assert_eq!(ColumnType::Text, schema.get("b").unwrap().column_type);
}

#[tokio::test]
async fn declared_number_type_writes_empty_for_unparseable_cells() {
    let remote = Remote::with_schema("db-1", &[("Name", ColumnType::Title)]);
    let config = SyncConfig {
        add_missing_columns: true,
        column_types: vec![ColumnType::Number],
        ..Default::default()
    };

    let summary = run(remote.clone(), table("a,b\n1,x\n2,y\n"), config)
        .await
        .unwrap();
    assert_eq!(0, summary.failed(), "without the strict flag the run succeeds");

    let schema = remote.get_schema("db-1").await.unwrap();
    assert_eq!(ColumnType::Number, schema.get("b").unwrap().column_type);
}

#[tokio::test]
async fn declared_number_type_fails_rows_when_strict() {
    let remote = Remote::with_schema("db-1", &[("Name", ColumnType::Title)]);
    let config = SyncConfig {
        add_missing_columns: true,
        column_types: vec![ColumnType::Number],
        fail: FailFlags {
            conversion_error: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let summary = run(remote, table("a,b\n1,x\n2,y\n"), config).await.unwrap();
    assert_eq!(2, summary.failed(), "both rows carry unparseable numbers");
    assert_eq!(0, summary.inserted);
}

#[tokio::test]
async fn merge_updates_matching_keys_and_inserts_the_rest() {
    let remote = Remote::with_schema(
        "db-1",
        &[("Name", ColumnType::Title), ("b", ColumnType::Text)],
    );
    remote.seed_page("db-1", "p1", "1");

    let config = SyncConfig {
        merge: true,
        ..Default::default()
    };
    let summary = run(remote.clone(), table("a,b\n1,new\n3,zzz\n"), config)
        .await
        .unwrap();

    assert_eq!(1, summary.updated);
    assert_eq!(1, summary.inserted);
    assert_eq!(2, remote.pages("db-1").len(), "one pre-existing plus one new");

    let updates = remote.updates();
    assert_eq!(1, updates.len());
    assert_eq!("p1", updates[0].0);
    assert_eq!(
        Some(&json!({"rich_text": [{"text": {"content": "new"}}]})),
        updates[0].1.get("b"),
    );
}

#[tokio::test]
async fn emoji_icon_sets_no_upload_in_motion() {
    let remote = Remote::with_schema("db-1", &[("Name", ColumnType::Title)]);
    let config = SyncConfig {
        icon_column: Some("ico".to_string()),
        ..Default::default()
    };

    let summary = run(remote.clone(), table("a,ico\n1,🚀\n"), config)
        .await
        .unwrap();
    assert_eq!(1, summary.inserted);
    assert_eq!(0, remote.uploads());
}

#[tokio::test]
async fn delete_all_archives_across_pages() {
    let remote = Remote::with_schema("db-1", &[("Name", ColumnType::Title)]);
    remote.seed_pages("db-1", 250);

    let summary = sync::delete_all(remote.clone(), "db-1", 5).await.unwrap();
    assert_eq!(250, summary.total);
    assert_eq!(0, summary.failed());
    assert_eq!(250, remote.archived());
}
