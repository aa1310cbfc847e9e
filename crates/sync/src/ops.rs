use std::path::Path;

use async_trait::async_trait;
use notion_client::{Error, FileUploadHandle, PageObject, QueryPage, UserObject};
use serde_json::Value;

/// The remote operations the pipeline needs. The converter and uploader
/// depend on this seam rather than the concrete client, which also breaks
/// the cycle between relation resolution and row insertion.
#[async_trait]
pub trait NotionOps: Send + Sync {
    async fn get_schema(&self, database_id: &str) -> Result<models::Schema, Error>;

    async fn update_database(&self, database_id: &str, patch: Value) -> Result<(), Error>;

    async fn query_page(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<QueryPage, Error>;

    async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
        icon: Option<Value>,
        cover: Option<Value>,
    ) -> Result<PageObject, Error>;

    async fn update_page(
        &self,
        page_id: &str,
        properties: Value,
        icon: Option<Value>,
        cover: Option<Value>,
    ) -> Result<PageObject, Error>;

    async fn archive_page(&self, page_id: &str) -> Result<(), Error>;

    async fn append_blocks(&self, page_id: &str, children: Value) -> Result<(), Error>;

    async fn list_users(&self) -> Result<Vec<UserObject>, Error>;

    async fn upload_file(&self, path: &Path) -> Result<FileUploadHandle, Error>;
}

#[async_trait]
impl NotionOps for notion_client::Client {
    async fn get_schema(&self, database_id: &str) -> Result<models::Schema, Error> {
        self.get_database(database_id).await
    }

    async fn update_database(&self, database_id: &str, patch: Value) -> Result<(), Error> {
        notion_client::Client::update_database(self, database_id, patch).await
    }

    async fn query_page(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<QueryPage, Error> {
        self.query_database_page(database_id, cursor.as_deref()).await
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
        icon: Option<Value>,
        cover: Option<Value>,
    ) -> Result<PageObject, Error> {
        notion_client::Client::create_page(self, database_id, properties, icon, cover).await
    }

    async fn update_page(
        &self,
        page_id: &str,
        properties: Value,
        icon: Option<Value>,
        cover: Option<Value>,
    ) -> Result<PageObject, Error> {
        notion_client::Client::update_page(self, page_id, properties, icon, cover).await
    }

    async fn archive_page(&self, page_id: &str) -> Result<(), Error> {
        notion_client::Client::archive_page(self, page_id).await
    }

    async fn append_blocks(&self, page_id: &str, children: Value) -> Result<(), Error> {
        notion_client::Client::append_blocks(self, page_id, children).await
    }

    async fn list_users(&self) -> Result<Vec<UserObject>, Error> {
        notion_client::Client::list_users(self).await
    }

    async fn upload_file(&self, path: &Path) -> Result<FileUploadHandle, Error> {
        notion_client::Client::upload_file(self, path).await
    }
}

/// Collects every row of `database_id` by following continuation cursors
/// until the remote reports no more pages.
pub async fn query_all(ops: &dyn NotionOps, database_id: &str) -> Result<Vec<PageObject>, Error> {
    let mut results = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = ops.query_page(database_id, cursor.take()).await?;
        results.extend(page.results);
        if page.has_more {
            cursor = page.next_cursor;
        } else {
            return Ok(results);
        }
    }
}
