use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::types::{FileUploadHandle, FileUploadSlot, PageObject, QueryPage, UserObject, UserPage};
use crate::validate::validate_token;
use crate::Error;

const API_BASE: &str = "https://api.notion.com/v1/";
const API_VERSION: &str = "2022-06-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const QUERY_PAGE_SIZE: u32 = 100;

/// Client for the hosted database API. Cheap to clone; clones share the
/// write limiter and connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base: url::Url,
    token: String,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl Client {
    /// Builds a client, validating the token prefix before any request is
    /// issued.
    pub fn new(token: &str) -> Result<Self, Error> {
        validate_token(token)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Client {
            http,
            base: url::Url::parse(API_BASE).expect("static URL parses"),
            token: token.to_string(),
            limiter: Arc::new(RateLimiter::new(3.0)),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_write_rate(mut self, per_second: f64) -> Self {
        self.limiter = Arc::new(RateLimiter::new(per_second));
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Issues one API request with rate limiting (writes only) and
    /// transient-error retry. 429 responses honour the server-advised
    /// interval when present.
    async fn request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
        limited: bool,
    ) -> Result<T, Error> {
        let url = self.base.join(path).expect("api paths are valid");
        let mut attempt = 0u32;
        loop {
            if limited {
                self.limiter.acquire().await;
            }

            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.token)
                .header("Notion-Version", API_VERSION);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let outcome = match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json::<T>().await?);
                    }
                    let advised = retry_after(&response);
                    let (code, message) = error_body(response).await;
                    let err = Error::Api {
                        status: status.as_u16(),
                        code,
                        message,
                    };
                    (err, advised)
                }
                Err(err) => (Error::Http(err), None),
            };

            let (err, advised) = outcome;
            if !err.is_transient() {
                return Err(err);
            }
            attempt += 1;
            let Some(backoff) = self.retry.next_backoff(attempt) else {
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            };
            let wait = advised.map(|d| self.retry.clamp(d)).unwrap_or(backoff);
            tracing::warn!(
                attempt,
                wait_secs = wait.as_secs_f64(),
                error = %err,
                "transient API error, backing off"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Retrieves the database object, including its full property schema.
    pub async fn get_database(&self, database_id: &str) -> Result<models::Schema, Error> {
        let object: Value = self
            .request(
                reqwest::Method::GET,
                &format!("databases/{database_id}"),
                None,
                false,
            )
            .await?;
        models::Schema::from_database_object(database_id.to_string(), &object).map_err(|err| {
            Error::Api {
                status: 200,
                code: "invalid_schema".to_string(),
                message: err.to_string(),
            }
        })
    }

    /// Patches the database object: add properties, rename the title
    /// property, create options.
    pub async fn update_database(&self, database_id: &str, patch: Value) -> Result<(), Error> {
        let _: Value = self
            .request(
                reqwest::Method::PATCH,
                &format!("databases/{database_id}"),
                Some(&patch),
                true,
            )
            .await?;
        Ok(())
    }

    /// One page of database rows, cursor-based.
    pub async fn query_database_page(
        &self,
        database_id: &str,
        cursor: Option<&str>,
    ) -> Result<QueryPage, Error> {
        let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        self.request(
            reqwest::Method::POST,
            &format!("databases/{database_id}/query"),
            Some(&body),
            false,
        )
        .await
    }

    /// Every row of the database, across all pages. The remote pages at 100
    /// rows; continuation cursors are followed until exhausted.
    pub async fn query_database_all(&self, database_id: &str) -> Result<Vec<PageObject>, Error> {
        let client = self.clone();
        let target = database_id.to_string();
        let results = crate::pagination::collect_all::<QueryPage, _, _, Error>(move |cursor| {
            let client = client.clone();
            let target = target.clone();
            async move { client.query_database_page(&target, cursor.as_deref()).await }
        })
        .await?;
        tracing::debug!(rows = results.len(), database_id, "fetched all database rows");
        Ok(results)
    }

    /// Creates a page (row) in the database. `icon` and `cover` ride on the
    /// same request so a failure surfaces as a single error.
    pub async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
        icon: Option<Value>,
        cover: Option<Value>,
    ) -> Result<PageObject, Error> {
        let mut body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        if let Some(icon) = icon {
            body["icon"] = icon;
        }
        if let Some(cover) = cover {
            body["cover"] = cover;
        }
        self.request(reqwest::Method::POST, "pages", Some(&body), true)
            .await
    }

    /// Updates properties (and optionally icon/cover) of an existing page.
    pub async fn update_page(
        &self,
        page_id: &str,
        properties: Value,
        icon: Option<Value>,
        cover: Option<Value>,
    ) -> Result<PageObject, Error> {
        let mut body = json!({ "properties": properties });
        if let Some(icon) = icon {
            body["icon"] = icon;
        }
        if let Some(cover) = cover {
            body["cover"] = cover;
        }
        self.request(
            reqwest::Method::PATCH,
            &format!("pages/{page_id}"),
            Some(&body),
            true,
        )
        .await
    }

    /// Soft-deletes a page.
    pub async fn archive_page(&self, page_id: &str) -> Result<(), Error> {
        let _: Value = self
            .request(
                reqwest::Method::PATCH,
                &format!("pages/{page_id}"),
                Some(&json!({ "archived": true })),
                true,
            )
            .await?;
        Ok(())
    }

    /// Appends child blocks to a page body.
    pub async fn append_blocks(&self, page_id: &str, children: Value) -> Result<(), Error> {
        let _: Value = self
            .request(
                reqwest::Method::PATCH,
                &format!("blocks/{page_id}/children"),
                Some(&json!({ "children": children })),
                true,
            )
            .await?;
        Ok(())
    }

    /// All workspace members, across pages.
    pub async fn list_users(&self) -> Result<Vec<UserObject>, Error> {
        let client = self.clone();
        crate::pagination::collect_all::<UserPage, _, _, Error>(move |cursor| {
            let client = client.clone();
            async move {
                let path = match cursor {
                    Some(cursor) => {
                        format!("users?page_size={QUERY_PAGE_SIZE}&start_cursor={cursor}")
                    }
                    None => format!("users?page_size={QUERY_PAGE_SIZE}"),
                };
                client.request(reqwest::Method::GET, &path, None, false).await
            }
        })
        .await
    }

    /// Uploads a local file: allocate a slot, stream the bytes to the signed
    /// URL, finalize. Returns the stable handle.
    pub async fn upload_file(&self, path: &Path) -> Result<FileUploadHandle, Error> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let content_type = content_type_for(&filename);

        let bytes = tokio::fs::read(path).await.map_err(|source| Error::UploadRead {
            path: path.display().to_string(),
            source,
        })?;

        let slot: FileUploadSlot = self
            .request(
                reqwest::Method::POST,
                "file_uploads",
                Some(&json!({ "filename": filename, "mode": "single_part" })),
                true,
            )
            .await?;

        // The upload URL is pre-signed: no bearer auth, no API version.
        let response = self
            .http
            .put(&slot.upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type.as_ref())
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let (code, message) = error_body(response).await;
            return Err(Error::Api {
                status,
                code,
                message,
            });
        }

        let _: Value = self
            .request(
                reqwest::Method::POST,
                &format!("file_uploads/{}/complete", slot.id),
                Some(&json!({})),
                true,
            )
            .await?;

        tracing::debug!(file = %path.display(), upload_id = %slot.id, "uploaded file");
        Ok(FileUploadHandle {
            id: slot.id,
            filename,
        })
    }
}

fn content_type_for(filename: &str) -> mime::Mime {
    let extension = filename.rsplit('.').next().unwrap_or_default();
    match extension.to_ascii_lowercase().as_str() {
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "svg" => mime::IMAGE_SVG,
        "pdf" => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<f64>()
        .ok()
        .map(Duration::from_secs_f64)
}

async fn error_body(response: reqwest::Response) -> (String, String) {
    match response.json::<Value>().await {
        Ok(body) => {
            let code = body
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("(no message)")
                .to_string();
            (code, message)
        }
        Err(_) => ("unknown".to_string(), "(unreadable body)".to_string()),
    }
}
