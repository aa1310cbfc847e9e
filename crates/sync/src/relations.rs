use std::collections::HashMap;
use std::sync::Arc;

use models::PropertyValue;
use regex::Regex;

use crate::error::SyncError;
use crate::ops::{query_all, NotionOps};

lazy_static::lazy_static! {
    static ref PAGE_ID: Regex = Regex::new(r"([0-9a-fA-F]{32})(?:\?.*)?$").unwrap();
}

/// How an unresolved relation fragment is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissingRelation {
    Drop,
    Add,
    Fail,
}

/// The lazily loaded rows of one linked database, addressed by title.
struct LinkedIndex {
    /// Name of the linked database's title property, needed to insert rows.
    title_property: String,
    /// Title → page id. Ambiguous titles resolve to the page whose id sorts
    /// first, unless the strict flag turned ambiguity into a fatal error at
    /// load time.
    by_title: HashMap<String, String>,
}

type IndexState = Arc<tokio::sync::Mutex<Option<Arc<tokio::sync::Mutex<LinkedIndex>>>>>;

/// Resolves relation fragments to page references, loading each linked
/// database at most once and serializing lookup-then-insert so concurrent
/// workers cannot create the same referent twice.
pub struct RelationResolver {
    ops: Arc<dyn NotionOps>,
    on_missing: OnMissingRelation,
    fail_on_duplicates: bool,
    states: std::sync::Mutex<HashMap<String, IndexState>>,
}

/// The outcome of resolving one fragment.
#[derive(Debug)]
pub enum Resolution {
    Page(String),
    /// The fragment had no match and the policy is to drop it.
    Dropped,
    /// The fragment had no match and the policy is to fail the row.
    Unresolved,
}

impl RelationResolver {
    pub fn new(
        ops: Arc<dyn NotionOps>,
        on_missing: OnMissingRelation,
        fail_on_duplicates: bool,
    ) -> Self {
        RelationResolver {
            ops,
            on_missing,
            fail_on_duplicates,
            states: Default::default(),
        }
    }

    /// Resolves one comma-fragment of a relation cell: a page URL of the
    /// linked database is used directly, anything else is a title lookup.
    pub async fn resolve(
        &self,
        database_id: &str,
        fragment: &str,
    ) -> Result<Resolution, SyncError> {
        if let Some(page_id) = page_id_from_url(fragment) {
            return Ok(Resolution::Page(page_id));
        }

        let index = self.index_for(database_id).await?;
        let mut index = index.lock().await;

        if let Some(page_id) = index.by_title.get(fragment) {
            return Ok(Resolution::Page(page_id.clone()));
        }

        match self.on_missing {
            OnMissingRelation::Drop => {
                tracing::warn!(
                    fragment,
                    database_id,
                    "relation value has no match in the linked database, dropping"
                );
                Ok(Resolution::Dropped)
            }
            OnMissingRelation::Fail => Ok(Resolution::Unresolved),
            OnMissingRelation::Add => {
                // Lookup-then-insert stays inside the index lock, so a
                // concurrent worker with the same fragment waits and then
                // finds the page we create here.
                let mut properties = serde_json::Map::new();
                properties.insert(
                    index.title_property.clone(),
                    serde_json::to_value(PropertyValue::title(fragment))
                        .expect("property values serialize"),
                );
                let page = self
                    .ops
                    .create_page(database_id, serde_json::Value::Object(properties), None, None)
                    .await?;
                tracing::info!(fragment, database_id, "created missing linked-database row");
                index
                    .by_title
                    .insert(fragment.to_string(), page.id.clone());
                Ok(Resolution::Page(page.id))
            }
        }
    }

    /// Forces the linked database to load now, surfacing strict-mode
    /// duplicate-title errors before any row is dispatched.
    pub async fn preload(&self, database_id: &str) -> Result<(), SyncError> {
        self.index_for(database_id).await.map(|_| ())
    }

    /// The loaded index of `database_id`, fetching it on first use. Uses the
    /// same two-level locking as the file cache so concurrent first uses
    /// coalesce onto one fetch.
    async fn index_for(
        &self,
        database_id: &str,
    ) -> Result<Arc<tokio::sync::Mutex<LinkedIndex>>, SyncError> {
        let state = {
            let mut states = self.states.lock().unwrap();
            states
                .entry(database_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
                .clone()
        };

        let mut state = state.lock().await;
        if let Some(index) = &*state {
            return Ok(index.clone());
        }

        let index = self.load(database_id).await?;
        let index = Arc::new(tokio::sync::Mutex::new(index));
        *state = Some(index.clone());
        Ok(index)
    }

    async fn load(&self, database_id: &str) -> Result<LinkedIndex, SyncError> {
        let schema = self.ops.get_schema(database_id).await?;
        let pages = query_all(self.ops.as_ref(), database_id).await?;

        let mut by_title: HashMap<String, String> = HashMap::new();
        for page in pages {
            let Some(title) = page.title_text().filter(|t| !t.is_empty()) else {
                continue;
            };
            match by_title.get(&title) {
                None => {
                    by_title.insert(title, page.id);
                }
                Some(existing) => {
                    if self.fail_on_duplicates {
                        return Err(SyncError::RelationDuplicates {
                            database_id: database_id.to_string(),
                            title,
                        });
                    }
                    tracing::warn!(
                        title,
                        database_id,
                        "linked database has duplicate titles, keeping the first by id order"
                    );
                    if page.id < *existing {
                        by_title.insert(title, page.id);
                    }
                }
            }
        }

        tracing::debug!(
            database_id,
            rows = by_title.len(),
            "loaded linked database index"
        );
        Ok(LinkedIndex {
            title_property: schema.title().name.clone(),
            by_title,
        })
    }
}

/// Extracts the page id from a hosted-service page URL, or None when the
/// fragment is not such a URL.
fn page_id_from_url(fragment: &str) -> Option<String> {
    let url = url::Url::parse(fragment).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    if !(host == "notion.so"
        || host.ends_with(".notion.so")
        || host == "notion.site"
        || host.ends_with(".notion.site"))
    {
        return None;
    }
    let segment = url.path_segments()?.last()?;
    let tail = segment.rsplit('-').next()?;
    PAGE_ID
        .captures(tail)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}
