use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::SyncError;
use crate::ops::{query_all, NotionOps};

/// Key value → page id for every current row of the target database. Built
/// once before dispatch; merge-inserted pages are appended so later rows
/// with the same key update the page created earlier in the run.
#[derive(Debug)]
pub struct MergeIndex {
    by_key: RwLock<HashMap<String, String>>,
}

impl MergeIndex {
    /// Fetches all rows of the target database and indexes them by key
    /// (title) value. With `fail_on_duplicates`, a repeated key aborts the
    /// run before any write.
    pub async fn build(
        ops: &dyn NotionOps,
        database_id: &str,
        fail_on_duplicates: bool,
    ) -> Result<Self, SyncError> {
        let pages = query_all(ops, database_id).await?;
        let mut by_key = HashMap::with_capacity(pages.len());
        for page in pages {
            if page.archived {
                continue;
            }
            let Some(key) = page.title_text().filter(|k| !k.trim().is_empty()) else {
                continue;
            };
            if by_key.insert(key.clone(), page.id).is_some() {
                if fail_on_duplicates {
                    return Err(SyncError::DuplicateKey {
                        key,
                        origin: "database",
                    });
                }
                tracing::warn!(key, "database contains duplicate keys, the last one wins");
            }
        }
        tracing::debug!(rows = by_key.len(), "built merge index");
        Ok(MergeIndex {
            by_key: RwLock::new(by_key),
        })
    }

    pub fn empty() -> Self {
        MergeIndex {
            by_key: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.by_key.read().unwrap().get(key).cloned()
    }

    /// Records a page inserted during the run.
    pub fn insert(&self, key: String, page_id: String) {
        self.by_key.write().unwrap().insert(key, page_id);
    }

    pub fn len(&self) -> usize {
        self.by_key.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
