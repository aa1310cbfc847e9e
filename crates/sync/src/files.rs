use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notion_client::{Error, FileUploadHandle};

use crate::ops::NotionOps;

// UploadState is an upload which may be:
// - Finished (if Some)
// - Currently in flight (if locked)
// - Neither (None and not locked).
type UploadState = Arc<tokio::sync::Mutex<Option<FileUploadHandle>>>;

/// Per-run upload cache keyed on the canonical absolute path. Concurrent
/// workers asking for the same file block on a single upload and share the
/// resulting handle.
pub struct FileCache {
    ops: Arc<dyn NotionOps>,
    states: std::sync::Mutex<HashMap<PathBuf, UploadState>>,
}

impl FileCache {
    pub fn new(ops: Arc<dyn NotionOps>) -> Self {
        FileCache {
            ops,
            states: Default::default(),
        }
    }

    pub async fn upload(&self, path: &Path) -> Result<FileUploadHandle, Error> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let state = {
            // Non-async lock, never held across an await point.
            let mut states = self.states.lock().unwrap();
            states.entry(key).or_default().clone()
        };

        // Path-specific, async-aware lock.
        let mut state = state.lock().await;

        // Fast path: another worker already uploaded this file.
        if let Some(handle) = &*state {
            return Ok(handle.clone());
        }

        // Slow path: we hold the lock, so this is the one upload; waiters
        // queue on the lock and take the fast path when it is released.
        let handle = self.ops.upload_file(path).await?;
        *state = Some(handle.clone());
        Ok(handle)
    }
}
