mod client;
mod limiter;
mod pagination;
mod retry;
mod types;
mod validate;

pub use client::Client;
pub use limiter::RateLimiter;
pub use pagination::{collect_all, Page};
pub use retry::RetryPolicy;
pub use types::{FileUploadHandle, FileUploadSlot, PageObject, QueryPage, UserObject};
pub use validate::{parse_database_url, validate_token, DatabaseRef};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "invalid integration token: expected it to start with 'secret_' or 'ntn_'. \
         Generate one from your workspace's integration settings."
    )]
    InvalidToken,

    #[error("invalid database URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: &'static str },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    #[error("failed to read '{path}' for upload: {source}")]
    UploadRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Transient errors are retried with backoff; everything else surfaces
    /// immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            Error::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    /// Permission and not-found failures when touching a linked database,
    /// used to distinguish inaccessible relations from hard faults.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status == 403 || *status == 404)
    }
}
