use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// The image handed to the caption provider: a URL the provider can fetch,
/// or raw bytes for files that only exist locally.
#[derive(Debug, Clone)]
pub enum CaptionInput {
    Url(String),
    Bytes { filename: String, bytes: Vec<u8> },
}

#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("caption service returned an empty caption")]
    Empty,
}

/// A pluggable captioning service. Failures are logged and swallowed by the
/// caller; no state is persisted.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    async fn caption(&self, input: CaptionInput) -> Result<String, CaptionError>;
}

/// Captions images through an HTTP inference endpoint hosting `model`.
pub struct HttpCaptioner {
    http: reqwest::Client,
    endpoint: url::Url,
    model: String,
}

#[derive(Debug, Deserialize)]
struct CaptionResponse {
    caption: String,
}

impl HttpCaptioner {
    pub fn new(endpoint: url::Url, model: impl Into<String>) -> Self {
        HttpCaptioner {
            http: reqwest::Client::new(),
            endpoint,
            model: model.into(),
        }
    }
}

#[async_trait]
impl CaptionProvider for HttpCaptioner {
    async fn caption(&self, input: CaptionInput) -> Result<String, CaptionError> {
        let request = match input {
            CaptionInput::Url(url) => self
                .http
                .post(self.endpoint.clone())
                .json(&json!({ "model": self.model, "image_url": url })),
            CaptionInput::Bytes { filename, bytes } => self
                .http
                .post(self.endpoint.clone())
                .query(&[("model", self.model.as_str()), ("filename", &filename)])
                .body(bytes),
        };

        let response: CaptionResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let caption = response.caption.trim().to_string();
        if caption.is_empty() {
            return Err(CaptionError::Empty);
        }
        Ok(caption)
    }
}
