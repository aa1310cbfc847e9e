use serde::Deserialize;
use serde_json::Value;

/// One page of a database query response.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryPage {
    pub results: Vec<PageObject>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// A page row of a database, as returned by queries and writes.
#[derive(Debug, Clone, Deserialize)]
pub struct PageObject {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PageObject {
    /// The concatenated plain text of the page's title property.
    pub fn title_text(&self) -> Option<String> {
        let title = self
            .properties
            .values()
            .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))?;
        let fragments = title.get("title")?.as_array()?;
        Some(
            fragments
                .iter()
                .filter_map(|f| f.get("plain_text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(""),
        )
    }
}

/// A workspace member, used to resolve person columns by name or email.
#[derive(Debug, Clone, Deserialize)]
pub struct UserObject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub person: Option<PersonDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonDetail {
    #[serde(default)]
    pub email: Option<String>,
}

impl UserObject {
    pub fn matches(&self, needle: &str) -> bool {
        if self.name.as_deref() == Some(needle) {
            return true;
        }
        self.person
            .as_ref()
            .and_then(|p| p.email.as_deref())
            .map_or(false, |email| email.eq_ignore_ascii_case(needle))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserPage {
    pub results: Vec<UserObject>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// An allocated upload slot: bytes are PUT to `upload_url`, then the slot is
/// finalized into a stable handle.
#[derive(Debug, Clone, Deserialize)]
pub struct FileUploadSlot {
    pub id: String,
    pub upload_url: String,
}

/// The stable handle of a finalized upload, referenced from file properties,
/// covers, icons, and image blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadHandle {
    pub id: String,
    pub filename: String,
}
