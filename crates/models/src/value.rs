use serde::Serialize;

use crate::date::DateValue;
use crate::types::ColumnType;

/// One typed property payload of a remote write request. The serialized form
/// is exactly the shape the API expects for that property type, keyed by the
/// property type name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Title(Vec<RichText>),
    RichText(Vec<RichText>),
    Number(Option<f64>),
    Select(Option<SelectValue>),
    MultiSelect(Vec<SelectValue>),
    Status(Option<SelectValue>),
    Date(Option<DateValue>),
    People(Vec<UserRef>),
    Files(Vec<FileRef>),
    Checkbox(bool),
    Url(Option<String>),
    Email(Option<String>),
    PhoneNumber(Option<String>),
    CreatedTime(String),
    LastEditedTime(String),
    Relation(Vec<PageRef>),
}

impl PropertyValue {
    pub fn title(content: impl Into<String>) -> Self {
        PropertyValue::Title(RichText::plain(content))
    }

    pub fn text(content: impl Into<String>) -> Self {
        PropertyValue::RichText(RichText::plain(content))
    }

    /// The empty value for a column type: what a cell converts to when its
    /// content is blank or unparseable. Writing it clears the property.
    pub fn empty(column_type: ColumnType) -> Self {
        use ColumnType::*;
        match column_type {
            Title => PropertyValue::Title(Vec::new()),
            Text => PropertyValue::RichText(Vec::new()),
            Number => PropertyValue::Number(None),
            Select => PropertyValue::Select(None),
            MultiSelect => PropertyValue::MultiSelect(Vec::new()),
            Status => PropertyValue::Status(None),
            Date | CreatedTime | LastEditedTime => PropertyValue::Date(None),
            Person => PropertyValue::People(Vec::new()),
            File => PropertyValue::Files(Vec::new()),
            Checkbox => PropertyValue::Checkbox(false),
            Url => PropertyValue::Url(None),
            Email => PropertyValue::Email(None),
            PhoneNumber => PropertyValue::PhoneNumber(None),
            Relation => PropertyValue::Relation(Vec::new()),
            // Unsettable types are dropped during reconciliation and never
            // reach conversion.
            Formula | Rollup | CreatedBy | LastEditedBy => PropertyValue::RichText(Vec::new()),
        }
    }

    /// Whether this value carries no content. Used by decoration columns
    /// (icon, image) to decide between the cell and a configured default.
    pub fn is_empty(&self) -> bool {
        use PropertyValue::*;
        match self {
            Title(v) | RichText(v) => v.is_empty(),
            Number(v) => v.is_none(),
            Select(v) | Status(v) => v.is_none(),
            MultiSelect(v) => v.is_empty(),
            Date(v) => v.is_none(),
            People(v) => v.is_empty(),
            Files(v) => v.is_empty(),
            Checkbox(_) => false,
            Url(v) | Email(v) | PhoneNumber(v) => v.is_none(),
            CreatedTime(v) | LastEditedTime(v) => v.is_empty(),
            Relation(v) => v.is_empty(),
        }
    }

    /// The plain-text rendition of a title or rich-text value.
    pub fn as_plain_text(&self) -> Option<String> {
        match self {
            PropertyValue::Title(v) | PropertyValue::RichText(v) => Some(
                v.iter()
                    .map(|rt| rt.text.content.as_str())
                    .collect::<Vec<_>>()
                    .join(""),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RichText {
    pub text: TextContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    pub content: String,
}

impl RichText {
    pub fn plain(content: impl Into<String>) -> Vec<RichText> {
        let content = content.into();
        if content.is_empty() {
            return Vec::new();
        }
        vec![RichText {
            text: TextContent { content },
        }]
    }
}

/// A select, multi-select, or status option referenced by name. Unknown
/// select and multi-select names are created server-side on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectValue {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub object: &'static str,
    pub id: String,
}

impl UserRef {
    pub fn new(id: impl Into<String>) -> Self {
        UserRef {
            object: "user",
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub id: String,
}

/// A file attachment: either referenced by URL, or a handle to a finalized
/// upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileRef {
    External {
        name: String,
        external: ExternalFile,
    },
    Upload {
        name: String,
        file_upload: UploadHandle,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalFile {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadHandle {
    pub id: String,
}

impl FileRef {
    pub fn external(name: impl Into<String>, url: impl Into<String>) -> Self {
        FileRef::External {
            name: name.into(),
            external: ExternalFile { url: url.into() },
        }
    }

    pub fn uploaded(name: impl Into<String>, upload_id: impl Into<String>) -> Self {
        FileRef::Upload {
            name: name.into(),
            file_upload: UploadHandle {
                id: upload_id.into(),
            },
        }
    }
}
