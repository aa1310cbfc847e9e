use std::fmt;
use std::str::FromStr;

use strum::EnumIter;

/// The closed catalogue of column types that an input column may map to.
///
/// `Title` never appears in user-supplied type lists: the first input column
/// is always the title, and users declare it as `text`. It exists as a
/// distinct variant because the remote write payload for the title property
/// has its own shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum ColumnType {
    Title,
    Text,
    Number,
    Select,
    MultiSelect,
    Status,
    Date,
    Person,
    File,
    Checkbox,
    Url,
    Email,
    PhoneNumber,
    CreatedTime,
    LastEditedTime,
    Relation,
    Formula,
    Rollup,
    CreatedBy,
    LastEditedBy,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown column type: '{0}'")]
pub struct UnknownColumnType(pub String);

impl FromStr for ColumnType {
    type Err = UnknownColumnType;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        use ColumnType::*;
        Ok(match code {
            "text" => Text,
            "number" => Number,
            "select" => Select,
            "multi_select" => MultiSelect,
            "status" => Status,
            "date" => Date,
            "person" => Person,
            "file" => File,
            "checkbox" => Checkbox,
            "url" => Url,
            "email" => Email,
            "phone_number" => PhoneNumber,
            "created_time" => CreatedTime,
            "last_edited_time" => LastEditedTime,
            "relation" => Relation,
            "formula" => Formula,
            "rollup" => Rollup,
            "created_by" => CreatedBy,
            "last_edited_by" => LastEditedBy,
            other => return Err(UnknownColumnType(other.to_string())),
        })
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ColumnType::*;
        let code = match self {
            Title | Text => "text",
            Number => "number",
            Select => "select",
            MultiSelect => "multi_select",
            Status => "status",
            Date => "date",
            Person => "person",
            File => "file",
            Checkbox => "checkbox",
            Url => "url",
            Email => "email",
            PhoneNumber => "phone_number",
            CreatedTime => "created_time",
            LastEditedTime => "last_edited_time",
            Relation => "relation",
            Formula => "formula",
            Rollup => "rollup",
            CreatedBy => "created_by",
            LastEditedBy => "last_edited_by",
        };
        f.write_str(code)
    }
}

impl ColumnType {
    /// The property type name used by the remote API, which differs from the
    /// user-facing catalogue code for a few types.
    pub fn api_name(&self) -> &'static str {
        use ColumnType::*;
        match self {
            Title => "title",
            Text => "rich_text",
            Person => "people",
            File => "files",
            Number => "number",
            Select => "select",
            MultiSelect => "multi_select",
            Status => "status",
            Date => "date",
            Checkbox => "checkbox",
            Url => "url",
            Email => "email",
            PhoneNumber => "phone_number",
            CreatedTime => "created_time",
            LastEditedTime => "last_edited_time",
            Relation => "relation",
            Formula => "formula",
            Rollup => "rollup",
            CreatedBy => "created_by",
            LastEditedBy => "last_edited_by",
        }
    }

    /// Maps a remote property type name back to the catalogue.
    pub fn from_api_name(name: &str) -> Result<Self, UnknownColumnType> {
        use ColumnType::*;
        Ok(match name {
            "title" => Title,
            "rich_text" => Text,
            "people" => Person,
            "files" => File,
            other => other.parse()?,
        })
    }

    /// Types that can never be written through the API.
    pub fn is_settable(&self) -> bool {
        use ColumnType::*;
        !matches!(self, Formula | Rollup | CreatedBy | LastEditedBy)
    }

    /// Types whose cells are split on commas into multiple values.
    pub fn multi_valued(&self) -> bool {
        use ColumnType::*;
        matches!(self, MultiSelect | Person | File | Relation)
    }
}
