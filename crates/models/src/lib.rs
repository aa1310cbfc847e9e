mod date;
mod infer;
mod schema;
mod types;
mod value;

pub use self::date::{parse_date_cell, DateParseError, DateValue};
pub use self::infer::{infer_column_type, is_email, is_url, parse_checkbox, parse_number};
pub use self::schema::{Property, Schema, SchemaError, SelectOption, SELECT_COLORS};
pub use self::types::{ColumnType, UnknownColumnType};
pub use self::value::{
    ExternalFile, FileRef, PageRef, PropertyValue, RichText, SelectValue, TextContent, UserRef,
};
