use std::path::{Path, PathBuf};
use std::sync::Arc;

use models::{
    parse_checkbox, parse_date_cell, parse_number, ColumnType, FileRef, PageRef, PropertyValue,
    RichText, SelectValue, UserRef,
};
use notion_client::UserObject;
use parser::{Cell, Row};
use serde_json::{json, Map, Value};
use unicode_segmentation::UnicodeSegmentation;

use crate::caption::{CaptionInput, CaptionProvider};
use crate::config::SyncConfig;
use crate::error::{RowCause, RowError, SyncError};
use crate::files::FileCache;
use crate::reconcile::{EffectiveColumn, EffectiveSchema};
use crate::relations::{RelationResolver, Resolution};

/// An image or icon source resolved from a cell: a URL used by reference, or
/// an uploaded local file.
#[derive(Debug, Clone)]
enum Asset {
    Url(String),
    Uploaded { id: String },
}

impl Asset {
    /// The payload shape shared by covers and icons.
    fn file_value(&self) -> Value {
        match self {
            Asset::Url(url) => json!({ "type": "external", "external": { "url": url } }),
            Asset::Uploaded { id } => {
                json!({ "type": "file_upload", "file_upload": { "id": id } })
            }
        }
    }
}

/// One row's fully converted write request, awaiting dispatch.
#[derive(Debug)]
pub struct UploadJob {
    pub row_index: u64,
    pub key: String,
    /// Property name → serialized property value.
    pub properties: Map<String, Value>,
    pub icon: Option<Value>,
    pub cover: Option<Value>,
    /// Image blocks appended to the page body.
    pub blocks: Vec<Value>,
}

/// Converts rows to upload jobs. Shared by all workers; the file cache and
/// relation resolver it holds are the run-wide concurrency-safe caches.
pub struct Converter {
    pub schema: Arc<EffectiveSchema>,
    pub config: Arc<SyncConfig>,
    pub users: Vec<UserObject>,
    pub relations: Arc<RelationResolver>,
    pub files: Arc<FileCache>,
    /// Directory of the input file; relative file cells resolve against it.
    pub base_dir: PathBuf,
    pub captioner: Option<Arc<dyn CaptionProvider>>,
}

impl Converter {
    pub async fn convert(&self, row: &Row) -> Result<UploadJob, RowError> {
        let key_column = self.schema.key_column();
        let key = row.text(&key_column.input_name).ok_or_else(|| {
            RowError::conversion(row.index, &key_column.input_name, "the key cell is empty")
        })?;

        let mut properties = Map::with_capacity(self.schema.columns.len());
        for column in &self.schema.columns {
            if let Some(value) = self.convert_cell(row, column).await? {
                let value = serde_json::to_value(value).expect("property values serialize");
                properties.insert(column.property_name.clone(), value);
            }
        }

        let (cover, blocks) = self.resolve_images(row, &mut properties).await?;
        let icon = self.resolve_icon(row).await?;

        Ok(UploadJob {
            row_index: row.index,
            key,
            properties,
            icon,
            cover,
            blocks,
        })
    }

    /// Converts one cell to its typed property value, or None when the
    /// property should be omitted from the write.
    async fn convert_cell(
        &self,
        row: &Row,
        column: &EffectiveColumn,
    ) -> Result<Option<PropertyValue>, RowError> {
        use ColumnType::*;

        let text = row.text(&column.input_name);
        // Multi-valued columns split their cell on commas; everything else
        // consumes the whole cell.
        let parts = if column.column_type.multi_valued() {
            fragments(row.cells.get(&column.input_name))
        } else {
            Vec::new()
        };
        let value = match column.column_type {
            Title => Some(PropertyValue::title(text.unwrap_or_default())),
            Text => Some(PropertyValue::text(text.unwrap_or_default())),

            Number => match text {
                None => Some(PropertyValue::Number(None)),
                Some(raw) => match parse_number(&raw) {
                    Some(number) => Some(PropertyValue::Number(Some(number))),
                    None => self.fail_or_empty(row, column, &raw)?,
                },
            },

            Checkbox => match text {
                None => Some(PropertyValue::Checkbox(false)),
                Some(raw) => match parse_checkbox(&raw) {
                    Some(checked) => Some(PropertyValue::Checkbox(checked)),
                    None => self.fail_or_empty(row, column, &raw)?,
                },
            },

            Url => Some(PropertyValue::Url(text)),
            Email => Some(PropertyValue::Email(text)),
            PhoneNumber => Some(PropertyValue::PhoneNumber(text)),

            Select => Some(PropertyValue::Select(
                text.map(|name| SelectValue { name }),
            )),

            Status => self.convert_status(row, column, text)?,

            Date => match text {
                None => Some(PropertyValue::Date(None)),
                Some(raw) => match parse_date_cell(&raw) {
                    Ok(date) => Some(PropertyValue::Date(Some(date))),
                    Err(_) => self.fail_or_empty(row, column, &raw)?,
                },
            },

            CreatedTime | LastEditedTime => match text {
                None => None,
                Some(raw) => match parse_date_cell(&raw) {
                    Ok(date) if column.column_type == CreatedTime => {
                        Some(PropertyValue::CreatedTime(date.start))
                    }
                    Ok(date) => Some(PropertyValue::LastEditedTime(date.start)),
                    Err(_) => {
                        // There is no valid "empty" payload for these two, so
                        // an unparseable cell omits the property entirely.
                        self.fail_or_empty(row, column, &raw)?;
                        None
                    }
                },
            },

            MultiSelect => Some(PropertyValue::MultiSelect(
                parts.into_iter().map(|name| SelectValue { name }).collect(),
            )),

            Person => Some(PropertyValue::People(self.convert_people(row, column, parts))),

            File => Some(PropertyValue::Files(
                self.convert_files(row, parts).await?,
            )),

            Relation => Some(PropertyValue::Relation(
                self.convert_relation(row, column, parts).await?,
            )),

            // Unsettable types never survive reconciliation.
            Formula | Rollup | CreatedBy | LastEditedBy => None,
        };
        Ok(value)
    }

    fn convert_status(
        &self,
        row: &Row,
        column: &EffectiveColumn,
        text: Option<String>,
    ) -> Result<Option<PropertyValue>, RowError> {
        let Some(name) = text else {
            return Ok(Some(PropertyValue::Status(None)));
        };
        if column.options.iter().any(|o| *o == name) {
            return Ok(Some(PropertyValue::Status(Some(SelectValue { name }))));
        }
        if self.config.fail.wrong_status_values {
            return Err(RowError::conversion(
                row.index,
                &column.input_name,
                format!("'{name}' is not an option of the status property"),
            ));
        }
        match &column.default_status {
            Some(default) => {
                tracing::warn!(
                    row = row.index,
                    column = %column.input_name,
                    value = %name,
                    default = %default,
                    "unknown status value, substituting the database default"
                );
                Ok(Some(PropertyValue::Status(Some(SelectValue {
                    name: default.clone(),
                }))))
            }
            None => {
                tracing::warn!(
                    row = row.index,
                    column = %column.input_name,
                    value = %name,
                    "unknown status value and the property has no options, leaving empty"
                );
                Ok(Some(PropertyValue::Status(None)))
            }
        }
    }

    fn convert_people(
        &self,
        row: &Row,
        column: &EffectiveColumn,
        fragments: Vec<String>,
    ) -> Vec<UserRef> {
        let mut people = Vec::new();
        for fragment in fragments {
            match self.users.iter().find(|u| u.matches(&fragment)) {
                Some(user) => people.push(UserRef::new(user.id.clone())),
                None => tracing::warn!(
                    row = row.index,
                    column = %column.input_name,
                    value = %fragment,
                    "no workspace member matches, dropping"
                ),
            }
        }
        people
    }

    async fn convert_files(
        &self,
        row: &Row,
        fragments: Vec<String>,
    ) -> Result<Vec<FileRef>, RowError> {
        let mut files = Vec::new();
        for fragment in fragments {
            match self.resolve_asset(&fragment, row.index).await? {
                Asset::Url(url) => {
                    let name = url_filename(&url);
                    files.push(FileRef::external(name, url));
                }
                Asset::Uploaded { id } => {
                    let name = Path::new(&fragment)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| fragment.clone());
                    files.push(FileRef::uploaded(name, id));
                }
            }
        }
        Ok(files)
    }

    async fn convert_relation(
        &self,
        row: &Row,
        column: &EffectiveColumn,
        fragments: Vec<String>,
    ) -> Result<Vec<PageRef>, RowError> {
        let database_id = column
            .relation_database_id
            .as_deref()
            .expect("reconciliation keeps only resolvable relations");

        let mut pages = Vec::new();
        for fragment in fragments {
            let resolution = self
                .relations
                .resolve(database_id, &fragment)
                .await
                .map_err(|err| row_cause(row.index, err))?;
            match resolution {
                Resolution::Page(id) => pages.push(PageRef { id }),
                Resolution::Dropped => {}
                Resolution::Unresolved => {
                    return Err(RowError::conversion(
                        row.index,
                        &column.input_name,
                        format!("'{fragment}' has no match in the linked database"),
                    ));
                }
            }
        }
        Ok(pages)
    }

    /// Resolves the image columns: the last resolvable image becomes the
    /// cover (cover mode), every resolved image becomes a body block (block
    /// mode). Also drives the optional AI caption binding.
    async fn resolve_images(
        &self,
        row: &Row,
        properties: &mut Map<String, Value>,
    ) -> Result<(Option<Value>, Vec<Value>), RowError> {
        let mut caption = self
            .config
            .image_caption_column
            .as_ref()
            .and_then(|column| row.text(column));

        let mut cover = None;
        let mut blocks = Vec::new();
        for column in &self.config.image_columns {
            let Some(raw) = row.text(column) else { continue };
            let asset = self.resolve_asset(&raw, row.index).await?;

            if let Some((source, target)) = &self.config.caption_binding {
                if source == column {
                    self.caption_image(row, &asset, &raw, target, properties).await;
                }
            }

            match self.config.image_mode {
                crate::config::ImageMode::Cover => {
                    cover = Some(asset.file_value());
                }
                crate::config::ImageMode::Block => {
                    // The caption column captions the first block.
                    let caption = caption.take().filter(|_| blocks.is_empty());
                    blocks.push(image_block(&asset, caption));
                }
            }
        }
        Ok((cover, blocks))
    }

    /// Invokes the caption provider and writes the result into the target
    /// column. Failure to obtain a caption is logged and leaves the target
    /// untouched.
    async fn caption_image(
        &self,
        row: &Row,
        asset: &Asset,
        raw: &str,
        target: &str,
        properties: &mut Map<String, Value>,
    ) {
        let Some(captioner) = &self.captioner else {
            return;
        };
        let Some(target_column) = self.schema.get(target) else {
            tracing::warn!(
                column = %target,
                "caption target column is not in the write schema, skipping"
            );
            return;
        };

        let input = match asset {
            Asset::Url(url) => CaptionInput::Url(url.clone()),
            Asset::Uploaded { .. } => {
                // The hosted handle is not publicly fetchable, so captioning
                // re-reads the local bytes.
                let path = self.base_dir.join(raw);
                match std::fs::read(&path) {
                    Ok(bytes) => CaptionInput::Bytes {
                        filename: path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "image".to_string()),
                        bytes,
                    },
                    Err(err) => {
                        tracing::warn!(row = row.index, error = %err, "cannot read image for captioning");
                        return;
                    }
                }
            }
        };

        match captioner.caption(input).await {
            Ok(caption) => {
                tracing::debug!(row = row.index, caption = %caption, "captioned image");
                properties.insert(
                    target_column.property_name.clone(),
                    serde_json::to_value(PropertyValue::text(caption))
                        .expect("property values serialize"),
                );
            }
            Err(err) => {
                tracing::warn!(row = row.index, error = %err, "caption provider failed, leaving target empty");
            }
        }
    }

    async fn resolve_icon(&self, row: &Row) -> Result<Option<Value>, RowError> {
        let cell = self
            .config
            .icon_column
            .as_ref()
            .and_then(|column| row.text(column));
        let source = match cell.or_else(|| self.config.default_icon.clone()) {
            Some(source) => source,
            None => return Ok(None),
        };

        // A single grapheme is an emoji icon; no upload involved.
        if source.graphemes(true).count() == 1 {
            return Ok(Some(json!({ "type": "emoji", "emoji": source })));
        }
        let asset = self.resolve_asset(&source, row.index).await?;
        Ok(Some(asset.file_value()))
    }

    /// URL fragments pass through by reference; anything else is a path
    /// resolved against the input file's directory and uploaded through the
    /// single-flight cache.
    async fn resolve_asset(&self, raw: &str, row_index: u64) -> Result<Asset, RowError> {
        if models::is_url(raw) {
            return Ok(Asset::Url(raw.to_string()));
        }
        let path = self.base_dir.join(raw);
        let handle = self
            .files
            .upload(&path)
            .await
            .map_err(|err| RowError::client(row_index, err))?;
        Ok(Asset::Uploaded { id: handle.id })
    }

    fn fail_or_empty(
        &self,
        row: &Row,
        column: &EffectiveColumn,
        raw: &str,
    ) -> Result<Option<PropertyValue>, RowError> {
        if self.config.fail.conversion_error {
            return Err(RowError::conversion(
                row.index,
                &column.input_name,
                format!("'{raw}' cannot be converted to {}", column.column_type),
            ));
        }
        tracing::warn!(
            row = row.index,
            column = %column.input_name,
            value = %raw,
            r#type = %column.column_type,
            "conversion failed, writing an empty value"
        );
        Ok(Some(PropertyValue::empty(column.column_type)))
    }
}

/// Splits a multi-valued cell into trimmed, non-empty fragments. Array cells
/// (JSON input) contribute one fragment per element; string cells split on
/// commas with no escaping.
fn fragments(cell: Option<&Cell>) -> Vec<String> {
    let mut fragments = Vec::new();
    match cell {
        Some(Cell::Array(items)) => {
            for item in items {
                match item {
                    Cell::String(s) => fragments.push(s.clone()),
                    Cell::Number(n) => fragments.push(n.to_string()),
                    Cell::Bool(b) => fragments.push(b.to_string()),
                    _ => {}
                }
            }
        }
        Some(Cell::String(s)) => {
            fragments.extend(s.split(',').map(str::to_string));
        }
        Some(Cell::Number(n)) => fragments.push(n.to_string()),
        Some(Cell::Bool(b)) => fragments.push(b.to_string()),
        _ => {}
    }
    fragments
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

fn image_block(asset: &Asset, caption: Option<String>) -> Value {
    let caption: Vec<RichText> = caption.map(RichText::plain).unwrap_or_default();
    let mut image = match asset {
        Asset::Url(url) => json!({ "type": "external", "external": { "url": url } }),
        Asset::Uploaded { id } => json!({ "type": "file_upload", "file_upload": { "id": id } }),
    };
    image["caption"] = serde_json::to_value(caption).expect("captions serialize");
    json!({ "object": "block", "type": "image", "image": image })
}

fn url_filename(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|s| s.last().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "file".to_string())
}

/// Client failures during relation resolution become the row's error; other
/// resolver failures were ruled out before dispatch.
fn row_cause(row: u64, err: SyncError) -> RowError {
    match err {
        SyncError::Client(err) => RowError {
            row,
            cause: RowCause::Client(err),
        },
        other => RowError {
            row,
            cause: RowCause::Conversion {
                column: String::new(),
                message: other.to_string(),
            },
        },
    }
}
