use models::ColumnType;

/// Where a resolved image lands on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageMode {
    /// Set the page cover.
    #[default]
    Cover,
    /// Append an image block to the page body.
    Block,
}

/// Warnings that specific flags upgrade to fatal or per-row errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailFlags {
    /// Key repeats in the input or the remote database abort the run.
    pub duplicates: bool,
    /// A cell that cannot be coerced to its column type fails the row
    /// instead of writing an empty value.
    pub conversion_error: bool,
    /// An inaccessible linked database aborts instead of dropping the
    /// relation column.
    pub inaccessible_relations: bool,
    /// A column absent from the remote schema aborts instead of being
    /// dropped (or added).
    pub missing_columns: bool,
    /// An unsettable remote column aborts instead of being dropped.
    pub unsettable_columns: bool,
    /// A status value with no matching option fails the row instead of
    /// falling back to the database default.
    pub wrong_status_values: bool,
    /// Ambiguous duplicate titles in a linked database abort the run.
    pub relation_duplicates: bool,
}

/// The behavior of one upload run. Assembled from CLI arguments and threaded
/// through the pipeline explicitly.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Parallel upload workers. 1 preserves input order.
    pub max_workers: usize,

    /// Update rows whose key matches instead of always inserting.
    pub merge: bool,
    /// In merge mode, restrict updates to these columns.
    pub merge_only_columns: Vec<String>,
    /// In merge mode, do not insert rows whose key has no match.
    pub merge_skip_new: bool,

    /// Create columns that exist in the input but not the database.
    pub add_missing_columns: bool,
    /// Create linked-database rows for unresolved relation values.
    pub add_missing_relations: bool,
    /// Give options of newly created select columns a colour picked from the
    /// palette instead of the default.
    pub randomize_select_colors: bool,
    /// Rename the database title property (from, to) during reconciliation.
    pub rename_key_column: Option<(String, String)>,
    /// Declared types for the non-key input columns, positional.
    pub column_types: Vec<ColumnType>,

    /// Columns holding an image URL or path, attached per `image_mode`.
    pub image_columns: Vec<String>,
    pub image_columns_keep: bool,
    pub image_mode: ImageMode,
    /// Column holding the image block caption.
    pub image_caption_column: Option<String>,
    pub image_caption_column_keep: bool,

    /// Column holding the page icon: an emoji, URL, or local file.
    pub icon_column: Option<String>,
    pub icon_column_keep: bool,
    /// Icon applied when the row's icon cell is empty.
    pub default_icon: Option<String>,

    /// AI captioning: (image source column, target text column).
    pub caption_binding: Option<(String, String)>,

    pub fail: FailFlags,
}

impl SyncConfig {
    pub const DEFAULT_WORKERS: usize = 5;

    pub fn workers(&self) -> usize {
        if self.max_workers == 0 {
            Self::DEFAULT_WORKERS
        } else {
            self.max_workers
        }
    }

    /// Decoration source columns that are excluded from the write schema
    /// (those without a keep flag).
    pub fn dropped_decoration_columns(&self) -> Vec<&str> {
        let mut dropped = Vec::new();
        if !self.image_columns_keep {
            dropped.extend(self.image_columns.iter().map(String::as_str));
        }
        if !self.image_caption_column_keep {
            dropped.extend(self.image_caption_column.as_deref());
        }
        if !self.icon_column_keep {
            dropped.extend(self.icon_column.as_deref());
        }
        dropped
    }
}
