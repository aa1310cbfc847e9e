use models::ColumnType;

/// Fatal errors raised before (or instead of) dispatching any row work.
/// These abort the run with exit code 2 and zero writes.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Read(#[from] parser::ReadError),

    #[error(transparent)]
    Client(#[from] notion_client::Error),

    #[error("input column '{0}' does not exist in the database")]
    MissingColumn(String),

    #[error("column '{0}' has unsettable type '{1}' and cannot be written")]
    UnsettableColumn(String, ColumnType),

    #[error("the linked database of relation column '{0}' is not accessible")]
    InaccessibleRelation(String),

    #[error("duplicate key '{key}' in the {origin}")]
    DuplicateKey { key: String, origin: &'static str },

    #[error("linked database '{database_id}' contains multiple pages titled '{title}'")]
    RelationDuplicates { database_id: String, title: String },

    #[error("{declared} column types were declared for {columns} non-key input columns")]
    ColumnTypeCount { declared: usize, columns: usize },

    #[error("cannot rename key column: the database title property is named '{actual}', not '{expected}'")]
    RenameMismatch { expected: String, actual: String },
}

/// The structured cause of one failed row.
#[derive(Debug, thiserror::Error)]
pub enum RowCause {
    #[error(transparent)]
    Read(parser::ReadError),

    #[error("column '{column}': {message}")]
    Conversion { column: String, message: String },

    #[error(transparent)]
    Client(notion_client::Error),
}

/// A per-row failure, recorded by the dispatcher while the queue drains.
#[derive(Debug)]
pub struct RowError {
    pub row: u64,
    pub cause: RowCause,
}

impl RowError {
    pub fn conversion(row: u64, column: impl Into<String>, message: impl Into<String>) -> Self {
        RowError {
            row,
            cause: RowCause::Conversion {
                column: column.into(),
                message: message.into(),
            },
        }
    }

    pub fn client(row: u64, err: notion_client::Error) -> Self {
        RowError {
            row,
            cause: RowCause::Client(err),
        }
    }
}
