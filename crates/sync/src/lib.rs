mod caption;
mod config;
mod convert;
mod dispatch;
mod error;
mod files;
mod merge;
mod ops;
mod reconcile;
mod relations;
mod upload;

#[cfg(test)]
pub(crate) mod testutil;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use models::ColumnType;
use tokio_util::sync::CancellationToken;

pub use caption::{CaptionError, CaptionInput, CaptionProvider, HttpCaptioner};
pub use config::{FailFlags, ImageMode, SyncConfig};
pub use convert::{Converter, UploadJob};
pub use dispatch::{delete_all, RunSummary};
pub use error::{RowCause, RowError, SyncError};
pub use merge::MergeIndex;
pub use ops::{query_all, NotionOps};
pub use reconcile::{EffectiveColumn, EffectiveSchema};
pub use relations::{OnMissingRelation, RelationResolver};
pub use upload::RowOutcome;

/// Runs the full pipeline against one input table: reconcile the schema,
/// build the merge index, then convert and upload every row through the
/// bounded worker pool. Fatal errors return before any row is dispatched.
pub async fn run(
    ops: Arc<dyn NotionOps>,
    captioner: Option<Arc<dyn CaptionProvider>>,
    table: parser::Table,
    input_dir: PathBuf,
    database_id: &str,
    config: SyncConfig,
    cancel: CancellationToken,
) -> Result<RunSummary, SyncError> {
    let parser::Table { header, rows } = table;
    let rows: Vec<Result<parser::Row, parser::ReadError>> = rows.collect();

    if config.fail.duplicates {
        check_input_duplicates(&header[0], &rows)?;
    }

    let schema = ops.get_schema(database_id).await?;
    let valid_rows: Vec<parser::Row> = rows.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
    let effective = Arc::new(
        reconcile::reconcile(ops.as_ref(), &schema, &header, &valid_rows, &config).await?,
    );
    drop(valid_rows);

    let users = if effective
        .columns
        .iter()
        .any(|c| c.column_type == ColumnType::Person)
    {
        ops.list_users().await?
    } else {
        Vec::new()
    };

    let merge_index = if config.merge || config.fail.duplicates {
        Arc::new(merge::MergeIndex::build(ops.as_ref(), database_id, config.fail.duplicates).await?)
    } else {
        Arc::new(merge::MergeIndex::empty())
    };

    let on_missing = if config.add_missing_relations {
        OnMissingRelation::Add
    } else if config.fail.conversion_error {
        OnMissingRelation::Fail
    } else {
        OnMissingRelation::Drop
    };
    let relations = Arc::new(RelationResolver::new(
        ops.clone(),
        on_missing,
        config.fail.relation_duplicates,
    ));

    // With the strict flag, ambiguous linked databases must abort before any
    // write, not in the middle of the run.
    if config.fail.relation_duplicates {
        for column in &effective.columns {
            if let Some(linked) = &column.relation_database_id {
                relations.preload(linked).await?;
            }
        }
    }

    let config = Arc::new(config);
    let converter = Arc::new(Converter {
        schema: effective,
        config: config.clone(),
        users,
        relations,
        files: Arc::new(files::FileCache::new(ops.clone())),
        base_dir: input_dir,
        captioner,
    });

    Ok(dispatch::dispatch(ops, converter, merge_index, config, rows, cancel).await)
}

/// With `--fail-on-duplicates`, repeated keys in the input abort the run
/// with zero writes.
fn check_input_duplicates(
    key_column: &str,
    rows: &[Result<parser::Row, parser::ReadError>],
) -> Result<(), SyncError> {
    let mut seen = HashSet::new();
    for row in rows.iter().flatten() {
        if let Some(key) = row.text(key_column) {
            if !seen.insert(key.clone()) {
                return Err(SyncError::DuplicateKey {
                    key,
                    origin: "input",
                });
            }
        }
    }
    Ok(())
}
