use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use parser::{ReadError, Row};
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::convert::Converter;
use crate::error::{RowCause, RowError, SyncError};
use crate::merge::MergeIndex;
use crate::ops::{query_all, NotionOps};
use crate::upload::{upload_row, RowOutcome};

const PROGRESS_BAR_TEMPLATE: &str = "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}";

/// The aggregate outcome of a run. At least one row error means the process
/// exits non-zero; a fatal error never produces a summary at all.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub total: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: Vec<RowError>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    fn record(&mut self, result: WorkResult) {
        match result {
            WorkResult::Done(RowOutcome::Inserted) => self.inserted += 1,
            WorkResult::Done(RowOutcome::Updated) => self.updated += 1,
            WorkResult::Done(RowOutcome::Skipped) | WorkResult::Cancelled => self.skipped += 1,
            WorkResult::Failed(err) => self.errors.push(err),
        }
    }
}

enum WorkResult {
    Done(RowOutcome),
    Failed(RowError),
    Cancelled,
}

/// Drives rows through the worker pool: each worker converts and writes one
/// row. Per-row failures are collected while the queue drains; cancellation
/// lets in-flight rows finish and stops dispatching new ones.
pub async fn dispatch(
    ops: Arc<dyn NotionOps>,
    converter: Arc<Converter>,
    merge_index: Arc<MergeIndex>,
    config: Arc<SyncConfig>,
    rows: Vec<Result<Row, ReadError>>,
    cancel: CancellationToken,
) -> RunSummary {
    let total = rows.len() as u64;
    let progress = ProgressBar::new(total);
    progress.set_style(ProgressStyle::with_template(PROGRESS_BAR_TEMPLATE).unwrap());
    progress.set_message("uploading rows");

    let results: Vec<WorkResult> = stream::iter(rows)
        .map(|row| {
            let ops = ops.clone();
            let converter = converter.clone();
            let merge_index = merge_index.clone();
            let config = config.clone();
            let cancel = cancel.clone();
            let progress = progress.clone();
            async move {
                let result = process_row(&*ops, &converter, &merge_index, &config, &cancel, row)
                    .await;
                if let WorkResult::Failed(err) = &result {
                    progress.println(format!("row {}: {}", err.row, err.cause));
                }
                progress.inc(1);
                result
            }
        })
        .buffer_unordered(config.workers())
        .collect()
        .await;

    progress.finish_with_message("done");

    let mut summary = RunSummary {
        total,
        ..Default::default()
    };
    for result in results {
        summary.record(result);
    }
    tracing::info!(
        total = summary.total,
        inserted = summary.inserted,
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed(),
        "upload finished"
    );
    summary
}

async fn process_row(
    ops: &dyn NotionOps,
    converter: &Converter,
    merge_index: &MergeIndex,
    config: &SyncConfig,
    cancel: &CancellationToken,
    row: Result<Row, ReadError>,
) -> WorkResult {
    if cancel.is_cancelled() {
        return WorkResult::Cancelled;
    }

    let row = match row {
        Ok(row) => row,
        Err(err) => {
            let row_index = err.row_index().unwrap_or_default();
            return WorkResult::Failed(RowError {
                row: row_index,
                cause: RowCause::Read(err),
            });
        }
    };

    let job = match converter.convert(&row).await {
        Ok(job) => job,
        Err(err) => return WorkResult::Failed(err),
    };

    match upload_row(ops, &converter.schema, config, merge_index, job).await {
        Ok(outcome) => WorkResult::Done(outcome),
        Err(err) => WorkResult::Failed(err),
    }
}

/// Archives every row of the target database, with the same bounded
/// parallelism and progress reporting as an upload run.
pub async fn delete_all(
    ops: Arc<dyn NotionOps>,
    database_id: &str,
    workers: usize,
) -> Result<RunSummary, SyncError> {
    let pages = query_all(ops.as_ref(), database_id).await?;
    let total = pages.len() as u64;

    let progress = ProgressBar::new(total);
    progress.set_style(ProgressStyle::with_template(PROGRESS_BAR_TEMPLATE).unwrap());
    progress.set_message("archiving rows");

    let errors: Vec<RowError> = stream::iter(pages.into_iter().enumerate())
        .map(|(ordinal, page)| {
            let ops = ops.clone();
            let progress = progress.clone();
            async move {
                let result = ops.archive_page(&page.id).await;
                progress.inc(1);
                result.err().map(|err| RowError::client(ordinal as u64 + 1, err))
            }
        })
        .buffer_unordered(workers.max(1))
        .filter_map(futures::future::ready)
        .collect()
        .await;

    progress.finish_with_message("done");
    tracing::info!(total, failed = errors.len(), "archive finished");

    Ok(RunSummary {
        total,
        errors,
        ..Default::default()
    })
}
