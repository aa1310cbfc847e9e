use serde_json::Value;

use crate::config::SyncConfig;
use crate::convert::UploadJob;
use crate::error::RowError;
use crate::merge::MergeIndex;
use crate::ops::NotionOps;
use crate::reconcile::EffectiveSchema;

/// What happened to one dispatched row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    Updated,
    /// Merge mode with `merge_skip_new`: the key had no match.
    Skipped,
}

/// Writes one converted row: create or update per the merge decision, icon
/// and cover on the same request, body blocks appended afterwards. Any
/// failure surfaces as the row's single error; a partially decorated page is
/// tolerated and reported through that error.
pub async fn upload_row(
    ops: &dyn NotionOps,
    schema: &EffectiveSchema,
    config: &SyncConfig,
    merge_index: &MergeIndex,
    job: UploadJob,
) -> Result<RowOutcome, RowError> {
    let UploadJob {
        row_index,
        key,
        mut properties,
        icon,
        cover,
        blocks,
    } = job;

    let client_err = |err| RowError::client(row_index, err);

    let (page_id, outcome) = match merge_index.get(&key).filter(|_| config.merge) {
        Some(page_id) => {
            // The key column itself is never rewritten on update.
            properties.remove(&schema.key_column().property_name);
            if !config.merge_only_columns.is_empty() {
                let retained: Vec<String> = schema
                    .columns
                    .iter()
                    .filter(|c| config.merge_only_columns.contains(&c.input_name))
                    .map(|c| c.property_name.clone())
                    .collect();
                properties.retain(|name, _| retained.contains(name));
            }
            let page = ops
                .update_page(&page_id, Value::Object(properties), icon, cover)
                .await
                .map_err(client_err)?;
            (page.id, RowOutcome::Updated)
        }
        None if config.merge && config.merge_skip_new => {
            tracing::debug!(row = row_index, key = %key, "no matching row, skipping");
            return Ok(RowOutcome::Skipped);
        }
        None => {
            let page = ops
                .create_page(&schema.database_id, Value::Object(properties), icon, cover)
                .await
                .map_err(client_err)?;
            if config.merge {
                // Later rows with the same key update this page instead of
                // inserting again: last writer wins within the run.
                merge_index.insert(key.clone(), page.id.clone());
            }
            (page.id, RowOutcome::Inserted)
        }
    };

    if !blocks.is_empty() {
        ops.append_blocks(&page_id, Value::Array(blocks))
            .await
            .map_err(client_err)?;
    }

    Ok(outcome)
}
