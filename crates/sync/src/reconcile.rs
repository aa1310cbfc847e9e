use std::collections::BTreeSet;

use models::{infer_column_type, ColumnType, Schema, SELECT_COLORS};
use parser::Row;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde_json::{json, Map, Value};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::ops::NotionOps;

/// One input column that will actually be written, with everything the
/// converter needs about its remote counterpart.
#[derive(Debug, Clone)]
pub struct EffectiveColumn {
    pub input_name: String,
    pub property_name: String,
    pub column_type: ColumnType,
    /// Existing option names of a select, multi-select, or status property.
    pub options: Vec<String>,
    /// The first declared status option, substituted for unknown values.
    pub default_status: Option<String>,
    /// Target database of a relation property.
    pub relation_database_id: Option<String>,
}

/// The effective write schema: the subset of input columns that survive
/// reconciliation, title first.
#[derive(Debug, Clone)]
pub struct EffectiveSchema {
    pub database_id: String,
    pub columns: Vec<EffectiveColumn>,
}

impl EffectiveSchema {
    pub fn key_column(&self) -> &EffectiveColumn {
        &self.columns[0]
    }

    pub fn get(&self, input_name: &str) -> Option<&EffectiveColumn> {
        self.columns.iter().find(|c| c.input_name == input_name)
    }
}

/// Aligns the input header against the remote schema: maps the first column
/// to the title (renaming it when configured), matches the rest by name,
/// adds or drops missing columns, and drops unsettable and decoration-only
/// columns. Issues the database patches it decides on.
pub async fn reconcile(
    ops: &dyn NotionOps,
    schema: &Schema,
    header: &[String],
    rows: &[Row],
    config: &SyncConfig,
) -> Result<EffectiveSchema, SyncError> {
    let declared = declared_types(header, config)?;
    let dropped_decoration = config.dropped_decoration_columns();

    let mut schema = schema.clone();
    if let Some((from, to)) = &config.rename_key_column {
        rename_title(ops, &mut schema, from, to).await?;
    }

    let title = schema.title();
    let mut columns = vec![EffectiveColumn {
        input_name: header[0].clone(),
        property_name: title.name.clone(),
        column_type: ColumnType::Title,
        options: Vec::new(),
        default_status: None,
        relation_database_id: None,
    }];

    let mut additions: Map<String, Value> = Map::new();
    let mut rng = config
        .randomize_select_colors
        .then(|| SmallRng::from_entropy());

    for (position, name) in header.iter().enumerate().skip(1) {
        if dropped_decoration.contains(&name.as_str()) {
            tracing::debug!(column = %name, "decoration source column, not written");
            continue;
        }

        match schema.get(name) {
            Some(property) if !property.column_type.is_settable() => {
                if config.fail.unsettable_columns {
                    return Err(SyncError::UnsettableColumn(
                        name.clone(),
                        property.column_type,
                    ));
                }
                tracing::warn!(
                    column = %name,
                    r#type = %property.column_type,
                    "column type cannot be written, dropping"
                );
            }
            Some(property) if property.column_type == ColumnType::Relation => {
                let database_id = property.relation_database_id.clone();
                let accessible = match &database_id {
                    Some(id) => ops.get_schema(id).await.map(|_| true).or_else(|err| {
                        if err.is_access_denied() {
                            Ok(false)
                        } else {
                            Err(err)
                        }
                    })?,
                    None => false,
                };
                if !accessible {
                    if config.fail.inaccessible_relations {
                        return Err(SyncError::InaccessibleRelation(name.clone()));
                    }
                    tracing::warn!(column = %name, "linked database is not accessible, dropping");
                    continue;
                }
                columns.push(EffectiveColumn {
                    input_name: name.clone(),
                    property_name: property.name.clone(),
                    column_type: ColumnType::Relation,
                    options: Vec::new(),
                    default_status: None,
                    relation_database_id: database_id,
                });
            }
            Some(property) => {
                let mut options: Vec<String> =
                    property.options.iter().map(|o| o.name.clone()).collect();

                // Options the input introduces are created explicitly, so
                // they get the default colour (or a palette pick) instead of
                // whatever the server would assign on first write.
                if matches!(
                    property.column_type,
                    ColumnType::Select | ColumnType::MultiSelect
                ) {
                    let new_options =
                        missing_options(property, name, rows, rng.as_mut());
                    if !new_options.is_empty() {
                        options.extend(
                            new_options
                                .iter()
                                .filter_map(|o| o.get("name").and_then(Value::as_str))
                                .map(str::to_string),
                        );
                        let mut existing: Vec<Value> = property
                            .options
                            .iter()
                            .map(|o| match &o.color {
                                Some(color) => json!({ "name": o.name, "color": color }),
                                None => json!({ "name": o.name }),
                            })
                            .collect();
                        existing.extend(new_options);
                        let key = property.column_type.api_name();
                        let mut definition = Map::new();
                        definition
                            .insert(key.to_string(), json!({ "options": existing }));
                        additions.insert(property.name.clone(), Value::Object(definition));
                    }
                }

                columns.push(EffectiveColumn {
                    input_name: name.clone(),
                    property_name: property.name.clone(),
                    column_type: property.column_type,
                    options,
                    default_status: property.default_status().map(|o| o.name.clone()),
                    relation_database_id: None,
                });
            }
            None => {
                if config.fail.missing_columns {
                    return Err(SyncError::MissingColumn(name.clone()));
                }
                if !config.add_missing_columns {
                    tracing::warn!(column = %name, "column does not exist in the database, dropping");
                    continue;
                }

                let column_type = match declared.get(position - 1).copied().flatten() {
                    Some(declared) => declared,
                    None => {
                        let values: Vec<String> =
                            rows.iter().filter_map(|r| r.text(name)).collect();
                        infer_column_type(values.iter().map(String::as_str))
                    }
                };

                let Some(definition) =
                    property_definition(column_type, name, rows, rng.as_mut())
                else {
                    tracing::warn!(
                        column = %name,
                        r#type = %column_type,
                        "column type cannot be created, dropping"
                    );
                    continue;
                };
                tracing::info!(column = %name, r#type = %column_type, "adding missing column");
                additions.insert(name.clone(), definition);
                columns.push(EffectiveColumn {
                    input_name: name.clone(),
                    property_name: name.clone(),
                    column_type,
                    options: Vec::new(),
                    default_status: None,
                    relation_database_id: None,
                });
            }
        }
    }

    if !additions.is_empty() {
        ops.update_database(&schema.database_id, json!({ "properties": additions }))
            .await?;
    }

    Ok(EffectiveSchema {
        database_id: schema.database_id.clone(),
        columns,
    })
}

/// Positional `--column-types` declarations for the non-key columns. The
/// list may be shorter than the header (the rest is inferred) but not
/// longer.
fn declared_types(
    header: &[String],
    config: &SyncConfig,
) -> Result<Vec<Option<ColumnType>>, SyncError> {
    let non_key = header.len().saturating_sub(1);
    if config.column_types.len() > non_key {
        return Err(SyncError::ColumnTypeCount {
            declared: config.column_types.len(),
            columns: non_key,
        });
    }
    let mut declared: Vec<Option<ColumnType>> =
        config.column_types.iter().copied().map(Some).collect();
    declared.resize(non_key, None);
    Ok(declared)
}

async fn rename_title(
    ops: &dyn NotionOps,
    schema: &mut Schema,
    from: &str,
    to: &str,
) -> Result<(), SyncError> {
    let title_name = schema.title().name.clone();
    if title_name != from {
        return Err(SyncError::RenameMismatch {
            expected: from.to_string(),
            actual: title_name,
        });
    }
    let mut renames = Map::new();
    renames.insert(from.to_string(), json!({ "name": to }));
    ops.update_database(&schema.database_id, json!({ "properties": renames }))
        .await?;
    tracing::info!(from, to, "renamed key column");
    schema.properties[0].name = to.to_string();
    Ok(())
}

/// The database patch fragment defining a new property of `column_type`, or
/// None for types that cannot be created through the API.
fn property_definition(
    column_type: ColumnType,
    name: &str,
    rows: &[Row],
    rng: Option<&mut SmallRng>,
) -> Option<Value> {
    use ColumnType::*;
    let definition = match column_type {
        Text => json!({ "rich_text": {} }),
        Number => json!({ "number": { "format": "number" } }),
        Date => json!({ "date": {} }),
        Checkbox => json!({ "checkbox": {} }),
        Url => json!({ "url": {} }),
        Email => json!({ "email": {} }),
        PhoneNumber => json!({ "phone_number": {} }),
        Person => json!({ "people": {} }),
        File => json!({ "files": {} }),
        Select | MultiSelect => {
            let options = select_options(column_type, name, rows, rng);
            if column_type == Select {
                json!({ "select": { "options": options } })
            } else {
                json!({ "multi_select": { "options": options } })
            }
        }
        // Status properties and relations cannot be created by patching the
        // schema, and unsettable types were filtered before this point.
        Status | Relation | Title | CreatedTime | LastEditedTime | Formula | Rollup
        | CreatedBy | LastEditedBy => return None,
    };
    Some(definition)
}

/// The distinct values a column takes across the input, split on commas for
/// multi-select columns.
fn distinct_values(column_type: ColumnType, name: &str, rows: &[Row]) -> BTreeSet<String> {
    let mut values = BTreeSet::new();
    for row in rows {
        let Some(cell) = row.text(name) else { continue };
        if column_type == ColumnType::MultiSelect {
            values.extend(
                cell.split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            );
        } else {
            values.insert(cell);
        }
    }
    values
}

fn option_color(rng: &mut Option<&mut SmallRng>) -> &'static str {
    match rng.as_mut() {
        // Skip the leading "default" entry when randomizing.
        Some(rng) => SELECT_COLORS[rng.gen_range(1..SELECT_COLORS.len())],
        None => "default",
    }
}

/// The distinct values of a new select column become its options, with the
/// default colour or a random pick from the palette.
fn select_options(
    column_type: ColumnType,
    name: &str,
    rows: &[Row],
    mut rng: Option<&mut SmallRng>,
) -> Vec<Value> {
    distinct_values(column_type, name, rows)
        .into_iter()
        .map(|value| {
            let color = option_color(&mut rng);
            json!({ "name": value, "color": color })
        })
        .collect()
}

/// Input values of an existing select column that are not yet among its
/// options.
fn missing_options(
    property: &models::Property,
    input_name: &str,
    rows: &[Row],
    rng: Option<&mut SmallRng>,
) -> Vec<Value> {
    let mut rng = rng;
    distinct_values(property.column_type, input_name, rows)
        .into_iter()
        .filter(|value| !property.has_option(value))
        .map(|value| {
            let color = option_color(&mut rng);
            json!({ "name": value, "color": color })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::FailFlags;
    use crate::testutil::{schema_with, table_rows, MockOps};

    fn base_config() -> SyncConfig {
        SyncConfig::default()
    }

    #[tokio::test]
    async fn first_column_maps_to_title_regardless_of_name() {
        let ops = MockOps::default();
        let schema = schema_with(&[("Name", ColumnType::Title), ("b", ColumnType::Text)]);
        let (header, rows) = table_rows(&[("a", "1"), ("b", "x")]);

        let effective = reconcile(&ops, &schema, &header, &rows, &base_config())
            .await
            .unwrap();
        assert_eq!("a", effective.key_column().input_name);
        assert_eq!("Name", effective.key_column().property_name);
        assert_eq!(ColumnType::Title, effective.key_column().column_type);
    }

    #[tokio::test]
    async fn missing_columns_are_dropped_by_default() {
        let ops = MockOps::default();
        let schema = schema_with(&[("Name", ColumnType::Title)]);
        let (header, rows) = table_rows(&[("a", "1"), ("b", "x")]);

        let effective = reconcile(&ops, &schema, &header, &rows, &base_config())
            .await
            .unwrap();
        assert_eq!(1, effective.columns.len());
        assert_eq!(0, ops.database_patch_count());
    }

    #[tokio::test]
    async fn missing_columns_fail_when_strict() {
        let ops = MockOps::default();
        let schema = schema_with(&[("Name", ColumnType::Title)]);
        let (header, rows) = table_rows(&[("a", "1"), ("b", "x")]);

        let config = SyncConfig {
            fail: FailFlags {
                missing_columns: true,
                ..Default::default()
            },
            ..base_config()
        };
        let err = reconcile(&ops, &schema, &header, &rows, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingColumn(name) if name == "b"));
    }

    #[tokio::test]
    async fn missing_columns_are_added_with_inferred_types() {
        let ops = MockOps::default();
        let schema = schema_with(&[("Name", ColumnType::Title)]);
        let (header, rows) = table_rows(&[("a", "1"), ("n", "2.5"), ("t", "hello")]);

        let config = SyncConfig {
            add_missing_columns: true,
            ..base_config()
        };
        let effective = reconcile(&ops, &schema, &header, &rows, &config)
            .await
            .unwrap();

        assert_eq!(ColumnType::Number, effective.get("n").unwrap().column_type);
        assert_eq!(ColumnType::Text, effective.get("t").unwrap().column_type);
        assert_eq!(1, ops.database_patch_count());
    }

    #[tokio::test]
    async fn declared_types_override_inference() {
        let ops = MockOps::default();
        let schema = schema_with(&[("Name", ColumnType::Title)]);
        let (header, rows) = table_rows(&[("a", "1"), ("b", "x")]);

        let config = SyncConfig {
            add_missing_columns: true,
            column_types: vec![ColumnType::Number],
            ..base_config()
        };
        let effective = reconcile(&ops, &schema, &header, &rows, &config)
            .await
            .unwrap();
        assert_eq!(ColumnType::Number, effective.get("b").unwrap().column_type);
    }

    #[tokio::test]
    async fn too_many_declared_types_are_rejected() {
        let ops = MockOps::default();
        let schema = schema_with(&[("Name", ColumnType::Title)]);
        let (header, rows) = table_rows(&[("a", "1"), ("b", "x")]);

        let config = SyncConfig {
            column_types: vec![ColumnType::Number, ColumnType::Date],
            ..base_config()
        };
        let err = reconcile(&ops, &schema, &header, &rows, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ColumnTypeCount { declared: 2, columns: 1 }));
    }

    #[tokio::test]
    async fn new_select_values_become_options() {
        let ops = MockOps::default();
        let mut schema = schema_with(&[("Name", ColumnType::Title), ("kind", ColumnType::Select)]);
        schema.properties[1].options = vec![models::SelectOption {
            name: "tool".to_string(),
            color: Some("blue".to_string()),
        }];
        let (header, rows) = table_rows(&[("a", "1"), ("kind", "gadget")]);

        let effective = reconcile(&ops, &schema, &header, &rows, &base_config())
            .await
            .unwrap();
        let kind = effective.get("kind").unwrap();
        assert!(kind.options.contains(&"tool".to_string()));
        assert!(kind.options.contains(&"gadget".to_string()));
        assert_eq!(1, ops.database_patch_count(), "options were created explicitly");
    }

    #[tokio::test]
    async fn known_select_values_patch_nothing() {
        let ops = MockOps::default();
        let mut schema = schema_with(&[("Name", ColumnType::Title), ("kind", ColumnType::Select)]);
        schema.properties[1].options = vec![models::SelectOption {
            name: "tool".to_string(),
            color: None,
        }];
        let (header, rows) = table_rows(&[("a", "1"), ("kind", "tool")]);

        reconcile(&ops, &schema, &header, &rows, &base_config())
            .await
            .unwrap();
        assert_eq!(0, ops.database_patch_count());
    }

    #[tokio::test]
    async fn unsettable_columns_are_dropped_or_fatal() {
        let ops = MockOps::default();
        let schema = schema_with(&[
            ("Name", ColumnType::Title),
            ("calc", ColumnType::Formula),
        ]);
        let (header, rows) = table_rows(&[("a", "1"), ("calc", "x")]);

        let effective = reconcile(&ops, &schema, &header, &rows, &base_config())
            .await
            .unwrap();
        assert!(effective.get("calc").is_none());

        let config = SyncConfig {
            fail: FailFlags {
                unsettable_columns: true,
                ..Default::default()
            },
            ..base_config()
        };
        let err = reconcile(&ops, &schema, &header, &rows, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsettableColumn(..)));
    }

    #[tokio::test]
    async fn decoration_columns_leave_the_write_set() {
        let ops = MockOps::default();
        let schema = schema_with(&[("Name", ColumnType::Title), ("pic", ColumnType::Text)]);
        let (header, rows) = table_rows(&[("a", "1"), ("pic", "photo.png")]);

        let config = SyncConfig {
            image_columns: vec!["pic".to_string()],
            ..base_config()
        };
        let effective = reconcile(&ops, &schema, &header, &rows, &config)
            .await
            .unwrap();
        assert!(effective.get("pic").is_none());

        let config = SyncConfig {
            image_columns: vec!["pic".to_string()],
            image_columns_keep: true,
            ..base_config()
        };
        let effective = reconcile(&ops, &schema, &header, &rows, &config)
            .await
            .unwrap();
        assert!(effective.get("pic").is_some());
    }

    #[tokio::test]
    async fn key_column_rename_patches_the_database() {
        let ops = MockOps::default();
        let schema = schema_with(&[("Name", ColumnType::Title)]);
        let (header, rows) = table_rows(&[("id", "1")]);

        let config = SyncConfig {
            rename_key_column: Some(("Name".to_string(), "Key".to_string())),
            ..base_config()
        };
        let effective = reconcile(&ops, &schema, &header, &rows, &config)
            .await
            .unwrap();
        assert_eq!("Key", effective.key_column().property_name);
        assert_eq!(1, ops.database_patch_count());

        let config = SyncConfig {
            rename_key_column: Some(("Wrong".to_string(), "Key".to_string())),
            ..base_config()
        };
        let err = reconcile(&ops, &schema, &header, &rows, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RenameMismatch { .. }));
    }
}
