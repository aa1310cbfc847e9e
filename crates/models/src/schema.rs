use serde::Deserialize;
use serde_json::Value;

use crate::types::{ColumnType, UnknownColumnType};

/// Option colours accepted by the remote API. `default` is what newly created
/// options get unless colour randomization is enabled.
pub const SELECT_COLORS: &[&str] = &[
    "default", "gray", "brown", "orange", "yellow", "green", "blue", "purple", "pink", "red",
];

/// The remote database schema: an ordered list of properties with the title
/// property first.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub database_id: String,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub column_type: ColumnType,
    /// Existing options of a select, multi-select, or status property.
    pub options: Vec<SelectOption>,
    /// Identifier of the linked database, for relation properties.
    pub relation_database_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectOption {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("database object has no 'properties' map")]
    MissingProperties,

    #[error("malformed property '{0}': {1}")]
    MalformedProperty(String, serde_json::Error),

    #[error("property '{0}': {1}")]
    UnknownType(String, #[source] UnknownColumnType),

    #[error("database has no title property")]
    MissingTitle,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    select: Option<RawOptions>,
    #[serde(default)]
    multi_select: Option<RawOptions>,
    #[serde(default)]
    status: Option<RawOptions>,
    #[serde(default)]
    relation: Option<RawRelation>,
}

#[derive(Debug, Deserialize)]
struct RawOptions {
    #[serde(default)]
    options: Vec<SelectOption>,
}

#[derive(Debug, Deserialize)]
struct RawRelation {
    database_id: String,
}

impl Schema {
    /// Builds a Schema from the `properties` map of a retrieved database
    /// object. The title property is moved to the front; the remaining order
    /// follows the response map.
    pub fn from_database_object(database_id: String, object: &Value) -> Result<Schema, SchemaError> {
        let map = object
            .get("properties")
            .and_then(Value::as_object)
            .ok_or(SchemaError::MissingProperties)?;

        let mut title = None;
        let mut rest = Vec::with_capacity(map.len());

        for (name, raw) in map {
            let raw: RawProperty = serde_json::from_value(raw.clone())
                .map_err(|err| SchemaError::MalformedProperty(name.clone(), err))?;
            let column_type = ColumnType::from_api_name(&raw.kind)
                .map_err(|err| SchemaError::UnknownType(name.clone(), err))?;

            let options = match (&raw.select, &raw.multi_select, &raw.status) {
                (Some(o), _, _) | (_, Some(o), _) | (_, _, Some(o)) => o.options.clone(),
                _ => Vec::new(),
            };

            let property = Property {
                id: raw.id,
                name: name.clone(),
                column_type,
                options,
                relation_database_id: raw.relation.map(|r| r.database_id),
            };
            if column_type == ColumnType::Title {
                title = Some(property);
            } else {
                rest.push(property);
            }
        }

        let title = title.ok_or(SchemaError::MissingTitle)?;
        let mut properties = Vec::with_capacity(rest.len() + 1);
        properties.push(title);
        properties.extend(rest);

        Ok(Schema {
            database_id,
            properties,
        })
    }

    /// The title property. Construction guarantees it exists and is first.
    pub fn title(&self) -> &Property {
        &self.properties[0]
    }

    /// Case-sensitive lookup by property name.
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

impl Property {
    /// Whether `name` is among the property's existing options.
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|o| o.name == name)
    }

    /// The status option substituted for unknown status values: the first
    /// declared option, or None when the property declares none (the value is
    /// then left empty).
    pub fn default_status(&self) -> Option<&SelectOption> {
        self.options.first()
    }
}
