use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{OdmError, Result};

use super::PropType;

/// Type of one attribute: either a PropType or a one-level nested object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrType {
    Scalar(PropType),
    Nested(BTreeMap<String, PropType>),
}

/// Field name to attribute type.
pub type Attr = BTreeMap<String, AttrType>;

/// Whether a property holds one record or a keyed collection of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    Single,
    Collection,
}

/// Layout of one top-level property of an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prop {
    #[serde(rename = "type")]
    pub kind: PropKind,
    /// Field of each element holding its unique key. Required for collections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub attr: Attr,
}

impl Prop {
    pub fn single(attr: Attr) -> Self {
        Self {
            kind: PropKind::Single,
            identifier: None,
            attr,
        }
    }

    pub fn collection(identifier: impl Into<String>, attr: Attr) -> Self {
        Self {
            kind: PropKind::Collection,
            identifier: Some(identifier.into()),
            attr,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.kind == PropKind::Collection
    }

    /// Returns the element identifier field of a collection.
    pub fn collection_identifier(&self, prop_name: &str) -> Result<&str> {
        self.identifier.as_deref().ok_or_else(|| {
            OdmError::InvalidSchema(format!(
                "Value of `identifier` is missing on property `{}`",
                prop_name
            ))
        })
    }
}

/// Layout of a data model.
///
/// `name` prefixes the partition key of every record of the model.
/// `identifier` optionally names the field holding a caller supplied id,
/// otherwise ids are generated when objects are constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub props: BTreeMap<String, Prop>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: None,
            props: BTreeMap::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, prop: Prop) -> Self {
        self.props.insert(name.into(), prop);
        self
    }

    /// Looks up the layout of a property.
    pub fn prop(&self, name: &str) -> Result<&Prop> {
        self.props.get(name).ok_or_else(|| {
            OdmError::SchemaMismatch(format!("Schema of property `{}` not found", name))
        })
    }

    /// Checks the schema for authoring errors.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains('#') {
            return Err(OdmError::InvalidSchema(format!(
                "Schema name `{}` must be non-empty and must not contain `#`",
                self.name
            )));
        }

        for (name, prop) in &self.props {
            if name.is_empty() || name.contains('#') {
                return Err(OdmError::InvalidSchema(format!(
                    "Property name `{}` must be non-empty and must not contain `#`",
                    name
                )));
            }

            if prop.is_collection() {
                let identifier = prop.collection_identifier(name)?;
                if !prop.attr.contains_key(identifier) {
                    return Err(OdmError::InvalidSchema(format!(
                        "Identifier `{}` of property `{}` is not one of its attributes",
                        identifier, name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Schemas of every model stored in one table or collection, keyed by model name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON object of model name to schema.
    pub fn from_json(json: &str) -> Result<Self> {
        let registry: Self =
            serde_json::from_str(json).map_err(|e| OdmError::Config(e.to_string()))?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn insert(&mut self, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        self.schemas.insert(schema.name.clone(), schema.clone());
        schema
    }

    pub fn with(mut self, schema: Schema) -> Self {
        self.insert(schema);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.schemas.values().try_for_each(|schema| schema.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarType;

    const MOCK_SCHEMA: &str = r#"{
        "MockObj": {
            "name": "MockObj",
            "identifier": "ulid",
            "props": {
                "meta": { "type": "single", "attr": { "objName": "string", "objRank": "int?" } },
                "row1": { "type": "single", "attr": { "subObj": { "prop1": "decimal[]" } } },
                "collection": {
                    "type": "collection",
                    "identifier": "collectionId",
                    "attr": { "collectionId": "string", "sampleIntArr": "int[]" }
                }
            }
        }
    }"#;

    #[test]
    fn test_registry_from_json() {
        let registry = SchemaRegistry::from_json(MOCK_SCHEMA).unwrap();
        let schema = registry.get("MockObj").unwrap();

        assert_eq!(schema.identifier.as_deref(), Some("ulid"));
        assert_eq!(schema.props.len(), 3);

        let meta = schema.prop("meta").unwrap();
        assert_eq!(meta.kind, PropKind::Single);
        assert_eq!(
            meta.attr.get("objRank"),
            Some(&AttrType::Scalar(PropType::optional(ScalarType::Int)))
        );

        let row1 = schema.prop("row1").unwrap();
        match row1.attr.get("subObj") {
            Some(AttrType::Nested(fields)) => {
                assert_eq!(
                    fields.get("prop1"),
                    Some(&PropType::array(ScalarType::Decimal))
                );
            }
            other => panic!("Expected nested attr, got {:?}", other),
        }

        let collection = schema.prop("collection").unwrap();
        assert!(collection.is_collection());
        assert_eq!(collection.identifier.as_deref(), Some("collectionId"));
    }

    #[test]
    fn test_registry_rejects_unknown_type_tag() {
        let json = r#"{ "A": { "name": "A", "props": {
            "p": { "type": "single", "attr": { "f": "float" } } } } }"#;
        assert!(matches!(
            SchemaRegistry::from_json(json),
            Err(OdmError::Config(_))
        ));
    }

    #[test]
    fn test_collection_without_identifier_is_invalid() {
        let schema = Schema::new("A").with_prop(
            "items",
            Prop {
                kind: PropKind::Collection,
                identifier: None,
                attr: Attr::new(),
            },
        );
        assert!(matches!(schema.validate(), Err(OdmError::InvalidSchema(_))));
    }

    #[test]
    fn test_collection_identifier_must_be_an_attribute() {
        let schema = Schema::new("A").with_prop(
            "items",
            Prop::collection(
                "id",
                Attr::from([(
                    "name".to_string(),
                    AttrType::Scalar(PropType::single(ScalarType::String)),
                )]),
            ),
        );
        assert!(matches!(schema.validate(), Err(OdmError::InvalidSchema(_))));
    }

    #[test]
    fn test_prop_lookup_reports_missing_schema_entry() {
        let schema = Schema::new("A");
        assert_eq!(
            schema.prop("meta").unwrap_err(),
            OdmError::SchemaMismatch("Schema of property `meta` not found".to_string())
        );
    }
}
