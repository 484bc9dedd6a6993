//! Schema-bound objects.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::Result;
use crate::schema::Schema;
use crate::typed;
use crate::value::{Record, Value};

/// Runtime value of a top-level property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// One record, for `single` props.
    Single(Record),
    /// Records keyed by their identifier, for `collection` props.
    Collection(BTreeMap<String, Record>),
    /// A bare value. Never valid for storage; `insert_obj` rejects it.
    Scalar(Value),
}

impl PropValue {
    pub fn as_single(&self) -> Option<&Record> {
        match self {
            PropValue::Single(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&BTreeMap<String, Record>> {
        match self {
            PropValue::Collection(c) => Some(c),
            _ => None,
        }
    }
}

/// Identity of an object: the model name and the object id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjKey {
    pub schema_name: String,
    pub object_id: String,
}

impl fmt::Display for ObjKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.schema_name, self.object_id)
    }
}

/// Address of one stored record under an object.
///
/// `identifier` is the element key for `collection` props and `None` for
/// `single` props.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementKey {
    pub prop: String,
    pub identifier: Option<String>,
}

impl ElementKey {
    pub fn single(prop: impl Into<String>) -> Self {
        Self {
            prop: prop.into(),
            identifier: None,
        }
    }

    pub fn element(prop: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            prop: prop.into(),
            identifier: Some(identifier.into()),
        }
    }
}

#[derive(Debug)]
struct ObjState {
    schema: Arc<Schema>,
    /// Fixed on first read.
    id: Option<String>,
    props: BTreeMap<String, PropValue>,
}

impl ObjState {
    fn resolve_id(&mut self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }

        let field = self.schema.identifier.clone();
        let id = field
            .as_deref()
            .and_then(|field| match self.props.get(field) {
                Some(PropValue::Scalar(value)) => value.to_key(),
                _ => None,
            })
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if let Some(field) = field {
            self.props
                .entry(field)
                .or_insert_with(|| PropValue::Scalar(Value::String(id.clone())));
        }
        self.id = Some(id.clone());
        id
    }
}

/// Shared handle to an object bound to a [`Schema`].
///
/// The object id is resolved on first read: from the field named by
/// `schema.identifier` when it holds a value, otherwise generated. It does
/// not change afterwards.
///
/// Clones refer to the same object. Property values are meant to be changed
/// through a write transaction; [`Obj::set_prop`] and [`Obj::remove_prop`]
/// change the in-memory object only and are not tracked for persistence.
#[derive(Clone)]
pub struct Obj {
    inner: Arc<RwLock<ObjState>>,
}

impl Obj {
    /// Creates an object whose id is resolved on first read.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ObjState {
                schema,
                id: None,
                props: BTreeMap::new(),
            })),
        }
    }

    /// Creates an object with a caller supplied id, also set on the identity
    /// field when the schema names one.
    pub fn with_id(schema: Arc<Schema>, id: impl Into<String>) -> Self {
        let id = id.into();
        let mut props = BTreeMap::new();
        if let Some(field) = &schema.identifier {
            props.insert(field.clone(), PropValue::Scalar(Value::String(id.clone())));
        }
        Self {
            inner: Arc::new(RwLock::new(ObjState {
                schema,
                id: Some(id),
                props,
            })),
        }
    }

    /// Sets a property in place. Chainable, for building objects before insertion.
    pub fn with_prop(self, name: impl Into<String>, value: PropValue) -> Self {
        self.set_prop(name, value);
        self
    }

    pub fn object_id(&self) -> String {
        if let Some(id) = &self.inner.read().id {
            return id.clone();
        }
        self.inner.write().resolve_id()
    }

    pub fn schema(&self) -> Arc<Schema> {
        self.inner.read().schema.clone()
    }

    /// Identity used to address the object's records.
    pub fn owner_key(&self) -> ObjKey {
        let mut state = self.inner.write();
        ObjKey {
            schema_name: state.schema.name.clone(),
            object_id: state.resolve_id(),
        }
    }

    /// Names of the properties declared by the schema.
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().schema.props.keys().cloned().collect()
    }

    pub fn prop(&self, name: &str) -> Option<PropValue> {
        self.inner.read().props.get(name).cloned()
    }

    /// Snapshot of every property currently set.
    pub fn props(&self) -> BTreeMap<String, PropValue> {
        self.inner.read().props.clone()
    }

    /// Sets a property directly, bypassing persistence tracking.
    pub fn set_prop(&self, name: impl Into<String>, value: PropValue) {
        self.inner.write().props.insert(name.into(), value);
    }

    /// Removes a property directly, bypassing persistence tracking.
    pub fn remove_prop(&self, name: &str) -> Option<PropValue> {
        self.inner.write().props.remove(name)
    }

    /// Mutates the properties in place, bypassing persistence tracking.
    pub fn update_props<R>(&self, f: impl FnOnce(&mut BTreeMap<String, PropValue>) -> R) -> R {
        f(&mut self.inner.write().props)
    }

    /// Deserializes a `single` property into an application type.
    pub fn prop_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.prop(name) {
            Some(PropValue::Single(record)) => typed::from_record(&record).map(Some),
            _ => Ok(None),
        }
    }

    /// Whether both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.object_id() != other.object_id() {
            return false;
        }
        let a = self.inner.read();
        let b = other.inner.read();
        a.schema.name == b.schema.name && a.props == b.props
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        f.debug_struct("Obj")
            .field("schema", &state.schema.name)
            .field("id", &state.id)
            .field("props", &state.props)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::schema::{Attr, AttrType, Prop};
    use crate::value::record;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new("MockObj"))
    }

    fn identified_schema() -> Arc<Schema> {
        Arc::new(
            Schema::new("MockObj")
                .with_identifier("ulid")
                .with_prop(
                    "meta",
                    Prop::single(Attr::from([(
                        "objName".to_string(),
                        AttrType::Scalar("string".parse().unwrap()),
                    )])),
                ),
        )
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Obj::new(schema());
        let b = Obj::new(schema());
        assert_ne!(a.object_id(), b.object_id());
    }

    #[test]
    fn test_owner_key_display() {
        let obj = Obj::with_id(schema(), "01H");
        assert_eq!(obj.owner_key().to_string(), "MockObj#01H");
    }

    #[test]
    fn test_clones_share_state() {
        let obj = Obj::with_id(schema(), "1");
        let alias = obj.clone();
        alias.set_prop("meta", PropValue::Single(record([("objName", "mock")])));

        assert!(obj.ptr_eq(&alias));
        assert_eq!(
            obj.prop("meta"),
            Some(PropValue::Single(record([("objName", "mock")])))
        );
    }

    #[test]
    fn test_structural_equality() {
        let a = Obj::with_id(schema(), "1")
            .with_prop("meta", PropValue::Single(record([("objName", "mock")])));
        let b = Obj::with_id(schema(), "1")
            .with_prop("meta", PropValue::Single(record([("objName", "mock")])));
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);

        b.remove_prop("meta");
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_id_reads_identity_field() {
        let obj = Obj::new(identified_schema());
        obj.set_prop("ulid", PropValue::Scalar(Value::from("MY-ID")));

        assert_eq!(obj.object_id(), "MY-ID");
        assert_eq!(obj.owner_key().to_string(), "MockObj#MY-ID");
    }

    #[test]
    fn test_object_id_is_fixed_after_first_read() {
        let obj = Obj::new(identified_schema());
        let id = obj.object_id();

        assert_eq!(obj.prop("ulid"), Some(PropValue::Scalar(Value::String(id.clone()))));
        obj.set_prop("ulid", PropValue::Scalar(Value::from("OTHER")));
        assert_eq!(obj.object_id(), id);
    }

    #[test]
    fn test_with_id_sets_identity_field() {
        let obj = Obj::with_id(identified_schema(), "01H");
        assert_eq!(obj.prop("ulid"), Some(PropValue::Scalar(Value::from("01H"))));

        let plain = Obj::with_id(schema(), "01H");
        assert!(plain.props().is_empty());
    }

    #[test]
    fn test_keys_lists_declared_props() {
        let obj = Obj::new(identified_schema());
        obj.set_prop("extra", PropValue::Single(record([("objName", "mock")])));

        assert_eq!(obj.keys(), vec!["meta".to_string()]);
    }

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Meta {
        obj_name: String,
    }

    #[test]
    fn test_prop_as() {
        let obj = Obj::with_id(identified_schema(), "1")
            .with_prop("meta", PropValue::Single(record([("objName", "mock")])));

        assert_eq!(
            obj.prop_as::<Meta>("meta").unwrap(),
            Some(Meta {
                obj_name: "mock".to_string()
            })
        );
        assert_eq!(obj.prop_as::<Meta>("missing").unwrap(), None);
        assert_eq!(obj.prop_as::<Meta>("ulid").unwrap(), None);
    }
}
