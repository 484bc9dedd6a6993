//! Conversions between application types and [`Record`]s.
//!
//! Application code keeps its own strongly typed structs and converts them at
//! the boundary. Numbers are typed by the declared [`Attr`], so an `f64` field
//! declared as `decimal` is stored as exact decimal text.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map as JsonMap, Number, Value as Json};

use crate::error::{OdmError, Result};
use crate::schema::{Attr, AttrType, Modifier, PropType, ScalarType};
use crate::value::{Record, Scalar, Value};

/// Converts an application value into a [`Record`] shaped by `attr`.
///
/// `null` fields are skipped. Fields without an attribute are rejected.
pub fn to_record<T: Serialize>(value: &T, attr: &Attr) -> Result<Record> {
    let json = serde_json::to_value(value).map_err(|e| OdmError::InvalidProperty(e.to_string()))?;
    let Json::Object(fields) = json else {
        return Err(OdmError::InvalidProperty(
            "Only object-shaped values can be converted to a record".to_string(),
        ));
    };

    let mut record = Record::new();
    for (key, field) in fields {
        if field.is_null() {
            continue;
        }
        let attr_type = attr.get(&key).ok_or_else(|| {
            OdmError::SchemaMismatch(format!("Schema of object property `{}` not found", key))
        })?;
        let value = match attr_type {
            AttrType::Scalar(ty) => json_to_value(&key, field, ty)?,
            AttrType::Nested(layout) => {
                let Json::Object(sub_fields) = field else {
                    return Err(OdmError::SchemaMismatch(format!(
                        "Property `{}` is declared as a nested object",
                        key
                    )));
                };
                let mut sub = Record::new();
                for (sub_key, sub_field) in sub_fields {
                    if sub_field.is_null() {
                        continue;
                    }
                    let ty = layout.get(&sub_key).ok_or_else(|| {
                        OdmError::SchemaMismatch(format!(
                            "Schema of sub-object property `{}` not found",
                            sub_key
                        ))
                    })?;
                    sub.insert(sub_key.clone(), json_to_value(&sub_key, sub_field, ty)?);
                }
                Value::Map(sub)
            }
        };
        record.insert(key, value);
    }

    Ok(record)
}

/// Converts a [`Record`] into an application value.
pub fn from_record<T: DeserializeOwned>(record: &Record) -> Result<T> {
    let json = Json::Object(
        record
            .iter()
            .map(|(k, v)| Ok((k.clone(), value_to_json(v)?)))
            .collect::<Result<JsonMap<_, _>>>()?,
    );
    serde_json::from_value(json).map_err(|e| OdmError::InvalidProperty(e.to_string()))
}

fn json_to_value(key: &str, json: Json, ty: &PropType) -> Result<Value> {
    match ty.modifier {
        Modifier::Single | Modifier::Optional => json_to_scalar(key, json, ty.scalar).map(Value::from),
        Modifier::Array => match json {
            Json::Array(items) => items
                .into_iter()
                .map(|item| json_to_scalar(key, item, ty.scalar).map(Value::from))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Err(mismatch(key, &other, ty)),
        },
        Modifier::Set => match json {
            Json::Array(items) => items
                .into_iter()
                .map(|item| json_to_scalar(key, item, ty.scalar))
                .collect::<Result<_>>()
                .map(Value::Set),
            other => Err(mismatch(key, &other, ty)),
        },
    }
}

fn json_to_scalar(key: &str, json: Json, scalar: ScalarType) -> Result<Scalar> {
    let ty = PropType::single(scalar);
    match (scalar, json) {
        (ScalarType::Bool, Json::Bool(b)) => Ok(Scalar::Bool(b)),
        (ScalarType::Int, Json::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Scalar::Int(i)),
            None => n
                .as_f64()
                .map(|f| Scalar::Int(f.trunc() as i64))
                .ok_or_else(|| mismatch(key, &Json::Number(n), &ty)),
        },
        (ScalarType::Double, Json::Number(n)) => n
            .as_f64()
            .map(Scalar::Double)
            .ok_or_else(|| mismatch(key, &Json::Number(n), &ty)),
        (ScalarType::Decimal, Json::Number(n)) => Ok(Scalar::Decimal(n.to_string())),
        (ScalarType::Decimal, Json::String(s)) => Ok(Scalar::Decimal(s)),
        (ScalarType::String, Json::String(s)) => Ok(Scalar::String(s)),
        (_, other) => Err(mismatch(key, &other, &ty)),
    }
}

fn value_to_json(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number(Number::from(*i)),
        Value::Double(d) => Number::from_f64(*d).map(Json::Number).ok_or_else(|| {
            OdmError::InvalidProperty(format!("Double `{}` has no JSON representation", d))
        })?,
        Value::Decimal(d) | Value::String(d) => Json::String(d.clone()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect::<Result<_>>()?),
        Value::Set(items) => Json::Array(
            items
                .iter()
                .map(|s| value_to_json(&Value::from(s.clone())))
                .collect::<Result<_>>()?,
        ),
        Value::Map(record) => Json::Object(
            record
                .iter()
                .map(|(k, v)| Ok((k.clone(), value_to_json(v)?)))
                .collect::<Result<_>>()?,
        ),
    })
}

fn mismatch(key: &str, json: &Json, ty: &PropType) -> OdmError {
    OdmError::SchemaMismatch(format!(
        "Value `{}` of property `{}` does not match type `{}`",
        json, key, ty
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Meta {
        obj_name: String,
        obj_rank: Option<i64>,
        tags: BTreeSet<String>,
        price: String,
    }

    fn meta_attr() -> Attr {
        Attr::from([
            ("objName".to_string(), AttrType::Scalar("string".parse().unwrap())),
            ("objRank".to_string(), AttrType::Scalar("int?".parse().unwrap())),
            ("tags".to_string(), AttrType::Scalar("string<>".parse().unwrap())),
            ("price".to_string(), AttrType::Scalar("decimal".parse().unwrap())),
        ])
    }

    #[test]
    fn test_struct_round_trip() {
        let meta = Meta {
            obj_name: "mock".to_string(),
            obj_rank: Some(3),
            tags: BTreeSet::from(["a".to_string(), "b".to_string()]),
            price: "19.99".to_string(),
        };

        let record = to_record(&meta, &meta_attr()).unwrap();
        assert_eq!(record.get("objRank"), Some(&Value::Int(3)));
        assert_eq!(record.get("price"), Some(&Value::decimal("19.99")));

        let back: Meta = from_record(&record).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_none_fields_are_skipped() {
        let meta = Meta {
            obj_name: "mock".to_string(),
            obj_rank: None,
            tags: BTreeSet::new(),
            price: "1".to_string(),
        };
        let record = to_record(&meta, &meta_attr()).unwrap();
        assert!(!record.contains_key("objRank"));
    }

    #[test]
    fn test_unknown_field_is_schema_mismatch() {
        let attr = Attr::from([(
            "objName".to_string(),
            AttrType::Scalar("string".parse().unwrap()),
        )]);
        let result = to_record(&serde_json::json!({ "objName": "a", "other": 1 }), &attr);
        assert!(matches!(result, Err(OdmError::SchemaMismatch(_))));
    }

    #[test]
    fn test_int_truncates_fractional_numbers() {
        let attr = Attr::from([("n".to_string(), AttrType::Scalar("int".parse().unwrap()))]);
        let record = to_record(&serde_json::json!({ "n": 3.7 }), &attr).unwrap();
        assert_eq!(record.get("n"), Some(&Value::Int(3)));
    }
}
