//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValues and [`Value`]s,
//! directed by the declared [`PropType`]. These are testable in isolation without DynamoDB access.
//!
//! Wire kinds by type:
//!
//! | type                 | wire                    |
//! |----------------------|-------------------------|
//! | `bool`               | `BOOL`                  |
//! | `int`, `double`      | `N`                     |
//! | `decimal`, `string`  | `S`                     |
//! | `bool[]`, `bool<>`   | `L` of `BOOL`           |
//! | `int[]`, `double[]`  | `L` of `N`              |
//! | `decimal[]`, `string[]` | `L` of `S`           |
//! | `int<>`, `double<>`  | `NS`                    |
//! | `decimal<>`, `string<>` | `SS`                 |
//! | nested object        | `M`                     |
//!
//! DynamoDB rejects empty sets, so an empty `NS`/`SS` set is written as an empty `L`.

use std::collections::{BTreeSet, HashMap};

use aws_sdk_dynamodb::types::AttributeValue;
use tyodm_core::schema::{Modifier, ScalarType};
use tyodm_core::{Attr, AttrType, OdmError, PropType, Record, Result, Scalar, Value};

use super::keys;

/// A raw DynamoDB item.
pub type Item = HashMap<String, AttributeValue>;

// ============================================================================
// Encoding
// ============================================================================

/// Encode a value as the AttributeValue its type is stored as.
pub fn encode(value: &Value, ty: &PropType) -> Result<AttributeValue> {
    let ty = ty.required();
    match ty.modifier {
        Modifier::Single | Modifier::Optional => encode_scalar(value, ty.scalar, &ty),
        Modifier::Array => {
            let Value::List(items) = value else {
                return Err(mismatch(value, &ty));
            };
            items
                .iter()
                .map(|item| encode_scalar(item, ty.scalar, &ty))
                .collect::<Result<Vec<_>>>()
                .map(AttributeValue::L)
        }
        Modifier::Set => encode_set(value, &ty),
    }
}

fn encode_scalar(value: &Value, scalar: ScalarType, ty: &PropType) -> Result<AttributeValue> {
    match (scalar, value) {
        (ScalarType::Bool, Value::Bool(b)) => Ok(AttributeValue::Bool(*b)),
        (ScalarType::Int, Value::Int(i)) => Ok(AttributeValue::N(i.to_string())),
        (ScalarType::Int, Value::Double(d)) => truncate_to_i64(finite(*d)?)
            .map(|i| AttributeValue::N(i.to_string()))
            .ok_or_else(|| OdmError::InvalidProperty(format!("`{}` is out of range for `int`", d))),
        (ScalarType::Double, Value::Double(d)) => Ok(AttributeValue::N(finite(*d)?.to_string())),
        (ScalarType::Double, Value::Int(i)) => Ok(AttributeValue::N(i.to_string())),
        (ScalarType::Decimal, Value::Decimal(text)) => {
            if is_decimal_text(text) {
                Ok(AttributeValue::S(text.clone()))
            } else {
                Err(OdmError::InvalidProperty(format!(
                    "`{}` is not a decimal number",
                    text
                )))
            }
        }
        (ScalarType::Decimal, Value::Int(i)) => Ok(AttributeValue::S(i.to_string())),
        (ScalarType::Decimal, Value::Double(d)) => Ok(AttributeValue::S(finite(*d)?.to_string())),
        (ScalarType::String, Value::String(s)) => Ok(AttributeValue::S(s.clone())),
        _ => Err(mismatch(value, ty)),
    }
}

fn encode_set(value: &Value, ty: &PropType) -> Result<AttributeValue> {
    let members: Vec<Value> = match value {
        Value::Set(set) => set.iter().cloned().map(Value::from).collect(),
        Value::List(items) => items.clone(),
        other => return Err(mismatch(other, ty)),
    };

    let encoded = members
        .into_iter()
        .map(|member| match member {
            // -0.0 and 0.0 are distinct members but the same number on the wire.
            Value::Double(d) if d == 0.0 => Value::Double(0.0),
            other => other,
        })
        .map(|member| encode_scalar(&member, ty.scalar, ty))
        .collect::<Result<Vec<_>>>()?;

    if ty.scalar == ScalarType::Bool {
        // No native boolean set: an ordered list of distinct booleans.
        let mut seen = BTreeSet::new();
        let list = encoded
            .into_iter()
            .filter(|av| match av {
                AttributeValue::Bool(b) => seen.insert(*b),
                _ => false,
            })
            .collect();
        return Ok(AttributeValue::L(list));
    }

    let texts: BTreeSet<String> = encoded
        .into_iter()
        .filter_map(|av| match av {
            AttributeValue::N(text) | AttributeValue::S(text) => Some(text),
            _ => None,
        })
        .collect();

    if texts.is_empty() {
        return Ok(AttributeValue::L(Vec::new()));
    }

    let texts = texts.into_iter().collect();
    if ty.scalar.is_numeric() {
        Ok(AttributeValue::Ns(texts))
    } else {
        Ok(AttributeValue::Ss(texts))
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode an AttributeValue stored with the given type.
///
/// `decimal` values decode to [`Value::Decimal`] holding the exact text;
/// use [`Value::as_f64`] for a (lossy) number.
pub fn decode(av: &AttributeValue, ty: &PropType) -> Result<Value> {
    let ty = ty.required();
    match ty.modifier {
        Modifier::Single | Modifier::Optional => decode_scalar(av, ty.scalar).map(Value::from),
        Modifier::Array => match av {
            AttributeValue::L(items) => items
                .iter()
                .map(|item| decode_scalar(item, ty.scalar).map(Value::from))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            AttributeValue::Ns(texts) | AttributeValue::Ss(texts) => texts
                .iter()
                .map(|text| decode_text(text, ty.scalar).map(Value::from))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Err(incompatible(other, &ty)),
        },
        Modifier::Set => match av {
            AttributeValue::L(items) => items
                .iter()
                .map(|item| decode_scalar(item, ty.scalar))
                .collect::<Result<BTreeSet<_>>>()
                .map(Value::Set),
            AttributeValue::Ns(texts) | AttributeValue::Ss(texts) => texts
                .iter()
                .map(|text| decode_text(text, ty.scalar))
                .collect::<Result<BTreeSet<_>>>()
                .map(Value::Set),
            other => Err(incompatible(other, &ty)),
        },
    }
}

/// Decode `av` and assign it to `target[key]`.
///
/// A `NULL` attribute of an optional type leaves the field absent.
pub fn assign_to_record(
    av: &AttributeValue,
    ty: &PropType,
    target: &mut Record,
    key: &str,
) -> Result<()> {
    if ty.is_optional() && matches!(av, AttributeValue::Null(_)) {
        return Ok(());
    }
    let value = decode(av, ty)?;
    target.insert(key.to_string(), value);
    Ok(())
}

fn decode_scalar(av: &AttributeValue, scalar: ScalarType) -> Result<Scalar> {
    match (scalar, av) {
        (ScalarType::Bool, AttributeValue::Bool(b)) => Ok(Scalar::Bool(*b)),
        (ScalarType::Int | ScalarType::Double, AttributeValue::N(text))
        | (ScalarType::Decimal | ScalarType::String, AttributeValue::S(text))
        | (ScalarType::Decimal, AttributeValue::N(text)) => decode_text(text, scalar),
        (_, other) => Err(incompatible(other, &PropType::single(scalar))),
    }
}

fn decode_text(text: &str, scalar: ScalarType) -> Result<Scalar> {
    let invalid = || {
        OdmError::NonCompatibleRecord(format!("`{}` is not a valid `{}`", text, scalar.as_str()))
    };
    match scalar {
        ScalarType::Int => match text.parse::<i64>() {
            Ok(i) => Ok(Scalar::Int(i)),
            Err(_) => text
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(truncate_to_i64)
                .map(Scalar::Int)
                .ok_or_else(invalid),
        },
        ScalarType::Double => text.parse::<f64>().map(Scalar::Double).map_err(|_| invalid()),
        ScalarType::Decimal => {
            if is_decimal_text(text) {
                Ok(Scalar::Decimal(text.to_string()))
            } else {
                Err(invalid())
            }
        }
        ScalarType::String => Ok(Scalar::String(text.to_string())),
        ScalarType::Bool => Err(invalid()),
    }
}

// ============================================================================
// Record conversions
// ============================================================================

/// Encode a record's fields into `item`, validating every field against `attr`.
pub fn record_to_item(record: &Record, attr: &Attr, item: &mut Item) -> Result<()> {
    for (key, value) in record {
        if key.eq_ignore_ascii_case(keys::PK) || key.eq_ignore_ascii_case(keys::SK) {
            return Err(OdmError::InvalidProperty(format!(
                "Field name `{}` is reserved for keys",
                key
            )));
        }

        let attr_type = attr.get(key).ok_or_else(|| {
            OdmError::SchemaMismatch(format!("Schema of object property `{}` not found", key))
        })?;

        let av = match attr_type {
            AttrType::Scalar(ty) => encode(value, ty)?,
            AttrType::Nested(layout) => {
                let Value::Map(sub) = value else {
                    return Err(OdmError::SchemaMismatch(format!(
                        "Property `{}` is declared as a nested object but holds a {}",
                        key,
                        value.kind()
                    )));
                };
                let mut map = HashMap::with_capacity(sub.len());
                for (sub_key, sub_value) in sub {
                    let ty = layout.get(sub_key).ok_or_else(|| {
                        OdmError::SchemaMismatch(format!(
                            "Schema of sub-object property `{}` not found",
                            sub_key
                        ))
                    })?;
                    map.insert(sub_key.clone(), encode(sub_value, ty)?);
                }
                AttributeValue::M(map)
            }
        };

        item.insert(key.clone(), av);
    }

    Ok(())
}

/// Decode the fields of an item described by `attr`.
///
/// Key attributes and fields without a schema entry are skipped, as are
/// nested objects that are not stored as a map.
pub fn item_to_record(item: &Item, attr: &Attr) -> Result<Record> {
    let mut record = Record::new();

    for (key, av) in item {
        if key.eq_ignore_ascii_case(keys::PK) || key.eq_ignore_ascii_case(keys::SK) {
            continue;
        }

        match attr.get(key) {
            None => continue,
            Some(AttrType::Scalar(ty)) => assign_to_record(av, ty, &mut record, key)?,
            Some(AttrType::Nested(layout)) => {
                let AttributeValue::M(sub_item) = av else {
                    continue;
                };
                let mut sub = Record::new();
                for (sub_key, sub_av) in sub_item {
                    if let Some(ty) = layout.get(sub_key) {
                        assign_to_record(sub_av, ty, &mut sub, sub_key)?;
                    }
                }
                record.insert(key.clone(), Value::Map(sub));
            }
        }
    }

    Ok(record)
}

// ============================================================================
// Helper functions
// ============================================================================

/// Truncates `f` toward zero, or `None` if the result does not fit an `i64`.
fn truncate_to_i64(f: f64) -> Option<i64> {
    // 2^63, exactly representable. `i64::MAX as f64` rounds up to it.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    let t = f.trunc();
    (t >= -BOUND && t < BOUND).then_some(t as i64)
}

/// Whether `text` is a plain decimal number: `[+-]digits[.digits][e[+-]digits]`.
fn is_decimal_text(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (unsigned, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    let mantissa_ok = !(int_part.is_empty() && frac_part.is_empty())
        && all_digits(int_part)
        && all_digits(frac_part);
    let exponent_ok = exponent.map_or(true, |e| {
        let digits = e.strip_prefix(['+', '-']).unwrap_or(e);
        !digits.is_empty() && all_digits(digits)
    });

    mantissa_ok && exponent_ok
}

fn finite(d: f64) -> Result<f64> {
    if d.is_finite() {
        Ok(d)
    } else {
        Err(OdmError::InvalidProperty(format!(
            "`{}` cannot be stored as a number",
            d
        )))
    }
}

fn wire_kind(av: &AttributeValue) -> &'static str {
    match av {
        AttributeValue::B(_) => "B",
        AttributeValue::Bool(_) => "BOOL",
        AttributeValue::Bs(_) => "BS",
        AttributeValue::L(_) => "L",
        AttributeValue::M(_) => "M",
        AttributeValue::N(_) => "N",
        AttributeValue::Ns(_) => "NS",
        AttributeValue::Null(_) => "NULL",
        AttributeValue::S(_) => "S",
        AttributeValue::Ss(_) => "SS",
        _ => "unknown",
    }
}

fn mismatch(value: &Value, ty: &PropType) -> OdmError {
    OdmError::SchemaMismatch(format!(
        "Value of kind `{}` does not match type `{}`",
        value.kind(),
        ty
    ))
}

fn incompatible(av: &AttributeValue, ty: &PropType) -> OdmError {
    OdmError::NonCompatibleRecord(format!(
        "Attribute of kind `{}` cannot be read as type `{}`",
        wire_kind(av),
        ty
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tyodm_core::record;

    fn ty(tag: &str) -> PropType {
        tag.parse().unwrap()
    }

    fn round_trip(value: Value, tag: &str) {
        let encoded = encode(&value, &ty(tag)).unwrap();
        let decoded = decode(&encoded, &ty(tag)).unwrap();
        assert_eq!(decoded, value, "round trip of `{}`", tag);
    }

    #[test]
    fn test_scalar_round_trips() {
        round_trip(Value::Bool(true), "bool");
        round_trip(Value::Int(-42), "int");
        round_trip(Value::Int(7), "int?");
        round_trip(Value::Double(3.25), "double");
        round_trip(Value::decimal("10.50"), "decimal");
        round_trip(Value::from("hello"), "string");
        round_trip(Value::from("maybe"), "string?");
    }

    #[test]
    fn test_array_round_trips() {
        round_trip(Value::list([true, false, true]), "bool[]");
        round_trip(Value::list([3, 1, 3]), "int[]");
        round_trip(Value::list([0.5, -1.5]), "double[]");
        round_trip(
            Value::List(vec![Value::decimal("1.10"), Value::decimal("2")]),
            "decimal[]",
        );
        round_trip(Value::list(["b", "a", "b"]), "string[]");
    }

    #[test]
    fn test_set_round_trips() {
        round_trip(Value::set([Scalar::Bool(true), Scalar::Bool(false)]), "bool<>");
        round_trip(Value::set([Scalar::Int(10), Scalar::Int(2)]), "int<>");
        round_trip(Value::set([Scalar::Double(0.1), Scalar::Double(2.5)]), "double<>");
        round_trip(
            Value::set([Scalar::Decimal("1.5".into()), Scalar::Decimal("2".into())]),
            "decimal<>",
        );
        round_trip(
            Value::set([Scalar::String("x".into()), Scalar::String("y".into())]),
            "string<>",
        );
        round_trip(Value::Set(BTreeSet::new()), "string<>");
    }

    #[test]
    fn test_wire_kinds() {
        assert_eq!(
            encode(&Value::Int(5), &ty("int")).unwrap(),
            AttributeValue::N("5".to_string())
        );
        assert_eq!(
            encode(&Value::list([1, 2]), &ty("int[]")).unwrap(),
            AttributeValue::L(vec![
                AttributeValue::N("1".to_string()),
                AttributeValue::N("2".to_string())
            ])
        );
        assert_eq!(
            encode(&Value::list(["1", "2"]), &ty("string[]")).unwrap(),
            AttributeValue::L(vec![
                AttributeValue::S("1".to_string()),
                AttributeValue::S("2".to_string())
            ])
        );
        assert_eq!(
            encode(&Value::set([Scalar::Int(1), Scalar::Int(2)]), &ty("int<>")).unwrap(),
            AttributeValue::Ns(vec!["1".to_string(), "2".to_string()])
        );
        assert_eq!(
            encode(&Value::set([Scalar::String("a".into())]), &ty("string<>")).unwrap(),
            AttributeValue::Ss(vec!["a".to_string()])
        );
        assert_eq!(
            encode(&Value::list([true, true, false]), &ty("bool<>")).unwrap(),
            AttributeValue::L(vec![AttributeValue::Bool(true), AttributeValue::Bool(false)])
        );
    }

    #[test]
    fn test_set_from_list_is_deduplicated() {
        let encoded = encode(&Value::list([2, 1, 2]), &ty("int<>")).unwrap();
        assert_eq!(
            encoded,
            AttributeValue::Ns(vec!["1".to_string(), "2".to_string()])
        );
    }

    #[test]
    fn test_decimal_keeps_full_precision_on_the_wire() {
        let text = "123456789012345678901234567890.000000000000000000001";
        let encoded = encode(&Value::decimal(text), &ty("decimal")).unwrap();
        assert_eq!(encoded, AttributeValue::S(text.to_string()));

        let decoded = decode(&encoded, &ty("decimal")).unwrap();
        assert_eq!(decoded.as_str(), Some(text));
    }

    #[test]
    fn test_decimal_numeric_decode() {
        let decoded = decode(&AttributeValue::S("19.99".to_string()), &ty("decimal")).unwrap();
        assert_eq!(decoded.as_f64(), Some(19.99));

        let lossy = decode(
            &AttributeValue::S("0.12345678901234567890123".to_string()),
            &ty("decimal"),
        )
        .unwrap();
        assert_eq!(lossy.as_f64(), Some(0.12345678901234567890123_f64));
    }

    #[test]
    fn test_decimal_rejects_non_numeric_text() {
        assert!(matches!(
            encode(&Value::decimal("12a"), &ty("decimal")),
            Err(OdmError::InvalidProperty(_))
        ));
        assert!(matches!(
            encode(&Value::decimal("NaN"), &ty("decimal")),
            Err(OdmError::InvalidProperty(_))
        ));
    }

    #[test]
    fn test_int_decode_truncates() {
        assert_eq!(
            decode(&AttributeValue::N("3.7".to_string()), &ty("int")).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            decode(&AttributeValue::N("-3.7".to_string()), &ty("int")).unwrap(),
            Value::Int(-3)
        );
    }

    #[test]
    fn test_int_encode_truncates_doubles() {
        assert_eq!(
            encode(&Value::Double(9.9), &ty("int")).unwrap(),
            AttributeValue::N("9".to_string())
        );
    }

    #[test]
    fn test_int_out_of_range_is_rejected() {
        assert!(matches!(
            decode(&AttributeValue::N("100000000000000000000".to_string()), &ty("int")),
            Err(OdmError::NonCompatibleRecord(_))
        ));
        assert!(matches!(
            encode(&Value::Double(1e30), &ty("int")),
            Err(OdmError::InvalidProperty(_))
        ));
        assert!(matches!(
            encode(&Value::Double(-1e19), &ty("int")),
            Err(OdmError::InvalidProperty(_))
        ));
        assert_eq!(
            decode(&AttributeValue::N("-9223372036854775808".to_string()), &ty("int")).unwrap(),
            Value::Int(i64::MIN)
        );
        assert_eq!(
            decode(&AttributeValue::N("-9.2e18".to_string()), &ty("int")).unwrap(),
            Value::Int(-9_200_000_000_000_000_000)
        );
    }

    #[test]
    fn test_double_set_merges_signed_zero() {
        let set = Value::set([
            Scalar::Double(0.0),
            Scalar::Double(-0.0),
            Scalar::Double(1.5),
        ]);
        assert_eq!(
            encode(&set, &ty("double<>")).unwrap(),
            AttributeValue::Ns(vec!["0".to_string(), "1.5".to_string()])
        );
    }

    #[test]
    fn test_double_rejects_non_finite() {
        assert!(matches!(
            encode(&Value::Double(f64::INFINITY), &ty("double")),
            Err(OdmError::InvalidProperty(_))
        ));
    }

    #[test]
    fn test_value_kind_mismatch() {
        assert!(matches!(
            encode(&Value::from("x"), &ty("int")),
            Err(OdmError::SchemaMismatch(_))
        ));
        assert!(matches!(
            encode(&Value::Int(1), &ty("int[]")),
            Err(OdmError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_wire_kind_mismatch_is_non_compatible() {
        assert!(matches!(
            decode(&AttributeValue::S("x".to_string()), &ty("int")),
            Err(OdmError::NonCompatibleRecord(_))
        ));
    }

    #[test]
    fn test_legacy_string_set_decodes_as_array() {
        let decoded = decode(
            &AttributeValue::Ss(vec!["1.5".to_string(), "2".to_string()]),
            &ty("decimal[]"),
        )
        .unwrap();
        assert_eq!(
            decoded,
            Value::List(vec![Value::decimal("1.5"), Value::decimal("2")])
        );
    }

    #[test]
    fn test_optional_null_is_skipped() {
        let mut target = Record::new();
        assign_to_record(&AttributeValue::Null(true), &ty("int?"), &mut target, "rank").unwrap();
        assert!(target.is_empty());
    }

    fn row_attr() -> Attr {
        Attr::from([
            ("objName".to_string(), AttrType::Scalar(ty("string"))),
            (
                "subObj".to_string(),
                AttrType::Nested([("prop1".to_string(), ty("decimal[]"))].into()),
            ),
        ])
    }

    #[test]
    fn test_record_item_round_trip_with_nested_map() {
        let record = record([
            ("objName", Value::from("mock")),
            (
                "subObj",
                Value::Map(record([(
                    "prop1",
                    Value::List(vec![Value::decimal("1"), Value::decimal("2")]),
                )])),
            ),
        ]);

        let mut item = Item::new();
        record_to_item(&record, &row_attr(), &mut item).unwrap();
        assert_eq!(
            item.get("subObj"),
            Some(&AttributeValue::M(HashMap::from([(
                "prop1".to_string(),
                AttributeValue::L(vec![
                    AttributeValue::S("1".to_string()),
                    AttributeValue::S("2".to_string())
                ])
            )])))
        );

        assert_eq!(item_to_record(&item, &row_attr()).unwrap(), record);
    }

    #[test]
    fn test_record_to_item_rejects_unknown_fields() {
        let mut item = Item::new();
        let err = record_to_item(&record([("other", 1)]), &row_attr(), &mut item).unwrap_err();
        assert_eq!(
            err,
            OdmError::SchemaMismatch("Schema of object property `other` not found".to_string())
        );

        let nested = record([("subObj", Value::Map(record([("prop9", 1)])))]);
        let err = record_to_item(&nested, &row_attr(), &mut item).unwrap_err();
        assert_eq!(
            err,
            OdmError::SchemaMismatch("Schema of sub-object property `prop9` not found".to_string())
        );
    }

    #[test]
    fn test_record_to_item_rejects_key_fields() {
        let attr = Attr::from([("pk".to_string(), AttrType::Scalar(ty("string")))]);
        let mut item = Item::new();
        assert!(matches!(
            record_to_item(&record([("pk", "x")]), &attr, &mut item),
            Err(OdmError::InvalidProperty(_))
        ));
    }

    #[test]
    fn test_item_to_record_skips_keys_and_unknown_fields() {
        let item = Item::from([
            ("pk".to_string(), AttributeValue::S("MockObj#1".to_string())),
            ("sk".to_string(), AttributeValue::S("meta".to_string())),
            ("objName".to_string(), AttributeValue::S("mock".to_string())),
            ("legacy".to_string(), AttributeValue::S("ignored".to_string())),
            ("subObj".to_string(), AttributeValue::S("not a map".to_string())),
        ]);

        let record = item_to_record(&item, &row_attr()).unwrap();
        assert_eq!(record, tyodm_core::record([("objName", "mock")]));
    }

    #[test]
    fn test_is_decimal_text() {
        for ok in ["0", "-1", "+2.5", ".5", "5.", "1e10", "1.5E-3"] {
            assert!(is_decimal_text(ok), "{}", ok);
        }
        for bad in ["", ".", "-", "1e", "abc", "1.2.3", "inf", "NaN", "1 2"] {
            assert!(!is_decimal_text(bad), "{}", bad);
        }
    }
}
