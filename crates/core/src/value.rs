//! Open value model for object properties.
//!
//! Values are validated against a [`Schema`](crate::schema::Schema) at the
//! codec boundary, not when they are constructed.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Field name to value.
pub type Record = BTreeMap<String, Value>;

/// Builds a [`Record`] from field/value pairs.
pub fn record<I, K, V>(fields: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A scalar that can be a member of a set.
///
/// Doubles are ordered with `f64::total_cmp`, so sets of doubles are well defined.
#[derive(Debug, Clone)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Double(f64),
    Decimal(String),
    String(String),
}

impl Scalar {
    fn rank(&self) -> u8 {
        match self {
            Scalar::Bool(_) => 0,
            Scalar::Int(_) => 1,
            Scalar::Double(_) => 2,
            Scalar::Decimal(_) => 3,
            Scalar::String(_) => 4,
        }
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Double(a), Scalar::Double(b)) => a.total_cmp(b),
            (Scalar::Decimal(a), Scalar::Decimal(b)) => a.cmp(b),
            (Scalar::String(a), Scalar::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(i) => Value::Int(i),
            Scalar::Double(d) => Value::Double(d),
            Scalar::Decimal(d) => Value::Decimal(d),
            Scalar::String(s) => Value::String(s),
        }
    }
}

/// A property field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    /// Exact decimal text.
    Decimal(String),
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Unique values.
    Set(BTreeSet<Scalar>),
    /// Nested object.
    Map(Record),
}

impl Value {
    pub fn decimal(text: impl Into<String>) -> Self {
        Value::Decimal(text.into())
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(values.into_iter().map(Into::into).collect())
    }

    pub fn set<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Scalar>,
    {
        Value::Set(values.into_iter().collect())
    }

    /// Name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
        }
    }

    /// Numeric view of the value.
    ///
    /// Decimals are parsed into an `f64`, so digits beyond its precision are
    /// lost. Callers needing exact decimals should read the text instead.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Decimal(d) => d.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a scalar value into a set member.
    pub fn to_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Int(i) => Some(Scalar::Int(*i)),
            Value::Double(d) => Some(Scalar::Double(*d)),
            Value::Decimal(d) => Some(Scalar::Decimal(d.clone())),
            Value::String(s) => Some(Scalar::String(s.clone())),
            _ => None,
        }
    }

    /// Text used when the value identifies a collection element.
    pub fn to_key(&self) -> Option<String> {
        match self {
            Value::String(s) | Value::Decimal(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Double(d) => Some(d.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Decimal(d) | Value::String(d) => write!(f, "{}", d),
            Value::List(_) | Value::Set(_) | Value::Map(_) => write!(f, "<{}>", self.kind()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Map(r)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(values: Vec<V>) -> Self {
        Value::list(values)
    }
}

impl From<BTreeSet<Scalar>> for Value {
    fn from(set: BTreeSet<Scalar>) -> Self {
        Value::Set(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let r = record([("name", Value::from("mock")), ("rank", Value::from(1))]);
        assert_eq!(r.get("name"), Some(&Value::String("mock".to_string())));
        assert_eq!(r.get("rank"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_set_deduplicates() {
        let set = Value::set([Scalar::Int(1), Scalar::Int(2), Scalar::Int(1)]);
        match set {
            Value::Set(s) => assert_eq!(s.len(), 2),
            other => panic!("Expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_double_set_uses_total_order() {
        let set: BTreeSet<Scalar> = [Scalar::Double(1.5), Scalar::Double(-0.5), Scalar::Double(1.5)]
            .into_iter()
            .collect();
        let values: Vec<_> = set.into_iter().collect();
        assert_eq!(values, vec![Scalar::Double(-0.5), Scalar::Double(1.5)]);
    }

    #[test]
    fn test_decimal_keeps_text_and_offers_lossy_number() {
        let value = Value::decimal("12345678901234567890.123456789");
        assert_eq!(value.as_str(), Some("12345678901234567890.123456789"));
        assert_eq!(value.as_f64(), Some(12345678901234567890.123456789_f64));
    }

    #[test]
    fn test_to_key() {
        assert_eq!(Value::from("abc").to_key(), Some("abc".to_string()));
        assert_eq!(Value::from(42).to_key(), Some("42".to_string()));
        assert_eq!(Value::list([1, 2]).to_key(), None);
    }
}
