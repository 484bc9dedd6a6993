//! DynamoDB key generation functions.
//!
//! Pure functions for generating partition and sort keys following the single-table design.
//! All records of one object share a partition; each property (or collection
//! element) is one sort key within it.

use tyodm_core::{ElementKey, ObjKey, OdmError, Result};

/// Partition key attribute name.
pub const PK: &str = "pk";
/// Sort key attribute name.
pub const SK: &str = "sk";
/// Separator between key segments.
pub const SEPARATOR: char = '#';
/// Maximum number of distinct items a single `TransactWriteItems` call may target.
pub const MAX_TRANSACT_ITEMS: usize = 25;

/// Generate partition key for an object.
///
/// Pattern: `<schema_name>#<object_id>`
pub fn partition_key(owner: &ObjKey) -> String {
    format!("{}{SEPARATOR}{}", owner.schema_name, owner.object_id)
}

/// Generate sort key for a record.
///
/// Pattern: `<prop>` for single props, `<prop>#<identifier>` for collection elements.
pub fn sort_key(element: &ElementKey) -> String {
    match &element.identifier {
        Some(identifier) => format!("{}{SEPARATOR}{identifier}", element.prop),
        None => element.prop.clone(),
    }
}

/// Extract the object id from a partition key of the given model.
pub fn object_id_from_pk<'a>(schema_name: &str, pk: &'a str) -> Result<&'a str> {
    pk.strip_prefix(schema_name)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
        .ok_or_else(|| {
            OdmError::NonCompatibleRecord(format!(
                "Partition key `{}` does not belong to model `{}`",
                pk, schema_name
            ))
        })
}

/// Split a sort key into property name and optional element identifier.
pub fn parse_sort_key(sk: &str) -> ElementKey {
    match sk.split_once(SEPARATOR) {
        Some((prop, identifier)) => ElementKey::element(prop, identifier),
        None => ElementKey::single(sk),
    }
}
