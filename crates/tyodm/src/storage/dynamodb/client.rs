//! Table access seam.
//!
//! The driver talks to DynamoDB through [`TableClient`], which covers the two
//! calls it needs: an atomic multi-item write and a paginated partition query.
//! It is implemented for the SDK [`Client`] and for
//! [`MemoryTable`](crate::storage::inmemory::MemoryTable).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem, Update};
use aws_sdk_dynamodb::Client;
use tyodm_core::Result;

use super::conversions::Item;
use super::error::{map_build_error, map_query_error, map_transact_write_error};
use super::keys;

/// One item-level operation of a write transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Replace the whole item. `item` includes the key attributes.
    Put { item: Item },
    /// Set `fields` on the item at `key`, creating it if absent.
    Update { key: Item, fields: Item },
    /// Remove the item at `key`, if present.
    Delete { key: Item },
}

impl WriteOp {
    /// Key attributes of the targeted item.
    pub fn key(&self) -> (Option<&AttributeValue>, Option<&AttributeValue>) {
        let attrs = match self {
            WriteOp::Put { item } => item,
            WriteOp::Update { key, .. } | WriteOp::Delete { key } => key,
        };
        (attrs.get(keys::PK), attrs.get(keys::SK))
    }
}

/// A write addressed to a table.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub table: String,
    pub op: WriteOp,
}

/// One page of a partition query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Key to resume from; `None` once the partition is exhausted.
    pub last_evaluated_key: Option<Item>,
}

/// Minimal DynamoDB surface used by the driver.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Applies every write or none of them.
    async fn transact_write(&self, writes: Vec<WriteRequest>) -> Result<()>;

    /// Reads one page of the items sharing partition key `pk`, ordered by sort key.
    async fn query_partition(
        &self,
        table: &str,
        pk: &str,
        exclusive_start_key: Option<Item>,
    ) -> Result<QueryPage>;
}

/// Client shared between the handles attached to the same target.
pub type SharedClient = Arc<dyn TableClient>;

#[async_trait]
impl TableClient for Client {
    async fn transact_write(&self, writes: Vec<WriteRequest>) -> Result<()> {
        let items = writes
            .into_iter()
            .map(to_transact_item)
            .collect::<Result<Vec<_>>>()?;

        self.transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(map_transact_write_error)?;

        Ok(())
    }

    async fn query_partition(
        &self,
        table: &str,
        pk: &str,
        exclusive_start_key: Option<Item>,
    ) -> Result<QueryPage> {
        let result = self
            .query()
            .table_name(table)
            .key_condition_expression("#pk = :pk")
            .expression_attribute_names("#pk", keys::PK)
            .expression_attribute_values(":pk", AttributeValue::S(pk.to_string()))
            .consistent_read(true)
            .set_exclusive_start_key(exclusive_start_key)
            .send()
            .await
            .map_err(map_query_error)?;

        Ok(QueryPage {
            items: result.items.unwrap_or_default(),
            last_evaluated_key: result.last_evaluated_key,
        })
    }
}

/// Convert a write request to its SDK form.
pub fn to_transact_item(request: WriteRequest) -> Result<TransactWriteItem> {
    let WriteRequest { table, op } = request;
    let item = match op {
        WriteOp::Put { item } => TransactWriteItem::builder()
            .put(
                Put::builder()
                    .table_name(table)
                    .set_item(Some(item))
                    .build()
                    .map_err(map_build_error)?,
            )
            .build(),
        WriteOp::Update { key, fields } => {
            let (expression, names, values) = update_expression(fields);
            TransactWriteItem::builder()
                .update(
                    Update::builder()
                        .table_name(table)
                        .set_key(Some(key))
                        .update_expression(expression)
                        .set_expression_attribute_names(Some(names))
                        .set_expression_attribute_values(Some(values))
                        .build()
                        .map_err(map_build_error)?,
                )
                .build()
        }
        WriteOp::Delete { key } => TransactWriteItem::builder()
            .delete(
                Delete::builder()
                    .table_name(table)
                    .set_key(Some(key))
                    .build()
                    .map_err(map_build_error)?,
            )
            .build(),
    };
    Ok(item)
}

/// Build a `SET` expression assigning every field, with placeholder names and values.
///
/// Placeholders are positional (`#f0`, `:v0`, ...) so field names never
/// collide with reserved words.
pub fn update_expression(
    fields: Item,
) -> (String, HashMap<String, String>, HashMap<String, AttributeValue>) {
    let mut fields: Vec<_> = fields.into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let mut assignments = Vec::with_capacity(fields.len());
    let mut names = HashMap::with_capacity(fields.len());
    let mut values = HashMap::with_capacity(fields.len());

    for (i, (field, value)) in fields.into_iter().enumerate() {
        let name = format!("#f{i}");
        let placeholder = format!(":v{i}");
        assignments.push(format!("{name} = {placeholder}"));
        names.insert(name, field);
        values.insert(placeholder, value);
    }

    (format!("SET {}", assignments.join(", ")), names, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_expression() {
        let fields = Item::from([
            ("rank".to_string(), AttributeValue::N("2".to_string())),
            ("name".to_string(), AttributeValue::S("mock".to_string())),
        ]);

        let (expression, names, values) = update_expression(fields);

        assert_eq!(expression, "SET #f0 = :v0, #f1 = :v1");
        assert_eq!(names.get("#f0").map(String::as_str), Some("name"));
        assert_eq!(names.get("#f1").map(String::as_str), Some("rank"));
        assert_eq!(values.get(":v0"), Some(&AttributeValue::S("mock".to_string())));
        assert_eq!(values.get(":v1"), Some(&AttributeValue::N("2".to_string())));
    }

    #[test]
    fn test_to_transact_item_delete() {
        let key = Item::from([
            (keys::PK.to_string(), AttributeValue::S("MockObj#1".to_string())),
            (keys::SK.to_string(), AttributeValue::S("meta".to_string())),
        ]);
        let item = to_transact_item(WriteRequest {
            table: "default".to_string(),
            op: WriteOp::Delete { key: key.clone() },
        })
        .unwrap();

        let delete = item.delete().unwrap();
        assert_eq!(delete.table_name(), "default");
        assert_eq!(delete.key(), &key);
        assert!(item.put().is_none());
    }

    #[test]
    fn test_write_op_key() {
        let op = WriteOp::Update {
            key: Item::from([
                (keys::PK.to_string(), AttributeValue::S("MockObj#1".to_string())),
                (keys::SK.to_string(), AttributeValue::S("meta".to_string())),
            ]),
            fields: Item::new(),
        };
        assert_eq!(
            op.key(),
            (
                Some(&AttributeValue::S("MockObj#1".to_string())),
                Some(&AttributeValue::S("meta".to_string()))
            )
        );
    }
}
