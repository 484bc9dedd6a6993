//! In-memory table implementation.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use tokio::sync::RwLock;
use tracing::debug;

use tyodm_core::{OdmError, Result};

use crate::storage::dynamodb::{
    Item, QueryPage, TableClient, WriteOp, WriteRequest, MAX_TRANSACT_ITEMS, PK, SK,
};

/// Items per query page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// (table, pk, sk)
type ItemKey = (String, String, String);

#[derive(Debug)]
struct Inner {
    items: RwLock<BTreeMap<ItemKey, Item>>,
    page_size: usize,
    fail_next: AtomicBool,
    transactions: AtomicUsize,
}

/// In-memory stand-in for DynamoDB tables.
///
/// Clones share the same data. Transactions follow DynamoDB's rules: at most
/// 25 writes, one write per item, applied all or nothing. Data is not
/// persisted and is lost when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    inner: Arc<Inner>,
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTable {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates a new empty table returning at most `page_size` items per query page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                items: RwLock::new(BTreeMap::new()),
                page_size: page_size.max(1),
                fail_next: AtomicBool::new(false),
                transactions: AtomicUsize::new(0),
            }),
        }
    }

    /// Makes the next transaction fail without applying anything.
    pub fn fail_next_transaction(&self) {
        self.inner.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of transactions applied so far.
    pub fn transaction_count(&self) -> usize {
        self.inner.transactions.load(Ordering::SeqCst)
    }

    /// Number of items stored, across tables.
    pub async fn len(&self) -> usize {
        self.inner.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns the item stored at the given key.
    pub async fn get(&self, table: &str, pk: &str, sk: &str) -> Option<Item> {
        let items = self.inner.items.read().await;
        items
            .get(&(table.to_string(), pk.to_string(), sk.to_string()))
            .cloned()
    }
}

#[async_trait]
impl TableClient for MemoryTable {
    async fn transact_write(&self, writes: Vec<WriteRequest>) -> Result<()> {
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            return Err(OdmError::Backend("Transaction cancelled by test hook".to_string()));
        }

        if writes.len() > MAX_TRANSACT_ITEMS {
            return Err(OdmError::Backend(format!(
                "Member must have length less than or equal to {}",
                MAX_TRANSACT_ITEMS
            )));
        }

        let mut seen = HashSet::with_capacity(writes.len());
        let mut keyed = Vec::with_capacity(writes.len());
        for write in writes {
            let key = item_key(&write)?;
            if !seen.insert(key.clone()) {
                return Err(OdmError::Backend(
                    "Transaction request cannot include multiple operations on one item"
                        .to_string(),
                ));
            }
            keyed.push((key, write.op));
        }

        let mut items = self.inner.items.write().await;
        for (key, op) in keyed {
            match op {
                WriteOp::Put { item } => {
                    items.insert(key, item);
                }
                WriteOp::Update { key: attrs, fields } => {
                    items.entry(key).or_insert(attrs).extend(fields);
                }
                WriteOp::Delete { .. } => {
                    items.remove(&key);
                }
            }
        }

        let count = self.inner.transactions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(transaction = count, items = items.len(), "Applied in-memory transaction");
        Ok(())
    }

    async fn query_partition(
        &self,
        table: &str,
        pk: &str,
        exclusive_start_key: Option<Item>,
    ) -> Result<QueryPage> {
        let start_sk = exclusive_start_key
            .as_ref()
            .and_then(|key| string_attr(key, SK))
            .map(str::to_string);

        let items = self.inner.items.read().await;
        let mut matching = items
            .range((table.to_string(), pk.to_string(), String::new())..)
            .take_while(|((t, p, _), _)| t == table && p == pk)
            .filter(|((_, _, sk), _)| start_sk.as_deref().map_or(true, |start| sk.as_str() > start))
            .map(|(_, item)| item.clone());

        let page: Vec<Item> = matching.by_ref().take(self.inner.page_size).collect();
        let last_evaluated_key = match matching.next() {
            Some(_) => page.last().map(|item| {
                item.iter()
                    .filter(|(name, _)| name.as_str() == PK || name.as_str() == SK)
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            }),
            None => None,
        };

        Ok(QueryPage {
            items: page,
            last_evaluated_key,
        })
    }
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Some(value),
        _ => None,
    }
}

fn item_key(write: &WriteRequest) -> Result<ItemKey> {
    match write.op.key() {
        (Some(AttributeValue::S(pk)), Some(AttributeValue::S(sk))) => {
            Ok((write.table.clone(), pk.clone(), sk.clone()))
        }
        _ => Err(OdmError::Backend(
            "One of the required keys was not given a value".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(pk: &str, sk: &str) -> Item {
        Item::from([
            (PK.to_string(), AttributeValue::S(pk.to_string())),
            (SK.to_string(), AttributeValue::S(sk.to_string())),
        ])
    }

    fn put(pk: &str, sk: &str) -> WriteRequest {
        WriteRequest {
            table: "default".to_string(),
            op: WriteOp::Put { item: key(pk, sk) },
        }
    }

    #[tokio::test]
    async fn test_transaction_applies_all_writes() {
        let table = MemoryTable::new();
        table
            .transact_write(vec![put("MockObj#1", "meta"), put("MockObj#1", "other")])
            .await
            .unwrap();

        assert_eq!(table.len().await, 2);
        assert_eq!(table.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_item_rejects_whole_transaction() {
        let table = MemoryTable::new();
        let result = table
            .transact_write(vec![
                put("MockObj#1", "other"),
                put("MockObj#1", "meta"),
                put("MockObj#1", "meta"),
            ])
            .await;

        assert!(matches!(result, Err(OdmError::Backend(_))));
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_too_many_writes_rejected() {
        let table = MemoryTable::new();
        let writes = (0..26).map(|i| put("MockObj#1", &i.to_string())).collect();

        assert!(table.transact_write(writes).await.is_err());
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_is_upsert() {
        let table = MemoryTable::new();
        let fields = Item::from([("objName".to_string(), AttributeValue::S("mock".to_string()))]);
        table
            .transact_write(vec![WriteRequest {
                table: "default".to_string(),
                op: WriteOp::Update {
                    key: key("MockObj#1", "meta"),
                    fields,
                },
            }])
            .await
            .unwrap();

        let item = table.get("default", "MockObj#1", "meta").await.unwrap();
        assert_eq!(item.get("objName"), Some(&AttributeValue::S("mock".to_string())));
        assert_eq!(item.get(PK), Some(&AttributeValue::S("MockObj#1".to_string())));
    }

    #[tokio::test]
    async fn test_injected_failure_applies_nothing() {
        let table = MemoryTable::new();
        table.fail_next_transaction();

        assert!(table
            .transact_write(vec![put("MockObj#1", "meta")])
            .await
            .is_err());
        assert!(table.is_empty().await);

        table
            .transact_write(vec![put("MockObj#1", "meta")])
            .await
            .unwrap();
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_query_pages_through_partition() {
        let table = MemoryTable::with_page_size(2);
        table
            .transact_write(vec![
                put("MockObj#1", "a"),
                put("MockObj#1", "b"),
                put("MockObj#1", "c"),
                put("MockObj#2", "a"),
            ])
            .await
            .unwrap();

        let first = table.query_partition("default", "MockObj#1", None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.last_evaluated_key, Some(key("MockObj#1", "b")));

        let second = table
            .query_partition("default", "MockObj#1", first.last_evaluated_key)
            .await
            .unwrap();
        assert_eq!(second.items, vec![key("MockObj#1", "c")]);
        assert_eq!(second.last_evaluated_key, None);
    }

    #[tokio::test]
    async fn test_write_without_key_is_rejected() {
        let table = MemoryTable::new();
        let mut item = key("MockObj#1", "meta");
        item.remove(SK);
        let result = table
            .transact_write(vec![WriteRequest {
                table: "default".to_string(),
                op: WriteOp::Put { item },
            }])
            .await;

        assert!(matches!(result, Err(OdmError::Backend(_))));
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_query_is_scoped_to_table() {
        let table = MemoryTable::new();
        table.transact_write(vec![put("MockObj#1", "a")]).await.unwrap();

        let page = table.query_partition("other", "MockObj#1", None).await.unwrap();
        assert!(page.items.is_empty());
    }
}
