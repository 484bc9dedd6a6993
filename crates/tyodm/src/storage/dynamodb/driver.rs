//! DynamoDB driver implementation.
//!
//! Implements [`DbDriver`] on a single table: every object is one partition,
//! every property (or collection element) one item within it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use tracing::{debug, warn};

use tyodm_core::{
    DbDriver, ElementKey, Obj, ObjKey, OdmError, Prop, PropKind, PropValue, Record, Result,
    Schema,
};

use super::client::{SharedClient, WriteOp, WriteRequest};
use super::conversions::{item_to_record, record_to_item, Item};
use super::keys;

/// A write waiting for the next commit, addressed by its item key.
#[derive(Debug, Clone, PartialEq)]
struct StagedWrite {
    pk: String,
    sk: String,
    op: WriteOp,
}

/// DynamoDB-based driver.
///
/// Writes are staged in memory and sent as one `TransactWriteItems` call on
/// commit. DynamoDB allows a single operation per item in a transaction, so
/// writes to the same item are coalesced as they are staged.
pub struct DynamoDbDriver {
    client: SharedClient,
    table_name: String,
    staged: Vec<StagedWrite>,
}

impl DynamoDbDriver {
    /// Creates a new driver with the given client and table name.
    pub fn new(client: SharedClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            staged: Vec::new(),
        }
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Writes that the next commit would send.
    pub fn staged_writes(&self) -> Vec<WriteRequest> {
        self.staged
            .iter()
            .map(|staged| WriteRequest {
                table: self.table_name.clone(),
                op: staged.op.clone(),
            })
            .collect()
    }

    fn stage(&mut self, owner: &ObjKey, element: &ElementKey, op: impl FnOnce(Item) -> WriteOp) {
        let pk = keys::partition_key(owner);
        let sk = keys::sort_key(element);
        let key = Item::from([
            (keys::PK.to_string(), AttributeValue::S(pk.clone())),
            (keys::SK.to_string(), AttributeValue::S(sk.clone())),
        ]);
        let op = op(key);

        let Some(existing) = self.staged.iter_mut().find(|s| s.pk == pk && s.sk == sk) else {
            self.staged.push(StagedWrite { pk, sk, op });
            return;
        };

        debug!(pk = %existing.pk, sk = %existing.sk, "Coalescing write on staged item");
        let earlier = std::mem::replace(&mut existing.op, WriteOp::Delete { key: Item::new() });
        existing.op = coalesce(earlier, op);
    }

    fn stage_put(
        &mut self,
        owner: &ObjKey,
        element: &ElementKey,
        record: &Record,
        layout: &Prop,
    ) -> Result<()> {
        let fields = put_fields(record, layout)?;
        self.stage_fields(owner, element, fields);
        Ok(())
    }

    fn stage_fields(&mut self, owner: &ObjKey, element: &ElementKey, fields: Item) {
        self.stage(owner, element, |mut item| {
            item.extend(fields);
            WriteOp::Put { item }
        });
    }

    /// Reads every item of a partition, following pagination.
    async fn query_all(&self, pk: &str) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let page = self
                .client
                .query_partition(&self.table_name, pk, start_key)
                .await?;
            items.extend(page.items);
            match page.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl DbDriver for DynamoDbDriver {
    fn insert_obj(&mut self, obj: &Obj) -> Result<()> {
        let schema = obj.schema();
        let owner = obj.owner_key();

        // Every record is encoded before any is staged, so a failure stages nothing.
        let mut puts = Vec::new();
        for (name, value) in obj.props() {
            if schema.identifier.as_deref() == Some(name.as_str()) {
                continue;
            }

            let layout = schema.prop(&name)?;
            match (layout.kind, value) {
                (_, PropValue::Scalar(value)) => {
                    return Err(OdmError::InvalidProperty(format!(
                        "Property `{}` must hold an object, not a {}",
                        name,
                        value.kind()
                    )));
                }
                (PropKind::Single, PropValue::Single(record)) => {
                    puts.push((ElementKey::single(&name), put_fields(&record, layout)?));
                }
                (PropKind::Collection, PropValue::Collection(elements)) => {
                    let field = layout.collection_identifier(&name)?;
                    for record in elements.values() {
                        let identifier = element_identifier(record, field, &name)?;
                        puts.push((
                            ElementKey::element(&name, identifier),
                            put_fields(record, layout)?,
                        ));
                    }
                }
                (PropKind::Single, PropValue::Collection(_)) => {
                    return Err(OdmError::SchemaMismatch(format!(
                        "Property `{}` is declared `single` but holds a collection",
                        name
                    )));
                }
                (PropKind::Collection, PropValue::Single(_)) => {
                    layout.collection_identifier(&name)?;
                    return Err(OdmError::SchemaMismatch(format!(
                        "Property `{}` is declared `collection` but holds a single record",
                        name
                    )));
                }
            }
        }

        for (element, fields) in puts {
            self.stage_fields(&owner, &element, fields);
        }
        Ok(())
    }

    fn insert_one(
        &mut self,
        owner: &ObjKey,
        element: &Record,
        prop_name: &str,
        layout: &Prop,
    ) -> Result<()> {
        let key = match layout.kind {
            PropKind::Single => ElementKey::single(prop_name),
            PropKind::Collection => {
                let field = layout.collection_identifier(prop_name)?;
                ElementKey::element(prop_name, element_identifier(element, field, prop_name)?)
            }
        };
        self.stage_put(owner, &key, element, layout)
    }

    fn update(
        &mut self,
        owner: &ObjKey,
        element: &ElementKey,
        values: &Record,
        layout: &Prop,
    ) -> Result<()> {
        if values.is_empty() {
            debug!(owner = %owner, prop = %element.prop, "Ignoring empty update");
            return Ok(());
        }

        let mut fields = Item::new();
        record_to_item(values, &layout.attr, &mut fields)?;
        self.stage(owner, element, |key| WriteOp::Update { key, fields });
        Ok(())
    }

    fn delete_one(&mut self, owner: &ObjKey, element: &ElementKey) -> Result<()> {
        self.stage(owner, element, |key| WriteOp::Delete { key });
        Ok(())
    }

    async fn commit_write_transaction(&mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);

        if staged.is_empty() {
            return Ok(());
        }

        if staged.len() > keys::MAX_TRANSACT_ITEMS {
            return Err(OdmError::MaxWriteActionExceeded {
                actions: staged.len(),
                max_allowed: keys::MAX_TRANSACT_ITEMS,
            });
        }

        debug!(
            table = %self.table_name,
            actions = staged.len(),
            "Committing write transaction"
        );

        let writes = staged
            .into_iter()
            .map(|staged| WriteRequest {
                table: self.table_name.clone(),
                op: staged.op,
            })
            .collect();

        self.client.transact_write(writes).await
    }

    fn cancel_write_transaction(&mut self) {
        if !self.staged.is_empty() {
            debug!(discarded = self.staged.len(), "Cancelling write transaction");
        }
        self.staged.clear();
    }

    fn staged_len(&self) -> usize {
        self.staged.len()
    }

    async fn get_obj_by_id(&self, id: &str, schema: &Arc<Schema>) -> Result<Option<Obj>> {
        let owner = ObjKey {
            schema_name: schema.name.clone(),
            object_id: id.to_string(),
        };
        let pk = keys::partition_key(&owner);
        let items = self.query_all(&pk).await?;

        if items.is_empty() {
            return Ok(None);
        }

        let mut props: BTreeMap<String, PropValue> = BTreeMap::new();

        for item in &items {
            let item_pk = key_attribute(item, keys::PK)?;
            if keys::object_id_from_pk(&schema.name, item_pk)? != id {
                return Err(OdmError::NonCompatibleRecord(format!(
                    "Record of partition `{}` returned for `{}`",
                    item_pk, pk
                )));
            }

            let sk = key_attribute(item, keys::SK)?;
            let element = keys::parse_sort_key(sk);
            let Some(layout) = schema.props.get(&element.prop) else {
                debug!(pk = %pk, sk = %sk, "Skipping record of undeclared property");
                continue;
            };

            let record = item_to_record(item, &layout.attr)?;
            match (layout.kind, element.identifier) {
                (PropKind::Single, None) => {
                    props.insert(element.prop, PropValue::Single(record));
                }
                (PropKind::Collection, Some(identifier)) => {
                    let entry = props
                        .entry(element.prop)
                        .or_insert_with(|| PropValue::Collection(BTreeMap::new()));
                    if let PropValue::Collection(elements) = entry {
                        elements.insert(identifier, record);
                    }
                }
                (kind, _) => {
                    warn!(pk = %pk, sk = %sk, ?kind, "Sort key does not match property kind");
                    return Err(OdmError::NonCompatibleRecord(format!(
                        "Sort key `{}` does not address a {:?} property",
                        sk, kind
                    )));
                }
            }
        }

        debug!(pk = %pk, records = items.len(), "Hydrated object");

        let obj = Obj::with_id(schema.clone(), id);
        obj.update_props(|current| current.extend(props));
        Ok(Some(obj))
    }
}

/// Combines two writes to the same item into one.
///
/// A later put or delete wins. A later update merges into an earlier put or
/// update, and turns an earlier delete into a put of the updated fields.
fn coalesce(earlier: WriteOp, later: WriteOp) -> WriteOp {
    match (earlier, later) {
        (WriteOp::Put { mut item }, WriteOp::Update { fields, .. }) => {
            item.extend(fields);
            WriteOp::Put { item }
        }
        (WriteOp::Update { key, fields: mut merged }, WriteOp::Update { fields, .. }) => {
            merged.extend(fields);
            WriteOp::Update { key, fields: merged }
        }
        (WriteOp::Delete { key }, WriteOp::Update { fields, .. }) => {
            let mut item = key;
            item.extend(fields);
            WriteOp::Put { item }
        }
        (_, later) => later,
    }
}

fn put_fields(record: &Record, layout: &Prop) -> Result<Item> {
    let mut fields = Item::new();
    record_to_item(record, &layout.attr, &mut fields)?;
    Ok(fields)
}

fn element_identifier(record: &Record, field: &str, prop_name: &str) -> Result<String> {
    record.get(field).and_then(|v| v.to_key()).ok_or_else(|| {
        OdmError::InvalidProperty(format!(
            "Identifier `{}` missing from element of `{}`",
            field, prop_name
        ))
    })
}

fn key_attribute<'a>(item: &'a Item, name: &str) -> Result<&'a str> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Ok(value),
        _ => Err(OdmError::NonCompatibleRecord(format!(
            "Record is missing its `{}` attribute",
            name
        ))),
    }
}
