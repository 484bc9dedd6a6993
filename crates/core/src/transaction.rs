//! Transaction-scoped mutation handle.

use tracing::warn;

use crate::error::{OdmError, Result};
use crate::events::{WriteEvent, WriteEventBus};
use crate::object::Obj;
use crate::schema::PropKind;
use crate::value::Record;

/// Mutation methods scoped to one open write transaction.
///
/// Every call is published to the transaction's event bus, which stages the
/// backend write and queues the in-memory replay. Nothing is visible in the
/// backend or on the objects until the transaction commits.
pub struct Transaction<'a> {
    bus: WriteEventBus<'a>,
}

impl<'a> Transaction<'a> {
    pub fn new(bus: WriteEventBus<'a>) -> Self {
        Self { bus }
    }

    /// Persists every property of `obj` as currently held in memory.
    pub fn insert_obj(&mut self, obj: &Obj) -> Result<()> {
        self.publish(WriteEvent::InsertObj { obj: obj.clone() })
    }

    /// Inserts one record into `to_prop`, replacing the whole property for
    /// `single` props or the element with the same identifier for collections.
    pub fn insert_one(&mut self, obj: &Obj, to_prop: &str, value: Record) -> Result<()> {
        let schema = obj.schema();
        let layout = schema.prop(to_prop)?;
        if layout.kind == PropKind::Collection {
            let field = layout.collection_identifier(to_prop)?;
            if value.get(field).and_then(|v| v.to_key()).is_none() {
                return Err(OdmError::InvalidProperty(format!(
                    "Identifier `{}` missing from record inserted into `{}`",
                    field, to_prop
                )));
            }
        }

        self.publish(WriteEvent::InsertOne {
            obj: obj.clone(),
            to_prop: to_prop.to_string(),
            value,
        })
    }

    /// Merges `values` into a stored record. `identifier` addresses the
    /// element of a collection and must be `None` for `single` props.
    pub fn update_one(
        &mut self,
        obj: &Obj,
        to_prop: &str,
        identifier: Option<&str>,
        values: Record,
    ) -> Result<()> {
        check_target(obj, to_prop, identifier)?;
        self.publish(WriteEvent::UpdateOne {
            obj: obj.clone(),
            to_prop: to_prop.to_string(),
            identifier: identifier.map(str::to_string),
            values,
        })
    }

    /// Deletes a stored record. `identifier` addresses the element of a
    /// collection and must be `None` for `single` props.
    pub fn delete_one(&mut self, obj: &Obj, target_prop: &str, identifier: Option<&str>) -> Result<()> {
        check_target(obj, target_prop, identifier)?;
        self.publish(WriteEvent::DeleteOne {
            obj: obj.clone(),
            target_prop: target_prop.to_string(),
            identifier: identifier.map(str::to_string),
        })
    }

    fn publish(&mut self, event: WriteEvent) -> Result<()> {
        let kind = event.kind();
        if !self.bus.emit(&event)? {
            warn!(event = %kind, "Write event published with no listener, ignored");
        }
        Ok(())
    }

    /// Unsubscribes every listener.
    pub fn close(mut self) {
        self.bus.remove_all_listeners();
    }
}

fn check_target(obj: &Obj, prop: &str, identifier: Option<&str>) -> Result<()> {
    let schema = obj.schema();
    let layout = schema.prop(prop)?;
    match (layout.kind, identifier) {
        (PropKind::Collection, None) => Err(OdmError::InvalidProperty(format!(
            "Property `{}` is a collection, an element identifier is required",
            prop
        ))),
        (PropKind::Single, Some(_)) => Err(OdmError::InvalidProperty(format!(
            "Property `{}` is a single record and has no elements",
            prop
        ))),
        _ => Ok(()),
    }
}
