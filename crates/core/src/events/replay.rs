//! Replays committed write actions onto in-memory objects.

use std::collections::BTreeMap;

use crate::error::{OdmError, Result};
use crate::object::PropValue;
use crate::schema::PropKind;

use super::{PendingWriteAction, WriteEvent};

impl PendingWriteAction {
    /// Applies the action to its object.
    ///
    /// Inserting a whole object is a no-op: its values are already in memory.
    pub fn replay(&self) -> Result<()> {
        match &self.event {
            WriteEvent::InsertObj { .. } => Ok(()),
            WriteEvent::InsertOne { obj, to_prop, value } => {
                let schema = obj.schema();
                let layout = schema.prop(to_prop)?;
                match layout.kind {
                    PropKind::Single => {
                        obj.set_prop(to_prop.clone(), PropValue::Single(value.clone()));
                    }
                    PropKind::Collection => {
                        let field = layout.collection_identifier(to_prop)?;
                        let key = value.get(field).and_then(|v| v.to_key()).ok_or_else(|| {
                            OdmError::InvalidProperty(format!(
                                "Identifier `{}` missing from record inserted into `{}`",
                                field, to_prop
                            ))
                        })?;
                        obj.update_props(|props| {
                            let entry = props
                                .entry(to_prop.clone())
                                .or_insert_with(|| PropValue::Collection(BTreeMap::new()));
                            if !matches!(entry, PropValue::Collection(_)) {
                                *entry = PropValue::Collection(BTreeMap::new());
                            }
                            if let PropValue::Collection(elements) = entry {
                                elements.insert(key, value.clone());
                            }
                        });
                    }
                }
                Ok(())
            }
            WriteEvent::UpdateOne {
                obj,
                to_prop,
                identifier,
                values,
            } => {
                if values.is_empty() {
                    return Ok(());
                }
                obj.update_props(|props| match identifier {
                    None => {
                        let entry = props
                            .entry(to_prop.clone())
                            .or_insert_with(|| PropValue::Single(Default::default()));
                        if let PropValue::Single(record) = entry {
                            record.extend(values.clone());
                        }
                    }
                    Some(id) => {
                        let entry = props
                            .entry(to_prop.clone())
                            .or_insert_with(|| PropValue::Collection(BTreeMap::new()));
                        if let PropValue::Collection(elements) = entry {
                            elements
                                .entry(id.clone())
                                .or_default()
                                .extend(values.clone());
                        }
                    }
                });
                Ok(())
            }
            WriteEvent::DeleteOne {
                obj,
                target_prop,
                identifier,
            } => {
                obj.update_props(|props| match identifier {
                    None => {
                        props.remove(target_prop);
                    }
                    Some(id) => {
                        let emptied = match props.get_mut(target_prop) {
                            Some(PropValue::Collection(elements)) => {
                                elements.remove(id).is_some() && elements.is_empty()
                            }
                            _ => false,
                        };
                        if emptied {
                            props.remove(target_prop);
                        }
                    }
                });
                Ok(())
            }
        }
    }
}
