//! Contract between the unit of work and a persistence backend.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::object::{ElementKey, Obj, ObjKey};
use crate::schema::{Prop, Schema};
use crate::value::Record;

/// A persistence backend.
///
/// Mutations are staged synchronously and applied atomically by
/// [`DbDriver::commit_write_transaction`].
#[async_trait]
pub trait DbDriver: Send + Sync {
    /// Stages one write per top-level property of `obj`, or one per element
    /// of a `collection` property.
    ///
    /// # Errors
    /// - `SchemaMismatch` if a property has no schema entry, or its shape
    ///   disagrees with the declared `single`/`collection` type.
    /// - `InvalidProperty` if a property is not object-shaped.
    /// - `InvalidSchema` if a `collection` property has no `identifier`.
    fn insert_obj(&mut self, obj: &Obj) -> Result<()>;

    /// Stages the write of one record under `owner`.
    fn insert_one(
        &mut self,
        owner: &ObjKey,
        element: &Record,
        prop_name: &str,
        layout: &Prop,
    ) -> Result<()>;

    /// Stages a partial update of one stored record.
    fn update(
        &mut self,
        owner: &ObjKey,
        element: &ElementKey,
        values: &Record,
        layout: &Prop,
    ) -> Result<()>;

    /// Stages the deletion of one stored record.
    fn delete_one(&mut self, owner: &ObjKey, element: &ElementKey) -> Result<()>;

    /// Applies every staged write atomically.
    ///
    /// The staged writes are discarded whether or not the commit succeeds.
    async fn commit_write_transaction(&mut self) -> Result<()>;

    /// Discards every staged write.
    fn cancel_write_transaction(&mut self);

    /// Number of writes currently staged.
    fn staged_len(&self) -> usize;

    /// Reads every record of an object and hydrates it, or `None` if nothing is stored.
    async fn get_obj_by_id(&self, id: &str, schema: &Arc<Schema>) -> Result<Option<Obj>>;
}
