//! Unit-of-work orchestrator.
//!
//! A [`TyOdm`] owns one logical connection: `attach` binds it to a shared
//! client and builds the matching driver, `write` runs a transaction body,
//! commits what it staged and replays it onto the in-memory objects.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, info, warn};

use tyodm_core::events::{PendingWriteAction, WriteEvent, WriteEventBus, WriteEventKind};
use tyodm_core::{
    DbDriver, ElementKey, Obj, OdmConfig, OdmError, OdmMode, Result, Transaction,
};

use crate::connection::{ConnectionRegistry, HandleId};
use crate::storage::dynamodb::DynamoDbDriver;

/// An object-document mapper bound to one configuration.
///
/// Concurrent `write` calls on one instance are prevented by `&mut self`;
/// a transaction body cannot open another transaction on the same instance.
pub struct TyOdm {
    config: OdmConfig,
    handle: HandleId,
    registry: Arc<ConnectionRegistry>,
    driver: Option<Box<dyn DbDriver>>,
}

impl TyOdm {
    /// Creates a detached instance using the process-wide registry.
    pub fn new(config: impl Into<OdmConfig>) -> Self {
        Self::with_registry(config, ConnectionRegistry::global())
    }

    /// Creates a detached instance using `registry` for its clients.
    pub fn with_registry(config: impl Into<OdmConfig>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            config: config.into(),
            handle: HandleId::new(),
            registry,
            driver: None,
        }
    }

    pub fn mode(&self) -> OdmMode {
        self.config.mode()
    }

    pub fn config(&self) -> &OdmConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.driver.is_some()
    }

    /// Connects to the configured database.
    ///
    /// # Errors
    /// - `AlreadyAttached` if this instance is attached.
    /// - `NotImplemented` for MongoDB configurations.
    pub async fn attach(&mut self) -> Result<()> {
        if self.driver.is_some() {
            return Err(OdmError::AlreadyAttached);
        }

        match &self.config {
            OdmConfig::MongoDb(_) => Err(OdmError::NotImplemented("MongoDB attach")),
            OdmConfig::DynamoDb(config) => {
                let client = self.registry.attach(self.handle, &self.config).await?;
                self.driver = Some(Box::new(DynamoDbDriver::new(client, config.table.clone())));
                info!(handle = %self.handle, table = %config.table, "Attached to DynamoDB");
                Ok(())
            }
        }
    }

    /// Releases the driver and the client attachment.
    ///
    /// Returns whether anything was attached.
    pub async fn detach(&mut self) -> Result<bool> {
        let had_driver = self.driver.take().is_some();
        let had_client = self.registry.detach(self.handle, self.mode()).await?;
        if had_driver || had_client {
            info!(handle = %self.handle, "Detached");
        }
        Ok(had_driver || had_client)
    }

    /// Loads an object of the model `type_name`, or `None` if nothing is stored under `key`.
    ///
    /// # Errors
    /// - `NotAttached` if this instance is not attached.
    /// - `InvalidSchema` if `type_name` is not a configured model.
    pub async fn object_by_key(&self, type_name: &str, key: &str) -> Result<Option<Obj>> {
        let driver = self.driver.as_deref().ok_or(OdmError::NotAttached)?;
        let schema = self.config.schema().get(type_name).ok_or_else(|| {
            OdmError::InvalidSchema(format!("Schema of model `{}` not found", type_name))
        })?;
        driver.get_obj_by_id(key, &schema).await
    }

    /// Lists the objects of a model. Not supported by the DynamoDB driver.
    pub async fn objects(&self, _type_name: &str) -> Result<Vec<Obj>> {
        Err(OdmError::NotImplemented("objects"))
    }

    /// Runs `body` as one write transaction.
    ///
    /// Every mutation made through the [`Transaction`] is staged on the driver
    /// and queued. When `body` succeeds the staged writes are committed
    /// atomically, then the queue is replayed onto the objects in call order.
    /// If `body` or the commit fails, nothing is written, the objects are left
    /// untouched and the error is returned.
    ///
    /// # Errors
    /// `NotAttached` if this instance is not attached, otherwise whatever
    /// `body`, staging or the commit fails with.
    pub async fn write<F, E>(&mut self, body: F) -> std::result::Result<(), E>
    where
        F: FnOnce(&mut Transaction<'_>) -> std::result::Result<(), E>,
        E: From<OdmError>,
    {
        let driver = self.driver.as_deref_mut().ok_or(OdmError::NotAttached)?;

        let queue = match stage(&mut *driver, body) {
            Ok(queue) => queue,
            Err(e) => {
                driver.cancel_write_transaction();
                return Err(e);
            }
        };

        if let Err(e) = driver.commit_write_transaction().await {
            warn!(error = %e, actions = queue.len(), "Write transaction failed to commit");
            driver.cancel_write_transaction();
            return Err(e.into());
        }

        // Replay can only fail where staging the same action already did. The
        // commit stands, so a failure is logged and the rest still apply.
        debug!(actions = queue.len(), "Replaying committed write actions");
        for action in &queue {
            if let Err(e) = action.replay() {
                warn!(error = %e, kind = %action.kind(), "Failed to replay committed write action");
            }
        }

        Ok(())
    }
}

struct Stage<'d> {
    driver: &'d mut dyn DbDriver,
    queue: Vec<PendingWriteAction>,
}

/// Runs `body` with a listener per event kind that stages each mutation on
/// the driver and queues it for replay.
fn stage<F, E>(driver: &mut dyn DbDriver, body: F) -> std::result::Result<Vec<PendingWriteAction>, E>
where
    F: FnOnce(&mut Transaction<'_>) -> std::result::Result<(), E>,
    E: From<OdmError>,
{
    let stage = RefCell::new(Stage {
        driver,
        queue: Vec::new(),
    });

    {
        let mut bus = WriteEventBus::new();
        for kind in WriteEventKind::ALL {
            let stage = &stage;
            bus.on(kind, move |event| {
                let mut stage = stage.borrow_mut();
                forward(&mut *stage.driver, event)?;
                stage.queue.push(PendingWriteAction::new(event.clone()));
                Ok(())
            })?;
        }

        let mut tx = Transaction::new(bus);
        let result = body(&mut tx);
        tx.close();
        result?;
    }

    Ok(stage.into_inner().queue)
}

/// Stages the driver call matching `event`.
fn forward(driver: &mut dyn DbDriver, event: &WriteEvent) -> Result<()> {
    match event {
        WriteEvent::InsertObj { obj } => driver.insert_obj(obj),
        WriteEvent::InsertOne { obj, to_prop, value } => {
            let schema = obj.schema();
            let layout = schema.prop(to_prop)?;
            driver.insert_one(&obj.owner_key(), value, to_prop, layout)
        }
        WriteEvent::UpdateOne {
            obj,
            to_prop,
            identifier,
            values,
        } => {
            let schema = obj.schema();
            let layout = schema.prop(to_prop)?;
            let element = ElementKey {
                prop: to_prop.clone(),
                identifier: identifier.clone(),
            };
            driver.update(&obj.owner_key(), &element, values, layout)
        }
        WriteEvent::DeleteOne {
            obj,
            target_prop,
            identifier,
        } => {
            let element = ElementKey {
                prop: target_prop.clone(),
                identifier: identifier.clone(),
            };
            driver.delete_one(&obj.owner_key(), &element)
        }
    }
}
