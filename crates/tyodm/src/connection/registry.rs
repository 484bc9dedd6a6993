//! Process-wide registry of database clients.
//!
//! Handles attached to structurally equal targets share one client. A client
//! is dropped from the registry when the last handle using its target detaches.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use tyodm_core::{DynamoDbConfig, OdmConfig, OdmError, OdmMode, Result};

use crate::storage::dynamodb::SharedClient;

/// Identity of one ODM instance in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a client connects to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionTarget {
    pub region: String,
    pub endpoint: Option<String>,
}

impl ConnectionTarget {
    /// Canonical form the registry keys clients by.
    fn canonical(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| OdmError::Config(e.to_string()))
    }
}

impl From<&DynamoDbConfig> for ConnectionTarget {
    fn from(config: &DynamoDbConfig) -> Self {
        Self {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        }
    }
}

/// Creates the client for a target the registry has no client for yet.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create(&self, target: &ConnectionTarget) -> Result<SharedClient>;
}

/// Creates SDK clients from the default credential chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct AwsClientFactory;

#[async_trait]
impl ClientFactory for AwsClientFactory {
    async fn create(&self, target: &ConnectionTarget) -> Result<SharedClient> {
        let mut sdk_config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(target.region.clone()));

        if let Some(endpoint) = &target.endpoint {
            sdk_config_loader = sdk_config_loader.endpoint_url(endpoint);
        }

        let sdk_config = sdk_config_loader.load().await;
        Ok(Arc::new(Client::new(&sdk_config)))
    }
}

#[derive(Default)]
struct RegistryState {
    /// Canonical target to client.
    clients: HashMap<String, SharedClient>,
    attachments: HashMap<HandleId, ConnectionTarget>,
}

/// Shares DynamoDB clients between ODM instances.
pub struct ConnectionRegistry {
    factory: Arc<dyn ClientFactory>,
    state: Mutex<RegistryState>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<ConnectionRegistry>> = OnceLock::new();

impl ConnectionRegistry {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// The process-wide registry, creating SDK clients.
    pub fn global() -> Arc<ConnectionRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(ConnectionRegistry::new(Arc::new(AwsClientFactory))))
            .clone()
    }

    /// Attaches `handle` to the client of the configured target, creating it if needed.
    ///
    /// # Errors
    /// - `WrongBackendMode` if `config` is not a DynamoDB configuration.
    /// - `AlreadyAttached` if `handle` is attached.
    pub async fn attach(&self, handle: HandleId, config: &OdmConfig) -> Result<SharedClient> {
        let OdmConfig::DynamoDb(config) = config else {
            return Err(OdmError::WrongBackendMode {
                expected: OdmMode::DynamoDb,
                actual: config.mode(),
            });
        };

        let mut state = self.state.lock().await;
        if state.attachments.contains_key(&handle) {
            return Err(OdmError::AlreadyAttached);
        }

        let target = ConnectionTarget::from(config);
        let key = target.canonical()?;
        let client = match state.clients.get(&key) {
            Some(client) => {
                debug!(handle = %handle, target = %key, "Reusing client");
                client.clone()
            }
            None => {
                let client = self.factory.create(&target).await?;
                info!(handle = %handle, target = %key, "Created client");
                state.clients.insert(key, client.clone());
                client
            }
        };

        state.attachments.insert(handle, target);
        Ok(client)
    }

    /// Detaches `handle`. Returns `false` if it was not attached.
    ///
    /// # Errors
    /// `WrongBackendMode` if `mode` is not DynamoDB.
    pub async fn detach(&self, handle: HandleId, mode: OdmMode) -> Result<bool> {
        if mode != OdmMode::DynamoDb {
            return Err(OdmError::WrongBackendMode {
                expected: OdmMode::DynamoDb,
                actual: mode,
            });
        }

        let mut state = self.state.lock().await;
        let Some(target) = state.attachments.remove(&handle) else {
            return Ok(false);
        };

        if !state.attachments.values().any(|other| *other == target) {
            let key = target.canonical()?;
            state.clients.remove(&key);
            info!(handle = %handle, target = %key, "Released client");
        }

        Ok(true)
    }

    pub async fn is_attached(&self, handle: HandleId) -> bool {
        self.state.lock().await.attachments.contains_key(&handle)
    }

    /// Number of clients currently held.
    pub async fn client_count(&self) -> usize {
        self.state.lock().await.clients.len()
    }
}
