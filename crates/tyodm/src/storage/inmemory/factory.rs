//! Client factory handing out in-memory tables.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use tyodm_core::Result;

use crate::connection::{ClientFactory, ConnectionTarget};
use crate::storage::dynamodb::SharedClient;

use super::MemoryTable;

/// Creates clients backed by one shared [`MemoryTable`], whatever the target.
///
/// Every created client is a distinct instance, so client sharing in the
/// registry stays observable with `Arc::ptr_eq`.
#[derive(Debug, Default)]
pub struct MemoryClientFactory {
    table: MemoryTable,
    created: AtomicUsize,
}

impl MemoryClientFactory {
    pub fn new(table: MemoryTable) -> Self {
        Self {
            table,
            created: AtomicUsize::new(0),
        }
    }

    /// The table behind every created client.
    pub fn table(&self) -> &MemoryTable {
        &self.table
    }

    /// Number of clients created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MemoryClientFactory {
    async fn create(&self, _target: &ConnectionTarget) -> Result<SharedClient> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.table.clone()))
    }
}
