//! In-memory storage backend for testing.
//!
//! [`MemoryTable`] implements the same [`TableClient`] seam as the DynamoDB
//! SDK client, so the real driver runs unchanged on top of it.
//! [`MemoryClientFactory`] plugs it into a
//! [`ConnectionRegistry`](crate::connection::ConnectionRegistry).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use tyodm::connection::ConnectionRegistry;
//! use tyodm::storage::inmemory::{MemoryClientFactory, MemoryTable};
//!
//! let table = MemoryTable::new();
//! let registry = ConnectionRegistry::new(Arc::new(MemoryClientFactory::new(table.clone())));
//! ```
//!
//! [`TableClient`]: crate::storage::dynamodb::TableClient

mod factory;
mod table;

pub use factory::MemoryClientFactory;
pub use table::{MemoryTable, DEFAULT_PAGE_SIZE};
