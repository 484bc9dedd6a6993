//! Storage backend implementations.
//!
//! - `dynamodb`: the DynamoDB driver, its type codec and the [`TableClient`]
//!   seam it talks through.
//! - `inmemory`: a [`TableClient`] over in-process maps, for tests and local
//!   development.
//!
//! [`TableClient`]: dynamodb::TableClient

pub mod dynamodb;
pub mod inmemory;
