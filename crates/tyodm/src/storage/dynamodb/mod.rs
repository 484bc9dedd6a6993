//! DynamoDB storage backend implementation.
//!
//! This module provides the DynamoDB driver using `aws-sdk-dynamodb`. Every
//! object is stored as one partition with one item per property, or per
//! element of a collection property.

mod client;
mod conversions;
mod driver;
mod error;
mod keys;

pub use client::{QueryPage, SharedClient, TableClient, WriteOp, WriteRequest};
pub use conversions::{assign_to_record, decode, encode, item_to_record, record_to_item, Item};
pub use driver::DynamoDbDriver;
pub use keys::{partition_key, sort_key, MAX_TRANSACT_ITEMS, PK, SK};
