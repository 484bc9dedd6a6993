//! Object-document mapper for DynamoDB.
//!
//! Objects are described by a [`Schema`](tyodm_core::Schema) and stored one
//! partition per object. Mutations go through a [`Transaction`] inside
//! [`TyOdm::write`], which commits them atomically and then applies them to
//! the in-memory objects.
//!
//! ```rust,ignore
//! use tyodm::{DynamoDbConfig, TyOdm};
//!
//! let mut odm = TyOdm::new(DynamoDbConfig::from_env(schemas));
//! odm.attach().await?;
//! odm.write(|tx| tx.insert_obj(&obj)).await?;
//! ```

pub mod connection;
pub mod odm;
pub mod storage;

pub use odm::TyOdm;
pub use tyodm_core::*;
