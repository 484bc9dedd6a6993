//! Backend-agnostic core of the tyodm object-document mapper.
//!
//! Pure data and logic only: schemas, values, objects, the driver contract,
//! write events and their replay. Backends and the unit of work live in the
//! `tyodm` crate.

pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod object;
pub mod schema;
pub mod transaction;
pub mod typed;
pub mod value;

pub use config::{DynamoDbConfig, MongoDbConfig, OdmConfig, OdmMode};
pub use driver::DbDriver;
pub use error::{OdmError, Result};
pub use object::{ElementKey, Obj, ObjKey, PropValue};
pub use schema::{Attr, AttrType, Prop, PropKind, PropType, Schema, SchemaRegistry};
pub use transaction::Transaction;
pub use value::{record, Record, Scalar, Value};
