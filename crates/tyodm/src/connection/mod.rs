//! Sharing of database clients between ODM instances.

mod registry;

pub use registry::{AwsClientFactory, ClientFactory, ConnectionRegistry, ConnectionTarget, HandleId};
