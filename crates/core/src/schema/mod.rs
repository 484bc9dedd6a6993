//! Static description of data models.

mod layout;
mod types;

pub use layout::{Attr, AttrType, Prop, PropKind, Schema, SchemaRegistry};
pub use types::{Modifier, PropType, ScalarType};
