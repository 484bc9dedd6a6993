//! Write events published by transactions, and their replay.

mod actions;
mod bus;
mod replay;

pub use actions::{PendingWriteAction, WriteEvent, WriteEventKind};
pub use bus::{Listener, WriteEventBus};
