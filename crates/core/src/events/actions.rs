use std::fmt;

use crate::object::Obj;
use crate::value::Record;

/// The kinds of write event a transaction listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteEventKind {
    InsertObj,
    InsertOne,
    UpdateOne,
    DeleteOne,
}

impl WriteEventKind {
    pub const ALL: [WriteEventKind; 4] = [
        WriteEventKind::InsertObj,
        WriteEventKind::InsertOne,
        WriteEventKind::UpdateOne,
        WriteEventKind::DeleteOne,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WriteEventKind::InsertObj => "insert new object",
            WriteEventKind::InsertOne => "insert one record",
            WriteEventKind::UpdateOne => "update one record",
            WriteEventKind::DeleteOne => "delete one record",
        }
    }
}

impl fmt::Display for WriteEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation requested on an object.
#[derive(Debug, Clone)]
pub enum WriteEvent {
    /// Persist every property of the object as it is in memory.
    InsertObj { obj: Obj },
    /// Insert one record into a property.
    InsertOne {
        obj: Obj,
        to_prop: String,
        value: Record,
    },
    /// Merge fields into a record. `identifier` addresses a collection element.
    UpdateOne {
        obj: Obj,
        to_prop: String,
        identifier: Option<String>,
        values: Record,
    },
    /// Delete a record. `identifier` addresses a collection element.
    DeleteOne {
        obj: Obj,
        target_prop: String,
        identifier: Option<String>,
    },
}

impl WriteEvent {
    pub fn kind(&self) -> WriteEventKind {
        match self {
            WriteEvent::InsertObj { .. } => WriteEventKind::InsertObj,
            WriteEvent::InsertOne { .. } => WriteEventKind::InsertOne,
            WriteEvent::UpdateOne { .. } => WriteEventKind::UpdateOne,
            WriteEvent::DeleteOne { .. } => WriteEventKind::DeleteOne,
        }
    }

    pub fn obj(&self) -> &Obj {
        match self {
            WriteEvent::InsertObj { obj }
            | WriteEvent::InsertOne { obj, .. }
            | WriteEvent::UpdateOne { obj, .. }
            | WriteEvent::DeleteOne { obj, .. } => obj,
        }
    }
}

/// A mutation captured by an open transaction, replayed onto the object after commit.
#[derive(Debug, Clone)]
pub struct PendingWriteAction {
    pub event: WriteEvent,
}

impl PendingWriteAction {
    pub fn new(event: WriteEvent) -> Self {
        Self { event }
    }

    pub fn kind(&self) -> WriteEventKind {
        self.event.kind()
    }
}
