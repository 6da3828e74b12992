//! Request/response messages. Every message is a kind plus a keyed payload;
//! replies reuse the same shape and the failure kinds carry only context.
use std::fmt;

use hashbrown::HashMap;
use quarry_chunk::Chunk;
use quarry_world::ChunkCoord;

use crate::client::ServiceClient;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Ping,
    NewClient,
    SetChunk,
    GetChunk,
    InitChunk,
    IsGenerated,
    Failed,
    Invalid,
    DuplicateInit,
}

impl RequestKind {
    /// Terminal failure replies; never valid as requests.
    #[inline]
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            RequestKind::Failed | RequestKind::Invalid | RequestKind::DuplicateInit
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataKey {
    Pong,
    NewClientName,
    NewClient,
    ChunkPos,
    ChunkData,
    Boolean,
}

pub enum Value {
    Text(String),
    Client(ServiceClient),
    Pos(ChunkCoord),
    Chunk(Chunk),
    Bool(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Client(_) => "client",
            Value::Pos(_) => "pos",
            Value::Chunk(_) => "chunk",
            Value::Bool(_) => "bool",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Client(c) => write!(f, "Client({:?})", c.name()),
            Value::Pos(p) => write!(f, "Pos{p}"),
            Value::Chunk(c) => write!(f, "{c}"),
            Value::Bool(b) => write!(f, "Bool({b})"),
        }
    }
}

#[derive(Debug)]
pub struct Message {
    pub kind: RequestKind,
    pub data: HashMap<DataKey, Value>,
    pub context: Option<String>,
}

impl Message {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            data: HashMap::new(),
            context: None,
        }
    }

    pub fn failure(kind: RequestKind, context: impl Into<String>) -> Self {
        debug_assert!(kind.is_failure());
        Self {
            kind,
            data: HashMap::new(),
            context: Some(context.into()),
        }
    }

    #[must_use]
    pub fn with(mut self, key: DataKey, value: Value) -> Self {
        self.data.insert(key, value);
        self
    }

    #[inline]
    pub fn take(&mut self, key: DataKey) -> Option<Value> {
        self.data.remove(&key)
    }

    pub fn take_pos(&mut self) -> Option<ChunkCoord> {
        match self.take(DataKey::ChunkPos)? {
            Value::Pos(p) => Some(p),
            _ => None,
        }
    }

    pub fn take_chunk(&mut self) -> Option<Chunk> {
        match self.take(DataKey::ChunkData)? {
            Value::Chunk(c) => Some(c),
            _ => None,
        }
    }

    pub fn take_bool(&mut self) -> Option<bool> {
        match self.take(DataKey::Boolean)? {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn take_client(&mut self) -> Option<ServiceClient> {
        match self.take(DataKey::NewClient)? {
            Value::Client(c) => Some(c),
            _ => None,
        }
    }
}
