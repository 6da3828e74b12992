use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use crossbeam_channel::{Receiver, Sender};
use quarry_chunk::Chunk;
use quarry_world::{ChunkCoord, ChunkDims};

use crate::error::ClientError;
use crate::protocol::{DataKey, Message, RequestKind, Value};

/// Request/response stub for one consumer. Not `Clone` and not `Sync`: a
/// handle can move to another thread but never be shared, so a reply always
/// pairs with the request that produced it. Threads ask the service for their
/// own handle through [`ServiceClient::new_client`].
///
/// ```compile_fail
/// fn shared<T: Sync>() {}
/// shared::<quarry_service::ServiceClient>();
/// ```
pub struct ServiceClient {
    name: String,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    _not_sync: PhantomData<Cell<()>>,
}

impl ServiceClient {
    pub(crate) fn new(name: String, tx: Sender<Message>, rx: Receiver<Message>) -> Self {
        Self {
            name,
            tx,
            rx,
            _not_sync: PhantomData,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write one request and block for exactly one reply.
    pub fn send_request(&self, request: Message) -> Result<Message, ClientError> {
        self.tx
            .send(request)
            .map_err(|_| ClientError::Disconnected)?;
        self.rx.recv().map_err(|_| ClientError::Disconnected)
    }

    fn call(&self, request: Message) -> Result<Message, ClientError> {
        let kind = request.kind;
        let reply = self.send_request(request)?;
        if reply.kind.is_failure() {
            return Err(ClientError::Rejected {
                request: kind,
                kind: reply.kind,
                context: reply.context,
            });
        }
        if reply.kind != kind {
            // Framing disagreement between the two ends; nothing sensible can follow.
            log::error!(
                target: "service",
                "client '{}' sent {:?} but the service answered {:?}",
                self.name,
                kind,
                reply.kind
            );
            return Err(ClientError::Mismatched {
                request: kind,
                reply: reply.kind,
            });
        }
        Ok(reply)
    }

    pub fn ping(&self) -> Result<(), ClientError> {
        let mut reply = self.call(Message::new(RequestKind::Ping))?;
        match reply.take(DataKey::Pong) {
            Some(Value::Text(pong)) => {
                log::info!(target: "service", "client '{}': server replied {}", self.name, pong);
                Ok(())
            }
            _ => Err(ClientError::Malformed {
                request: RequestKind::Ping,
                expected: DataKey::Pong,
            }),
        }
    }

    /// Ask the service for a fresh handle, usable from another thread.
    pub fn new_client(&self, name: Option<&str>) -> Result<ServiceClient, ClientError> {
        let mut req = Message::new(RequestKind::NewClient);
        if let Some(name) = name {
            req = req.with(DataKey::NewClientName, Value::Text(name.to_string()));
        }
        self.call(req)?
            .take_client()
            .ok_or(ClientError::Malformed {
                request: RequestKind::NewClient,
                expected: DataKey::NewClient,
            })
    }

    pub fn set_chunk(&self, coord: ChunkCoord, chunk: Chunk) -> Result<(), ClientError> {
        self.call(chunk_request(RequestKind::SetChunk, coord, chunk))
            .map(|_| ())
    }

    /// First-writer-wins write; fails with `DuplicateInit` once the chunk exists.
    pub fn init_chunk(&self, coord: ChunkCoord, chunk: Chunk) -> Result<(), ClientError> {
        self.call(chunk_request(RequestKind::InitChunk, coord, chunk))
            .map(|_| ())
    }

    pub fn get_chunk(&self, coord: ChunkCoord) -> Result<Chunk, ClientError> {
        self.call(pos_request(RequestKind::GetChunk, coord))?
            .take_chunk()
            .ok_or(ClientError::Malformed {
                request: RequestKind::GetChunk,
                expected: DataKey::ChunkData,
            })
    }

    pub fn is_generated(&self, coord: ChunkCoord) -> Result<bool, ClientError> {
        self.call(pos_request(RequestKind::IsGenerated, coord))?
            .take_bool()
            .ok_or(ClientError::Malformed {
                request: RequestKind::IsGenerated,
                expected: DataKey::Boolean,
            })
    }

    #[inline]
    pub fn chunk_local_to_abs(
        dims: ChunkDims,
        coord: ChunkCoord,
        bx: i32,
        by: i32,
        bz: i32,
    ) -> (i32, i32, i32) {
        quarry_world::chunk_local_to_abs(dims, coord, bx, by, bz)
    }

    #[inline]
    pub fn abs_to_chunk_local(
        dims: ChunkDims,
        abx: i32,
        aby: i32,
        abz: i32,
    ) -> (ChunkCoord, (i32, i32, i32)) {
        quarry_world::abs_to_chunk_local(dims, abx, aby, abz)
    }
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn pos_request(kind: RequestKind, coord: ChunkCoord) -> Message {
    Message::new(kind).with(DataKey::ChunkPos, Value::Pos(coord))
}

fn chunk_request(kind: RequestKind, coord: ChunkCoord, chunk: Chunk) -> Message {
    pos_request(kind, coord).with(DataKey::ChunkData, Value::Chunk(chunk))
}
