use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Select, Sender, TryRecvError, bounded};
use hashbrown::{HashMap, HashSet};
use quarry_chunk::Chunk;
use quarry_world::{ChunkCoord, ChunkDims, Config};

use crate::client::ServiceClient;
use crate::error::ServiceError;
use crate::protocol::{DataKey, Message, RequestKind, Value};

struct Connection {
    name: String,
    rx: Receiver<Message>,
    tx: Sender<Message>,
    primary: bool,
}

/// Everything the control loop owns. Nothing outside the service thread ever
/// holds a reference into `chunks`.
struct ServiceState {
    dims: ChunkDims,
    chunks: HashMap<ChunkCoord, Chunk>,
    connections: Vec<Connection>,
    names: HashSet<String>,
    random_id_len: usize,
    fingerprint_len: usize,
    wait: Duration,
}

/// Handle to the running service thread.
pub struct ChunkService {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ChunkService {
    /// Start the service and return it together with the primary client.
    /// Dropping the primary client shuts the service down.
    pub fn spawn(cfg: &Config) -> io::Result<(Self, ServiceClient)> {
        let mut state = ServiceState {
            dims: cfg.dims(),
            chunks: HashMap::new(),
            connections: Vec::new(),
            names: HashSet::new(),
            random_id_len: cfg.service.random_id_len,
            fingerprint_len: cfg.service.fingerprint_len,
            wait: cfg.service.connection_wait(),
        };
        let primary = state.register(cfg.service.primary_name.clone(), true);

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = thread::Builder::new()
            .name("quarry-service".into())
            .spawn(move || state.run(&flag))?;

        Ok((
            Self {
                running,
                handle: Some(handle),
            },
            primary,
        ))
    }

    /// False once the control loop has exited for any reason.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Flip the running flag and join; returns within one connection wait.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!(target: "service", "service thread panicked");
            }
        }
    }
}

impl Drop for ChunkService {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ServiceState {
    fn register(&mut self, name: String, primary: bool) -> ServiceClient {
        let (req_tx, req_rx) = bounded::<Message>(1);
        let (rep_tx, rep_rx) = bounded::<Message>(1);
        self.names.insert(name.clone());
        self.connections.push(Connection {
            name: name.clone(),
            rx: req_rx,
            tx: rep_tx,
            primary,
        });
        ServiceClient::new(name, req_tx, rep_rx)
    }

    fn random_name(&self) -> String {
        loop {
            let id: String = (0..self.random_id_len)
                .map(|_| fastrand::lowercase())
                .collect();
            if !self.names.contains(&id) {
                return id;
            }
        }
    }

    fn run(mut self, running: &AtomicBool) {
        log::info!(target: "service", "chunk data service started");
        while running.load(Ordering::Acquire) {
            if !self.poll_once() {
                break;
            }
        }
        log::info!(
            target: "service",
            "chunk data service stopped ({} chunks, {} connections)",
            self.chunks.len(),
            self.connections.len()
        );
    }

    /// Wait on every connection at once, then serve at most one request per
    /// ready connection. Returns false when the primary connection closed.
    fn poll_once(&mut self) -> bool {
        let ready = {
            let mut sel = Select::new();
            for conn in &self.connections {
                sel.recv(&conn.rx);
            }
            sel.ready_timeout(self.wait).is_ok()
        };
        if !ready {
            return true;
        }

        let count = self.connections.len();
        let mut closed: Vec<usize> = Vec::new();
        for idx in 0..count {
            let req = match self.connections[idx].rx.try_recv() {
                Ok(req) => req,
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Disconnected) => {
                    closed.push(idx);
                    continue;
                }
            };
            let name = self.connections[idx].name.clone();
            let reply = self.handle(&name, req);
            log::trace!(target: "service", "replying to '{}' with {:?}", name, reply.kind);
            if self.connections[idx]
                .tx
                .send_timeout(reply, self.wait)
                .is_err()
            {
                closed.push(idx);
            }
        }

        for idx in closed.into_iter().rev() {
            let conn = self.connections.remove(idx);
            if conn.primary {
                log::info!(target: "service", "primary connection '{}' closed, exiting", conn.name);
                return false;
            }
            self.names.remove(&conn.name);
            log::info!(target: "service", "client closed connection '{}'", conn.name);
        }
        true
    }

    fn handle(&mut self, client: &str, req: Message) -> Message {
        let kind = req.kind;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(client, req)))
            .unwrap_or_else(|payload| {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                Err(ServiceError::Failed(msg))
            });
        match outcome {
            Ok(reply) => reply,
            Err(err) => {
                match &err {
                    ServiceError::Invalid(_) => {
                        log::warn!(target: "service", "invalid {:?} request from '{}': {}", kind, client, err)
                    }
                    ServiceError::DuplicateInit(_) => {
                        log::debug!(target: "service", "'{}': {}", client, err)
                    }
                    ServiceError::Failed(_) => {
                        log::error!(target: "service", "{:?} from '{}' failed: {}", kind, client, err)
                    }
                }
                Message::failure(err.reply_kind(), err.to_string())
            }
        }
    }

    fn dispatch(&mut self, client: &str, mut req: Message) -> Result<Message, ServiceError> {
        log::debug!(target: "service", "request from '{}': {:?}", client, req.kind);
        match req.kind {
            RequestKind::Ping => {
                log::info!(target: "service", "received ping from '{}'", client);
                Ok(Message::new(RequestKind::Ping)
                    .with(DataKey::Pong, Value::Text("pong".to_string())))
            }
            RequestKind::NewClient => {
                let requested = match req.take(DataKey::NewClientName) {
                    None => None,
                    Some(Value::Text(name)) => Some(name),
                    Some(other) => {
                        return Err(ServiceError::Invalid(format!(
                            "NewClientName must be text, got {}",
                            other.type_name()
                        )));
                    }
                };
                let name = match requested {
                    Some(name) if !self.names.contains(&name) => name,
                    requested => {
                        let id = self.random_name();
                        if let Some(taken) = requested {
                            log::debug!(target: "service", "client name '{}' taken, using '{}'", taken, id);
                        }
                        id
                    }
                };
                let new_client = self.register(name, false);
                log::info!(target: "service", "created a new client '{}' for '{}'", new_client.name(), client);
                Ok(Message::new(RequestKind::NewClient)
                    .with(DataKey::NewClient, Value::Client(new_client)))
            }
            RequestKind::SetChunk => {
                let (coord, mut chunk) = self.pos_and_chunk(&mut req)?;
                chunk.mark_generated();
                log::debug!(
                    target: "service",
                    "set {} to {}",
                    coord,
                    chunk.fingerprint(self.fingerprint_len)
                );
                self.chunks.insert(coord, chunk);
                Ok(Message::new(RequestKind::SetChunk))
            }
            RequestKind::InitChunk => {
                let (coord, mut chunk) = self.pos_and_chunk(&mut req)?;
                let dims = self.dims;
                let slot = self
                    .chunks
                    .entry(coord)
                    .or_insert_with(|| Chunk::new(dims));
                if slot.is_generated() {
                    return Err(ServiceError::DuplicateInit(coord));
                }
                chunk.mark_generated();
                *slot = chunk;
                Ok(Message::new(RequestKind::InitChunk))
            }
            RequestKind::GetChunk => {
                let coord = self.pos(&mut req)?;
                let chunk = self.chunk_entry(coord).clone();
                Ok(Message::new(RequestKind::GetChunk)
                    .with(DataKey::ChunkData, Value::Chunk(chunk)))
            }
            RequestKind::IsGenerated => {
                let coord = self.pos(&mut req)?;
                let generated = self.chunk_entry(coord).is_generated();
                Ok(Message::new(RequestKind::IsGenerated)
                    .with(DataKey::Boolean, Value::Bool(generated)))
            }
            kind @ (RequestKind::Failed | RequestKind::Invalid | RequestKind::DuplicateInit) => Err(
                ServiceError::Invalid(format!("{kind:?} is a reply kind, not a request")),
            ),
        }
    }

    fn chunk_entry(&mut self, coord: ChunkCoord) -> &mut Chunk {
        let dims = self.dims;
        self.chunks
            .entry(coord)
            .or_insert_with(|| Chunk::new(dims))
    }

    fn pos(&self, req: &mut Message) -> Result<ChunkCoord, ServiceError> {
        match req.take(DataKey::ChunkPos) {
            Some(Value::Pos(p)) => Ok(p),
            Some(other) => Err(ServiceError::Invalid(format!(
                "ChunkPos must be a position, got {}",
                other.type_name()
            ))),
            None => Err(ServiceError::Invalid("missing ChunkPos".to_string())),
        }
    }

    fn pos_and_chunk(&self, req: &mut Message) -> Result<(ChunkCoord, Chunk), ServiceError> {
        let coord = self.pos(req)?;
        let chunk = match req.take(DataKey::ChunkData) {
            Some(Value::Chunk(c)) => c,
            Some(other) => {
                return Err(ServiceError::Invalid(format!(
                    "ChunkData must be a chunk, got {}",
                    other.type_name()
                )));
            }
            None => return Err(ServiceError::Invalid("missing ChunkData".to_string())),
        };
        if chunk.dims() != self.dims {
            return Err(ServiceError::Invalid(format!(
                "chunk dims {:?} do not match the world {:?}",
                chunk.dims(),
                self.dims
            )));
        }
        Ok((coord, chunk))
    }
}
