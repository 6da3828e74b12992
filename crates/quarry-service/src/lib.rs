//! Authoritative chunk data service: one control loop owns every chunk and
//! answers typed requests from any number of client handles.
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod protocol;
mod server;

pub use client::ServiceClient;
pub use error::{ClientError, ServiceError};
pub use protocol::{DataKey, Message, RequestKind, Value};
pub use server::ChunkService;
