//! World sizing, coordinate mapping, and runtime configuration.
#![forbid(unsafe_code)]

pub mod config;
mod chunk_coord;
mod coords;

pub use chunk_coord::ChunkCoord;
pub use config::{
    Config, ConfigError, GenerationConfig, RenderConfig, ServiceConfig, WorldSection,
};
pub use coords::{ChunkDims, abs_to_chunk_local, chunk_local_to_abs, translate};
