//! Block types and the static per-face colour table.
#![forbid(unsafe_code)]

pub mod color;
pub mod types;

pub use color::{FACE_COUNT, FaceColors, VERTICES_PER_CUBE, color_of};
pub use types::{Block, BlockType};
