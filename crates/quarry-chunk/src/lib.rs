//! Sparse chunk storage with validated local coordinates.
#![forbid(unsafe_code)]

use std::fmt::{self, Write as _};

use hashbrown::HashMap;
use quarry_blocks::Block;
use quarry_world::ChunkDims;
use sha2::{Digest, Sha512};

/// Default number of hex digits shown by `Display`.
pub const FINGERPRINT_LEN: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{axis} coordinate must be >= 0 and < {limit}, not {value}")]
pub struct ChunkError {
    pub axis: char,
    pub value: i32,
    pub limit: usize,
}

/// A `size x height x size` region stored as a sparse map; absent positions
/// read as `Block::EMPTY`.
#[derive(Clone, Debug)]
pub struct Chunk {
    dims: ChunkDims,
    blocks: HashMap<(i32, i32, i32), Block>,
    generated: bool,
}

impl Chunk {
    pub fn new(dims: ChunkDims) -> Self {
        Self {
            dims,
            blocks: HashMap::new(),
            generated: false,
        }
    }

    #[inline]
    pub fn dims(&self) -> ChunkDims {
        self.dims
    }

    #[inline]
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Set once the chunk has been written through the data service; never cleared.
    #[inline]
    pub fn mark_generated(&mut self) {
        self.generated = true;
    }

    pub fn check_position(&self, x: i32, y: i32, z: i32) -> Result<(), ChunkError> {
        let in_range = |v: i32, limit: usize| v >= 0 && (v as usize) < limit;
        if !in_range(x, self.dims.size) {
            return Err(ChunkError {
                axis: 'x',
                value: x,
                limit: self.dims.size,
            });
        }
        if !in_range(y, self.dims.height) {
            return Err(ChunkError {
                axis: 'y',
                value: y,
                limit: self.dims.height,
            });
        }
        if !in_range(z, self.dims.size) {
            return Err(ChunkError {
                axis: 'z',
                value: z,
                limit: self.dims.size,
            });
        }
        Ok(())
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<Block, ChunkError> {
        self.check_position(x, y, z)?;
        Ok(self.blocks.get(&(x, y, z)).copied().unwrap_or(Block::EMPTY))
    }

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Block) -> Result<(), ChunkError> {
        self.check_position(x, y, z)?;
        if block.is_empty() {
            self.blocks.remove(&(x, y, z));
        } else {
            self.blocks.insert((x, y, z), block);
        }
        Ok(())
    }

    /// Non-empty voxels, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32, i32), Block)> + '_ {
        self.blocks.iter().map(|(p, b)| (*p, *b))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Every legal local position, empty or not.
    pub fn all_positions(&self) -> impl Iterator<Item = (i32, i32, i32)> + use<> {
        let s = self.dims.size as i32;
        let h = self.dims.height as i32;
        (0..s).flat_map(move |x| (0..h).flat_map(move |y| (0..s).map(move |z| (x, y, z))))
    }

    /// Every (x, z) column.
    pub fn all_columns(&self) -> impl Iterator<Item = (i32, i32)> + use<> {
        let s = self.dims.size as i32;
        (0..s).flat_map(move |x| (0..s).map(move |z| (x, z)))
    }

    /// Blocks sharing `(x, z)`, ordered bottom to top.
    pub fn column(&self, x: i32, z: i32) -> Result<Vec<Block>, ChunkError> {
        self.check_position(x, 0, z)?;
        Ok((0..self.dims.height as i32)
            .map(|y| self.blocks.get(&(x, y, z)).copied().unwrap_or(Block::EMPTY))
            .collect())
    }

    /// Truncated SHA-512 over the sorted contents. For logs and cheap
    /// inequality checks only.
    pub fn fingerprint(&self, len: usize) -> String {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable();
        let mut hasher = Sha512::new();
        for ((x, y, z), b) in entries {
            hasher.update(x.to_le_bytes());
            hasher.update(y.to_le_bytes());
            hasher.update(z.to_le_bytes());
            hasher.update(b.ty.name().as_bytes());
        }
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            let _ = write!(hex, "{byte:02x}");
        }
        hex.truncate(len.clamp(1, hex.len()));
        hex
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims && self.blocks == other.blocks
    }
}

impl Eq for Chunk {}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chunk: {}", self.fingerprint(FINGERPRINT_LEN))
    }
}
