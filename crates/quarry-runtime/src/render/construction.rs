use std::vec;

use quarry_world::ChunkCoord;

use super::background::FinishedChunk;
use super::geometry::VoxelDraw;

/// The one chunk currently being moved into visible state.
pub(crate) struct Construction {
    pub coord: ChunkCoord,
    pending: vec::IntoIter<VoxelDraw>,
    applied: Vec<VoxelDraw>,
}

impl Construction {
    pub fn new(finished: FinishedChunk) -> Self {
        Self {
            coord: finished.coord,
            applied: Vec::with_capacity(finished.records.len()),
            pending: finished.records.into_iter(),
        }
    }

    /// Apply up to `budget` records; returns how many were applied.
    pub fn apply(&mut self, budget: usize) -> usize {
        let before = self.applied.len();
        self.applied.extend(self.pending.by_ref().take(budget));
        self.applied.len() - before
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    pub fn applied(&self) -> &[VoxelDraw] {
        &self.applied
    }

    pub fn into_batch(self) -> (ChunkCoord, Vec<VoxelDraw>) {
        (self.coord, self.applied)
    }
}
