//! Absolute <-> (chunk, local) block coordinate mapping.
//!
//! `abx = cx * size + bx`, `abz = cy * size + bz`, `aby = by`. Division floors
//! toward negative infinity so the mapping stays a bijection for negative
//! chunks.

use crate::ChunkCoord;

/// Chunk extents: `size` along X and Z, `height` along Y.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkDims {
    pub size: usize,
    pub height: usize,
}

impl ChunkDims {
    #[inline]
    pub const fn new(size: usize, height: usize) -> Self {
        Self { size, height }
    }

    #[inline]
    pub fn volume(self) -> usize {
        self.size * self.size * self.height
    }
}

#[inline]
pub fn chunk_local_to_abs(
    dims: ChunkDims,
    coord: ChunkCoord,
    bx: i32,
    by: i32,
    bz: i32,
) -> (i32, i32, i32) {
    let s = dims.size as i32;
    (coord.cx * s + bx, by, coord.cy * s + bz)
}

#[inline]
pub fn abs_to_chunk_local(
    dims: ChunkDims,
    abx: i32,
    aby: i32,
    abz: i32,
) -> (ChunkCoord, (i32, i32, i32)) {
    let s = dims.size as i32;
    let coord = ChunkCoord::new(abx.div_euclid(s), abz.div_euclid(s));
    (coord, (abx.rem_euclid(s), aby, abz.rem_euclid(s)))
}

/// Linearly remap `num` from `[min_in, max_in]` to `[min_out, max_out]`.
#[inline]
pub fn translate(num: f32, min_in: f32, max_in: f32, min_out: f32, max_out: f32) -> f32 {
    (num - min_in) / (max_in - min_in) * (max_out - min_out) + min_out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: ChunkDims = ChunkDims::new(16, 8);

    #[test]
    fn negative_blocks_floor_into_previous_chunk() {
        let (coord, local) = abs_to_chunk_local(DIMS, -1, 3, -16);
        assert_eq!(coord, ChunkCoord::new(-1, -1));
        assert_eq!(local, (15, 3, 0));
        assert_eq!(chunk_local_to_abs(DIMS, coord, 15, 3, 0), (-1, 3, -16));
    }

    #[test]
    fn translate_matches_reference_table() {
        let cases = [
            ((0.0, 0.0, 4.0, 0.0, 40.0), 0.0),
            ((1.0, 0.0, 4.0, 0.0, 40.0), 10.0),
            ((3.0, 0.0, 4.0, 0.0, 40.0), 30.0),
            ((4.0, 0.0, 4.0, 0.0, 40.0), 40.0),
            ((5.0, 0.0, 10.0, 0.0, 100.0), 50.0),
            ((9.0, 0.0, 10.0, 0.0, 100.0), 90.0),
        ];
        for ((n, a, b, c, d), want) in cases {
            assert!((translate(n, a, b, c, d) - want).abs() < 1e-4);
        }
    }
}
