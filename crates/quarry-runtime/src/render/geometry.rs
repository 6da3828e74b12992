//! Per-voxel draw records: a fixed 24-vertex cube drawn as six quads.

use quarry_blocks::{Block, FaceColors, VERTICES_PER_CUBE, color_of};
use quarry_chunk::Chunk;
use quarry_world::{ChunkCoord, chunk_local_to_abs};
use rayon::prelude::*;

pub const CUBE_INDICES: [u32; VERTICES_PER_CUBE] = {
    let mut out = [0u32; VERTICES_PER_CUBE];
    let mut i = 0;
    while i < VERTICES_PER_CUBE {
        out[i] = i as u32;
        i += 1;
    }
    out
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Quads,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VoxelDraw {
    pub abs: (i32, i32, i32),
    pub vertex_count: u32,
    pub primitive: Primitive,
    pub indices: &'static [u32; VERTICES_PER_CUBE],
    pub vertices: [f32; VERTICES_PER_CUBE * 3],
    pub colors: &'static FaceColors,
}

// Unit offsets per vertex, faces ordered top, front, bottom, left, back, right.
#[rustfmt::skip]
const CORNERS: [[i8; 3]; VERTICES_PER_CUBE] = [
    [-1, 1, 1], [1, 1, 1], [1, 1, -1], [-1, 1, -1],
    [-1, -1, 1], [1, -1, 1], [1, 1, 1], [-1, 1, 1],
    [-1, -1, -1], [1, -1, -1], [1, -1, 1], [-1, -1, 1],
    [-1, 1, 1], [-1, 1, -1], [-1, -1, -1], [-1, -1, 1],
    [-1, 1, -1], [1, 1, -1], [1, -1, -1], [-1, -1, -1],
    [1, -1, 1], [1, -1, -1], [1, 1, -1], [1, 1, 1],
];

/// Cube of half-extent `n` centred at `abs * 2n`, so neighbours share faces.
pub fn cube_vertices(abs: (i32, i32, i32), n: f32) -> [f32; VERTICES_PER_CUBE * 3] {
    let centre = [
        abs.0 as f32 * n * 2.0,
        abs.1 as f32 * n * 2.0,
        abs.2 as f32 * n * 2.0,
    ];
    let mut out = [0.0f32; VERTICES_PER_CUBE * 3];
    for (v, corner) in CORNERS.iter().enumerate() {
        for axis in 0..3 {
            out[v * 3 + axis] = centre[axis] + f32::from(corner[axis]) * n;
        }
    }
    out
}

/// `None` for blocks without a colour (Empty).
pub fn voxel_draw(abs: (i32, i32, i32), block: Block, voxel_size: f32) -> Option<VoxelDraw> {
    let colors = color_of(block.ty)?;
    Some(VoxelDraw {
        abs,
        vertex_count: VERTICES_PER_CUBE as u32,
        primitive: Primitive::Quads,
        indices: &CUBE_INDICES,
        vertices: cube_vertices(abs, voxel_size),
        colors,
    })
}

/// Draw records for every stored voxel, ordered by local position.
pub fn chunk_payload(coord: ChunkCoord, chunk: &Chunk, voxel_size: f32) -> Vec<VoxelDraw> {
    let dims = chunk.dims();
    let mut voxels: Vec<_> = chunk.iter().collect();
    voxels.sort_unstable_by_key(|(pos, _)| *pos);
    voxels
        .par_iter()
        .filter_map(|&((bx, by, bz), block)| {
            voxel_draw(chunk_local_to_abs(dims, coord, bx, by, bz), block, voxel_size)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_world::ChunkDims;

    #[test]
    fn cube_spans_two_half_extents() {
        let v = cube_vertices((1, 0, -1), 0.5);
        let xs: Vec<f32> = v.chunks(3).map(|p| p[0]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), 0.5);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 1.5);
        // first face is the top one
        assert!(v[..12].chunks(3).all(|p| p[1] == 0.5));
    }

    #[test]
    fn empty_blocks_are_not_drawn() {
        assert!(voxel_draw((0, 0, 0), Block::EMPTY, 1.0).is_none());
        let d = voxel_draw((0, 0, 0), Block::GRASS, 1.0).unwrap();
        assert_eq!(d.vertex_count, 24);
        assert_eq!(d.primitive, Primitive::Quads);
        assert_eq!(d.indices[23], 23);
    }

    #[test]
    fn payload_uses_absolute_positions() {
        let mut chunk = Chunk::new(ChunkDims::new(4, 4));
        chunk.set_block(1, 2, 3, Block::STONE).unwrap();
        chunk.set_block(0, 0, 0, Block::GRASS).unwrap();
        let payload = chunk_payload(ChunkCoord::new(-1, 2), &chunk, 1.0);
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].abs, (-4, 0, 8));
        assert_eq!(payload[1].abs, (-3, 2, 11));
    }
}
