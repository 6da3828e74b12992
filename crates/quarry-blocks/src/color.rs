//! Per-face RGB colours for the fixed cube topology.
//!
//! Faces are emitted in the order top, front, bottom, left, back, right with
//! four vertices each; every vertex carries one RGB triple.

use crate::types::BlockType;

pub const FACE_COUNT: usize = 6;
pub const VERTICES_PER_CUBE: usize = FACE_COUNT * 4;

/// 24 vertices x RGB.
pub type FaceColors = [u8; VERTICES_PER_CUBE * 3];

const GRASS_TOP: [u8; 3] = [0, 255, 0];
const DIRT: [u8; 3] = [139, 69, 19];
const STONE: [u8; 3] = [175, 175, 175];

const fn build(faces: [[u8; 3]; FACE_COUNT]) -> FaceColors {
    let mut out = [0u8; VERTICES_PER_CUBE * 3];
    let mut v = 0;
    while v < VERTICES_PER_CUBE {
        let rgb = faces[v / 4];
        out[v * 3] = rgb[0];
        out[v * 3 + 1] = rgb[1];
        out[v * 3 + 2] = rgb[2];
        v += 1;
    }
    out
}

static GRASS_COLORS: FaceColors = build([GRASS_TOP, DIRT, DIRT, DIRT, DIRT, DIRT]);
static STONE_COLORS: FaceColors = build([STONE; FACE_COUNT]);

/// Colour table lookup. `Empty` has no colour and is never drawn.
#[inline]
pub fn color_of(ty: BlockType) -> Option<&'static FaceColors> {
    match ty {
        BlockType::Empty => None,
        BlockType::Grass => Some(&GRASS_COLORS),
        BlockType::Stone => Some(&STONE_COLORS),
    }
}
