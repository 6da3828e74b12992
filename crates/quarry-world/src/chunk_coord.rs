use std::fmt;

/// Horizontal chunk coordinate. Y is not chunked, so `cy` indexes along world Z.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32) -> Self {
        Self { cx, cy }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
        }
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dy = i64::from(self.cy - other.cy);
        dx * dx + dy * dy
    }

    /// Every coordinate in the square `self ± radius`, row by row.
    pub fn square(self, radius: i32) -> impl Iterator<Item = ChunkCoord> {
        let r = radius.max(0);
        (-r..=r).flat_map(move |ox| (-r..=r).map(move |oy| self.offset(ox, oy)))
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<ChunkCoord> for (i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cy)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.cx, self.cy)
    }
}
