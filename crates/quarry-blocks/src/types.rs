use std::fmt;

/// Closed set of voxel materials.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockType {
    #[default]
    Empty,
    Grass,
    Stone,
}

impl BlockType {
    pub const ALL: [BlockType; 3] = [BlockType::Empty, BlockType::Grass, BlockType::Stone];

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            BlockType::Empty => "empty",
            BlockType::Grass => "grass",
            BlockType::Stone => "stone",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// A single voxel. Two blocks are equal iff their types are equal.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block {
    pub ty: BlockType,
}

impl Block {
    pub const EMPTY: Block = Block {
        ty: BlockType::Empty,
    };
    pub const GRASS: Block = Block {
        ty: BlockType::Grass,
    };
    pub const STONE: Block = Block {
        ty: BlockType::Stone,
    };

    #[inline]
    pub const fn new(ty: BlockType) -> Self {
        Self { ty }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        matches!(self.ty, BlockType::Empty)
    }
}

impl From<BlockType> for Block {
    fn from(ty: BlockType) -> Self {
        Self::new(ty)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A block of type {}", self.ty.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_follows_type() {
        let a = Block::new(BlockType::Grass);
        let mut b = Block::EMPTY;
        assert_ne!(a, b);
        b = Block::from(BlockType::Grass);
        assert_eq!(a, b);
    }

    #[test]
    fn names_resolve_back_to_types() {
        for ty in BlockType::ALL {
            assert_eq!(BlockType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(BlockType::from_name("lava"), None);
        assert!(Block::default().is_empty());
    }
}
