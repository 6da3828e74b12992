//! Background generation pool and render-data pipeline (engine-only, no GPU).
#![forbid(unsafe_code)]

mod generation;
mod recent_cache;
pub mod render;
pub mod strategy;

pub use generation::{GenerationPool, GenerationStats};
pub use recent_cache::{RecentCacheStats, RecentlyRequested};
pub use render::{
    DrawTarget, FrameReport, Primitive, RenderPipeline, RenderStatus, VoxelDraw,
};
pub use strategy::{Strategy, StrategyPicker, default_picker, fixed_picker};
