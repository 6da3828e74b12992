//! Terrain strategies: pure functions from a chunk coordinate to its contents.

use std::sync::Arc;

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use quarry_blocks::Block;
use quarry_chunk::{Chunk, ChunkError};
use quarry_service::ServiceClient;
use quarry_world::{ChunkCoord, ChunkDims, GenerationConfig, chunk_local_to_abs, translate};

const HEIGHT_FREQUENCY: f32 = 1.0 / 400.0;
const HEIGHT_OCTAVES: i32 = 5;
const HEIGHT_GAIN: f32 = 0.5;
const HEIGHT_MULTIPLIER: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
    /// Grass columns whose height follows fractal 2D noise over absolute X/Z.
    PerlinHeight { seed: i32 },
    /// Every column filled with grass from 0 up to (not including) `height`.
    Flat { height: usize },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::PerlinHeight { .. } => "perlin-height",
            Strategy::Flat { .. } => "flat",
        }
    }

    /// Build the chunk at `coord`. `client` is the worker's own service
    /// handle; strategies that depend on neighbouring chunks read through it.
    pub fn generate(
        &self,
        coord: ChunkCoord,
        dims: ChunkDims,
        client: &ServiceClient,
    ) -> Result<Chunk, ChunkError> {
        log::debug!(
            target: "generation",
            "{} building {} with {}",
            client.name(),
            coord,
            self.name()
        );
        match *self {
            Strategy::PerlinHeight { seed } => perlin_height(coord, dims, seed),
            Strategy::Flat { height } => flat(dims, height),
        }
    }
}

fn height_noise(seed: i32) -> FastNoiseLite {
    let mut noise = FastNoiseLite::with_seed(seed);
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(HEIGHT_FREQUENCY));
    noise.set_fractal_type(Some(FractalType::FBm));
    noise.set_fractal_octaves(Some(HEIGHT_OCTAVES));
    noise.set_fractal_gain(Some(HEIGHT_GAIN));
    noise
}

fn perlin_height(coord: ChunkCoord, dims: ChunkDims, seed: i32) -> Result<Chunk, ChunkError> {
    let noise = height_noise(seed);
    let max_h = dims.height as f32;
    let mut chunk = Chunk::new(dims);
    for (bx, bz) in chunk.all_columns() {
        let (abx, _, abz) = chunk_local_to_abs(dims, coord, bx, 0, bz);
        let n = noise.get_noise_2d(abx as f32, abz as f32) * HEIGHT_MULTIPLIER;
        let h = translate(n, 0.0, HEIGHT_MULTIPLIER, 0.0, max_h)
            .round()
            .clamp(0.0, max_h) as i32;
        for by in 0..h {
            chunk.set_block(bx, by, bz, Block::GRASS)?;
        }
    }
    Ok(chunk)
}

fn flat(dims: ChunkDims, height: usize) -> Result<Chunk, ChunkError> {
    let top = height.min(dims.height) as i32;
    let mut chunk = Chunk::new(dims);
    for (bx, bz) in chunk.all_columns() {
        for by in 0..top {
            chunk.set_block(bx, by, bz, Block::GRASS)?;
        }
    }
    Ok(chunk)
}

/// Chooses the strategy for each requested coordinate.
pub type StrategyPicker = Arc<dyn Fn(ChunkCoord) -> Strategy + Send + Sync>;

/// Noise terrain everywhere, seeded from the generation config.
pub fn default_picker(cfg: &GenerationConfig) -> StrategyPicker {
    let seed = cfg.seed;
    Arc::new(move |_| Strategy::PerlinHeight { seed })
}

pub fn fixed_picker(strategy: Strategy) -> StrategyPicker {
    Arc::new(move |_| strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_service::ChunkService;
    use quarry_world::Config;

    fn client() -> (ChunkService, ServiceClient) {
        let mut cfg = Config::default();
        cfg.service.connection_wait_ms = 20;
        ChunkService::spawn(&cfg).unwrap()
    }

    #[test]
    fn flat_fills_every_column_to_height() {
        let (_svc, main) = client();
        let dims = ChunkDims::new(4, 8);
        let chunk = Strategy::Flat { height: 3 }
            .generate(ChunkCoord::new(2, -1), dims, &main)
            .unwrap();
        assert_eq!(chunk.len(), 4 * 4 * 3);
        assert_eq!(chunk.get_block(0, 2, 0).unwrap(), Block::GRASS);
        assert!(chunk.get_block(0, 3, 0).unwrap().is_empty());
    }

    #[test]
    fn flat_height_is_capped_by_chunk_height() {
        let (_svc, main) = client();
        let dims = ChunkDims::new(2, 4);
        let chunk = Strategy::Flat { height: 99 }
            .generate(ChunkCoord::new(0, 0), dims, &main)
            .unwrap();
        assert_eq!(chunk.len(), dims.volume());
    }

    #[test]
    fn perlin_height_is_deterministic_and_bounded() {
        let (_svc, main) = client();
        let dims = ChunkDims::new(8, 8);
        let s = Strategy::PerlinHeight { seed: 1123 };
        let coord = ChunkCoord::new(-3, 7);
        let a = s.generate(coord, dims, &main).unwrap();
        let b = s.generate(coord, dims, &main).unwrap();
        assert_eq!(a, b);
        for (x, z) in a.all_columns() {
            let column = a.column(x, z).unwrap();
            // solid from the bottom up, nothing floating
            let solid = column.iter().take_while(|b| !b.is_empty()).count();
            assert!(column[solid..].iter().all(|b| b.is_empty()));
        }
    }

    #[test]
    fn pickers_report_their_strategy() {
        let cfg = GenerationConfig::default();
        let p = default_picker(&cfg);
        assert_eq!(p(ChunkCoord::new(1, 1)), Strategy::PerlinHeight { seed: cfg.seed });
        let f = fixed_picker(Strategy::Flat { height: 2 });
        assert_eq!(f(ChunkCoord::new(9, 9)).name(), "flat");
    }
}
