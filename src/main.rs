mod logging;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use quarry_runtime::{
    DrawTarget, GenerationPool, RenderPipeline, VoxelDraw, default_picker,
};
use quarry_service::ChunkService;
use quarry_world::{ChunkCoord, Config};

#[derive(Parser, Debug)]
#[command(name = "quarry", about = "Headless voxel backend: chunk service, generation pool and render pipeline")]
struct Args {
    /// TOML config; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of frames to run
    #[arg(long, default_value_t = 600)]
    frames: u64,
    /// Chunk radius around the origin, overriding both configured distances
    #[arg(long)]
    radius: Option<i32>,
    /// Target frame time in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,
    /// Also write debug logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Stands in for the GPU: counts what would be submitted.
#[derive(Default)]
struct FrameCounter {
    batches: usize,
    voxels: usize,
}

impl DrawTarget for FrameCounter {
    fn draw_batch(&mut self, _coord: ChunkCoord, records: &[VoxelDraw]) {
        self.batches += 1;
        self.voxels += records.len();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(args.log_file.as_deref())?;

    let mut cfg = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::default(),
    };
    if let Some(r) = args.radius {
        cfg.generation.distance = r;
        cfg.render.distance = r;
    }
    cfg.validate()?;
    log::info!(
        "chunk {}x{}x{}, {} generators, {} frames",
        cfg.world.chunk_size,
        cfg.world.chunk_size,
        cfg.world.world_height,
        cfg.generation.workers,
        args.frames
    );

    let (mut service, main_client) = ChunkService::spawn(&cfg)?;
    main_client.ping()?;
    let mut pool = GenerationPool::new(&cfg, &main_client, default_picker(&cfg.generation))?;
    let mut renderer = RenderPipeline::new(&cfg, &main_client)?;
    pool.start()?;
    renderer.start()?;

    let centre = ChunkCoord::new(0, 0);
    let frame_time = Duration::from_millis(args.frame_ms);
    let started = Instant::now();
    for frame in 0..args.frames {
        let tick = Instant::now();
        pool.request_radius(centre, cfg.generation.distance);
        renderer.request_radius(centre, cfg.render.distance);
        let report = renderer.render_queued();
        for coord in &report.completed {
            log::info!("chunk {} ready", coord);
        }
        let mut counter = FrameCounter::default();
        renderer.draw(&mut counter);
        if frame % 60 == 0 {
            let status = renderer.status();
            log::info!(
                "frame {}: {} voxels in {} batches, {} rendered, {} pending generation, {:?} in construction",
                frame,
                counter.voxels,
                counter.batches,
                status.rendered,
                pool.pending(),
                status.in_construction
            );
        }
        if let Some(rest) = frame_time.checked_sub(tick.elapsed()) {
            thread::sleep(rest);
        }
    }

    renderer.stop();
    pool.stop();
    let gen_stats = pool.stats();
    let status = renderer.status();
    log::info!(
        "done in {:.1}s: {} generated ({} lost races), {} rendered, {} evicted",
        started.elapsed().as_secs_f32(),
        gen_stats.generated,
        gen_stats.duplicates,
        status.rendered,
        status.evicted
    );
    drop(renderer);
    drop(pool);
    drop(main_client);
    service.stop();
    Ok(())
}
