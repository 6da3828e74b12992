//! Two-stage render pipeline.
//!
//! A background thread turns generated chunks into draw records; the
//! foreground moves those records into visible state under a per-frame
//! budget, one chunk at a time.

mod background;
mod construction;
mod geometry;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use hashbrown::HashMap;
use quarry_service::{ClientError, ServiceClient};
use quarry_world::{ChunkCoord, Config};

use crate::recent_cache::RecentlyRequested;
use background::{Background, BackgroundCounters, FinishedChunk};
use construction::Construction;

pub use geometry::{CUBE_INDICES, Primitive, VoxelDraw, chunk_payload, cube_vertices, voxel_draw};

/// Receives draw records. Implemented by whatever owns the GPU side.
pub trait DrawTarget {
    fn draw_batch(&mut self, coord: ChunkCoord, records: &[VoxelDraw]);
}

/// What one `render_queued` call did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub applied: usize,
    pub started: Option<ChunkCoord>,
    pub completed: Vec<ChunkCoord>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStatus {
    pub requested: usize,
    pub queued: usize,
    pub finished_waiting: usize,
    pub in_construction: Option<ChunkCoord>,
    pub remaining_in_construction: usize,
    pub rendered: usize,
    pub computed: usize,
    pub deferred: usize,
    pub evicted: usize,
}

pub struct RenderPipeline {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    pending_worker: Option<Background>,
    to_render_tx: Sender<ChunkCoord>,
    finished_rx: Receiver<FinishedChunk>,
    evicted_rx: Receiver<ChunkCoord>,
    recent: RecentlyRequested,
    constructing: Option<Construction>,
    rendered: HashMap<ChunkCoord, Vec<VoxelDraw>>,
    max_per_frame: usize,
    counters: Arc<BackgroundCounters>,
}

impl RenderPipeline {
    /// Builds the queues and asks the service for the background stage's own
    /// client. Nothing runs until [`RenderPipeline::start`].
    pub fn new(cfg: &Config, client: &ServiceClient) -> Result<Self, ClientError> {
        let rc = &cfg.render;
        let bg_client = client.new_client(Some("World Renderer"))?;
        let (to_render_tx, to_render_rx) = bounded(rc.to_render_capacity.max(1));
        let (finished_tx, finished_rx) = bounded(rc.finished_capacity.max(1));
        let (evicted_tx, evicted_rx) = unbounded();
        let running = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(BackgroundCounters::default());
        let background = Background {
            client: bg_client,
            running: Arc::clone(&running),
            to_render_tx: to_render_tx.clone(),
            to_render_rx,
            finished_tx,
            finished_rx: finished_rx.clone(),
            evicted_tx,
            voxel_size: cfg.world.voxel_size,
            wait: rc.wait(),
            defer_delay: rc.defer_delay(),
            overflow_evict: rc.overflow_evict,
            counters: Arc::clone(&counters),
        };
        Ok(Self {
            running,
            worker: None,
            pending_worker: Some(background),
            to_render_tx,
            finished_rx,
            evicted_rx,
            recent: RecentlyRequested::new(rc.recent_ttl(), rc.gc_interval(), rc.max_recent),
            constructing: None,
            rendered: HashMap::new(),
            max_per_frame: rc.max_voxels_per_frame.max(1),
            counters,
        })
    }

    pub fn start(&mut self) -> io::Result<()> {
        let Some(background) = self.pending_worker.take() else {
            return Ok(());
        };
        self.running.store(true, Ordering::Release);
        let handle = thread::Builder::new()
            .name("quarry-render".into())
            .spawn(move || background.run())?;
        self.worker = Some(handle);
        log::info!(target: "render", "render background stage started");
        Ok(())
    }

    /// Fire-and-forget. Returns true if the coordinate was queued.
    pub fn request_chunk(&mut self, cx: i32, cy: i32) -> bool {
        self.request_at(ChunkCoord::new(cx, cy), Instant::now())
    }

    fn request_at(&mut self, coord: ChunkCoord, now: Instant) -> bool {
        if !self.recent.try_claim_at(coord, now) {
            return false;
        }
        match self.to_render_tx.try_send(coord) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.recent.remove(coord);
                log::debug!(target: "render", "to-render queue full, dropped {}", coord);
                false
            }
        }
    }

    /// Request every chunk around `center` that is neither rendered nor in
    /// construction.
    pub fn request_radius(&mut self, center: ChunkCoord, radius: i32) -> usize {
        let now = Instant::now();
        let building = self.constructing.as_ref().map(|c| c.coord);
        center
            .square(radius)
            .filter(|c| {
                !self.rendered.contains_key(c) && building != Some(*c) && self.request_at(*c, now)
            })
            .count()
    }

    /// One frame of foreground work. Never blocks.
    ///
    /// Resumes the chunk in construction first; only when it is done is a new
    /// finished chunk dequeued, and it gets whatever budget is left.
    pub fn render_queued(&mut self) -> FrameReport {
        self.drain_evicted();
        let mut report = FrameReport::default();
        let mut budget = self.max_per_frame;

        if let Some(current) = self.constructing.as_mut() {
            let n = current.apply(budget);
            budget -= n;
            report.applied += n;
            if !current.is_complete() {
                return report;
            }
            self.complete_construction(&mut report);
        }
        if budget == 0 {
            return report;
        }
        let Ok(finished) = self.finished_rx.try_recv() else {
            return report;
        };
        let mut next = Construction::new(finished);
        report.started = Some(next.coord);
        report.applied += next.apply(budget);
        let done = next.is_complete();
        self.constructing = Some(next);
        if done {
            self.complete_construction(&mut report);
        }
        report
    }

    fn complete_construction(&mut self, report: &mut FrameReport) {
        if let Some(done) = self.constructing.take() {
            let (coord, batch) = done.into_batch();
            log::debug!(target: "render", "chunk {} rendered ({} voxels)", coord, batch.len());
            self.rendered.insert(coord, batch);
            report.completed.push(coord);
        }
    }

    fn drain_evicted(&mut self) {
        for coord in self.evicted_rx.try_iter() {
            self.recent.remove(coord);
        }
    }

    /// True once every record of the chunk has been applied.
    pub fn is_rendered(&self, cx: i32, cy: i32) -> bool {
        self.rendered.contains_key(&ChunkCoord::new(cx, cy))
    }

    pub fn rendered_voxels(&self, coord: ChunkCoord) -> Option<usize> {
        self.rendered.get(&coord).map(Vec::len)
    }

    /// Hand every applied record, including a partly applied chunk, to `target`.
    pub fn draw(&self, target: &mut impl DrawTarget) {
        for (coord, batch) in &self.rendered {
            target.draw_batch(*coord, batch);
        }
        if let Some(current) = &self.constructing {
            target.draw_batch(current.coord, current.applied());
        }
    }

    /// Forget a rendered chunk so it can be requested again.
    pub fn unload(&mut self, coord: ChunkCoord) -> bool {
        self.recent.remove(coord);
        self.rendered.remove(&coord).is_some()
    }

    pub fn status(&self) -> RenderStatus {
        RenderStatus {
            requested: self.recent.len(),
            queued: self.to_render_tx.len(),
            finished_waiting: self.finished_rx.len(),
            in_construction: self.constructing.as_ref().map(|c| c.coord),
            remaining_in_construction: self
                .constructing
                .as_ref()
                .map_or(0, Construction::remaining),
            rendered: self.rendered.len(),
            computed: self.counters.computed.load(Ordering::Relaxed),
            deferred: self.counters.deferred.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }

    /// Stop the background stage; it notices within one queue wait.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!(target: "render", "render background thread panicked");
            }
        }
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
