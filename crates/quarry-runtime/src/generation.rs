use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use quarry_service::{ClientError, ServiceClient};
use quarry_world::{ChunkCoord, ChunkDims, Config};

use crate::recent_cache::RecentlyRequested;
use crate::strategy::StrategyPicker;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub pending: usize,
    pub generated: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub workers: usize,
}

#[derive(Default)]
struct Counters {
    generated: AtomicUsize,
    duplicates: AtomicUsize,
    skipped: AtomicUsize,
}

/// Fixed pool of generator threads fed by a bounded job queue.
///
/// Each worker owns its own service client and publishes with `init_chunk`,
/// so a chunk that somebody else wrote first is left alone.
pub struct GenerationPool {
    running: Arc<AtomicBool>,
    job_tx: Sender<ChunkCoord>,
    job_rx: Receiver<ChunkCoord>,
    recent: RecentlyRequested,
    idle: Vec<ServiceClient>,
    workers: Vec<JoinHandle<()>>,
    picker: StrategyPicker,
    dims: ChunkDims,
    wait: Duration,
    counters: Arc<Counters>,
    dropped: usize,
}

impl GenerationPool {
    pub fn new(
        cfg: &Config,
        client: &ServiceClient,
        picker: StrategyPicker,
    ) -> Result<Self, ClientError> {
        let gen_cfg = &cfg.generation;
        let idle = (0..gen_cfg.workers.max(1))
            .map(|i| client.new_client(Some(&format!("generator-{i}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let (job_tx, job_rx) = bounded(gen_cfg.queue_size.max(1));
        Ok(Self {
            running: Arc::new(AtomicBool::new(false)),
            job_tx,
            job_rx,
            recent: RecentlyRequested::new(
                gen_cfg.recent_ttl(),
                gen_cfg.gc_interval(),
                gen_cfg.max_recent,
            ),
            idle,
            workers: Vec::new(),
            picker,
            dims: cfg.dims(),
            wait: gen_cfg.wait(),
            counters: Arc::new(Counters::default()),
            dropped: 0,
        })
    }

    /// Spawn one thread per worker client. Calling it twice is a no-op.
    pub fn start(&mut self) -> io::Result<()> {
        if !self.workers.is_empty() || self.idle.is_empty() {
            return Ok(());
        }
        self.running.store(true, Ordering::Release);
        for (i, client) in self.idle.drain(..).enumerate() {
            let worker = Worker {
                client,
                jobs: self.job_rx.clone(),
                running: Arc::clone(&self.running),
                picker: Arc::clone(&self.picker),
                dims: self.dims,
                wait: self.wait,
                counters: Arc::clone(&self.counters),
            };
            let handle = thread::Builder::new()
                .name(format!("quarry-gen-{i}"))
                .spawn(move || worker.run())?;
            self.workers.push(handle);
        }
        log::info!(target: "generation", "started {} generator threads", self.workers.len());
        Ok(())
    }

    /// Queue `(cx, cy)` unless it was requested within the TTL. Returns true
    /// if the job was enqueued; a full queue drops the request.
    pub fn request_chunk(&mut self, cx: i32, cy: i32) -> bool {
        self.request_at(ChunkCoord::new(cx, cy), Instant::now())
    }

    fn request_at(&mut self, coord: ChunkCoord, now: Instant) -> bool {
        if !self.recent.try_claim_at(coord, now) {
            return false;
        }
        match self.job_tx.try_send(coord) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                // forget the claim so a later request can retry
                self.recent.remove(coord);
                self.dropped += 1;
                log::debug!(target: "generation", "queue full, dropped request for {}", coord);
                false
            }
        }
    }

    /// Request every chunk in the square of `radius` around `center`.
    pub fn request_radius(&mut self, center: ChunkCoord, radius: i32) -> usize {
        let now = Instant::now();
        center
            .square(radius)
            .filter(|c| self.request_at(*c, now))
            .count()
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.job_rx.len()
    }

    pub fn stats(&self) -> GenerationStats {
        GenerationStats {
            pending: self.pending(),
            generated: self.counters.generated.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            dropped: self.dropped,
            workers: self.workers.len(),
        }
    }

    /// Signal the workers and join them; each exits within one queue wait.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!(target: "generation", "generator thread panicked");
            }
        }
    }
}

impl Drop for GenerationPool {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Step {
    Continue,
    Stop,
}

struct Worker {
    client: ServiceClient,
    jobs: Receiver<ChunkCoord>,
    running: Arc<AtomicBool>,
    picker: StrategyPicker,
    dims: ChunkDims,
    wait: Duration,
    counters: Arc<Counters>,
}

impl Worker {
    fn run(self) {
        while self.running.load(Ordering::Acquire) {
            let coord = match self.jobs.recv_timeout(self.wait) {
                Ok(coord) => coord,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if let Step::Stop = self.process(coord) {
                break;
            }
        }
        log::debug!(target: "generation", "{} exiting", self.client.name());
    }

    fn process(&self, coord: ChunkCoord) -> Step {
        match self.client.is_generated(coord) {
            Ok(true) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                return Step::Continue;
            }
            Ok(false) => {}
            Err(e) => return self.client_error("is_generated", coord, e),
        }
        let strategy = (self.picker)(coord);
        let chunk = match strategy.generate(coord, self.dims, &self.client) {
            Ok(chunk) => chunk,
            Err(e) => {
                log::warn!(target: "generation", "{} failed for {}: {}", strategy.name(), coord, e);
                return Step::Continue;
            }
        };
        match self.client.init_chunk(coord, chunk) {
            Ok(()) => {
                self.counters.generated.fetch_add(1, Ordering::Relaxed);
                log::debug!(target: "generation", "{} published {}", self.client.name(), coord);
            }
            Err(e) if e.is_duplicate_init() => {
                self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
                log::debug!(target: "generation", "{} already initialized, discarding", coord);
            }
            Err(e) => return self.client_error("init_chunk", coord, e),
        }
        Step::Continue
    }

    /// Losing the service or disagreeing with it about the wire format ends
    /// the worker; anything else is logged and the job dropped.
    fn client_error(&self, op: &str, coord: ChunkCoord, err: ClientError) -> Step {
        let name = self.client.name();
        if let ClientError::Disconnected = err {
            log::warn!(target: "generation", "{} lost the chunk service", name);
            Step::Stop
        } else if err.is_protocol_violation() {
            log::error!(target: "generation", "{}: {} {} broke the protocol: {}, stopping", name, op, coord, err);
            Step::Stop
        } else {
            log::warn!(target: "generation", "{}: {} {} failed: {}", name, op, coord, err);
            Step::Continue
        }
    }
}
