use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use quarry_service::{ClientError, ServiceClient};
use quarry_world::ChunkCoord;

use super::geometry::{VoxelDraw, chunk_payload};

/// A fully computed chunk waiting for the foreground.
pub(crate) struct FinishedChunk {
    pub coord: ChunkCoord,
    pub records: Vec<VoxelDraw>,
}

#[derive(Default)]
pub(crate) struct BackgroundCounters {
    pub computed: AtomicUsize,
    pub deferred: AtomicUsize,
    pub evicted: AtomicUsize,
}

pub(crate) struct Background {
    pub client: ServiceClient,
    pub running: Arc<AtomicBool>,
    pub to_render_tx: Sender<ChunkCoord>,
    pub to_render_rx: Receiver<ChunkCoord>,
    pub finished_tx: Sender<FinishedChunk>,
    // Second consumer handle, used only to discard the oldest payloads.
    pub finished_rx: Receiver<FinishedChunk>,
    pub evicted_tx: Sender<ChunkCoord>,
    pub voxel_size: f32,
    pub wait: Duration,
    pub defer_delay: Duration,
    pub overflow_evict: usize,
    pub counters: Arc<BackgroundCounters>,
}

impl Background {
    pub fn run(self) {
        while self.running.load(Ordering::Acquire) {
            let coord = match self.to_render_rx.recv_timeout(self.wait) {
                Ok(coord) => coord,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            match self.client.is_generated(coord) {
                Ok(true) => {}
                Ok(false) => {
                    self.defer(coord);
                    continue;
                }
                Err(e) => {
                    if self.client_error("is_generated", coord, e) {
                        break;
                    }
                    continue;
                }
            }
            let chunk = match self.client.get_chunk(coord) {
                Ok(chunk) => chunk,
                Err(e) => {
                    if self.client_error("get_chunk", coord, e) {
                        break;
                    }
                    continue;
                }
            };
            let records = chunk_payload(coord, &chunk, self.voxel_size);
            self.counters.computed.fetch_add(1, Ordering::Relaxed);
            log::debug!(target: "render", "computed {} records for {}", records.len(), coord);
            self.publish(FinishedChunk { coord, records });
        }
        log::debug!(target: "render", "background stage exiting");
    }

    /// Reverts the request; returns true when the stage must stop because
    /// the service is gone or speaks a different protocol.
    fn client_error(&self, op: &str, coord: ChunkCoord, err: ClientError) -> bool {
        self.revert(coord);
        if let ClientError::Disconnected = err {
            log::warn!(target: "render", "background stage lost the chunk service");
            true
        } else if err.is_protocol_violation() {
            log::error!(target: "render", "{} {} broke the protocol: {}, stopping", op, coord, err);
            true
        } else {
            log::warn!(target: "render", "{} {} failed: {}", op, coord, err);
            false
        }
    }

    /// Not generated yet: put it back behind whatever else is queued.
    fn defer(&self, coord: ChunkCoord) {
        self.counters.deferred.fetch_add(1, Ordering::Relaxed);
        if !self.defer_delay.is_zero() {
            thread::sleep(self.defer_delay);
        }
        if self.to_render_tx.try_send(coord).is_err() {
            log::debug!(target: "render", "to-render queue full, dropping deferred {}", coord);
            self.revert(coord);
        }
    }

    pub(crate) fn publish(&self, finished: FinishedChunk) {
        let finished = match self.finished_tx.try_send(finished) {
            Ok(()) => return,
            Err(TrySendError::Disconnected(_)) => return,
            Err(TrySendError::Full(finished)) => finished,
        };
        let mut dropped = Vec::new();
        for _ in 0..self.overflow_evict.max(1) {
            match self.finished_rx.try_recv() {
                Ok(old) => dropped.push(old.coord),
                Err(_) => break,
            }
        }
        log::warn!(
            target: "render",
            "finished queue full, evicted {} oldest chunks",
            dropped.len()
        );
        self.counters
            .evicted
            .fetch_add(dropped.len(), Ordering::Relaxed);
        for coord in dropped {
            self.revert(coord);
        }
        if let Err(e) = self.finished_tx.try_send(finished) {
            self.revert(e.into_inner().coord);
        }
    }

    /// Tell the foreground to forget it ever asked for `coord`.
    fn revert(&self, coord: ChunkCoord) {
        let _ = self.evicted_tx.send(coord);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};
    use quarry_blocks::Block;
    use quarry_service::{ChunkService, RequestKind};
    use quarry_service::DataKey;
    use quarry_world::Config;

    use crate::render::geometry::voxel_draw;

    type Stage = (ChunkService, ServiceClient, Background, Receiver<ChunkCoord>);

    fn stage(finished_capacity: usize, overflow_evict: usize) -> Stage {
        let mut cfg = Config::default();
        cfg.service.connection_wait_ms = 20;
        let (svc, main) = ChunkService::spawn(&cfg).unwrap();
        let (to_render_tx, to_render_rx) = bounded(4);
        let (finished_tx, finished_rx) = bounded(finished_capacity);
        let (evicted_tx, evicted_rx) = unbounded();
        let bg = Background {
            client: main.new_client(None).unwrap(),
            running: Arc::new(AtomicBool::new(true)),
            to_render_tx,
            to_render_rx,
            finished_tx,
            finished_rx,
            evicted_tx,
            voxel_size: 1.0,
            wait: Duration::from_millis(20),
            defer_delay: Duration::ZERO,
            overflow_evict,
            counters: Arc::new(BackgroundCounters::default()),
        };
        (svc, main, bg, evicted_rx)
    }

    fn finished(cx: i32) -> FinishedChunk {
        FinishedChunk {
            coord: ChunkCoord::new(cx, 0),
            records: vec![voxel_draw((cx, 0, 0), Block::GRASS, 1.0).unwrap()],
        }
    }

    #[test]
    fn full_finished_queue_evicts_the_oldest() {
        let (_svc, _main, bg, evicted_rx) = stage(2, 1);
        for cx in 0..3 {
            bg.publish(finished(cx));
        }
        let queued: Vec<i32> = bg.finished_rx.try_iter().map(|f| f.coord.cx).collect();
        assert_eq!(queued, vec![1, 2]);
        let evicted: Vec<ChunkCoord> = evicted_rx.try_iter().collect();
        assert_eq!(evicted, vec![ChunkCoord::new(0, 0)]);
        assert_eq!(bg.counters.evicted.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn protocol_violation_stops_the_stage_and_reverts() {
        let (_svc, _main, bg, evicted_rx) = stage(2, 1);
        let coord = ChunkCoord::new(5, 5);
        let malformed = ClientError::Malformed {
            request: RequestKind::GetChunk,
            expected: DataKey::ChunkData,
        };
        assert!(bg.client_error("get_chunk", coord, malformed));
        let failed = ClientError::Rejected {
            request: RequestKind::GetChunk,
            kind: RequestKind::Failed,
            context: None,
        };
        assert!(!bg.client_error("get_chunk", coord, failed));
        assert_eq!(evicted_rx.try_iter().count(), 2);
    }
}
