use std::time::{Duration, Instant};

use hashbrown::HashMap;
use quarry_world::ChunkCoord;

#[derive(Clone, Copy, Debug, Default)]
pub struct RecentCacheStats {
    pub hits: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub forced_sweeps: u64,
    pub entries: usize,
}

/// Coordinate -> last request time, used to suppress duplicate work.
///
/// Entries older than `ttl` count as absent. Stale entries are swept once per
/// `gc_interval`, or immediately when the map grows past `max_entries`.
pub struct RecentlyRequested {
    entries: HashMap<ChunkCoord, Instant>,
    ttl: Duration,
    gc_interval: Duration,
    max_entries: usize,
    last_sweep: Instant,
    stats: RecentCacheStats,
}

impl RecentlyRequested {
    pub fn new(ttl: Duration, gc_interval: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            gc_interval,
            max_entries,
            last_sweep: Instant::now(),
            stats: RecentCacheStats::default(),
        }
    }

    pub fn contains_at(&self, coord: ChunkCoord, now: Instant) -> bool {
        self.entries
            .get(&coord)
            .is_some_and(|t| now.saturating_duration_since(*t) < self.ttl)
    }

    pub fn insert_at(&mut self, coord: ChunkCoord, now: Instant) {
        self.entries.insert(coord, now);
        self.stats.inserts += 1;
    }

    pub fn remove(&mut self, coord: ChunkCoord) -> bool {
        self.entries.remove(&coord).is_some()
    }

    /// Drop every entry older than the TTL; returns how many were removed.
    pub fn sweep_at(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, t| now.saturating_duration_since(*t) < ttl);
        self.last_sweep = now;
        let removed = before - self.entries.len();
        self.stats.evictions += removed as u64;
        removed
    }

    /// Periodic sweep, plus an out-of-band one when over capacity.
    pub fn maintain_at(&mut self, now: Instant) {
        if self.entries.len() > self.max_entries {
            self.stats.forced_sweeps += 1;
            log::warn!(
                "recently-requested cache holds {} entries (max {}), sweeping early",
                self.entries.len(),
                self.max_entries
            );
            self.sweep_at(now);
        } else if now.saturating_duration_since(self.last_sweep) >= self.gc_interval {
            self.sweep_at(now);
        }
    }

    /// Record `coord` unless it was requested within the TTL. Returns true
    /// when the caller should go ahead with the work.
    pub fn try_claim_at(&mut self, coord: ChunkCoord, now: Instant) -> bool {
        self.maintain_at(now);
        if self.contains_at(coord, now) {
            self.stats.hits += 1;
            return false;
        }
        self.insert_at(coord, now);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> RecentCacheStats {
        RecentCacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(10);
    const GC: Duration = Duration::from_secs(1);

    #[test]
    fn claims_are_suppressed_within_ttl() {
        let t0 = Instant::now();
        let mut cache = RecentlyRequested::new(TTL, GC, 16);
        let c = ChunkCoord::new(5, 5);
        assert!(cache.try_claim_at(c, t0));
        assert!(!cache.try_claim_at(c, t0 + Duration::from_secs(9)));
        assert!(cache.try_claim_at(c, t0 + TTL));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn periodic_sweep_waits_for_interval() {
        let t0 = Instant::now();
        let mut cache = RecentlyRequested::new(Duration::from_millis(100), GC, 16);
        cache.insert_at(ChunkCoord::new(0, 0), t0);
        cache.maintain_at(t0 + Duration::from_millis(500));
        // stale, but the interval has not elapsed since construction
        assert_eq!(cache.len(), 1);
        cache.maintain_at(t0 + Duration::from_secs(5));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn overflow_forces_an_immediate_sweep() {
        let t0 = Instant::now();
        let mut cache = RecentlyRequested::new(Duration::from_millis(50), Duration::from_secs(3600), 4);
        for i in 0..5 {
            cache.insert_at(ChunkCoord::new(i, 0), t0);
        }
        let later = t0 + Duration::from_millis(60);
        assert!(cache.try_claim_at(ChunkCoord::new(99, 0), later));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().forced_sweeps, 1);
    }

    #[test]
    fn removal_reopens_a_coordinate() {
        let t0 = Instant::now();
        let mut cache = RecentlyRequested::new(TTL, GC, 16);
        let c = ChunkCoord::new(-1, 2);
        assert!(cache.try_claim_at(c, t0));
        assert!(cache.remove(c));
        assert!(cache.try_claim_at(c, t0));
    }
}
