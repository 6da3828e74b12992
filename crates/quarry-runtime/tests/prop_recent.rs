use std::time::{Duration, Instant};

use proptest::prelude::*;
use quarry_runtime::RecentlyRequested;
use quarry_world::ChunkCoord;

proptest! {
    // A claim succeeds exactly when the last successful claim of that
    // coordinate is at least one TTL old.
    #[test]
    fn claims_follow_the_ttl(
        steps in prop::collection::vec((0i32..4, 0u64..40), 1..64),
        ttl_ms in 1u64..50,
    ) {
        let ttl = Duration::from_millis(ttl_ms);
        let mut cache = RecentlyRequested::new(ttl, Duration::from_millis(5), 2);
        let t0 = Instant::now();
        let mut now = t0;
        let mut last: [Option<Instant>; 4] = [None; 4];
        for (cx, advance) in steps {
            now += Duration::from_millis(advance);
            let expected = last[cx as usize].is_none_or(|t| now - t >= ttl);
            let claimed = cache.try_claim_at(ChunkCoord::new(cx, 0), now);
            prop_assert_eq!(claimed, expected);
            if claimed {
                last[cx as usize] = Some(now);
            }
        }
    }
}
