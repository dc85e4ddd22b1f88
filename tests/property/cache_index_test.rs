// tests/property/cache_index_test.rs

//! Property-based tests for the LRU index
//! Compares the index against a plain recency list after every operation

use cacheproxy::core::cache::CacheIndex;
use proptest::prelude::*;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Op {
    Put(u8),
    Touch(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8).prop_map(Op::Put),
        (0u8..8).prop_map(Op::Touch),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_index_matches_recency_model(
        capacity in 1usize..6,
        ops in prop::collection::vec(op_strategy(), 1..100)
    ) {
        let mut index = CacheIndex::new(NonZeroUsize::new(capacity).unwrap(), Duration::from_secs(60));
        // Least recently used first.
        let mut model: Vec<String> = Vec::new();
        let now = Instant::now();

        for op in ops {
            match op {
                Op::Put(i) => {
                    let path = format!("/p{i}");
                    let evicted = index.put(&path, &path[1..], now);

                    let existed = model.iter().position(|p| *p == path);
                    if let Some(pos) = existed {
                        model.remove(pos);
                    }
                    model.push(path.clone());
                    let expected_evicted = (model.len() > capacity).then(|| model.remove(0));

                    prop_assert_eq!(evicted.map(|e| e.path), expected_evicted);
                }
                Op::Touch(i) => {
                    let path = format!("/p{i}");
                    index.touch(&path);
                    if let Some(pos) = model.iter().position(|p| *p == path) {
                        let p = model.remove(pos);
                        model.push(p);
                    }
                }
            }

            prop_assert!(index.len() <= capacity);
            prop_assert_eq!(index.paths_lru_order(), model.clone());
        }
    }

    #[test]
    fn test_freshness_boundary(ttl_ms in 1u64..10_000, age_ms in 0u64..20_000) {
        let ttl = Duration::from_millis(ttl_ms);
        let mut index = CacheIndex::new(NonZeroUsize::new(1).unwrap(), ttl);
        let fetched = Instant::now();
        index.put("/a", "a", fetched);

        let lookup = index.lookup("/a", fetched + Duration::from_millis(age_ms));
        let fresh = matches!(lookup, cacheproxy::core::cache::Lookup::Fresh(_));
        prop_assert_eq!(fresh, age_ms < ttl_ms);
    }
}
