// tests/property/dispatcher_test.rs

//! Property-based tests for cache consistency under arbitrary request sequences

use crate::test_helpers::TestContext;
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 30, // Each case builds a proxy state and touches the disk
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_index_and_blobs_stay_consistent(
        capacity in 1usize..5,
        paths in prop::collection::vec(prop::sample::select(vec!["/a", "/b", "/c", "/d", "/e", "/f"]), 1..40)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::with_cache(capacity, 60).await;
            let mut seen = HashSet::new();

            for path in &paths {
                let response = ctx.get(path).await;
                assert!(!response.is_empty(), "GET {path} returned nothing");
                seen.insert(*path);

                let cached = ctx.state.cache.paths_lru_order();
                assert!(cached.len() <= capacity);
                assert_eq!(cached.last().map(String::as_str), Some(*path));

                // Every live entry has its blob, and evicted blobs are gone.
                let mut expected_files: Vec<String> =
                    cached.iter().map(|p| p.trim_start_matches('/').to_string()).collect();
                expected_files.sort();
                assert_eq!(ctx.blob_files(), expected_files);
            }

            // With a long TTL the origin sees each path once per residency, so
            // at least once per distinct path and never more than once per request.
            let calls = ctx.origin.call_count();
            assert!(calls >= seen.len());
            assert!(calls <= paths.len());
        });
    }
}
