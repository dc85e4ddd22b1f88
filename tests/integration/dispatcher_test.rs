// tests/integration/dispatcher_test.rs

//! Integration tests for request dispatch
//! Tests: fresh hits, misses, expiry, non-200 pass-through, forwarding, origin failures

use super::fixtures::{COLLIDING_KEY, COLLIDING_SLASHED, COLLIDING_UNDERSCORED, PATH_A, PATH_B};
use super::test_helpers::{
    ScriptedOrigin, TestContext, ok_response, status_response, test_config,
};
use bytes::Bytes;
use cacheproxy::core::ProxyError;
use std::sync::atomic::Ordering;
use tokio::time::{Duration, sleep};

// ===== GET caching =====

#[tokio::test]
async fn test_miss_then_fresh_hit_skips_origin() {
    let ctx = TestContext::new().await;

    let first = ctx.get(PATH_A).await;
    assert_eq!(first, ok_response("GET /a"));
    assert_eq!(ctx.origin.call_count(), 1);

    let second = ctx.get(PATH_A).await;
    assert_eq!(second, first, "A fresh hit must return the stored bytes");
    assert_eq!(ctx.origin.call_count(), 1, "A fresh hit must not contact the origin");

    assert_eq!(ctx.state.cache.hits.load(Ordering::Relaxed), 1);
    assert_eq!(ctx.state.cache.misses.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_response_is_stored_under_its_storage_key() {
    let ctx = TestContext::new().await;

    let response = ctx.get("/x/y/").await;
    let stored = std::fs::read(ctx.blob_path("x_y")).unwrap();
    assert_eq!(Bytes::from(stored), response);
    assert!(ctx.state.cache.contains("/x/y/"));
}

#[tokio::test]
async fn test_root_path_is_stored_as_index_html() {
    let ctx = TestContext::new().await;

    let response = ctx.get("/").await;
    let stored = std::fs::read(ctx.blob_path("index.html")).unwrap();
    assert_eq!(Bytes::from(stored), response);
}

#[tokio::test]
async fn test_stale_entry_is_refetched() {
    let ctx = TestContext::with_cache(10, 1).await;

    ctx.get(PATH_A).await;
    sleep(Duration::from_millis(1100)).await;
    let response = ctx.get(PATH_A).await;

    assert_eq!(response, ok_response("GET /a"));
    assert_eq!(ctx.origin.calls_for(PATH_A), 2);
    assert_eq!(ctx.state.cache.stale_hits.load(Ordering::Relaxed), 1);

    // The refetch restarted the clock, so the next request is a hit again.
    ctx.get(PATH_A).await;
    assert_eq!(ctx.origin.calls_for(PATH_A), 2);
}

#[tokio::test]
async fn test_zero_ttl_always_refetches() {
    let ctx = TestContext::with_cache(10, 0).await;

    for _ in 0..3 {
        assert_eq!(ctx.get(PATH_A).await, ok_response("GET /a"));
    }
    assert_eq!(ctx.origin.calls_for(PATH_A), 3);
    assert_eq!(ctx.state.cache.hits.load(Ordering::Relaxed), 0);
    assert_eq!(ctx.state.cache.len(), 1);
}

#[tokio::test]
async fn test_unreadable_blob_is_refetched() {
    let ctx = TestContext::new().await;

    ctx.get(PATH_A).await;
    std::fs::remove_file(ctx.blob_path("a")).unwrap();

    let response = ctx.get(PATH_A).await;
    assert_eq!(response, ok_response("GET /a"));
    assert_eq!(ctx.origin.calls_for(PATH_A), 2);
    assert!(ctx.blob_path("a").exists(), "The refetch must rewrite the blob");
}

#[tokio::test]
async fn test_colliding_paths_share_a_blob_last_writer_wins() {
    let ctx = TestContext::new().await;

    ctx.get(COLLIDING_SLASHED).await;
    let newer = ctx.get(COLLIDING_UNDERSCORED).await;

    let stored = std::fs::read(ctx.blob_path(COLLIDING_KEY)).unwrap();
    assert_eq!(Bytes::from(stored), newer);

    // The older path is still fresh in the index and is served the shared blob.
    assert_eq!(ctx.get(COLLIDING_SLASHED).await, newer);
    assert_eq!(ctx.origin.call_count(), 2);
}

#[tokio::test]
async fn test_concurrent_misses_for_one_path_fetch_once() {
    let origin = ScriptedOrigin::serving_ok().with_delay(Duration::from_millis(50));
    let ctx = TestContext::with_origin(test_config(), origin).await;

    let (first, second) = tokio::join!(ctx.get(PATH_A), ctx.get(PATH_A));

    assert_eq!(first, ok_response("GET /a"));
    assert_eq!(second, first);
    assert_eq!(ctx.origin.calls_for(PATH_A), 1);
}

#[tokio::test]
async fn test_distinct_paths_do_not_block_each_other() {
    let origin = ScriptedOrigin::serving_ok().with_delay(Duration::from_millis(50));
    let ctx = TestContext::with_origin(test_config(), origin).await;

    let (a, b) = tokio::join!(ctx.get(PATH_A), ctx.get(PATH_B));

    assert_eq!(a, ok_response("GET /a"));
    assert_eq!(b, ok_response("GET /b"));
    assert_eq!(ctx.state.cache.len(), 2);
}

// ===== Non-cacheable responses =====

#[tokio::test]
async fn test_non_200_is_passed_through_and_not_cached() {
    let not_found = status_response(404, "Not Found", "missing");
    let ctx = TestContext::with_origin(test_config(), ScriptedOrigin::serving(not_found.clone())).await;

    assert_eq!(ctx.get(PATH_A).await, not_found);
    assert_eq!(ctx.get(PATH_A).await, not_found);

    assert_eq!(ctx.origin.call_count(), 2);
    assert!(ctx.state.cache.is_empty());
    assert!(ctx.blob_files().is_empty());
}

#[tokio::test]
async fn test_200_with_other_reason_phrase_is_cached() {
    let response = status_response(200, "Fine", "body");
    let ctx = TestContext::with_origin(test_config(), ScriptedOrigin::serving(response.clone())).await;

    ctx.get(PATH_A).await;
    assert_eq!(ctx.get(PATH_A).await, response);
    assert_eq!(ctx.origin.call_count(), 1);
}

#[tokio::test]
async fn test_status_only_in_body_is_not_cached() {
    let response = status_response(500, "Internal Server Error", "HTTP/1.1 200 OK");
    let ctx = TestContext::with_origin(test_config(), ScriptedOrigin::serving(response.clone())).await;

    assert_eq!(ctx.get(PATH_A).await, response);
    assert!(ctx.state.cache.is_empty());
}

#[tokio::test]
async fn test_unparseable_status_line_is_relayed_uncached() {
    let garbage = Bytes::from_static(b"garbage without a status line");
    let ctx = TestContext::with_origin(test_config(), ScriptedOrigin::serving(garbage.clone())).await;

    assert_eq!(ctx.get(PATH_A).await, garbage);
    assert!(ctx.state.cache.is_empty());
}

#[tokio::test]
async fn test_empty_origin_response_is_not_cached() {
    let ctx = TestContext::with_origin(test_config(), ScriptedOrigin::serving(Bytes::new())).await;

    assert!(ctx.get(PATH_A).await.is_empty());
    assert!(ctx.state.cache.is_empty());
}

// ===== Forwarding =====

#[tokio::test]
async fn test_post_is_forwarded_with_body_and_not_cached() {
    let ctx = TestContext::new().await;

    let response = ctx.request("POST", "/submit", b"payload").await;
    assert_eq!(response, ok_response("POST /submit"));

    let calls = ctx.origin.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "POST");
    assert_eq!(calls[0].body.as_deref(), Some(&b"payload"[..]));

    assert!(ctx.state.cache.is_empty());
    assert_eq!(ctx.state.stats.get_forwarded_requests(), 1);
}

#[tokio::test]
async fn test_forward_without_body_sends_none() {
    let ctx = TestContext::new().await;

    ctx.request("DELETE", PATH_A, b"").await;
    assert_eq!(ctx.origin.calls()[0].body, None);
}

#[tokio::test]
async fn test_forwarded_methods_ignore_cached_entries() {
    let ctx = TestContext::new().await;

    ctx.get(PATH_A).await;
    let response = ctx.request("HEAD", PATH_A, b"").await;

    assert_eq!(response, ok_response("HEAD /a"));
    assert_eq!(ctx.origin.calls_for(PATH_A), 2);
    // The cached GET entry is untouched.
    assert_eq!(ctx.get(PATH_A).await, ok_response("GET /a"));
    assert_eq!(ctx.origin.calls_for(PATH_A), 2);
}

#[tokio::test]
async fn test_lowercase_get_is_forwarded_not_cached() {
    let ctx = TestContext::new().await;

    ctx.request("get", PATH_A, b"").await;
    ctx.request("get", PATH_A, b"").await;

    assert_eq!(ctx.origin.calls_for(PATH_A), 2);
    assert!(ctx.state.cache.is_empty());
}

// ===== Origin failures =====

#[tokio::test]
async fn test_origin_failure_yields_empty_response_then_recovers() {
    let ctx = TestContext::new().await;

    ctx.origin.set_available(false);
    assert!(ctx.get(PATH_A).await.is_empty());
    assert!(ctx.state.cache.is_empty());
    assert_eq!(ctx.state.stats.get_origin_failures(), 1);

    ctx.origin.set_available(true);
    assert_eq!(ctx.get(PATH_A).await, ok_response("GET /a"));
    assert!(ctx.state.cache.contains(PATH_A));

    ctx.get(PATH_A).await;
    assert_eq!(ctx.origin.calls_for(PATH_A), 2);
}

#[tokio::test]
async fn test_forward_failure_yields_empty_response() {
    let ctx = TestContext::new().await;

    ctx.origin.set_available(false);
    assert!(ctx.request("PUT", PATH_B, b"x").await.is_empty());
    assert_eq!(ctx.state.stats.get_origin_failures(), 1);
}

#[tokio::test]
async fn test_origin_failure_keeps_stale_entry() {
    let ctx = TestContext::with_cache(10, 0).await;

    ctx.get(PATH_A).await;
    ctx.origin.set_available(false);
    assert!(ctx.get(PATH_A).await.is_empty());
    assert!(ctx.state.cache.contains(PATH_A));
    assert!(ctx.blob_path("a").exists());
}

#[tokio::test]
async fn test_origin_timeout_counts_as_origin_failure() {
    let origin = ScriptedOrigin::serving_ok().with_failure(ProxyError::OriginTimeout);
    let ctx = TestContext::with_origin(test_config(), origin).await;

    assert!(ctx.get(PATH_A).await.is_empty());
    assert_eq!(ctx.state.stats.get_origin_failures(), 1);
}

#[tokio::test]
async fn test_local_error_is_not_counted_as_origin_failure() {
    let origin =
        ScriptedOrigin::serving_ok().with_failure(ProxyError::Internal("no buffer".to_string()));
    let ctx = TestContext::with_origin(test_config(), origin).await;

    assert!(ctx.get(PATH_A).await.is_empty());
    assert!(ctx.request("POST", PATH_B, b"x").await.is_empty());
    assert!(ctx.state.cache.is_empty());
    assert_eq!(ctx.state.stats.get_origin_failures(), 0);
}

// ===== Blob write failures =====

#[tokio::test]
async fn test_write_failure_still_serves_response() {
    let ctx = TestContext::new().await;
    std::fs::remove_dir_all(ctx.cache_dir()).unwrap();

    let response = ctx.get(PATH_A).await;
    assert_eq!(response, ok_response("GET /a"));
    assert!(ctx.state.cache.is_empty(), "No entry may point at an unwritten blob");
    assert_eq!(ctx.state.cache.write_failures.load(Ordering::Relaxed), 1);

    ctx.get(PATH_A).await;
    assert_eq!(ctx.origin.calls_for(PATH_A), 2);
}

#[tokio::test]
async fn test_request_counters() {
    let ctx = TestContext::new().await;

    ctx.get(PATH_A).await;
    ctx.get(PATH_A).await;
    ctx.request("POST", PATH_B, b"").await;

    assert_eq!(ctx.state.stats.get_total_requests(), 3);
    assert_eq!(ctx.state.stats.get_forwarded_requests(), 1);
}
