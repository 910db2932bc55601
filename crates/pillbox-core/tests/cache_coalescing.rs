//! Concurrent lookups share one fetch.

use pillbox_core::cache::EntryState;
use pillbox_core::{CacheError, CacheKind, FetchError, ResourceCache};
use pillbox_test_utils::MemoryFetcher;
use pretty_assertions::assert_eq;
use serde_json::json;

const URL: &str = "http://assets.test/pillbox/tags?query=sky&limit=5";

#[test_log::test(tokio::test)]
async fn test_concurrent_gets_share_one_request() {
    let fetcher = MemoryFetcher::gated();
    fetcher.route_json(URL, json!([{"name": "blue_sky"}]));
    let cache = ResourceCache::new(fetcher.clone().into_shared());

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(CacheKind::Json, URL).await })
        })
        .collect();
    while cache.state(CacheKind::Json, URL) != EntryState::Pending {
        tokio::task::yield_now().await;
    }
    fetcher.release(1);

    for waiter in waiters {
        let value = waiter.await.unwrap().unwrap();
        assert_eq!(value.as_json().unwrap()[0]["name"], "blue_sky");
    }
    assert_eq!(fetcher.calls(URL), 1);
    assert_eq!(cache.state(CacheKind::Json, URL), EntryState::Resolved);
}

#[test_log::test(tokio::test)]
async fn test_failure_is_shared_then_retried() {
    let fetcher = MemoryFetcher::new();
    fetcher.route_error(URL, FetchError::Network("connection reset".to_string()));
    let cache = ResourceCache::new(fetcher.clone().into_shared());

    let err = cache.get(CacheKind::Json, URL).await.unwrap_err();
    assert!(matches!(err, CacheError::Fetch(FetchError::Network(_))));
    assert_eq!(cache.state(CacheKind::Json, URL), EntryState::Absent);

    fetcher.route_json(URL, json!([]));
    assert!(cache.get(CacheKind::Json, URL).await.is_ok());
    assert_eq!(fetcher.calls(URL), 2);
}

#[test_log::test(tokio::test)]
async fn test_missing_is_remembered_until_invalidated() {
    let fetcher = MemoryFetcher::new();
    let cache = ResourceCache::new(fetcher.clone().into_shared());

    for _ in 0..2 {
        let err = cache.get(CacheKind::Json, URL).await.unwrap_err();
        assert!(err.is_missing());
    }
    assert_eq!(fetcher.calls(URL), 1);

    fetcher.route_json(URL, json!(["late"]));
    cache.invalidate(URL);
    assert!(cache.get(CacheKind::Json, URL).await.is_ok());
    assert_eq!(fetcher.calls(URL), 2);
}
