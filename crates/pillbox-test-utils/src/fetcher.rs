//! In-memory [`Fetcher`] for cache and api tests.
//!
//! Routes map exact URLs to canned bodies. Unrouted URLs answer
//! [`FetchError::NotFound`]. Every call is counted, and a gated fetcher
//! parks each GET until the test releases it, which makes request
//! coalescing observable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pillbox_core::BoxFuture;
use pillbox_core::{FetchError, Fetcher};
use tokio::sync::Semaphore;

/// A recorded POST.
#[derive(Debug, Clone, PartialEq)]
pub struct Posted {
    pub url: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

impl Posted {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("posted body is not json")
    }
}

#[derive(Default)]
struct State {
    routes: HashMap<String, Result<Vec<u8>, FetchError>>,
    calls: HashMap<String, usize>,
    posts: Vec<Posted>,
}

#[derive(Clone, Default)]
pub struct MemoryFetcher {
    state: Arc<Mutex<State>>,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fetcher whose GETs wait for [`release`](Self::release).
    pub fn gated() -> Self {
        Self {
            state: Arc::default(),
            gate: Some(Arc::new(Semaphore::new(0))),
        }
    }

    /// Let `n` parked or future GETs through.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn route(&self, url: &str, body: impl Into<Vec<u8>>) -> &Self {
        self.set(url, Ok(body.into()))
    }

    pub fn route_json(&self, url: &str, value: serde_json::Value) -> &Self {
        self.route(url, value.to_string())
    }

    pub fn route_error(&self, url: &str, err: FetchError) -> &Self {
        self.set(url, Err(err))
    }

    fn set(&self, url: &str, outcome: Result<Vec<u8>, FetchError>) -> &Self {
        self.state
            .lock()
            .expect("fetcher state poisoned")
            .routes
            .insert(url.to_string(), outcome);
        self
    }

    /// Number of GETs issued for `url`.
    pub fn calls(&self, url: &str) -> usize {
        let state = self.state.lock().expect("fetcher state poisoned");
        state.calls.get(url).copied().unwrap_or(0)
    }

    /// Number of GETs issued for any url.
    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().expect("fetcher state poisoned");
        state.calls.values().sum()
    }

    pub fn posts(&self) -> Vec<Posted> {
        self.state
            .lock()
            .expect("fetcher state poisoned")
            .posts
            .clone()
    }

    pub fn into_shared(self) -> Arc<dyn Fetcher> {
        Arc::new(self)
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock().expect("fetcher state poisoned");
                *state.calls.entry(url.to_string()).or_default() += 1;
            }
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|e| FetchError::Network(e.to_string()))?
                    .forget();
            }
            let state = self.state.lock().expect("fetcher state poisoned");
            state
                .routes
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::NotFound))
        })
    }

    fn post<'a>(
        &'a self,
        url: &'a str,
        body: Vec<u8>,
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            let mut state = self.state.lock().expect("fetcher state poisoned");
            state.posts.push(Posted {
                url: url.to_string(),
                body: body.clone(),
                content_type: content_type.to_string(),
            });
            state.routes.insert(url.to_string(), Ok(body));
            Ok(Vec::new())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_and_counts() {
        let fetcher = MemoryFetcher::new();
        fetcher.route("http://x/a", "hello");

        assert_eq!(fetcher.fetch("http://x/a").await.unwrap(), b"hello");
        assert_eq!(fetcher.fetch("http://x/b").await, Err(FetchError::NotFound));
        assert_eq!(fetcher.calls("http://x/a"), 1);
        assert_eq!(fetcher.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_post_becomes_readable() {
        let fetcher = MemoryFetcher::new();
        fetcher
            .post("http://x/g.json", b"[]".to_vec(), "application/json")
            .await
            .unwrap();
        assert_eq!(fetcher.fetch("http://x/g.json").await.unwrap(), b"[]");
        assert_eq!(fetcher.posts()[0].content_type, "application/json");
    }

    #[tokio::test]
    async fn test_gate_parks_until_released() {
        let fetcher = MemoryFetcher::gated();
        fetcher.route("http://x/a", "ok");

        let parked = tokio::spawn({
            let fetcher = fetcher.clone();
            async move { fetcher.fetch("http://x/a").await }
        });
        tokio::task::yield_now().await;
        assert!(!parked.is_finished());

        fetcher.release(1);
        assert_eq!(parked.await.unwrap().unwrap(), b"ok");
    }
}
