//! Process-wide memoized fetch-and-decode layer.
//!
//! Entries are keyed by `(kind, url)` and move through
//!
//! ```text
//! absent ──get──▶ pending ──ok──────▶ resolved(value)
//!                    │ ──404─────▶ missing (sticky until invalidated)
//!                    └──error────▶ absent  (next get retries)
//! ```
//!
//! Concurrent `get`s for a pending key share the single in-flight fetch.
//! The fetch runs on its own task, so a caller that stops waiting (e.g. a
//! popup that closed) does not cancel it for everyone else.

mod bitmap;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::BoxFuture;

pub use bitmap::{DecodedImage, ImageFormat};

#[cfg(test)]
pub(crate) use bitmap::{decode as decode_image, fixtures};

/// How a cached resource is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Parsed JSON document.
    Json,
    /// Raw downloaded bytes.
    Binary,
    /// Image decoded for display; reuses `Binary` bytes for the same url.
    Image,
}

impl CacheKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheKind::Json => "json",
            CacheKind::Binary => "binary",
            CacheKind::Image => "image",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(CacheKind::Json),
            "binary" => Ok(CacheKind::Binary),
            "image" => Ok(CacheKind::Image),
            other => Err(CacheError::UnsupportedKind(other.to_string())),
        }
    }
}

/// A decoded cache value. Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Json(Arc<serde_json::Value>),
    Binary(Arc<Vec<u8>>),
    Image(Arc<DecodedImage>),
}

impl CacheValue {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            CacheValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Arc<Vec<u8>>> {
        match self {
            CacheValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&Arc<DecodedImage>> {
        match self {
            CacheValue::Image(i) => Some(i),
            _ => None,
        }
    }
}

/// Failure reported by a [`Fetcher`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("not found")]
    NotFound,

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),
}

/// Errors surfaced by [`ResourceCache`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("resource confirmed missing: {0}")]
    Missing(String),

    #[error("fetch failed: {0}")]
    Fetch(FetchError),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("unsupported cache kind: {0}")]
    UnsupportedKind(String),

    #[error("fetch abandoned before completion")]
    Abandoned,
}

impl CacheError {
    pub fn is_missing(&self) -> bool {
        matches!(self, CacheError::Missing(_))
    }
}

/// Transport used by the cache to download resources.
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the body.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>>;

    /// POST `body` to `url` and return the response body.
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: Vec<u8>,
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, FetchError>>;
}

/// Observable state of one cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    Pending,
    Resolved,
    Missing,
}

type Outcome = Result<CacheValue, CacheError>;
type Waiters = Arc<Mutex<Vec<oneshot::Sender<Outcome>>>>;
type Key = (CacheKind, String);

enum Entry {
    Pending(Waiters),
    Resolved(CacheValue),
    Missing,
}

struct Inner {
    fetcher: Arc<dyn Fetcher>,
    entries: Mutex<HashMap<Key, Entry>>,
}

/// Shared, memoizing resource cache.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<Inner>,
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("entries", &self.len())
            .finish()
    }
}

enum Step {
    Ready(Outcome),
    Wait(oneshot::Receiver<Outcome>),
}

fn deliver(waiters: &Waiters, outcome: &Outcome) {
    let drained: Vec<_> = waiters
        .lock()
        .map(|mut w| w.drain(..).collect())
        .unwrap_or_default();
    for tx in drained {
        let _ = tx.send(outcome.clone());
    }
}

impl ResourceCache {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The transport behind this cache, for uncached requests.
    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.inner.fetcher
    }

    /// Look up `url` as `kind`, fetching and decoding it on first use.
    ///
    /// A key that previously returned 404 yields [`CacheError::Missing`]
    /// without touching the network until [`invalidate`](Self::invalidate)
    /// is called for its url.
    pub async fn get(&self, kind: CacheKind, url: &str) -> Result<CacheValue, CacheError> {
        let key: Key = (kind, url.to_string());
        let step = {
            let mut entries = self
                .inner
                .entries
                .lock()
                .map_err(|_| CacheError::Abandoned)?;
            match entries.get(&key) {
                Some(Entry::Resolved(value)) => Step::Ready(Ok(value.clone())),
                Some(Entry::Missing) => Step::Ready(Err(CacheError::Missing(url.to_string()))),
                Some(Entry::Pending(waiters)) => {
                    let (tx, rx) = oneshot::channel();
                    if let Ok(mut w) = waiters.lock() {
                        w.push(tx);
                    }
                    Step::Wait(rx)
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    let waiters: Waiters = Arc::new(Mutex::new(vec![tx]));
                    entries.insert(key.clone(), Entry::Pending(Arc::clone(&waiters)));
                    self.spawn_load(key, waiters);
                    Step::Wait(rx)
                }
            }
        };

        match step {
            Step::Ready(outcome) => outcome,
            Step::Wait(rx) => rx.await.unwrap_or(Err(CacheError::Abandoned)),
        }
    }

    fn spawn_load(&self, key: Key, waiters: Waiters) {
        let cache = self.clone();
        tokio::spawn(async move {
            let (kind, url) = &key;
            debug!(%kind, %url, "cache fetch");
            let outcome = cache.load(*kind, url).await;
            cache.settle(&key, &waiters, &outcome);
            deliver(&waiters, &outcome);
        });
    }

    async fn load(&self, kind: CacheKind, url: &str) -> Outcome {
        match kind {
            CacheKind::Json => {
                let body = self.download(url).await?;
                serde_json::from_slice::<serde_json::Value>(&body)
                    .map(|v| CacheValue::Json(Arc::new(v)))
                    .map_err(|e| CacheError::Decode(e.to_string()))
            }
            CacheKind::Binary => {
                let body = self.download(url).await?;
                Ok(CacheValue::Binary(Arc::new(body)))
            }
            CacheKind::Image => {
                let bytes = match self.resolved(CacheKind::Binary, url) {
                    Some(CacheValue::Binary(bytes)) => {
                        debug!(%url, "decoding image from cached bytes");
                        bytes
                    }
                    _ => Arc::new(self.download(url).await?),
                };
                bitmap::decode(bytes)
                    .map(|img| CacheValue::Image(Arc::new(img)))
                    .map_err(CacheError::Decode)
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, CacheError> {
        self.inner.fetcher.fetch(url).await.map_err(|e| match e {
            FetchError::NotFound => CacheError::Missing(url.to_string()),
            other => CacheError::Fetch(other),
        })
    }

    /// Record the outcome, unless the slot was invalidated or overwritten
    /// while the fetch was in flight.
    fn settle(&self, key: &Key, waiters: &Waiters, outcome: &Outcome) {
        let Ok(mut entries) = self.inner.entries.lock() else {
            return;
        };
        let still_ours = matches!(entries.get(key), Some(Entry::Pending(w)) if Arc::ptr_eq(w, waiters));
        if !still_ours {
            return;
        }
        match outcome {
            Ok(value) => {
                entries.insert(key.clone(), Entry::Resolved(value.clone()));
            }
            Err(CacheError::Missing(_)) => {
                entries.insert(key.clone(), Entry::Missing);
            }
            Err(err) => {
                warn!(kind = %key.0, url = %key.1, error = %err, "cache fetch failed");
                entries.remove(key);
            }
        }
    }

    fn resolved(&self, kind: CacheKind, url: &str) -> Option<CacheValue> {
        let entries = self.inner.entries.lock().ok()?;
        match entries.get(&(kind, url.to_string())) {
            Some(Entry::Resolved(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Force-write an entry regardless of its state. Waiters on a pending
    /// fetch for the same key receive the written value.
    pub fn set(&self, kind: CacheKind, url: &str, value: CacheValue) {
        let previous = match self.inner.entries.lock() {
            Ok(mut entries) => entries.insert((kind, url.to_string()), Entry::Resolved(value.clone())),
            Err(_) => return,
        };
        if let Some(Entry::Pending(waiters)) = previous {
            deliver(&waiters, &Ok(value));
        }
    }

    /// Drop every entry for `url`, across all kinds.
    pub fn invalidate(&self, url: &str) -> usize {
        let Ok(mut entries) = self.inner.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|(_, u), _| u != url);
        let removed = before - entries.len();
        debug!(%url, removed, "cache invalidate");
        removed
    }

    pub fn state(&self, kind: CacheKind, url: &str) -> EntryState {
        let Ok(entries) = self.inner.entries.lock() else {
            return EntryState::Absent;
        };
        match entries.get(&(kind, url.to_string())) {
            None => EntryState::Absent,
            Some(Entry::Pending(_)) => EntryState::Pending,
            Some(Entry::Resolved(_)) => EntryState::Resolved,
            Some(Entry::Missing) => EntryState::Missing,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
