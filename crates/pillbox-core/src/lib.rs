#![deny(unsafe_code)]

//! pillbox core library.
//!
//! Keeps a structured list of prompt tags (plain words, weighted words, LoRA
//! and embedding references, group references) in sync with the flat text a
//! downstream consumer reads. The crate is headless: hosts (the TUI, or any
//! other front end) feed it key and pointer events and render the state it
//! exposes.

use std::future::Future;
use std::pin::Pin;

/// Boxed `Send` future returned by the object-safe async traits
/// (`dyn Fetcher`, `dyn GroupResolver`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Asset server client: browsing, search, previews, metadata, group files.
pub mod api;
/// Caret-tracking autocomplete coordinator for free-text surfaces.
pub mod autocomplete;
/// Memoizing, request-coalescing resource cache.
pub mod cache;
/// Tag grammar: parsing, formatting, serialization with group expansion.
pub mod codec;
/// Headless popup menu engine and its variants.
pub mod menu;
/// Transient user-visible notifications captured from `tracing`.
pub mod notify;
/// Tag records and collections.
pub mod tag;

pub use api::{AssetApi, AssetKind, CachedGroupResolver, HttpFetcher};
pub use cache::{CacheError, CacheKind, CacheValue, FetchError, Fetcher, ResourceCache};
pub use codec::{GroupResolver, parse_text, serialize};
pub use notify::{NotificationLayer, NotificationReader};
pub use tag::{Tag, TagCollection, TagKind};
