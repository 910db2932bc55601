#![deny(unsafe_code)]

//! Shared test utilities for the pillbox workspace.
//!
//! Provides config builders, an in-memory [`Fetcher`](pillbox_core::Fetcher),
//! an HTTP fixture server that speaks the asset endpoints, and tracing
//! helpers, so individual crate tests stay short.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! pillbox-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fetcher;
pub mod images;
pub mod server;
pub mod tracing_setup;

pub use config::TestConfigBuilder;
pub use fetcher::MemoryFetcher;
pub use server::{FixtureServer, Fixtures};
