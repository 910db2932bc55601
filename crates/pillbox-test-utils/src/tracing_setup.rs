//! Tracing initialisation helpers for tests.
//!
//! Call [`init_test_tracing`] at the top of any test that emits tracing events
//! and wants them captured by the test harness. It is idempotent.
//!
//! Tests that assert on user-facing notifications use
//! [`capture_notifications`] instead, which installs a thread-scoped
//! subscriber carrying a [`NotificationLayer`].

use std::time::Duration;

use pillbox_core::{NotificationLayer, NotificationReader};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

/// Initialise a tracing subscriber that writes to the test-harness writer
/// and respects the `RUST_LOG` environment variable.
///
/// # Example
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     pillbox_test_utils::tracing_setup::init_test_tracing();
///     tracing::info!("visible when RUST_LOG=info");
/// }
/// ```
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Route notifications raised on the current thread into a fresh buffer.
///
/// Capture stops when the returned guard is dropped. Use a
/// current-thread runtime so async work stays on the capturing thread.
pub fn capture_notifications() -> (NotificationReader, DefaultGuard) {
    let layer = NotificationLayer::new(32, Duration::from_secs(60));
    let reader = layer.reader();
    let subscriber = tracing_subscriber::registry().with(layer);
    (reader, tracing::subscriber::set_default(subscriber))
}
