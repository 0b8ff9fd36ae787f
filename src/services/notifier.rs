//! Outbound notification boundary.
//!
//! The core never talks to Discord text channels directly; processing
//! notices go through this trait. The gateway adapter supplies the real
//! implementation.

use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` to the given text channel. Delivery failures are the
    /// implementation's problem to log; callers never handle them.
    async fn notify(&self, channel_id: u64, text: &str);
}

/// Fallback notifier that writes notices to the log stream. Used until the
/// gateway wires a channel-backed implementation.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, channel_id: u64, text: &str) {
        info!("[channel {}] {}", channel_id, text);
    }
}
