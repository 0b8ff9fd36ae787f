//! Discord gateway adapter.
//!
//! The gateway process owns the websocket connection, slash-command dispatch
//! and the voice transport; it talks to the core exclusively through
//! [`VoicePlatform`], [`Notifier`] and the capture-event channel. This
//! module holds the integration point: the transport wiring lands here and
//! nowhere else in the crate.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::services::{CaptureEvent, VoiceError, VoiceHandle, VoicePlatform};

/// Placeholder voice adapter used until the gateway transport is attached.
/// Refuses connections so a recording session can never be started against
/// a transport that is not there.
pub struct UnconfiguredVoiceGateway {
    _events: mpsc::Sender<CaptureEvent>,
}

impl UnconfiguredVoiceGateway {
    pub fn new(events: mpsc::Sender<CaptureEvent>) -> Self {
        Self { _events: events }
    }
}

#[async_trait]
impl VoicePlatform for UnconfiguredVoiceGateway {
    async fn connect(&self, guild_id: u64, _channel_id: u64) -> Result<VoiceHandle, VoiceError> {
        warn!(
            "Voice connect requested for guild {} but no gateway transport is attached",
            guild_id
        );
        Err(VoiceError::Connect(
            "discord voice transport is not configured".to_string(),
        ))
    }

    async fn start_capture(
        &self,
        _handle: &VoiceHandle,
        _notify_channel_id: u64,
    ) -> Result<(), VoiceError> {
        Err(VoiceError::Transport(
            "discord voice transport is not configured".to_string(),
        ))
    }

    async fn stop_capture(&self, _handle: &VoiceHandle) -> Result<(), VoiceError> {
        Err(VoiceError::Transport(
            "discord voice transport is not configured".to_string(),
        ))
    }

    async fn disconnect(&self, _handle: VoiceHandle) -> Result<(), VoiceError> {
        Ok(())
    }
}
