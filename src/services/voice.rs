//! Voice platform boundary.
//!
//! The Discord voice transport lives behind [`VoicePlatform`]. Finished
//! captures are not delivered through an arbitrary callback: the platform is
//! constructed with an mpsc sender and posts a [`CaptureEvent`] into the app
//! loop when its sink has flushed, which keeps session-map mutations on the
//! event-loop side.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("voice connect refused: {0}")]
    Connect(String),
    #[error("voice transport error: {0}")]
    Transport(String),
}

/// Owned handle to an established voice connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceHandle {
    pub guild_id: u64,
    pub channel_id: u64,
}

/// The caller's current voice presence, as seen by the command layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceTarget {
    pub channel_id: u64,
}

/// Encoding shared by all per-speaker buffers of one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    /// Buffers are complete WAV files.
    Wav,
    /// Buffers are raw interleaved 16-bit little-endian PCM.
    Pcm { sample_rate: u32, channels: u16 },
}

/// Event posted by the platform when a capture sink has fully flushed.
#[derive(Debug)]
pub enum CaptureEvent {
    Finished(FinishedCapture),
}

#[derive(Debug)]
pub struct FinishedCapture {
    pub guild_id: u64,
    /// Text channel where processing notices should land.
    pub notify_channel_id: u64,
    /// One append-only buffer per distinct speaker heard.
    pub buffers: HashMap<u64, Vec<u8>>,
    pub encoding: SourceEncoding,
}

#[async_trait]
pub trait VoicePlatform: Send + Sync {
    /// Join a voice channel. Fails on permission or network errors.
    async fn connect(&self, guild_id: u64, channel_id: u64) -> Result<VoiceHandle, VoiceError>;

    /// Attach a capture sink that accumulates one buffer per speaker. The
    /// `notify_channel_id` is echoed back in the eventual [`CaptureEvent`].
    async fn start_capture(
        &self,
        handle: &VoiceHandle,
        notify_channel_id: u64,
    ) -> Result<(), VoiceError>;

    /// Ask the sink to finalize. The flushed buffers arrive asynchronously
    /// as a [`CaptureEvent::Finished`].
    async fn stop_capture(&self, handle: &VoiceHandle) -> Result<(), VoiceError>;

    async fn disconnect(&self, handle: VoiceHandle) -> Result<(), VoiceError>;
}
