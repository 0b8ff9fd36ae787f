//! Per-guild recording session lifecycle.
//!
//! One slot per guild, guarded by a single async mutex: `Connecting` while
//! the voice join is in flight, `Recording` once the capture sink is
//! attached, `Processing` while the export/minutes pipeline owns the guild.
//! The slot map is the only shared mutable state in the core.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{info, warn};

use crate::services::{VoiceError, VoiceHandle, VoicePlatform, VoiceTarget};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a recording is already in progress for this guild")]
    AlreadyRecording,
    #[error("no recording is currently running for this guild")]
    NoActiveRecording,
    #[error("the caller is not in a voice channel")]
    NotInVoiceChannel,
    #[error("failed to join the voice channel: {0}")]
    VoiceConnect(#[from] VoiceError),
}

/// Active recording state for one guild.
struct RecordingSession {
    handle: VoiceHandle,
    started_at: DateTime<Utc>,
    timer: AbortHandle,
}

enum GuildSlot {
    /// Voice join in flight; reserves the guild so concurrent starts lose.
    Connecting,
    Recording(RecordingSession),
    /// Export/pipeline in flight; extends the single-session invariant
    /// until the capture has been fully processed.
    Processing,
}

/// What the capture-finished handler should do with an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDisposition {
    Proceed,
    AlreadyHandled,
}

pub struct SessionManager {
    platform: Arc<dyn VoicePlatform>,
    slots: Mutex<HashMap<u64, GuildSlot>>,
    max_duration: Duration,
}

impl SessionManager {
    pub fn new(platform: Arc<dyn VoicePlatform>, max_duration: Duration) -> Self {
        Self {
            platform,
            slots: Mutex::new(HashMap::new()),
            max_duration,
        }
    }

    /// Start a recording session: join the caller's voice channel and attach
    /// the capture sink. The slot is reserved before the (slow) voice join so
    /// two near-simultaneous starts cannot both succeed.
    pub async fn start(
        self: Arc<Self>,
        guild_id: u64,
        voice: Option<VoiceTarget>,
        notify_channel_id: u64,
    ) -> Result<(), SessionError> {
        let Some(target) = voice else {
            return Err(SessionError::NotInVoiceChannel);
        };

        {
            let mut slots = self.slots.lock().await;
            if slots.contains_key(&guild_id) {
                return Err(SessionError::AlreadyRecording);
            }
            slots.insert(guild_id, GuildSlot::Connecting);
        }

        let handle = match self.platform.connect(guild_id, target.channel_id).await {
            Ok(handle) => handle,
            Err(e) => {
                self.slots.lock().await.remove(&guild_id);
                return Err(SessionError::VoiceConnect(e));
            }
        };

        if let Err(e) = self
            .platform
            .start_capture(&handle, notify_channel_id)
            .await
        {
            let _ = self.platform.disconnect(handle).await;
            self.slots.lock().await.remove(&guild_id);
            return Err(SessionError::VoiceConnect(e));
        }

        let timer = Self::spawn_session_timer(Arc::clone(&self), guild_id);
        let session = RecordingSession {
            handle,
            started_at: Utc::now(),
            timer,
        };

        self.slots
            .lock()
            .await
            .insert(guild_id, GuildSlot::Recording(session));

        info!(
            "Recording started for guild {} in channel {}",
            guild_id, target.channel_id
        );
        Ok(())
    }

    /// Stop a recording: finalize the sink, leave the channel, and flip the
    /// slot to `Processing`. Returns immediately; the flushed buffers arrive
    /// later as a capture event.
    pub async fn stop(&self, guild_id: u64) -> Result<(), SessionError> {
        let session = {
            let mut slots = self.slots.lock().await;
            match slots.remove(&guild_id) {
                Some(GuildSlot::Recording(session)) => {
                    slots.insert(guild_id, GuildSlot::Processing);
                    session
                }
                Some(other) => {
                    slots.insert(guild_id, other);
                    return Err(SessionError::NoActiveRecording);
                }
                None => return Err(SessionError::NoActiveRecording),
            }
        };

        let duration = Utc::now() - session.started_at;
        info!(
            "Stopping recording for guild {} after {}s",
            guild_id,
            duration.num_seconds().max(0)
        );

        if let Err(e) = self.platform.stop_capture(&session.handle).await {
            warn!("Failed to finalize capture for guild {}: {}", guild_id, e);
        }
        if let Err(e) = self.platform.disconnect(session.handle).await {
            warn!("Failed to disconnect voice for guild {}: {}", guild_id, e);
        }

        // Last: the timer task may be the caller of this very function.
        session.timer.abort();
        Ok(())
    }

    /// Called when the platform reports a flushed capture. Safe against the
    /// stop-was-never-called case (external disconnect): whatever slot
    /// remains is claimed exactly once.
    pub async fn acknowledge_capture(&self, guild_id: u64) -> CaptureDisposition {
        let leftover = {
            let mut slots = self.slots.lock().await;
            match slots.remove(&guild_id) {
                Some(GuildSlot::Processing) => {
                    slots.insert(guild_id, GuildSlot::Processing);
                    None
                }
                Some(GuildSlot::Recording(session)) => {
                    slots.insert(guild_id, GuildSlot::Processing);
                    Some(session)
                }
                Some(GuildSlot::Connecting) => {
                    slots.insert(guild_id, GuildSlot::Connecting);
                    warn!(
                        "Ignoring capture event for guild {} still connecting",
                        guild_id
                    );
                    return CaptureDisposition::AlreadyHandled;
                }
                None => {
                    warn!(
                        "Ignoring capture event for guild {} with no claimable session",
                        guild_id
                    );
                    return CaptureDisposition::AlreadyHandled;
                }
            }
        };

        if let Some(session) = leftover {
            // Externally triggered finalize: clean up what stop() would have.
            info!(
                "Capture finished without an explicit stop for guild {}",
                guild_id
            );
            session.timer.abort();
            if let Err(e) = self.platform.disconnect(session.handle).await {
                warn!("Failed to disconnect voice for guild {}: {}", guild_id, e);
            }
        }

        CaptureDisposition::Proceed
    }

    /// Release the `Processing` guard once the pipeline is done with the
    /// guild, successful or not.
    pub async fn release(&self, guild_id: u64) {
        self.slots.lock().await.remove(&guild_id);
    }

    /// Whether the guild currently holds any slot (recording or processing).
    pub async fn is_busy(&self, guild_id: u64) -> bool {
        self.slots.lock().await.contains_key(&guild_id)
    }

    pub async fn active_count(&self) -> usize {
        self.slots.lock().await.len()
    }

    fn spawn_session_timer(manager: Arc<Self>, guild_id: u64) -> AbortHandle {
        let max_duration = manager.max_duration;
        let task = tokio::spawn(async move {
            tokio::time::sleep(max_duration).await;
            info!(
                "Recording for guild {} hit the {}s limit, stopping automatically",
                guild_id,
                max_duration.as_secs()
            );
            if let Err(e) = manager.stop(guild_id).await {
                // Lost the race against a manual stop; nothing to do.
                warn!("Auto-stop for guild {} skipped: {}", guild_id, e);
            }
        });
        task.abort_handle()
    }
}
