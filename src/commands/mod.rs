//! Bot command surface.
//!
//! Thin adapter between slash-command semantics and the core: readiness
//! checks gate every recording start, session and readiness problems become
//! bilingual reply text instead of errors, and finished captures are driven
//! through export and the minutes pipeline here.

use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audio::{self, ExportError};
use crate::db::{GuildSettings, GuildStore};
use crate::messages::{self, msg, MessageKey};
use crate::pipeline::{MinutesPipeline, PipelineError};
use crate::readiness::{ReadinessGate, ReadinessLevel};
use crate::services::{DocumentService, FinishedCapture, Notifier, VoiceTarget};
use crate::session::{CaptureDisposition, SessionError, SessionManager};

const LANGUAGES: [&str; 2] = ["ja", "en"];

pub struct CommandService {
    gate: ReadinessGate,
    sessions: Arc<SessionManager>,
    pipeline: Arc<MinutesPipeline>,
    documents: Arc<dyn DocumentService>,
    store: Arc<dyn GuildStore>,
    notifier: Arc<dyn Notifier>,
    recordings_dir: PathBuf,
    cleanup_exports: bool,
}

impl CommandService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gate: ReadinessGate,
        sessions: Arc<SessionManager>,
        pipeline: Arc<MinutesPipeline>,
        documents: Arc<dyn DocumentService>,
        store: Arc<dyn GuildStore>,
        notifier: Arc<dyn Notifier>,
        recordings_dir: PathBuf,
        cleanup_exports: bool,
    ) -> Self {
        Self {
            gate,
            sessions,
            pipeline,
            documents,
            store,
            notifier,
            recordings_dir,
            cleanup_exports,
        }
    }

    /// `/record_start`: gate first, then hand off to the session manager.
    pub async fn start_recording(
        &self,
        guild_id: u64,
        voice: Option<VoiceTarget>,
        notify_channel_id: u64,
    ) -> String {
        let status = match self.gate.check(guild_id) {
            Ok(status) => status,
            Err(e) => {
                error!("Readiness check failed for guild {}: {}", guild_id, e);
                return msg(MessageKey::InternalError);
            }
        };
        if !status.is_ready() {
            return status.guidance();
        }

        match self
            .sessions
            .clone()
            .start(guild_id, voice, notify_channel_id)
            .await
        {
            Ok(()) => msg(MessageKey::RecordStart),
            Err(SessionError::AlreadyRecording) => msg(MessageKey::RecordAlready),
            Err(SessionError::NotInVoiceChannel) => msg(MessageKey::VoiceJoinFirst),
            Err(SessionError::VoiceConnect(e)) => {
                error!("Voice connect failed for guild {}: {}", guild_id, e);
                msg(MessageKey::VoiceConnectFailed)
            }
            Err(e) => {
                error!("Recording start failed for guild {}: {}", guild_id, e);
                msg(MessageKey::InternalError)
            }
        }
    }

    /// `/record_stop`: acknowledge immediately; processing continues once
    /// the platform flushes the capture.
    pub async fn stop_recording(&self, guild_id: u64) -> String {
        match self.sessions.stop(guild_id).await {
            Ok(()) => msg(MessageKey::RecordStopDone),
            Err(SessionError::NoActiveRecording) => msg(MessageKey::RecordStopNoRecord),
            Err(e) => {
                error!("Recording stop failed for guild {}: {}", guild_id, e);
                msg(MessageKey::InternalError)
            }
        }
    }

    /// `/setup`: persist per-guild settings.
    pub fn setup(
        &self,
        guild_id: u64,
        owner_id: u64,
        target_folder_id: &str,
        language: &str,
    ) -> String {
        if !LANGUAGES.contains(&language) {
            return msg(MessageKey::SetupFailed);
        }

        let settings = GuildSettings {
            guild_id,
            owner_id,
            target_folder_id: target_folder_id.to_string(),
            language: language.to_string(),
        };

        match self.store.upsert_settings(&settings) {
            Ok(()) => {
                info!("Server settings saved for guild {} by user {}", guild_id, owner_id);
                format!(
                    "{}\n・Google Drive Folder: `{}`\n・Language: `{}`",
                    msg(MessageKey::SetupSaved),
                    if settings.uses_root_folder() {
                        "(root)"
                    } else {
                        target_folder_id
                    },
                    language,
                )
            }
            Err(e) => {
                error!("Failed to save settings for guild {}: {}", guild_id, e);
                msg(MessageKey::SetupFailed)
            }
        }
    }

    /// `/google_auth`: DM body carrying the consent URL. The state token
    /// routes the callback back to this guild.
    pub fn authorization_request(&self, guild_id: u64, guild_name: &str) -> String {
        let state = format!("gid:{guild_id}");
        let auth_url = self.documents.authorization_url(&state);
        messages::authorization_dm(guild_name, &auth_url)
    }

    /// `/status`: self-check report for admins.
    pub fn check_readiness(&self, guild_id: u64) -> String {
        let status = match self.gate.check(guild_id) {
            Ok(status) => status,
            Err(e) => {
                error!("Readiness check failed for guild {}: {}", guild_id, e);
                return msg(MessageKey::InternalError);
            }
        };

        let setup_ok = status.level != ReadinessLevel::NeedSetup;
        let auth_ok = status.level == ReadinessLevel::Ready;

        let mut lines = vec!["🚦 **Self-Check**".to_string()];
        lines.push(format!(
            "• サーバー設定 (/setup): {}",
            if setup_ok { "✅ OK" } else { "❌ 未設定" }
        ));
        lines.push(format!(
            "• Google 認証 (/google_auth): {}",
            if auth_ok { "✅ OK" } else { "❌ 未認証" }
        ));
        lines.push(status.guidance());
        lines.join("\n")
    }

    /// Run the minutes pipeline against an already-exported audio file.
    /// Used by the capture driver below and exposed for re-running a failed
    /// upload by hand.
    pub async fn run_pipeline(
        &self,
        guild_id: u64,
        audio_path: &std::path::Path,
        title: &str,
    ) -> Result<String, PipelineError> {
        self.pipeline.process(guild_id, audio_path, title).await
    }

    /// Entry point for capture events from the platform. Spawns the heavy
    /// work so the caller's event loop keeps serving other guilds.
    pub fn handle_capture_finished(self: Arc<Self>, event: FinishedCapture) {
        tokio::spawn(async move {
            self.process_capture(event).await;
        });
    }

    async fn process_capture(&self, event: FinishedCapture) {
        let guild_id = event.guild_id;
        let channel_id = event.notify_channel_id;

        if self.sessions.acknowledge_capture(guild_id).await == CaptureDisposition::AlreadyHandled {
            return;
        }

        // Silent speakers leave empty buffers behind; drop them up front.
        let mut buffers = event.buffers;
        buffers.retain(|_, data| !data.is_empty());

        if buffers.is_empty() {
            info!("Capture for guild {} contained no audio", guild_id);
            self.notifier
                .notify(channel_id, &msg(MessageKey::NoAudioDetected))
                .await;
            self.sessions.release(guild_id).await;
            return;
        }

        let mut speakers: Vec<u64> = buffers.keys().copied().collect();
        speakers.sort_unstable();
        self.notifier
            .notify(channel_id, &messages::speakers_detected(&speakers))
            .await;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let output_base = self
            .recordings_dir
            .join(format!("recording_{guild_id}_{timestamp}"));

        let audio_path = match audio::mix_and_export(buffers, event.encoding, output_base).await {
            Ok(path) => path,
            Err(ExportError::EmptyRecording) => {
                self.notifier
                    .notify(channel_id, &msg(MessageKey::NoAudioDetected))
                    .await;
                self.sessions.release(guild_id).await;
                return;
            }
            Err(e) => {
                error!("Audio export failed for guild {}: {}", guild_id, e);
                self.notifier
                    .notify(channel_id, &msg(MessageKey::MinutesFailed))
                    .await;
                self.sessions.release(guild_id).await;
                return;
            }
        };

        let title = format!("Meeting Minutes {}", Local::now().format("%Y-%m-%d %H:%M"));
        match self.run_pipeline(guild_id, &audio_path, &title).await {
            Ok(url) => {
                self.notifier
                    .notify(channel_id, &messages::minutes_created(&url))
                    .await;
            }
            Err(e) => {
                error!("Minutes pipeline failed for guild {}: {}", guild_id, e);
                self.notifier
                    .notify(channel_id, &msg(MessageKey::MinutesFailed))
                    .await;
            }
        }

        if self.cleanup_exports {
            if let Err(e) = tokio::fs::remove_file(&audio_path).await {
                warn!("Failed to delete exported audio {:?}: {}", audio_path, e);
            }
        }

        self.sessions.release(guild_id).await;
    }
}
