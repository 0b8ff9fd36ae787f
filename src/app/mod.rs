//! Service wiring and the capture-event loop.
//!
//! All collaborators are constructed once here and handed to each component
//! by constructor; nothing reaches for global state. The gateway transport
//! drives [`crate::commands::CommandService`] directly for slash commands,
//! while finished captures flow through the mpsc channel owned by this loop.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::commands::CommandService;
use crate::config::Config;
use crate::db::{GuildStore, SqliteGuildStore};
use crate::gateway::UnconfiguredVoiceGateway;
use crate::oauth::OAuthServer;
use crate::pipeline::MinutesPipeline;
use crate::readiness::ReadinessGate;
use crate::services::{
    CaptureEvent, ChatMinutesFormatter, DocumentService, GoogleDocsClient, LogNotifier,
    MinutesFormatter, Notifier, TranscriptionService, VoicePlatform, WhisperApiClient,
};
use crate::session::SessionManager;

/// Everything a command transport needs to serve a guild.
pub struct AppContext {
    pub commands: Arc<CommandService>,
    pub documents: Arc<dyn DocumentService>,
    pub capture_tx: mpsc::Sender<CaptureEvent>,
}

/// Build the full service graph from config.
pub fn build_context(config: &Config) -> Result<(AppContext, mpsc::Receiver<CaptureEvent>)> {
    let store: Arc<dyn GuildStore> = Arc::new(SqliteGuildStore::open(&config.db_path()?)?);

    let recordings_dir = config.recordings_dir()?;
    std::fs::create_dir_all(&recordings_dir).context("Failed to create recordings directory")?;

    let (capture_tx, capture_rx) = mpsc::channel::<CaptureEvent>(16);

    let platform: Arc<dyn VoicePlatform> =
        Arc::new(UnconfiguredVoiceGateway::new(capture_tx.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let transcription: Arc<dyn TranscriptionService> = Arc::new(WhisperApiClient::new(
        config.transcription.api_key.clone(),
        config.transcription.model.clone(),
        config.transcription.endpoint.clone(),
    ));

    let formatter: Arc<dyn MinutesFormatter> = Arc::new(ChatMinutesFormatter::new(
        config.minutes_api_key().to_string(),
        config.minutes.model.clone(),
        config.minutes.endpoint.clone(),
    ));

    let documents: Arc<dyn DocumentService> = Arc::new(GoogleDocsClient::new(
        store.clone(),
        config.google.client_id.clone(),
        config.google.client_secret.clone(),
        config.google.redirect_uri.clone(),
    ));

    let sessions = Arc::new(SessionManager::new(
        platform,
        Duration::from_secs(config.recording.max_duration_seconds),
    ));

    let pipeline = Arc::new(MinutesPipeline::new(
        transcription,
        formatter,
        documents.clone(),
        store.clone(),
    ));

    let commands = Arc::new(CommandService::new(
        ReadinessGate::new(store.clone()),
        sessions,
        pipeline,
        documents.clone(),
        store,
        notifier,
        recordings_dir,
        config.recording.cleanup_exports,
    ));

    Ok((
        AppContext {
            commands,
            documents,
            capture_tx,
        },
        capture_rx,
    ))
}

pub async fn run_service(config: Config) -> Result<()> {
    info!("Starting shoki service");

    let (context, mut capture_rx) = build_context(&config)?;

    let oauth_server = OAuthServer::new(
        config.server.host.clone(),
        config.server.port,
        context.documents.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = oauth_server.start().await {
            error!("OAuth callback server failed: {}", e);
        }
    });

    info!("Shoki is ready; processing capture events");

    while let Some(event) = capture_rx.recv().await {
        match event {
            CaptureEvent::Finished(finished) => {
                context.commands.clone().handle_capture_finished(finished);
            }
        }
    }

    Ok(())
}
