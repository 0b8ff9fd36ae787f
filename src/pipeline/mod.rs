//! Meeting pipeline: transcription → minutes formatting → document upload.
//!
//! Each stage feeds the next, single attempt, fail-fast. Formatting is the
//! one exception: it is a best-effort enhancement and degrades to the raw
//! transcript instead of failing the run.

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::GuildStore;
use crate::services::{
    DocsError, DocumentService, MinutesFormatter, TranscriptionError, TranscriptionService,
};

/// Language used when a guild somehow has no settings row. The readiness
/// gate keeps this from happening on the normal path.
const FALLBACK_LANGUAGE: &str = "ja";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
    #[error(transparent)]
    Upload(#[from] DocsError),
}

pub struct MinutesPipeline {
    transcription: Arc<dyn TranscriptionService>,
    formatter: Arc<dyn MinutesFormatter>,
    documents: Arc<dyn DocumentService>,
    store: Arc<dyn GuildStore>,
}

impl MinutesPipeline {
    pub fn new(
        transcription: Arc<dyn TranscriptionService>,
        formatter: Arc<dyn MinutesFormatter>,
        documents: Arc<dyn DocumentService>,
        store: Arc<dyn GuildStore>,
    ) -> Self {
        Self {
            transcription,
            formatter,
            documents,
            store,
        }
    }

    /// Run the full pipeline for one exported recording. Returns the URL of
    /// the uploaded document, never a partial result.
    pub async fn process(
        &self,
        guild_id: u64,
        audio_path: &Path,
        title: &str,
    ) -> Result<String, PipelineError> {
        let language = self.language_for(guild_id);

        info!(
            "Processing recording for guild {}: {:?} (language: {})",
            guild_id, audio_path, language
        );

        let transcript = self.transcription.transcribe(audio_path, &language).await?;
        info!(
            "Transcription for guild {} complete: {} chars",
            guild_id,
            transcript.len()
        );

        let formatted = match self.formatter.format(&transcript).await {
            Ok(Some(minutes)) if !minutes.trim().is_empty() => minutes,
            Ok(_) => {
                warn!("Minutes formatting returned nothing, using raw transcript");
                transcript.clone()
            }
            Err(e) => {
                warn!("Minutes formatting failed, using raw transcript: {e}");
                transcript.clone()
            }
        };

        let url = self.documents.upload(guild_id, title, &formatted).await?;
        info!("Minutes for guild {} uploaded: {}", guild_id, url);

        Ok(url)
    }

    fn language_for(&self, guild_id: u64) -> String {
        match self.store.get_settings(guild_id) {
            Ok(Some(settings)) => settings.language,
            Ok(None) => FALLBACK_LANGUAGE.to_string(),
            Err(e) => {
                warn!("Settings lookup failed for guild {guild_id}, defaulting language: {e}");
                FALLBACK_LANGUAGE.to_string()
            }
        }
    }
}
