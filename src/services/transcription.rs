//! Speech-to-text boundary and the Whisper API client.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("audio file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("transcription provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, language: &str)
        -> Result<String, TranscriptionError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    r#type: Option<String>,
    code: Option<String>,
}

/// OpenAI Whisper API client.
pub struct WhisperApiClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl WhisperApiClient {
    pub fn new(api_key: String, model: String, endpoint: Option<String>) -> Self {
        let endpoint = endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        info!("Initialized Whisper client with endpoint: {}", endpoint);
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint,
            model,
        }
    }
}

#[async_trait]
impl TranscriptionService for WhisperApiClient {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        if !audio_path.exists() {
            return Err(TranscriptionError::FileNotFound(audio_path.to_path_buf()));
        }

        info!("Transcribing audio file via Whisper API: {:?}", audio_path);

        let bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| TranscriptionError::Provider(format!("failed to read audio file: {e}")))?;

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.ogg".to_string());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/ogg")
            .map_err(|e| TranscriptionError::Provider(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", language.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Provider(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Provider(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            error!("Whisper API request failed with status {}: {}", status, body);

            if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(TranscriptionError::Provider(format!(
                    "{} (type: {:?}, code: {:?})",
                    parsed.error.message, parsed.error.r#type, parsed.error.code
                )));
            }

            return Err(TranscriptionError::Provider(format!(
                "status {status}: {body}"
            )));
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| TranscriptionError::Provider(format!("unexpected response: {e}")))?;

        let text = parsed.text.trim().to_string();
        info!("Transcription complete: {} chars", text.len());
        debug!("Raw transcription: {}", text);

        Ok(text)
    }
}
