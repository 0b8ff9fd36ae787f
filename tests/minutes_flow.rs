//! End-to-end pipeline behavior over the public API, with scripted
//! collaborators standing in for the Whisper, chat and Google services.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use shoki::db::{GuildSettings, GuildStore, SqliteGuildStore, TokenBundle};
use shoki::pipeline::{MinutesPipeline, PipelineError};
use shoki::readiness::{ReadinessGate, ReadinessLevel};
use shoki::services::{
    DocsError, DocumentService, MinutesFormatter, TranscriptionError, TranscriptionService,
};

struct ScriptedTranscriber {
    text: String,
    calls: Mutex<Vec<(PathBuf, String)>>,
}

#[async_trait]
impl TranscriptionService for ScriptedTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        self.calls
            .lock()
            .unwrap()
            .push((audio_path.to_path_buf(), language.to_string()));
        Ok(self.text.clone())
    }
}

struct ScriptedFormatter {
    output: Option<String>,
}

#[async_trait]
impl MinutesFormatter for ScriptedFormatter {
    async fn format(&self, _transcript: &str) -> AnyResult<Option<String>> {
        Ok(self.output.clone())
    }
}

struct ScriptedUploader {
    url: String,
    calls: Mutex<Vec<(u64, String, String)>>,
}

#[async_trait]
impl DocumentService for ScriptedUploader {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.google.com/o/oauth2/v2/auth?state={state}")
    }

    async fn exchange_code(&self, _guild_id: u64, _code: &str) -> Result<(), DocsError> {
        Ok(())
    }

    async fn upload(&self, guild_id: u64, title: &str, content: &str) -> Result<String, DocsError> {
        self.calls
            .lock()
            .unwrap()
            .push((guild_id, title.to_string(), content.to_string()));
        Ok(self.url.clone())
    }
}

fn ready_store(guild_id: u64, language: &str) -> Arc<SqliteGuildStore> {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let store = Arc::new(SqliteGuildStore::with_connection(conn).unwrap());
    store
        .upsert_settings(&GuildSettings {
            guild_id,
            owner_id: 7,
            target_folder_id: String::new(),
            language: language.to_string(),
        })
        .unwrap();
    store
        .upsert_credential(
            guild_id,
            &TokenBundle {
                access_token: "ya29.test".to_string(),
                refresh_token: Some("1//r".to_string()),
                scopes: vec![],
                expiry: None,
            },
        )
        .unwrap();
    store
}

#[tokio::test]
async fn full_pipeline_uses_settings_language_and_returns_upload_url() {
    let store = ready_store(123, "en");

    // The gate sees the same rows the pipeline does.
    let gate = ReadinessGate::new(store.clone());
    assert_eq!(gate.check(123).unwrap().level, ReadinessLevel::Ready);

    let transcriber = Arc::new(ScriptedTranscriber {
        text: "raw transcript".to_string(),
        calls: Mutex::new(Vec::new()),
    });
    let uploader = Arc::new(ScriptedUploader {
        url: "https://docs.google.com/document/d/final/edit".to_string(),
        calls: Mutex::new(Vec::new()),
    });

    let pipeline = MinutesPipeline::new(
        transcriber.clone(),
        Arc::new(ScriptedFormatter {
            output: Some("formatted minutes".to_string()),
        }),
        uploader.clone(),
        store,
    );

    let url = pipeline
        .process(123, Path::new("/tmp/a.wav"), "Meeting Minutes")
        .await
        .unwrap();

    assert_eq!(url, "https://docs.google.com/document/d/final/edit");

    let transcribe_calls = transcriber.calls.lock().unwrap();
    assert_eq!(transcribe_calls.len(), 1);
    assert_eq!(transcribe_calls[0].0, PathBuf::from("/tmp/a.wav"));
    assert_eq!(transcribe_calls[0].1, "en");

    let upload_calls = uploader.calls.lock().unwrap();
    assert_eq!(upload_calls.len(), 1);
    assert_eq!(upload_calls[0].0, 123);
    assert_eq!(upload_calls[0].1, "Meeting Minutes");
    assert_eq!(upload_calls[0].2, "formatted minutes");
}

#[tokio::test]
async fn absent_formatter_output_uploads_raw_transcript_verbatim() {
    let store = ready_store(123, "ja");

    let uploader = Arc::new(ScriptedUploader {
        url: "https://docs.google.com/document/d/x/edit".to_string(),
        calls: Mutex::new(Vec::new()),
    });

    let pipeline = MinutesPipeline::new(
        Arc::new(ScriptedTranscriber {
            text: "raw transcript".to_string(),
            calls: Mutex::new(Vec::new()),
        }),
        Arc::new(ScriptedFormatter { output: None }),
        uploader.clone(),
        store,
    );

    pipeline
        .process(123, Path::new("/tmp/a.wav"), "Meeting Minutes")
        .await
        .unwrap();

    assert_eq!(uploader.calls.lock().unwrap()[0].2, "raw transcript");
}

#[tokio::test]
async fn transcription_failure_reaches_caller_unchanged() {
    struct FailingTranscriber;

    #[async_trait]
    impl TranscriptionService for FailingTranscriber {
        async fn transcribe(
            &self,
            audio_path: &Path,
            _language: &str,
        ) -> Result<String, TranscriptionError> {
            Err(TranscriptionError::FileNotFound(audio_path.to_path_buf()))
        }
    }

    let store = ready_store(123, "ja");
    let uploader = Arc::new(ScriptedUploader {
        url: String::new(),
        calls: Mutex::new(Vec::new()),
    });

    let pipeline = MinutesPipeline::new(
        Arc::new(FailingTranscriber),
        Arc::new(ScriptedFormatter { output: None }),
        uploader.clone(),
        store,
    );

    let result = pipeline
        .process(123, Path::new("/tmp/missing.ogg"), "Meeting Minutes")
        .await;

    match result {
        Err(PipelineError::Transcription(TranscriptionError::FileNotFound(path))) => {
            assert_eq!(path, PathBuf::from("/tmp/missing.ogg"));
        }
        other => panic!("expected FileNotFound passthrough, got {other:?}"),
    }
    assert!(uploader.calls.lock().unwrap().is_empty());
}
