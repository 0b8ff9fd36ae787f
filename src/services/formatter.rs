//! Meeting-minutes formatting boundary.
//!
//! Formatting is a best-effort enhancement: every failure mode collapses to
//! `Ok(None)` or an error the pipeline downgrades to the raw transcript.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = "あなたは会議の議事録を整理する専門家です。与えられた会議の書き起こしから、\
重要な情報を抽出し、テンプレートに沿って整理してください。ただし当てはまるものがない場合は空欄で構いません。";

const MINUTES_TEMPLATE: &str = "\
以下の会議の書き起こしを、以下のテンプレートに沿って整理してください。
テンプレートの各セクションに適切な内容を記入し、不要な情報は省略してください。

テンプレート:
1.目的
2.前提
3.アジェンダ
4.記録
5.ToDo

# 目的
1. 話し合いの目的を書いてください

# 前提
1. 話し合う上で前提となる情報を共有してください

# アジェンダ
1. 話し合いの全体の流れや内容をまとめたもの

# 記録
1. 話し合いの結果決定したことを記録してください。できるだけ詳細に会議で話し合ったことを書くこと。

# ToDo
1. 各メンバーに対して話し合いの結果決定したToDoを整理しましょう

会議の書き起こし:
";

#[async_trait]
pub trait MinutesFormatter: Send + Sync {
    /// Returns `None` when no usable minutes could be produced.
    async fn format(&self, transcript: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Formats transcripts through an OpenAI-compatible chat completion API.
pub struct ChatMinutesFormatter {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl ChatMinutesFormatter {
    pub fn new(api_key: String, model: String, endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model,
        }
    }

    fn user_prompt(transcript: &str) -> String {
        format!("{MINUTES_TEMPLATE}{transcript}")
    }
}

#[async_trait]
impl MinutesFormatter for ChatMinutesFormatter {
    async fn format(&self, transcript: &str) -> Result<Option<String>> {
        info!(
            "Formatting transcript into meeting minutes ({} chars)",
            transcript.len()
        );

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": Self::user_prompt(transcript) },
            ],
            "temperature": 0.7,
            "max_tokens": 2000,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send minutes formatting request")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read formatting response")?;

        if !status.is_success() {
            warn!("Minutes formatting request failed with status {status}: {text}");
            return Ok(None);
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).context("Failed to parse formatting response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty());

        Ok(content)
    }
}
