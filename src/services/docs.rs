//! Google Docs boundary: OAuth consent/exchange and document upload.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::db::{GuildStore, TokenBundle};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DOCS_ENDPOINT: &str = "https://docs.googleapis.com/v1/documents";
const DRIVE_FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";

const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/drive",
];

#[derive(Debug, Error)]
pub enum DocsError {
    #[error("no stored credential for guild {0}")]
    NoCredential(u64),
    #[error("document provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Build the consent URL carrying `state` through the redirect.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code and persist the resulting credential.
    async fn exchange_code(&self, guild_id: u64, code: &str) -> Result<(), DocsError>;

    /// Create a document with `content` and return its URL.
    async fn upload(&self, guild_id: u64, title: &str, content: &str) -> Result<String, DocsError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedDocument {
    #[serde(rename = "documentId")]
    document_id: String,
}

#[derive(Debug, Deserialize)]
struct FileParents {
    #[serde(default)]
    parents: Vec<String>,
}

pub struct GoogleDocsClient {
    client: reqwest::Client,
    store: Arc<dyn GuildStore>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleDocsClient {
    pub fn new(
        store: Arc<dyn GuildStore>,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            store,
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    fn bundle_from_response(previous_refresh: Option<String>, response: TokenResponse) -> TokenBundle {
        let scopes = response
            .scope
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_else(|| SCOPES.iter().map(|s| s.to_string()).collect());

        TokenBundle {
            access_token: response.access_token,
            // Google omits the refresh token on re-consent; keep the old one.
            refresh_token: response.refresh_token.or(previous_refresh),
            scopes,
            expiry: response
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    async fn request_token(
        &self,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, DocsError> {
        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(params)
            .send()
            .await
            .map_err(|e| DocsError::Provider(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DocsError::Provider(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            return Err(DocsError::Provider(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| DocsError::Provider(format!("unexpected token response: {e}")))
    }

    /// Return a non-expired access token for the guild, refreshing and
    /// re-persisting the bundle when necessary.
    async fn access_token(&self, guild_id: u64) -> Result<String, DocsError> {
        let bundle = self
            .store
            .get_credential(guild_id)
            .map_err(|e| DocsError::Provider(format!("credential lookup failed: {e}")))?
            .ok_or(DocsError::NoCredential(guild_id))?;

        if !bundle.is_expired() {
            return Ok(bundle.access_token);
        }

        let Some(refresh_token) = bundle.refresh_token.clone() else {
            // Expired with nothing to refresh from: behave as unauthorized.
            return Err(DocsError::NoCredential(guild_id));
        };

        debug!("Refreshing expired access token for guild {}", guild_id);
        let response = self
            .request_token(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        let refreshed = Self::bundle_from_response(bundle.refresh_token, response);
        let access_token = refreshed.access_token.clone();

        if let Err(e) = self.store.upsert_credential(guild_id, &refreshed) {
            warn!("Failed to persist refreshed credential for guild {guild_id}: {e}");
        }

        Ok(access_token)
    }

    async fn api_call(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<String, DocsError> {
        let response = request
            .send()
            .await
            .map_err(|e| DocsError::Provider(format!("{what} request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DocsError::Provider(format!("failed to read {what} response: {e}")))?;

        if !status.is_success() {
            return Err(DocsError::Provider(format!(
                "{what} returned {status}: {body}"
            )));
        }

        Ok(body)
    }

    async fn move_to_folder(
        &self,
        access_token: &str,
        document_id: &str,
        folder_id: &str,
    ) -> Result<(), DocsError> {
        let get_url = format!("{DRIVE_FILES_ENDPOINT}/{document_id}?fields=parents");
        let body = self
            .api_call(
                self.client.get(&get_url).bearer_auth(access_token),
                "drive parent lookup",
            )
            .await?;

        let parents: FileParents = serde_json::from_str(&body)
            .map_err(|e| DocsError::Provider(format!("unexpected drive response: {e}")))?;
        let previous_parents = parents.parents.join(",");

        let update_url = format!(
            "{DRIVE_FILES_ENDPOINT}/{document_id}?addParents={folder_id}&removeParents={previous_parents}"
        );
        self.api_call(
            self.client
                .patch(&update_url)
                .bearer_auth(access_token)
                .json(&json!({})),
            "drive move",
        )
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DocumentService for GoogleDocsClient {
    fn authorization_url(&self, state: &str) -> String {
        let mut url = Url::parse(AUTH_ENDPOINT).expect("static auth endpoint is valid");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        url.to_string()
    }

    async fn exchange_code(&self, guild_id: u64, code: &str) -> Result<(), DocsError> {
        info!("Exchanging authorization code for guild {}", guild_id);

        let response = self
            .request_token(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        let bundle = Self::bundle_from_response(None, response);
        self.store
            .upsert_credential(guild_id, &bundle)
            .map_err(|e| DocsError::Provider(format!("failed to persist credential: {e}")))?;

        info!("Stored Google credential for guild {}", guild_id);
        Ok(())
    }

    async fn upload(&self, guild_id: u64, title: &str, content: &str) -> Result<String, DocsError> {
        let access_token = self.access_token(guild_id).await?;

        let folder_id = self
            .store
            .get_settings(guild_id)
            .map_err(|e| DocsError::Provider(format!("settings lookup failed: {e}")))?
            .map(|settings| settings.target_folder_id)
            .unwrap_or_default();

        // 1. Create the document.
        let body = self
            .api_call(
                self.client
                    .post(DOCS_ENDPOINT)
                    .bearer_auth(&access_token)
                    .json(&json!({ "title": title })),
                "document create",
            )
            .await?;

        let created: CreatedDocument = serde_json::from_str(&body)
            .map_err(|e| DocsError::Provider(format!("unexpected docs response: {e}")))?;
        let document_id = created.document_id;

        // 2. Insert the minutes text.
        let update_url = format!("{DOCS_ENDPOINT}/{document_id}:batchUpdate");
        self.api_call(
            self.client
                .post(&update_url)
                .bearer_auth(&access_token)
                .json(&json!({
                    "requests": [
                        { "insertText": { "location": { "index": 1 }, "text": content } }
                    ]
                })),
            "document update",
        )
        .await?;

        // 3. Move it out of the root unless the sentinel is set.
        if !folder_id.is_empty() {
            self.move_to_folder(&access_token, &document_id, &folder_id)
                .await?;
        }

        let url = format!("https://docs.google.com/document/d/{document_id}/edit");
        info!("Uploaded minutes for guild {}: {}", guild_id, url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteGuildStore;
    use rusqlite::Connection;

    fn test_client() -> GoogleDocsClient {
        let conn = Connection::open_in_memory().unwrap();
        let store = Arc::new(SqliteGuildStore::with_connection(conn).unwrap());
        GoogleDocsClient::new(
            store,
            "client-id-123".to_string(),
            "client-secret".to_string(),
            "http://localhost:8000/oauth2callback".to_string(),
        )
    }

    #[test]
    fn test_authorization_url_carries_state_and_scopes() {
        let client = test_client();
        let url = client.authorization_url("gid:123");

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("accounts.google.com"));

        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-id-123"));
        assert_eq!(pairs.get("state").map(String::as_str), Some("gid:123"));
        assert_eq!(pairs.get("access_type").map(String::as_str), Some("offline"));
        assert!(pairs.get("scope").unwrap().contains("auth/documents"));
        assert!(pairs.get("scope").unwrap().contains("auth/drive"));
    }

    #[test]
    fn test_bundle_from_response_sets_expiry_and_scopes() {
        let response = TokenResponse {
            access_token: "ya29.new".to_string(),
            refresh_token: Some("1//r".to_string()),
            expires_in: Some(3599),
            scope: Some("a b".to_string()),
        };

        let bundle = GoogleDocsClient::bundle_from_response(None, response);
        assert_eq!(bundle.access_token, "ya29.new");
        assert_eq!(bundle.scopes, vec!["a".to_string(), "b".to_string()]);
        assert!(bundle.expiry.unwrap() > Utc::now());
    }

    #[test]
    fn test_bundle_keeps_previous_refresh_token() {
        let response = TokenResponse {
            access_token: "ya29.new".to_string(),
            refresh_token: None,
            expires_in: None,
            scope: None,
        };

        let bundle =
            GoogleDocsClient::bundle_from_response(Some("1//old".to_string()), response);
        assert_eq!(bundle.refresh_token.as_deref(), Some("1//old"));
    }

    #[tokio::test]
    async fn test_upload_without_credential_is_no_credential() {
        let client = test_client();
        let result = client.upload(555, "Minutes", "content").await;
        match result {
            Err(DocsError::NoCredential(guild_id)) => assert_eq!(guild_id, 555),
            other => panic!("expected NoCredential, got {other:?}"),
        }
    }
}
