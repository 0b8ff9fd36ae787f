//! HTTP server for the Google OAuth redirect.
//!
//! Exposes `GET /oauth2callback` (code exchange keyed by the `gid:<id>`
//! state token) and `GET /health` for liveness probes.

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{error, info};

use crate::services::DocumentService;

/// JSON error responses in the shape `{"error": true, "message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

/// Extract the guild id from the OAuth `state` parameter (`"gid:<id>"`).
pub fn parse_guild_state(state: &str) -> Result<u64, String> {
    let raw = state
        .strip_prefix("gid:")
        .ok_or_else(|| "Invalid state format".to_string())?;
    raw.parse::<u64>()
        .map_err(|_| "State does not contain a valid guild id".to_string())
}

#[derive(Clone)]
struct OAuthState {
    documents: Arc<dyn DocumentService>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: String,
    state: String,
}

pub struct OAuthServer {
    host: String,
    port: u16,
    documents: Arc<dyn DocumentService>,
}

impl OAuthServer {
    pub fn new(host: String, port: u16, documents: Arc<dyn DocumentService>) -> Self {
        Self {
            host,
            port,
            documents,
        }
    }

    pub fn router(documents: Arc<dyn DocumentService>) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/oauth2callback", get(oauth2_callback))
            .layer(ServiceBuilder::new())
            .with_state(OAuthState { documents })
    }

    pub async fn start(self) -> Result<()> {
        let app = Self::router(self.documents);

        let listener =
            tokio::net::TcpListener::bind(&format!("{}:{}", self.host, self.port)).await?;

        info!(
            "OAuth callback server listening on http://{}:{}",
            self.host, self.port
        );
        info!("Endpoints:");
        info!("  GET /health         - Liveness probe");
        info!("  GET /oauth2callback - Google OAuth redirect target");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn oauth2_callback(
    State(state): State<OAuthState>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<String>, ApiError> {
    let guild_id = parse_guild_state(&params.state).map_err(ApiError::bad_request)?;

    state
        .documents
        .exchange_code(guild_id, &params.code)
        .await
        .map_err(|e| {
            error!("OAuth code exchange failed for guild {}: {}", guild_id, e);
            ApiError::internal(e.to_string())
        })?;

    info!("Authorization completed for guild {}", guild_id);
    Ok(Html(success_page()))
}

fn success_page() -> String {
    "<html><body style='font-family:sans-serif;'>\
     <h3>✅ 認証に成功しました！ このタブは閉じて構いません。<br/>\
     Authentication successful! You may close this tab.</h3>\
     </body></html>"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_guild_state_valid() {
        assert_eq!(parse_guild_state("gid:123").unwrap(), 123);
        assert_eq!(parse_guild_state("gid:0").unwrap(), 0);
    }

    #[test]
    fn test_parse_guild_state_invalid() {
        assert!(parse_guild_state("123").is_err());
        assert!(parse_guild_state("gid:").is_err());
        assert!(parse_guild_state("gid:abc").is_err());
        assert!(parse_guild_state("guild:123").is_err());
        assert!(parse_guild_state("").is_err());
    }

    #[test]
    fn test_success_page_is_bilingual() {
        let page = success_page();
        assert!(page.contains("認証に成功しました"));
        assert!(page.contains("Authentication successful"));
    }
}
