//! SQLite persistence for per-guild settings and OAuth credentials.
//!
//! Raw SQL with rusqlite, no ORM. The cascade from `servers` to
//! `credentials` means deleting a guild's settings also drops its tokens.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod guilds;

pub use guilds::SqliteGuildStore;

/// Per-guild bot configuration, written by `/setup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub owner_id: u64,
    /// Google Drive destination folder. Empty string means "root/default".
    pub target_folder_id: String,
    /// Transcription language code ("ja" or "en").
    pub language: String,
}

impl GuildSettings {
    /// Whether documents should stay in the Drive root.
    pub fn uses_root_folder(&self) -> bool {
        self.target_folder_id.is_empty()
    }
}

/// OAuth token bundle persisted per guild, round-tripped through JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scopes: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl TokenBundle {
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= Utc::now(),
            None => false,
        }
    }
}

/// Abstract settings/credential store consumed by the gate, the pipeline and
/// the document service. Implemented by [`SqliteGuildStore`] in production
/// and by in-memory doubles in tests.
pub trait GuildStore: Send + Sync {
    fn get_settings(&self, guild_id: u64) -> Result<Option<GuildSettings>>;
    fn upsert_settings(&self, settings: &GuildSettings) -> Result<()>;
    fn get_credential(&self, guild_id: u64) -> Result<Option<TokenBundle>>;
    fn upsert_credential(&self, guild_id: u64, token: &TokenBundle) -> Result<()>;
    fn delete_guild_data(&self, guild_id: u64) -> Result<()>;
}

pub fn init_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path).context("Failed to open database connection")?;
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS servers (
            guild_id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            target_folder_id TEXT NOT NULL DEFAULT '',
            language TEXT NOT NULL DEFAULT 'ja'
        )",
        [],
    )
    .context("Failed to create servers table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS credentials (
            guild_id INTEGER PRIMARY KEY,
            token_json TEXT NOT NULL,
            FOREIGN KEY (guild_id) REFERENCES servers (guild_id) ON DELETE CASCADE
        )",
        [],
    )
    .context("Failed to create credentials table")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
                 AND name IN ('servers', 'credentials')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_token_bundle_roundtrip() {
        let bundle = TokenBundle {
            access_token: "ya29.token".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            scopes: vec!["https://www.googleapis.com/auth/documents".to_string()],
            expiry: Some(Utc::now() + Duration::hours(1)),
        };

        let json = serde_json::to_string(&bundle).unwrap();
        let parsed: TokenBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bundle);
    }

    #[test]
    fn test_token_bundle_expiry() {
        let mut bundle = TokenBundle {
            access_token: "t".to_string(),
            refresh_token: None,
            scopes: vec![],
            expiry: None,
        };
        assert!(!bundle.is_expired());

        bundle.expiry = Some(Utc::now() - Duration::minutes(5));
        assert!(bundle.is_expired());

        bundle.expiry = Some(Utc::now() + Duration::minutes(5));
        assert!(!bundle.is_expired());
    }

    #[test]
    fn test_uses_root_folder_sentinel() {
        let mut settings = GuildSettings {
            guild_id: 1,
            owner_id: 2,
            target_folder_id: String::new(),
            language: "ja".to_string(),
        };
        assert!(settings.uses_root_folder());

        settings.target_folder_id = "1AbCdEf".to_string();
        assert!(!settings.uses_root_folder());
    }
}
