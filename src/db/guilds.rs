//! SQLite-backed [`GuildStore`] implementation.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::{init_db, GuildSettings, GuildStore, TokenBundle};

/// Wraps a single connection behind a mutex. Queries are short and local, so
/// serialized access is enough here.
pub struct SqliteGuildStore {
    conn: Mutex<Connection>,
}

impl SqliteGuildStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = init_db(db_path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Build a store over an existing connection. Used by tests with
    /// in-memory databases.
    pub fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])
            .context("Failed to enable foreign keys")?;
        super::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means a previous statement panicked; the connection
        // itself is still usable.
        self.conn.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl GuildStore for SqliteGuildStore {
    fn get_settings(&self, guild_id: u64) -> Result<Option<GuildSettings>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT guild_id, owner_id, target_folder_id, language \
             FROM servers WHERE guild_id = ?1",
            params![guild_id as i64],
            |row| {
                Ok(GuildSettings {
                    guild_id: row.get::<_, i64>(0)? as u64,
                    owner_id: row.get::<_, i64>(1)? as u64,
                    target_folder_id: row.get(2)?,
                    language: row.get(3)?,
                })
            },
        )
        .optional()
        .context("Failed to query server settings")
    }

    fn upsert_settings(&self, settings: &GuildSettings) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO servers (guild_id, owner_id, target_folder_id, language)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(guild_id) DO UPDATE SET
                 owner_id = excluded.owner_id,
                 target_folder_id = excluded.target_folder_id,
                 language = excluded.language",
            params![
                settings.guild_id as i64,
                settings.owner_id as i64,
                settings.target_folder_id,
                settings.language,
            ],
        )
        .context("Failed to upsert server settings")?;
        Ok(())
    }

    fn get_credential(&self, guild_id: u64) -> Result<Option<TokenBundle>> {
        let conn = self.lock();
        let token_json: Option<String> = conn
            .query_row(
                "SELECT token_json FROM credentials WHERE guild_id = ?1",
                params![guild_id as i64],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query credentials")?;

        match token_json {
            Some(json) => {
                let bundle =
                    serde_json::from_str(&json).context("Failed to parse stored credential")?;
                Ok(Some(bundle))
            }
            None => Ok(None),
        }
    }

    fn upsert_credential(&self, guild_id: u64, token: &TokenBundle) -> Result<()> {
        let token_json = serde_json::to_string(token).context("Failed to serialize credential")?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO credentials (guild_id, token_json)
             VALUES (?1, ?2)
             ON CONFLICT(guild_id) DO UPDATE SET
                 token_json = excluded.token_json",
            params![guild_id as i64, token_json],
        )
        .context("Failed to upsert credentials")?;
        Ok(())
    }

    fn delete_guild_data(&self, guild_id: u64) -> Result<()> {
        // Cascade removes the credentials row as well.
        let conn = self.lock();
        conn.execute(
            "DELETE FROM servers WHERE guild_id = ?1",
            params![guild_id as i64],
        )
        .context("Failed to delete guild data")?;
        Ok(())
    }
}
