//! Per-guild readiness gate.
//!
//! A guild is ready to record once `/setup` has been run (settings row) and
//! Google authorization has completed (credential row). Every entry point
//! that starts a recording or uploads a document checks this first.

use anyhow::Result;
use std::sync::Arc;

use crate::db::GuildStore;
use crate::messages::{msg, MessageKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessLevel {
    NeedSetup,
    NeedAuth,
    Ready,
}

/// Aggregated readiness information for a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessStatus {
    pub level: ReadinessLevel,
}

impl ReadinessStatus {
    pub fn is_ready(&self) -> bool {
        self.level == ReadinessLevel::Ready
    }

    /// User-facing instruction for the next required action.
    pub fn guidance(&self) -> String {
        match self.level {
            ReadinessLevel::Ready => msg(MessageKey::Ready),
            ReadinessLevel::NeedSetup => msg(MessageKey::NeedSetup),
            ReadinessLevel::NeedAuth => msg(MessageKey::NeedAuth),
        }
    }
}

pub struct ReadinessGate {
    store: Arc<dyn GuildStore>,
}

impl ReadinessGate {
    pub fn new(store: Arc<dyn GuildStore>) -> Self {
        Self { store }
    }

    /// Pure read; no rows are created as a side effect.
    pub fn check(&self, guild_id: u64) -> Result<ReadinessStatus> {
        if self.store.get_settings(guild_id)?.is_none() {
            return Ok(ReadinessStatus {
                level: ReadinessLevel::NeedSetup,
            });
        }

        if self.store.get_credential(guild_id)?.is_none() {
            return Ok(ReadinessStatus {
                level: ReadinessLevel::NeedAuth,
            });
        }

        Ok(ReadinessStatus {
            level: ReadinessLevel::Ready,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{GuildSettings, SqliteGuildStore, TokenBundle};
    use rusqlite::Connection;

    fn gate_with_store() -> (ReadinessGate, Arc<SqliteGuildStore>) {
        let conn = Connection::open_in_memory().unwrap();
        let store = Arc::new(SqliteGuildStore::with_connection(conn).unwrap());
        (ReadinessGate::new(store.clone()), store)
    }

    fn settings(guild_id: u64) -> GuildSettings {
        GuildSettings {
            guild_id,
            owner_id: 1,
            target_folder_id: String::new(),
            language: "ja".to_string(),
        }
    }

    fn token() -> TokenBundle {
        TokenBundle {
            access_token: "t".to_string(),
            refresh_token: None,
            scopes: vec![],
            expiry: None,
        }
    }

    #[test]
    fn test_need_setup_without_settings() {
        let (gate, _store) = gate_with_store();
        let status = gate.check(123).unwrap();
        assert_eq!(status.level, ReadinessLevel::NeedSetup);
        assert!(!status.is_ready());
        assert!(status.guidance().contains("/setup"));
    }

    #[test]
    fn test_need_auth_with_settings_only() {
        let (gate, store) = gate_with_store();
        store.upsert_settings(&settings(123)).unwrap();

        let status = gate.check(123).unwrap();
        assert_eq!(status.level, ReadinessLevel::NeedAuth);
        assert!(status.guidance().contains("/google_auth"));
    }

    #[test]
    fn test_ready_with_settings_and_credential() {
        let (gate, store) = gate_with_store();
        store.upsert_settings(&settings(123)).unwrap();
        store.upsert_credential(123, &token()).unwrap();

        let status = gate.check(123).unwrap();
        assert_eq!(status.level, ReadinessLevel::Ready);
        assert!(status.is_ready());
    }

    #[test]
    fn test_check_is_idempotent() {
        let (gate, store) = gate_with_store();
        store.upsert_settings(&settings(123)).unwrap();

        let first = gate.check(123).unwrap();
        let second = gate.check(123).unwrap();
        let third = gate.check(123).unwrap();
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn test_guilds_checked_independently() {
        let (gate, store) = gate_with_store();
        store.upsert_settings(&settings(1)).unwrap();

        assert_eq!(gate.check(1).unwrap().level, ReadinessLevel::NeedAuth);
        assert_eq!(gate.check(2).unwrap().level, ReadinessLevel::NeedSetup);
    }
}
