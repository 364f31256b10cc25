// Session persistence
// The credential pair lives in a small key/value table so a session survives
// client restarts on the same machine

use anyhow::{anyhow, Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::types::TokenPair;

/// Named entries in the persisted store. Absence of either implies no session.
const ACCESS_KEY: &str = "access";
const REFRESH_KEY: &str = "refresh";

/// Holder of the current credential pair.
///
/// All operations are synchronous; reads degrade to absent. Only the
/// RefreshCoordinator and the explicit login/logout flows write. No caller
/// may assume atomicity between a `get` and a later `set`.
pub trait TokenStore: Send + Sync {
    /// Current pair, or `None` when no session is held
    fn get(&self) -> Option<TokenPair>;

    /// Replace the held pair wholesale
    fn set(&self, pair: &TokenPair) -> Result<()>;

    /// Drop the held pair
    fn clear(&self) -> Result<()>;
}

/// SQLite-backed store used in production
pub struct SqliteTokenStore {
    conn: Mutex<Connection>,
}

impl SqliteTokenStore {
    /// Open (or create) the session database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open session database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Build a store on an existing connection (in-memory databases in tests)
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS session_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .context("Failed to create session table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_entry(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
        conn.query_row("SELECT value FROM session_kv WHERE key = ?", [key], |row| {
            row.get(0)
        })
        .optional()
    }
}

impl TokenStore for SqliteTokenStore {
    fn get(&self) -> Option<TokenPair> {
        let conn = self.conn.lock().ok()?;

        let access = match Self::read_entry(&conn, ACCESS_KEY) {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!("Failed to read access entry: {}", e);
                return None;
            }
        };
        let refresh = match Self::read_entry(&conn, REFRESH_KEY) {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!("Failed to read refresh entry: {}", e);
                return None;
            }
        };

        Some(TokenPair { access, refresh })
    }

    fn set(&self, pair: &TokenPair) -> Result<()> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;

        // Full replacement, both entries in one transaction
        let tx = conn.transaction().context("Failed to begin transaction")?;
        tx.execute("DELETE FROM session_kv", [])?;
        tx.execute(
            "INSERT INTO session_kv (key, value) VALUES (?, ?)",
            [ACCESS_KEY, pair.access.as_str()],
        )?;
        tx.execute(
            "INSERT INTO session_kv (key, value) VALUES (?, ?)",
            [REFRESH_KEY, pair.refresh.as_str()],
        )?;
        tx.commit().context("Failed to store session")?;

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;

        conn.execute("DELETE FROM session_kv", [])
            .context("Failed to clear session")?;

        Ok(())
    }
}

/// In-memory store for tests and dependency injection
#[derive(Default)]
pub struct MemoryTokenStore {
    pair: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<TokenPair> {
        self.pair.lock().ok()?.clone()
    }

    fn set(&self, pair: &TokenPair) -> Result<()> {
        let mut held = self
            .pair
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        *held = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut held = self
            .pair
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        *held = None;
        Ok(())
    }
}
