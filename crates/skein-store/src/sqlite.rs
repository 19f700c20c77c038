use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use skein_core::error::{Result, SkeinError};
use skein_core::traits::SessionStore;
use skein_core::types::{SessionId, SessionState};

/// Durable session store backed by SQLite.
///
/// One row per session id, upserted on save. The connection sits behind a
/// mutex, so saves and loads for distinct session ids serialize but stay
/// safe; one active executor per session id is the caller's contract.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open or create the session database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| SkeinError::Session(format!("failed to open session store: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;

             CREATE TABLE IF NOT EXISTS sessions (
                 session_id TEXT PRIMARY KEY,
                 graph_id TEXT NOT NULL,
                 graph_version TEXT NOT NULL,
                 state_json TEXT NOT NULL,
                 saved_at TEXT NOT NULL
             );",
        )
        .map_err(|e| SkeinError::Session(format!("failed to initialize session schema: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SkeinError::Session(format!("session store lock poisoned: {}", e)))
    }
}

impl SessionStore for SqliteSessionStore {
    fn save(&self, state: &SessionState) -> Result<()> {
        let state_json = serde_json::to_string(state)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (session_id, graph_id, graph_version, state_json, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id) DO UPDATE SET
                 graph_id = excluded.graph_id,
                 graph_version = excluded.graph_version,
                 state_json = excluded.state_json,
                 saved_at = excluded.saved_at",
            params![
                state.session_id.0,
                state.graph_id,
                state.graph_version,
                state_json,
                state.saved_at.to_rfc3339(),
            ],
        )
        .map_err(|e| SkeinError::Session(format!("failed to save session: {}", e)))?;
        Ok(())
    }

    fn load(&self, session_id: &SessionId) -> Result<Option<SessionState>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT state_json FROM sessions WHERE session_id = ?1")
            .map_err(|e| SkeinError::Session(format!("failed to prepare query: {}", e)))?;

        let state_json: Option<String> = stmt
            .query_row(params![session_id.0], |row| row.get(0))
            .ok();

        match state_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, session_id: &SessionId) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM sessions WHERE session_id = ?1",
                params![session_id.0],
            )
            .map_err(|e| SkeinError::Session(format!("failed to delete session: {}", e)))?;
        Ok(deleted)
    }

    fn list(&self) -> Result<Vec<SessionId>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT session_id FROM sessions ORDER BY saved_at DESC")
            .map_err(|e| SkeinError::Session(format!("failed to prepare query: {}", e)))?;

        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| SkeinError::Session(format!("failed to list sessions: {}", e)))?
            .filter_map(|r| r.ok())
            .map(SessionId)
            .collect();
        Ok(ids)
    }
}
