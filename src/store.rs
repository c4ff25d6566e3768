use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("database handle poisoned")]
    Poisoned,
}

/// A manual moderator report, append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: i64,
    pub chat_id: i64,
    pub message_text: String,
    pub spam_prob: Option<f64>,
    pub reporter_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// One row per escalation attempt, append-only audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct EnforcementRecord {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Shared SQLite handle. The store serializes access internally; callers
/// never assume exclusive access to the connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chats (
                chat_id INTEGER PRIMARY KEY,
                threshold REAL NOT NULL DEFAULT 0.9,
                max_warnings INTEGER NOT NULL DEFAULT 3,
                punishment TEXT NOT NULL DEFAULT 'ban',
                logging INTEGER NOT NULL DEFAULT 1,
                anon_reports INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS warnings (
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (chat_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                message_text TEXT NOT NULL,
                spam_prob REAL,
                reporter_id INTEGER,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS enforcements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS score_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                message_text TEXT NOT NULL,
                spam_prob REAL NOT NULL,
                threshold REAL NOT NULL,
                removed INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn).map_err(StoreError::from)
    }

    /// Append a manual report row and return its id.
    pub fn record_report(
        &self,
        chat_id: i64,
        message_text: &str,
        spam_prob: Option<f64>,
        reporter_id: Option<i64>,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reports (chat_id, message_text, spam_prob, reporter_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    chat_id,
                    message_text,
                    spam_prob,
                    reporter_id,
                    Utc::now().to_rfc3339()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Append an enforcement audit row.
    pub fn record_enforcement(
        &self,
        chat_id: i64,
        user_id: i64,
        reason: &str,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO enforcements (chat_id, user_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![chat_id, user_id, reason, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Append a scored-message log row.
    pub fn record_score(
        &self,
        chat_id: i64,
        message_text: &str,
        spam_prob: f64,
        threshold: f64,
        removed: bool,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO score_log (chat_id, message_text, spam_prob, threshold, removed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    chat_id,
                    message_text,
                    spam_prob,
                    threshold,
                    removed as i64,
                    Utc::now().to_rfc3339()
                ],
            )?;
            Ok(())
        })
    }

    pub fn reports(&self, chat_id: i64) -> Result<Vec<Report>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, message_text, spam_prob, reporter_id, created_at
                 FROM reports WHERE chat_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map([chat_id], |row| {
                Ok(Report {
                    id: row.get(0)?,
                    chat_id: row.get(1)?,
                    message_text: row.get(2)?,
                    spam_prob: row.get(3)?,
                    reporter_id: row.get(4)?,
                    created_at: parse_timestamp(&row.get::<_, String>(5)?),
                })
            })?;
            rows.collect()
        })
    }

    pub fn enforcements(&self, chat_id: i64) -> Result<Vec<EnforcementRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, user_id, reason, created_at
                 FROM enforcements WHERE chat_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map([chat_id], |row| {
                Ok(EnforcementRecord {
                    id: row.get(0)?,
                    chat_id: row.get(1)?,
                    user_id: row.get(2)?,
                    reason: row.get(3)?,
                    created_at: parse_timestamp(&row.get::<_, String>(4)?),
                })
            })?;
            rows.collect()
        })
    }

    pub fn latest_report(&self, chat_id: i64) -> Result<Option<Report>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, chat_id, message_text, spam_prob, reporter_id, created_at
                 FROM reports WHERE chat_id = ?1 ORDER BY id DESC LIMIT 1",
                [chat_id],
                |row| {
                    Ok(Report {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        message_text: row.get(2)?,
                        spam_prob: row.get(3)?,
                        reporter_id: row.get(4)?,
                        created_at: parse_timestamp(&row.get::<_, String>(5)?),
                    })
                },
            )
            .optional()
        })
    }
}

// Timestamps are only ever written by this module as RFC3339; a row that
// fails to parse maps to the epoch rather than failing the whole read.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_bootstraps_and_rows_round_trip() {
        let store = Store::open_in_memory().unwrap();

        let id = store
            .record_report(-100, "free bitcoin, click here", Some(0.97), None)
            .unwrap();
        assert!(id > 0);

        store.record_enforcement(-100, 42, "ban: reached warning limit (auto)").unwrap();
        store.record_score(-100, "free bitcoin, click here", 0.97, 0.9, true).unwrap();

        let reports = store.reports(-100).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reporter_id, None);
        assert_eq!(reports[0].spam_prob, Some(0.97));

        let enforcements = store.enforcements(-100).unwrap();
        assert_eq!(enforcements.len(), 1);
        assert_eq!(enforcements[0].user_id, 42);
    }

    #[test]
    fn test_latest_report_empty_chat() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.latest_report(-5).unwrap().is_none());
    }
}
