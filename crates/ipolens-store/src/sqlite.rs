use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipolens_core::{IpoAnalysis, IpoLensError, LogEntry, Result, User};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::{NewLogEntry, Store};

/// SQLite-backed persistence. The connection sits behind a mutex; every
/// operation is short enough that this never becomes the bottleneck in
/// front of a multi-second LLM call.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_premium INTEGER NOT NULL DEFAULT 0,
                is_admin INTEGER NOT NULL DEFAULT 0,
                usage_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL REFERENCES users(username),
                company_name TEXT NOT NULL,
                stock_code TEXT NOT NULL,
                subscription TEXT,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS logs (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                username TEXT NOT NULL,
                action TEXT NOT NULL,
                details TEXT NOT NULL,
                metadata TEXT
            );",
        )
        .map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }
}

fn db_err(e: rusqlite::Error) -> IpoLensError {
    IpoLensError::Database(e.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IpoLensError::Database(format!("bad timestamp {raw:?}: {e}")))
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, bool, bool, u32)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn build_user(raw: (String, String, bool, bool, u32)) -> Result<User> {
    let (username, created_at, is_premium, is_admin, usage_count) = raw;
    Ok(User {
        username,
        created_at: parse_timestamp(&created_at)?,
        is_premium,
        is_admin,
        usage_count,
    })
}

const USER_COLUMNS: &str = "username, created_at, is_premium, is_admin, usage_count";

#[async_trait]
impl Store for SqliteStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let created_at = Utc::now();
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (username, password_hash, created_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![username, password_hash, created_at.to_rfc3339()],
        );
        match inserted {
            Ok(0) => Err(IpoLensError::InvalidOperation(
                "user already exists".to_string(),
            )),
            Ok(_) => Ok(User {
                username: username.to_string(),
                created_at,
                is_premium: false,
                is_admin: false,
                usage_count: 0,
            }),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username],
                row_to_user,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(build_user).transpose()
    }

    async fn password_hash(&self, username: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT password_hash FROM users WHERE username = ?1",
            [username],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)
    }

    async fn set_premium(&self, username: &str) -> Result<User> {
        {
            let conn = self.conn.lock();
            let changed = conn
                .execute(
                    "UPDATE users SET is_premium = 1, usage_count = 0 WHERE username = ?1",
                    [username],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(IpoLensError::NotFound(format!("user {username}")));
            }
        }
        self.find_user(username)
            .await?
            .ok_or_else(|| IpoLensError::NotFound(format!("user {username}")))
    }

    async fn increment_usage(&self, username: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET usage_count = usage_count + 1 WHERE username = ?1",
            [username],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn save_analysis(
        &self,
        username: &str,
        analysis: &IpoAnalysis,
        subscription: Option<&str>,
    ) -> Result<()> {
        let data = serde_json::to_string(analysis)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO analyses (username, company_name, stock_code, subscription, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                username,
                analysis.company_name,
                analysis.stock_code,
                subscription,
                data,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn history(&self, username: &str, limit: usize) -> Result<Vec<IpoAnalysis>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT data FROM analyses WHERE username = ?1
                 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(db_err)?;
        let jsons = stmt
            .query_map(rusqlite::params![username, limit as i64], |row| {
                row.get::<_, String>(0)
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        jsons
            .iter()
            .map(|json| serde_json::from_str(json).map_err(Into::into))
            .collect()
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<LogEntry> {
        let log = LogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            username: entry.username,
            action: entry.action,
            details: entry.details,
            metadata: entry.metadata,
        };
        let metadata = log
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO logs (id, timestamp, username, action, details, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                log.id,
                log.timestamp.to_rfc3339(),
                log.username,
                log.action.to_string(),
                log.details,
                metadata,
            ],
        )
        .map_err(db_err)?;
        Ok(log)
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, username, action, details, metadata
                 FROM logs ORDER BY rowid DESC LIMIT ?1",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(id, timestamp, username, action, details, metadata)| {
                Ok(LogEntry {
                    id,
                    timestamp: parse_timestamp(&timestamp)?,
                    username,
                    action: action.parse()?,
                    details,
                    metadata: metadata
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()?,
                })
            })
            .collect()
    }

    async fn clear_logs(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM logs", []).map_err(db_err)?;
        Ok(())
    }
}
