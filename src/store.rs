use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::StoreError;
use crate::result::{SessionKind, TestResult};

/// A finished session plus the free-text tags the subject attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub kind: SessionKind,
    pub reaction_times: Vec<f64>,
    pub average_time: f64,
    pub user_id: String,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Local>,
}

impl Submission {
    pub fn new(result: &TestResult, user_id: impl Into<String>) -> Result<Self, StoreError> {
        if result.kind() == SessionKind::Warmup {
            return Err(StoreError::WarmupNotPersisted);
        }
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(StoreError::MissingUser);
        }

        Ok(Self {
            kind: result.kind(),
            reaction_times: result.reaction_times().to_vec(),
            average_time: result.average_time(),
            user_id,
            condition: None,
            notes: None,
            recorded_at: Local::now(),
        })
    }

    pub fn with_condition(mut self, condition: Option<&str>) -> Self {
        self.condition = non_blank(condition);
        self
    }

    pub fn with_notes(mut self, notes: Option<&str>) -> Self {
        self.notes = non_blank(notes);
        self
    }
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A row read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub id: i64,
    pub submission: Submission,
}

/// Anything that can accept finished sessions
pub trait ResultStore {
    /// Persist a submission, returning its row id
    fn save(&mut self, submission: &Submission) -> Result<i64, StoreError>;
}

/// SQLite-backed result store
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Open the database in the default state directory
    pub fn open_default() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("reflex_results.db"));
        Self::open(path)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS reaction_tests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                test_type TEXT NOT NULL,
                reaction_times TEXT NOT NULL,
                average_time REAL NOT NULL,
                condition TEXT,
                notes TEXT,
                recorded_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_reaction_tests_user ON reaction_tests(user_id)",
            [],
        )?;

        Ok(Self { conn })
    }

    /// Saved results for one user, newest first
    pub fn results_for_user(&self, user_id: &str) -> Result<Vec<StoredResult>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, test_type, reaction_times, average_time, condition, notes, recorded_at
            FROM reaction_tests
            WHERE user_id = ?1
            ORDER BY recorded_at DESC, id DESC
            "#,
        )?;

        let rows = stmt.query_map([user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, test_type, times_json, average_time, condition, notes, recorded_at) = row?;
            let kind = serde_json::from_value(serde_json::Value::String(test_type))?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        6,
                        "recorded_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);

            results.push(StoredResult {
                id,
                submission: Submission {
                    kind,
                    reaction_times: serde_json::from_str(&times_json)?,
                    average_time,
                    user_id: user_id.to_string(),
                    condition,
                    notes,
                    recorded_at,
                },
            });
        }

        Ok(results)
    }
}

impl ResultStore for SqliteStore {
    fn save(&mut self, submission: &Submission) -> Result<i64, StoreError> {
        let times = serde_json::to_string(&submission.reaction_times)?;
        self.conn.execute(
            r#"
            INSERT INTO reaction_tests
            (user_id, test_type, reaction_times, average_time, condition, notes, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                submission.user_id,
                submission.kind.to_string(),
                times,
                submission.average_time,
                submission.condition,
                submission.notes,
                submission.recorded_at.to_rfc3339(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        tracing::info!(id, user = %submission.user_id, "result saved");
        Ok(id)
    }
}
