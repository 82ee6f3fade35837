use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use engine::{mark_failed, Stage};

pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Movie {
    pub id: i64,
    pub title: Option<String>,
    pub status: String,
    pub custom_prompts: Vec<String>,
    pub custom_retrievals: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub summary_id: i64,
    pub summary_text: String,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS movies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                status TEXT NOT NULL DEFAULT 'PENDING',
                custom_prompts_json TEXT NOT NULL DEFAULT '[]',
                custom_retrievals_json TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS movie_summaries (
                movie_id INTEGER NOT NULL,
                summary_id INTEGER NOT NULL,
                summary_text TEXT NOT NULL,
                PRIMARY KEY (movie_id, summary_id),
                FOREIGN KEY (movie_id) REFERENCES movies(id)
            )",
            [],
        )?;

        Ok(())
    }

    pub fn create_movie(
        &self,
        title: Option<&str>,
        custom_prompts: &[String],
        custom_retrievals: &[String],
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let prompts_json = serde_json::to_string(custom_prompts)?;
        let retrievals_json = serde_json::to_string(custom_retrievals)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO movies (title, status, custom_prompts_json, custom_retrievals_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![title, Stage::Pending.encode(), prompts_json, retrievals_json, now, now],
        )?;

        Ok(conn.last_insert_rowid())
    }

    pub fn get_movie(&self, id: i64) -> Result<Option<Movie>> {
        let conn = self.conn()?;
        let movie = conn
            .query_row(
                "SELECT id, title, status, custom_prompts_json, custom_retrievals_json, created_at, updated_at
                 FROM movies WHERE id = ?1",
                params![id],
                movie_from_row,
            )
            .optional()?;
        Ok(movie)
    }

    pub fn get_status(&self, id: i64) -> Result<Option<String>> {
        let conn = self.conn()?;
        let status = conn
            .query_row(
                "SELECT status FROM movies WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status)
    }

    /// Returns false when no such movie exists.
    pub fn set_status(&self, id: i64, status: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE movies SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now, id],
        )?;
        Ok(updated > 0)
    }

    /// Prefixes the current status with `FAILED_` unless it already is.
    /// Returns the resulting status.
    pub fn mark_failed(&self, id: i64) -> Result<Option<String>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM movies WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            return Ok(None);
        };

        let failed = mark_failed(&current);
        if failed != current {
            tx.execute(
                "UPDATE movies SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![failed, Utc::now().to_rfc3339(), id],
            )?;
        }
        tx.commit()?;
        Ok(Some(failed))
    }

    pub fn upsert_summary(&self, movie_id: i64, summary_id: i64, text: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO movie_summaries (movie_id, summary_id, summary_text) VALUES (?1, ?2, ?3)
             ON CONFLICT(movie_id, summary_id) DO UPDATE SET summary_text = excluded.summary_text",
            params![movie_id, summary_id, text],
        )?;
        Ok(())
    }

    /// Like [`Database::upsert_summary`], but a failure is logged and reported
    /// as `false` instead of aborting the caller.
    pub fn save_summary(&self, movie_id: i64, summary_id: i64, text: &str) -> bool {
        match self.upsert_summary(movie_id, summary_id, text) {
            Ok(()) => true,
            Err(e) => {
                warn!(movie_id, summary_id, error = %e, "failed to save summary");
                false
            }
        }
    }

    pub fn summary_exists(&self, movie_id: i64, summary_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM movie_summaries WHERE movie_id = ?1 AND summary_id = ?2",
            params![movie_id, summary_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn list_summaries(&self, movie_id: i64) -> Result<Vec<Summary>> {
        self.list_summaries_up_to(movie_id, i64::MAX)
    }

    pub fn list_summaries_up_to(&self, movie_id: i64, summary_id: i64) -> Result<Vec<Summary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT summary_id, summary_text FROM movie_summaries
             WHERE movie_id = ?1 AND summary_id <= ?2
             ORDER BY summary_id ASC",
        )?;
        let rows = stmt
            .query_map(params![movie_id, summary_id], |row| {
                Ok(Summary {
                    summary_id: row.get(0)?,
                    summary_text: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Deletes every summary with `summary_id >= from_summary_id`.
    pub fn delete_summaries_from(&self, movie_id: i64, from_summary_id: i64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM movie_summaries WHERE movie_id = ?1 AND summary_id >= ?2",
            params![movie_id, from_summary_id],
        )?;
        Ok(deleted)
    }
}

fn movie_from_row(row: &Row<'_>) -> rusqlite::Result<Movie> {
    let prompts_json: String = row.get(3)?;
    let retrievals_json: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;
    let updated_at_str: String = row.get(6)?;

    let custom_prompts = serde_json::from_str(&prompts_json)
        .map_err(|_| rusqlite::Error::InvalidColumnType(3, "TEXT".to_string(), rusqlite::types::Type::Text))?;
    let custom_retrievals = serde_json::from_str(&retrievals_json)
        .map_err(|_| rusqlite::Error::InvalidColumnType(4, "TEXT".to_string(), rusqlite::types::Type::Text))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|_| rusqlite::Error::InvalidColumnType(5, "TEXT".to_string(), rusqlite::types::Type::Text))?
        .with_timezone(&Utc);
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map_err(|_| rusqlite::Error::InvalidColumnType(6, "TEXT".to_string(), rusqlite::types::Type::Text))?
        .with_timezone(&Utc);

    Ok(Movie {
        id: row.get(0)?,
        title: row.get(1)?,
        status: row.get(2)?,
        custom_prompts,
        custom_retrievals,
        created_at,
        updated_at,
    })
}
