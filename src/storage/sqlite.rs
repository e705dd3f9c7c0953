//! SQLite storage implementation
//!
//! This module provides a SQLite-based [`DocumentSink`] and [`ArticleQuery`].

use crate::pipeline::CandidateRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    ArticleQuery, DocumentSink, KeywordMatch, StorageError, StorageResult,
};
use crate::storage::{RunRecord, RunStatus};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const ARTICLE_COLUMNS: &str = "url, headline, author, text, countries";
const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, committed, error_message";

/// SQLite storage backend
///
/// The async [`DocumentSink`] calls run on tokio's blocking pool, so a
/// caller's timeout still fires while SQLite waits on a lock.
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    /// Opens or creates the database and its schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Concurrent tasks upsert through one connection; WAL keeps readers unblocked
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored articles
    pub fn count_articles(&self) -> StorageResult<u64> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        lock_connection(&self.conn)
    }

    /// Runs a statement against the connection on the blocking pool
    async fn blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || op(&lock_connection(&conn)))
            .await
            .map_err(|e| StorageError::Database(format!("storage task failed: {}", e)))?
    }

    fn query_articles(
        &self,
        filter: Option<(&str, &KeywordMatch)>,
    ) -> StorageResult<Vec<CandidateRecord>> {
        let conn = self.lock();

        let (sql, keyword) = match filter {
            None => (
                format!(
                    "SELECT {} FROM articles ORDER BY first_seen_at, url",
                    ARTICLE_COLUMNS
                ),
                None,
            ),
            Some((column, query)) => {
                let condition = if query.case_sensitive {
                    format!("instr({}, ?1) > 0", column)
                } else {
                    format!("instr(lower({}), lower(?1)) > 0", column)
                };
                (
                    format!(
                        "SELECT {} FROM articles WHERE {} ORDER BY first_seen_at, url",
                        ARTICLE_COLUMNS, condition
                    ),
                    Some(query.keyword.as_str()),
                )
            }
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = match keyword {
            Some(keyword) => stmt.query_map(params![keyword], read_article)?,
            None => stmt.query_map([], read_article)?,
        };

        let mut records = Vec::new();
        for row in rows {
            let (mut record, countries) = row?;
            record.countries_mentioned = serde_json::from_str(&countries)?;
            records.push(record);
        }
        Ok(records)
    }
}

fn lock_connection(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn upsert_article(conn: &Connection, record: &CandidateRecord) -> StorageResult<()> {
    let countries = serde_json::to_string(&record.countries_mentioned)?;
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO articles (url, headline, author, text, countries, first_seen_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(url) DO UPDATE SET
            headline = excluded.headline,
            author = excluded.author,
            text = excluded.text,
            countries = excluded.countries,
            updated_at = excluded.updated_at",
        params![
            record.url,
            record.headline,
            record.author,
            record.text,
            countries,
            now
        ],
    )?;
    Ok(())
}

fn read_article(row: &Row<'_>) -> rusqlite::Result<(CandidateRecord, String)> {
    Ok((
        CandidateRecord {
            url: row.get(0)?,
            headline: row.get(1)?,
            author: row.get(2)?,
            text: row.get(3)?,
            countries_mentioned: Vec::new(),
        },
        row.get(4)?,
    ))
}

fn read_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
        committed: row.get::<_, i64>(5)? as u64,
        error_message: row.get(6)?,
    })
}

#[async_trait]
impl DocumentSink for SqliteSink {
    async fn upsert(&self, record: &CandidateRecord) -> StorageResult<()> {
        let record = record.clone();
        self.blocking(move |conn| upsert_article(conn, &record)).await
    }

    async fn begin_run(&self, config_hash: &str) -> StorageResult<i64> {
        let config_hash = config_hash.to_string();
        self.blocking(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
                params![now, config_hash, RunStatus::Running.to_db_string()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        committed: u64,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let error_message = error_message.map(str::to_string);
        self.blocking(move |conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn.execute(
                "UPDATE runs SET status = ?1, finished_at = ?2, committed = ?3, error_message = ?4
                 WHERE id = ?5",
                params![
                    status.to_db_string(),
                    now,
                    committed as i64,
                    error_message,
                    run_id
                ],
            )?;

            if updated == 0 {
                return Err(StorageError::RunNotFound(run_id));
            }
            Ok(())
        })
        .await
    }
}

impl ArticleQuery for SqliteSink {
    fn list_all(&self) -> StorageResult<Vec<CandidateRecord>> {
        self.query_articles(None)
    }

    fn find_by_text(&self, query: &KeywordMatch) -> StorageResult<Vec<CandidateRecord>> {
        self.query_articles(Some(("text", query)))
    }

    fn find_by_headline(&self, query: &KeywordMatch) -> StorageResult<Vec<CandidateRecord>> {
        self.query_articles(Some(("headline", query)))
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.lock()
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                read_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .lock()
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                read_run,
            )
            .optional()?;
        Ok(run)
    }
}
