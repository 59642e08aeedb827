//! SQLite-backed persistent store for failures, fix attempts, and generated tests.
//!
//! Failure rows are idempotent under the unique key (run_id, repo):
//! re-ingesting the same run updates the row in place and resets its status
//! to `pending`. Attempt rows are append-only. Every write completes before
//! the pipeline moves to its next stage, so a crash-restart never observes
//! regressed state.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;

// =============================================================================
// Types
// =============================================================================

/// Pipeline status of a failure row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStatus {
    Pending,
    FetchingLogs,
    Analyzing,
    Reproducing,
    GeneratingTest,
    Fixing,
    CreatingPr,
    Fixed,
    Escalated,
    Failed,
    NotReproduced,
}

impl FailureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::FetchingLogs => "fetching_logs",
            Self::Analyzing => "analyzing",
            Self::Reproducing => "reproducing",
            Self::GeneratingTest => "generating_test",
            Self::Fixing => "fixing",
            Self::CreatingPr => "creating_pr",
            Self::Fixed => "fixed",
            Self::Escalated => "escalated",
            Self::Failed => "failed",
            Self::NotReproduced => "not_reproduced",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "fetching_logs" => Self::FetchingLogs,
            "analyzing" => Self::Analyzing,
            "reproducing" => Self::Reproducing,
            "generating_test" => Self::GeneratingTest,
            "fixing" => Self::Fixing,
            "creating_pr" => Self::CreatingPr,
            "fixed" => Self::Fixed,
            "escalated" => Self::Escalated,
            "not_reproduced" => Self::NotReproduced,
            _ => Self::Failed,
        }
    }

    /// Terminal states admit no further transitions except re-ingestion.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Fixed | Self::Escalated | Self::Failed | Self::NotReproduced
        )
    }
}

impl std::fmt::Display for FailureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verdict of one fix attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptVerdict {
    Pass,
    Fail,
}

impl AttemptVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pass" => Self::Pass,
            _ => Self::Fail,
        }
    }
}

/// A failure row, one per (run_id, repo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: i64,
    pub run_id: i64,
    pub repo: String,
    pub sha: String,
    pub branch: String,
    pub workflow_name: String,
    pub created_at: i64,
    pub error_type: Option<String>,
    pub file_path: Option<String>,
    pub line_number: Option<i64>,
    pub function_name: Option<String>,
    pub error_message: Option<String>,
    pub failing_test: Option<String>,
    pub confidence: Option<f64>,
    pub raw_log_snippet: Option<String>,
    pub status: FailureStatus,
    pub pr_url: Option<String>,
    pub issue_url: Option<String>,
    pub error: Option<String>,
    pub completed_at: Option<i64>,
}

/// Fields for ingesting a failure event.
#[derive(Debug, Clone)]
pub struct NewFailure<'a> {
    pub run_id: i64,
    pub repo: &'a str,
    pub sha: &'a str,
    pub branch: &'a str,
    pub workflow_name: &'a str,
}

/// Analysis columns written after the diagnosis stage.
#[derive(Debug, Clone)]
pub struct AnalysisUpdate<'a> {
    pub error_type: &'a str,
    pub file_path: &'a str,
    pub line_number: Option<i64>,
    pub function_name: Option<&'a str>,
    pub error_message: &'a str,
    pub failing_test: Option<&'a str>,
    pub confidence: f64,
    pub raw_log_snippet: &'a str,
}

/// One fix attempt, ordered by attempt_number within a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAttemptRecord {
    pub id: i64,
    pub failure_id: i64,
    pub attempt_number: i64,
    pub file_path: String,
    pub original_code: String,
    pub fixed_code: String,
    pub explanation: String,
    pub test_result: AttemptVerdict,
    pub error_output: Option<String>,
    pub created_at: i64,
}

/// Fields for appending a fix attempt.
#[derive(Debug, Clone)]
pub struct NewFixAttempt<'a> {
    pub failure_id: i64,
    pub attempt_number: i64,
    pub file_path: &'a str,
    pub original_code: &'a str,
    pub fixed_code: &'a str,
    pub explanation: &'a str,
    pub test_result: AttemptVerdict,
    pub error_output: Option<&'a str>,
}

/// The synthesized regression test for a failure (at most one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTestRecord {
    pub id: i64,
    pub failure_id: i64,
    pub test_name: String,
    pub test_code: String,
    pub target_file: String,
    pub imports_needed: Vec<String>,
    pub created_at: i64,
}

// =============================================================================
// Error
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task join error: {0}")]
    Join(String),
    #[error("not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Store
// =============================================================================

const TERMINAL_GUARD: &str = "('fixed', 'escalated', 'failed', 'not_reproduced')";

/// Durable store behind a single SQLite connection.
#[derive(Clone)]
pub struct FailureStore {
    conn: Arc<Mutex<Connection>>,
    /// Gate concurrent spawn_blocking calls so only one blocking thread
    /// waits on the connection mutex at a time.
    sem: Arc<Semaphore>,
}

impl FailureStore {
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;\
             PRAGMA synchronous=NORMAL;\
             PRAGMA foreign_keys=ON;\
             PRAGMA busy_timeout=5000;",
        )?;
        Self::create_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            sem: Arc::new(Semaphore::new(1)),
        })
    }

    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("NIGHTWATCH_DB") {
            return PathBuf::from(path);
        }
        PathBuf::from("nightwatch.sqlite")
    }

    /// Recover from mutex poisoning; the SQLite connection is still usable.
    fn with_conn<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&Connection) -> StoreResult<R>,
    {
        let guard = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    fn create_tables(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS failures (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               run_id INTEGER NOT NULL,\
               repo TEXT NOT NULL,\
               sha TEXT NOT NULL,\
               branch TEXT NOT NULL,\
               workflow_name TEXT NOT NULL,\
               created_at INTEGER NOT NULL,\
               error_type TEXT,\
               file_path TEXT,\
               line_number INTEGER,\
               function_name TEXT,\
               error_message TEXT,\
               failing_test TEXT,\
               confidence REAL,\
               raw_log_snippet TEXT,\
               status TEXT NOT NULL DEFAULT 'pending',\
               pr_url TEXT,\
               issue_url TEXT,\
               error TEXT,\
               completed_at INTEGER,\
               UNIQUE(run_id, repo)\
             );\
             CREATE TABLE IF NOT EXISTS fix_attempts (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               failure_id INTEGER NOT NULL REFERENCES failures(id) ON DELETE CASCADE,\
               attempt_number INTEGER NOT NULL,\
               file_path TEXT NOT NULL,\
               original_code TEXT NOT NULL,\
               fixed_code TEXT NOT NULL,\
               explanation TEXT NOT NULL,\
               test_result TEXT NOT NULL,\
               error_output TEXT,\
               created_at INTEGER NOT NULL\
             );\
             CREATE TABLE IF NOT EXISTS generated_tests (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               failure_id INTEGER NOT NULL UNIQUE REFERENCES failures(id) ON DELETE CASCADE,\
               test_name TEXT NOT NULL,\
               test_code TEXT NOT NULL,\
               target_file TEXT NOT NULL,\
               imports_needed TEXT NOT NULL DEFAULT '[]',\
               created_at INTEGER NOT NULL\
             );\
             CREATE INDEX IF NOT EXISTS idx_failures_repo ON failures(repo);\
             CREATE INDEX IF NOT EXISTS idx_failures_status ON failures(status);\
             CREATE INDEX IF NOT EXISTS idx_failures_run_id ON failures(run_id);\
             CREATE INDEX IF NOT EXISTS idx_fix_attempts_failure ON fix_attempts(failure_id);",
        )?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Failures
    // -------------------------------------------------------------------------

    /// Ingest a failure event. Idempotent under (run_id, repo): a replay
    /// overwrites the row, clears prior outcome columns, and resets status
    /// to `pending`. Returns the row id.
    pub async fn upsert_failure(&self, new: &NewFailure<'_>) -> StoreResult<i64> {
        let store = self.clone();
        let run_id = new.run_id;
        let repo = new.repo.to_string();
        let sha = new.sha.to_string();
        let branch = new.branch.to_string();
        let workflow_name = new.workflow_name.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let now = now_epoch();
                conn.execute(
                    "INSERT INTO failures (run_id, repo, sha, branch, workflow_name, created_at, status) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending') \
                     ON CONFLICT(run_id, repo) DO UPDATE SET \
                       sha = excluded.sha,\
                       branch = excluded.branch,\
                       workflow_name = excluded.workflow_name,\
                       created_at = excluded.created_at,\
                       error_type = NULL,\
                       file_path = NULL,\
                       line_number = NULL,\
                       function_name = NULL,\
                       error_message = NULL,\
                       failing_test = NULL,\
                       confidence = NULL,\
                       raw_log_snippet = NULL,\
                       status = 'pending',\
                       pr_url = NULL,\
                       issue_url = NULL,\
                       error = NULL,\
                       completed_at = NULL",
                    params![run_id, repo, sha, branch, workflow_name, now],
                )?;
                conn.query_row(
                    "SELECT id FROM failures WHERE run_id = ?1 AND repo = ?2",
                    params![run_id, repo],
                    |row| row.get(0),
                )
                .map_err(StoreError::Sqlite)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Advance the pipeline status of a non-terminal row.
    ///
    /// Terminal rows are immutable here; the only way back is the
    /// re-ingestion reset in [`upsert_failure`]. Returns whether a row
    /// changed.
    pub async fn update_status(&self, id: i64, status: FailureStatus) -> StoreResult<bool> {
        let store = self.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let rows = conn.execute(
                    &format!(
                        "UPDATE failures SET status = ?1 \
                         WHERE id = ?2 AND status NOT IN {}",
                        TERMINAL_GUARD
                    ),
                    params![status.as_str(), id],
                )?;
                Ok(rows > 0)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Write the analysis columns after diagnosis.
    pub async fn record_analysis(&self, id: i64, update: &AnalysisUpdate<'_>) -> StoreResult<()> {
        let store = self.clone();
        let error_type = update.error_type.to_string();
        let file_path = update.file_path.to_string();
        let line_number = update.line_number;
        let function_name = update.function_name.map(String::from);
        let error_message = update.error_message.to_string();
        let failing_test = update.failing_test.map(String::from);
        let confidence = update.confidence;
        let raw_log_snippet = update.raw_log_snippet.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let rows = conn.execute(
                    "UPDATE failures SET error_type = ?1, file_path = ?2, line_number = ?3, \
                     function_name = ?4, error_message = ?5, failing_test = ?6, \
                     confidence = ?7, raw_log_snippet = ?8 WHERE id = ?9",
                    params![
                        error_type,
                        file_path,
                        line_number,
                        function_name,
                        error_message,
                        failing_test,
                        confidence,
                        raw_log_snippet,
                        id,
                    ],
                )?;
                if rows == 0 {
                    return Err(StoreError::NotFound(format!("failure {id}")));
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Move a row to a terminal status and stamp its completion time.
    pub async fn complete_failure(
        &self,
        id: i64,
        status: FailureStatus,
        pr_url: Option<&str>,
        issue_url: Option<&str>,
        error: Option<&str>,
    ) -> StoreResult<()> {
        debug_assert!(status.is_terminal());
        let store = self.clone();
        let pr_url = pr_url.map(String::from);
        let issue_url = issue_url.map(String::from);
        let error = error.map(String::from);
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let rows = conn.execute(
                    &format!(
                        "UPDATE failures SET status = ?1, pr_url = ?2, issue_url = ?3, \
                         error = ?4, completed_at = ?5 \
                         WHERE id = ?6 AND status NOT IN {}",
                        TERMINAL_GUARD
                    ),
                    params![status.as_str(), pr_url, issue_url, error, now_epoch(), id],
                )?;
                if rows == 0 {
                    return Err(StoreError::NotFound(format!(
                        "failure {id} (missing or already terminal)"
                    )));
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn get_failure(&self, id: i64) -> StoreResult<FailureRecord> {
        let store = self.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.query_row(
                    &format!("{} WHERE id = ?1", SELECT_FAILURE),
                    params![id],
                    row_to_failure,
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => {
                        StoreError::NotFound(format!("failure {id}"))
                    }
                    other => StoreError::Sqlite(other),
                })
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn get_failure_by_key(
        &self,
        run_id: i64,
        repo: &str,
    ) -> StoreResult<Option<FailureRecord>> {
        let store = self.clone();
        let repo = repo.to_string();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let result = conn.query_row(
                    &format!("{} WHERE run_id = ?1 AND repo = ?2", SELECT_FAILURE),
                    params![run_id, repo],
                    row_to_failure,
                );
                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn list_failures(&self, limit: i64) -> StoreResult<Vec<FailureRecord>> {
        let store = self.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let mut stmt =
                    conn.prepare(&format!("{} ORDER BY id DESC LIMIT ?1", SELECT_FAILURE))?;
                let mut rows = stmt.query(params![limit])?;
                let mut failures = Vec::new();
                while let Some(row) = rows.next()? {
                    failures.push(row_to_failure(row)?);
                }
                Ok(failures)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Fix attempts
    // -------------------------------------------------------------------------

    pub async fn insert_fix_attempt(&self, new: &NewFixAttempt<'_>) -> StoreResult<i64> {
        let store = self.clone();
        let failure_id = new.failure_id;
        let attempt_number = new.attempt_number;
        let file_path = new.file_path.to_string();
        let original_code = new.original_code.to_string();
        let fixed_code = new.fixed_code.to_string();
        let explanation = new.explanation.to_string();
        let test_result = new.test_result;
        let error_output = new.error_output.map(String::from);
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO fix_attempts (failure_id, attempt_number, file_path, \
                     original_code, fixed_code, explanation, test_result, error_output, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        failure_id,
                        attempt_number,
                        file_path,
                        original_code,
                        fixed_code,
                        explanation,
                        test_result.as_str(),
                        error_output,
                        now_epoch(),
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn attempts_for(&self, failure_id: i64) -> StoreResult<Vec<FixAttemptRecord>> {
        let store = self.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, failure_id, attempt_number, file_path, original_code, \
                     fixed_code, explanation, test_result, error_output, created_at \
                     FROM fix_attempts WHERE failure_id = ?1 ORDER BY attempt_number, id",
                )?;
                let mut rows = stmt.query(params![failure_id])?;
                let mut attempts = Vec::new();
                while let Some(row) = rows.next()? {
                    attempts.push(row_to_attempt(row)?);
                }
                Ok(attempts)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Generated tests
    // -------------------------------------------------------------------------

    /// Record the synthesized test for a failure; a replay replaces it.
    pub async fn upsert_generated_test(
        &self,
        failure_id: i64,
        test_name: &str,
        test_code: &str,
        target_file: &str,
        imports_needed: &[String],
    ) -> StoreResult<i64> {
        let store = self.clone();
        let test_name = test_name.to_string();
        let test_code = test_code.to_string();
        let target_file = target_file.to_string();
        let imports_json = serde_json::to_string(imports_needed)?;
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO generated_tests (failure_id, test_name, test_code, \
                     target_file, imports_needed, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(failure_id) DO UPDATE SET \
                       test_name = excluded.test_name,\
                       test_code = excluded.test_code,\
                       target_file = excluded.target_file,\
                       imports_needed = excluded.imports_needed,\
                       created_at = excluded.created_at",
                    params![
                        failure_id,
                        test_name,
                        test_code,
                        target_file,
                        imports_json,
                        now_epoch()
                    ],
                )?;
                conn.query_row(
                    "SELECT id FROM generated_tests WHERE failure_id = ?1",
                    params![failure_id],
                    |row| row.get(0),
                )
                .map_err(StoreError::Sqlite)
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn generated_test_for(
        &self,
        failure_id: i64,
    ) -> StoreResult<Option<GeneratedTestRecord>> {
        let store = self.clone();
        let _permit = self.sem.acquire().await.expect("semaphore closed");
        tokio::task::spawn_blocking(move || {
            store.with_conn(|conn| {
                let result = conn.query_row(
                    "SELECT id, failure_id, test_name, test_code, target_file, \
                     imports_needed, created_at \
                     FROM generated_tests WHERE failure_id = ?1",
                    params![failure_id],
                    row_to_generated_test,
                );
                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

// =============================================================================
// Row converters
// =============================================================================

const SELECT_FAILURE: &str = "SELECT id, run_id, repo, sha, branch, workflow_name, created_at, \
     error_type, file_path, line_number, function_name, error_message, failing_test, \
     confidence, raw_log_snippet, status, pr_url, issue_url, error, completed_at FROM failures";

fn row_to_failure(row: &rusqlite::Row<'_>) -> rusqlite::Result<FailureRecord> {
    Ok(FailureRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        repo: row.get(2)?,
        sha: row.get(3)?,
        branch: row.get(4)?,
        workflow_name: row.get(5)?,
        created_at: row.get(6)?,
        error_type: row.get(7)?,
        file_path: row.get(8)?,
        line_number: row.get(9)?,
        function_name: row.get(10)?,
        error_message: row.get(11)?,
        failing_test: row.get(12)?,
        confidence: row.get(13)?,
        raw_log_snippet: row.get(14)?,
        status: FailureStatus::from_str(&row.get::<_, String>(15)?),
        pr_url: row.get(16)?,
        issue_url: row.get(17)?,
        error: row.get(18)?,
        completed_at: row.get(19)?,
    })
}

fn row_to_attempt(row: &rusqlite::Row<'_>) -> rusqlite::Result<FixAttemptRecord> {
    Ok(FixAttemptRecord {
        id: row.get(0)?,
        failure_id: row.get(1)?,
        attempt_number: row.get(2)?,
        file_path: row.get(3)?,
        original_code: row.get(4)?,
        fixed_code: row.get(5)?,
        explanation: row.get(6)?,
        test_result: AttemptVerdict::from_str(&row.get::<_, String>(7)?),
        error_output: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn row_to_generated_test(row: &rusqlite::Row<'_>) -> rusqlite::Result<GeneratedTestRecord> {
    let imports_json: String = row.get(5)?;
    Ok(GeneratedTestRecord {
        id: row.get(0)?,
        failure_id: row.get(1)?,
        test_name: row.get(2)?,
        test_code: row.get(3)?,
        target_file: row.get(4)?,
        imports_needed: serde_json::from_str(&imports_json).unwrap_or_default(),
        created_at: row.get(6)?,
    })
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

// =============================================================================
// Tests
// =============================================================================
