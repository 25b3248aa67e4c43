use rusqlite::{Connection, params};
use std::path::Path;

/// SQLite-backed store for pipeline run history.
pub struct Store {
    conn: Connection,
}

/// One persisted step attempt.
#[derive(Debug, Clone, Copy)]
pub struct AttemptRecord<'a> {
    pub id: &'a str,
    pub run_id: &'a str,
    pub task_name: &'a str,
    pub attempt: u32,
    pub status: &'a str,
    pub started_at: &'a str,
    pub finished_at: Option<&'a str>,
    pub duration_ms: Option<i64>,
    pub error: Option<&'a str>,
}

impl Store {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pipeline_runs (
                id TEXT PRIMARY KEY,
                pipeline TEXT NOT NULL,
                trigger_type TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                duration_ms INTEGER
            );
            CREATE TABLE IF NOT EXISTS task_runs (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL REFERENCES pipeline_runs(id),
                task_name TEXT NOT NULL,
                attempt INTEGER NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                duration_ms INTEGER,
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_pipeline_runs_pipeline ON pipeline_runs(pipeline);
            CREATE INDEX IF NOT EXISTS idx_pipeline_runs_status ON pipeline_runs(status);
            CREATE INDEX IF NOT EXISTS idx_task_runs_run_id ON task_runs(run_id);"
        )?;
        Ok(())
    }

    /// Record a new pipeline run as started.
    pub fn insert_pipeline_run(
        &self,
        id: &str,
        pipeline: &str,
        trigger_type: &str,
        started_at: &str,
    ) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO pipeline_runs (id, pipeline, trigger_type, status, started_at)
             VALUES (?1, ?2, ?3, 'running', ?4)",
            params![id, pipeline, trigger_type, started_at],
        )?;
        Ok(())
    }

    pub fn complete_pipeline_run(
        &self,
        id: &str,
        status: &str,
        finished_at: &str,
        duration_ms: i64,
    ) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE pipeline_runs SET status = ?2, finished_at = ?3, duration_ms = ?4 WHERE id = ?1",
            params![id, status, finished_at, duration_ms],
        )?;
        Ok(())
    }

    /// Record one attempt of a step.
    pub fn insert_task_run(&self, record: &AttemptRecord<'_>) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO task_runs (id, run_id, task_name, attempt, status, started_at, finished_at, duration_ms, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.run_id,
                record.task_name,
                record.attempt,
                record.status,
                record.started_at,
                record.finished_at,
                record.duration_ms,
                record.error,
            ],
        )?;
        Ok(())
    }

    /// Mark in-flight runs as crashed (for crash recovery on startup).
    pub fn mark_inflight_as_crashed(&self) -> Result<usize, rusqlite::Error> {
        let count = self.conn.execute(
            "UPDATE pipeline_runs SET status = 'crashed' WHERE status = 'running'",
            [],
        )?;
        Ok(count)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRunRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pipeline, trigger_type, status, started_at, finished_at, duration_ms
             FROM pipeline_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1"
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(PipelineRunRow {
                id: row.get(0)?,
                pipeline: row.get(1)?,
                trigger_type: row.get(2)?,
                status: row.get(3)?,
                started_at: row.get(4)?,
                finished_at: row.get(5)?,
                duration_ms: row.get(6)?,
            })
        })?;
        rows.collect()
    }

    /// Step attempts of one run, in execution order.
    pub fn task_runs_for(&self, run_id: &str) -> Result<Vec<TaskRunRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, task_name, attempt, status, started_at, finished_at, duration_ms, error
             FROM task_runs WHERE run_id = ?1 ORDER BY rowid"
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(TaskRunRow {
                id: row.get(0)?,
                run_id: row.get(1)?,
                task_name: row.get(2)?,
                attempt: row.get(3)?,
                status: row.get(4)?,
                started_at: row.get(5)?,
                finished_at: row.get(6)?,
                duration_ms: row.get(7)?,
                error: row.get(8)?,
            })
        })?;
        rows.collect()
    }
}

#[derive(Debug)]
pub struct PipelineRunRow {
    pub id: String,
    pub pipeline: String,
    pub trigger_type: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug)]
pub struct TaskRunRow {
    pub id: String,
    pub run_id: String,
    pub task_name: String,
    pub attempt: u32,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}
