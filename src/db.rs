use crate::model::{ClassName, ResultRecord, ResultSummary, StoredResult, StudentEntry};
use crate::reconcile::reconcile_in_place;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

pub const DB_FILE_NAME: &str = "results.sqlite3";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("result not found: {0}")]
    NotFound(String),
    #[error("stored {column} for result {id} is unreadable: {source}")]
    Corrupt {
        id: String,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// IPC error code for a failed operation of the given kind
    /// (`query`, `insert`, `update`, `delete`).
    pub fn code(&self, op: &'static str) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::Corrupt { .. } => "db_corrupt_row",
            StoreError::Db(_) | StoreError::Json(_) => match op {
                "insert" => "db_insert_failed",
                "update" => "db_update_failed",
                "delete" => "db_delete_failed",
                _ => "db_query_failed",
            },
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS results(
            id TEXT PRIMARY KEY,
            year TEXT NOT NULL,
            class TEXT NOT NULL,
            data_json TEXT NOT NULL,
            summary_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_year ON results(year)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_year_class ON results(year, class)",
        [],
    )?;

    Ok(conn)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

const SELECT_COLUMNS: &str =
    "id, year, class, data_json, summary_json, created_at, updated_at";

struct RawRow {
    id: String,
    year: String,
    class: String,
    data_json: String,
    summary_json: String,
    created_at: String,
    updated_at: String,
}

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        year: row.get(1)?,
        class: row.get(2)?,
        data_json: row.get(3)?,
        summary_json: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl RawRow {
    fn decode(self) -> StoreResult<StoredResult> {
        let class: ClassName = serde_json::from_value(serde_json::Value::String(self.class))
            .map_err(|source| StoreError::Corrupt {
                id: self.id.clone(),
                column: "class",
                source,
            })?;
        let data: Vec<StudentEntry> =
            serde_json::from_str(&self.data_json).map_err(|source| StoreError::Corrupt {
                id: self.id.clone(),
                column: "data_json",
                source,
            })?;
        let summary: ResultSummary =
            serde_json::from_str(&self.summary_json).map_err(|source| StoreError::Corrupt {
                id: self.id.clone(),
                column: "summary_json",
                source,
            })?;
        Ok(StoredResult {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            record: ResultRecord {
                year: self.year,
                class,
                data,
                summary,
            },
        })
    }
}

/// Records for the admin table and the public results page, newest year first.
pub fn results_list(
    conn: &Connection,
    year: Option<&str>,
    class: Option<ClassName>,
) -> StoreResult<Vec<StoredResult>> {
    let mut sql = format!("SELECT {SELECT_COLUMNS} FROM results");
    let mut clauses: Vec<&str> = Vec::new();
    let mut bind: Vec<Value> = Vec::new();
    if let Some(y) = year {
        clauses.push("year = ?");
        bind.push(Value::Text(y.to_string()));
    }
    if let Some(c) = class {
        clauses.push("class = ?");
        bind.push(Value::Text(c.as_str().to_string()));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY year DESC, class, created_at, rowid");

    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(params_from_iter(bind), read_raw)?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter().map(RawRow::decode).collect()
}

pub fn results_years(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT year FROM results ORDER BY year DESC")?;
    let years = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(years)
}

pub fn results_get(conn: &Connection, id: &str) -> StoreResult<StoredResult> {
    let raw = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM results WHERE id = ?"),
            [id],
            read_raw,
        )
        .optional()?;
    raw.ok_or_else(|| StoreError::NotFound(id.to_string()))?
        .decode()
}

/// Stores a new record and returns its id. Derived fields are reconciled
/// before writing.
pub fn results_create(conn: &Connection, record: &ResultRecord) -> StoreResult<String> {
    let mut record = record.clone();
    reconcile_in_place(&mut record);

    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO results(id, year, class, data_json, summary_json, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &record.year,
            record.class.as_str(),
            serde_json::to_string(&record.data)?,
            serde_json::to_string(&record.summary)?,
            &now,
            &now,
        ),
    )?;
    Ok(id)
}

pub fn results_update(conn: &Connection, id: &str, record: &ResultRecord) -> StoreResult<()> {
    let mut record = record.clone();
    reconcile_in_place(&mut record);

    let changed = conn.execute(
        "UPDATE results
         SET year = ?, class = ?, data_json = ?, summary_json = ?, updated_at = ?
         WHERE id = ?",
        (
            &record.year,
            record.class.as_str(),
            serde_json::to_string(&record.data)?,
            serde_json::to_string(&record.summary)?,
            now_rfc3339(),
            id,
        ),
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}

pub fn results_delete(conn: &Connection, id: &str) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM results WHERE id = ?", [id])?;
    if changed == 0 {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}

/// Writes a stored result verbatim, keeping its id and timestamps. Used by
/// bundle import.
pub fn results_upsert_stored(conn: &Connection, stored: &StoredResult) -> StoreResult<()> {
    let mut record = stored.record.clone();
    reconcile_in_place(&mut record);
    conn.execute(
        "INSERT INTO results(id, year, class, data_json, summary_json, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           year = excluded.year,
           class = excluded.class,
           data_json = excluded.data_json,
           summary_json = excluded.summary_json,
           created_at = excluded.created_at,
           updated_at = excluded.updated_at",
        (
            &stored.id,
            &record.year,
            record.class.as_str(),
            serde_json::to_string(&record.data)?,
            serde_json::to_string(&record.summary)?,
            &stored.created_at,
            &stored.updated_at,
        ),
    )?;
    Ok(())
}
