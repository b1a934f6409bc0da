use super::{Record, RecordStore, StoreError, StoreResult, UpdateExpression};
use log::trace;
use rusqlite::{params, Connection, Error as SqliteError, ErrorCode, OptionalExtension};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct SqliteBackend {
    connection: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens the `SQLite` database at the given path and ensures the `records` table exists.
    ///
    /// # Errors
    ///
    /// Returns a mapped `StoreError` if the database file cannot be opened or the table cannot be created
    pub fn new(path: &str) -> StoreResult<Self> {
        let connection = Connection::open(path).map_err(map_sqlite_error)?;
        trace!("Opened SQLite database at '{path}'");
        Self::with_connection(connection)
    }

    /// Opens a private in-memory database
    ///
    /// # Errors
    ///
    /// Returns a mapped `StoreError` if the table cannot be created
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(map_sqlite_error)?)
    }

    fn with_connection(connection: Connection) -> StoreResult<Self> {
        // One row per item; `tbl` namespaces the logical tables
        connection
            .execute(
                "
                CREATE TABLE IF NOT EXISTS records (
                    tbl  TEXT NOT NULL,
                    id   TEXT NOT NULL,
                    body TEXT NOT NULL,
                    PRIMARY KEY (tbl, id)
                )
                ",
                [],
            )
            .map_err(map_sqlite_error)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn connection(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Maps a `rusqlite::Error` into a `StoreError`, wrapping known SQLite-specific codes into domain-specific variants.
///
/// This function is used internally by all database operations.
fn map_sqlite_error(e: rusqlite::Error) -> StoreError {
    match e {
        SqliteError::SqliteFailure(code, _) => match code.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Timeout,
            ErrorCode::PermissionDenied | ErrorCode::ReadOnly => StoreError::PermissionDenied,
            ErrorCode::NotADatabase => StoreError::NotADatabase,
            ErrorCode::SchemaChanged => StoreError::SchemaChanged,
            _ => StoreError::Other(anyhow::anyhow!("SQLite error: {:?}", code)),
        },
        other => StoreError::Other(anyhow::Error::new(other)),
    }
}

fn upsert(connection: &Connection, table: &str, record: &Record) -> StoreResult<()> {
    let body = serde_json::to_string(record)?;
    connection
        .execute(
            "INSERT INTO records (tbl, id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT (tbl, id) DO UPDATE SET body = excluded.body",
            params![table, record.id(), body],
        )
        .map_err(map_sqlite_error)?;
    Ok(())
}

fn select_one(connection: &Connection, table: &str, id: &str) -> StoreResult<Option<Record>> {
    let body: Option<String> = connection
        .query_row(
            "SELECT body FROM records WHERE tbl = ?1 AND id = ?2",
            params![table, id],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_sqlite_error)?;

    body.map(|body| serde_json::from_str(&body).map_err(StoreError::from))
        .transpose()
}

fn decode_all(bodies: &[String]) -> StoreResult<Vec<Record>> {
    bodies
        .iter()
        .map(|body| serde_json::from_str(body).map_err(StoreError::from))
        .collect()
}

impl RecordStore for SqliteBackend {
    fn get(&self, table: &str, id: &str) -> StoreResult<Option<Record>> {
        let connection = self.connection()?;
        select_one(&connection, table, id)
    }

    fn put(&self, table: &str, record: &Record) -> StoreResult<()> {
        let connection = self.connection()?;
        upsert(&connection, table, record)
    }

    /// Returns every row of the table, decoded. No `ORDER BY`: callers get no ordering.
    ///
    /// # Errors
    ///
    /// Returns a mapped `SQLite` error if the query fails, or `StoreError::ItemCorrupted`
    /// if a stored body is not a valid record
    fn scan(&self, table: &str) -> StoreResult<Vec<Record>> {
        let connection = self.connection()?;
        let mut stmt = connection
            .prepare("SELECT body FROM records WHERE tbl = ?1")
            .map_err(map_sqlite_error)?;

        let bodies = stmt
            .query_map([table], |row| row.get::<_, String>(0))
            .map_err(map_sqlite_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(map_sqlite_error)?;

        decode_all(&bodies)
    }

    /// Read-modify-write inside one transaction, so concurrent updates to
    /// the same key apply one after the other.
    ///
    /// # Errors
    ///
    /// Returns a mapped `SQLite` error if any statement fails
    fn update(&self, table: &str, id: &str, expression: &UpdateExpression) -> StoreResult<()> {
        let mut connection = self.connection()?;
        let tx = connection.transaction().map_err(map_sqlite_error)?;

        let mut record = select_one(&tx, table, id)?.unwrap_or_else(|| Record::new(id));
        expression.apply(&mut record);
        upsert(&tx, table, &record)?;

        tx.commit().map_err(map_sqlite_error)
    }

    fn delete(&self, table: &str, id: &str) -> StoreResult<()> {
        let rows = self
            .connection()?
            .execute(
                "DELETE FROM records WHERE tbl = ?1 AND id = ?2",
                params![table, id],
            )
            .map_err(map_sqlite_error)?;
        trace!("Deleted {rows} row(s) for '{id}' in '{table}'");
        Ok(())
    }

    /// String lookups run inside `SQLite` through `json_extract`; other
    /// value types fall back to scanning.
    fn query_by(&self, table: &str, attribute: &str, value: &Value) -> StoreResult<Vec<Record>> {
        let Value::String(wanted) = value else {
            return Ok(crate::filter_by(self.scan(table)?, attribute, value));
        };

        let path = format!("$.\"{}\"", attribute.replace('"', "\\\""));
        let connection = self.connection()?;
        let mut stmt = connection
            .prepare(
                "SELECT body FROM records
                 WHERE tbl = ?1 AND json_type(body, ?2) = 'text' AND json_extract(body, ?2) = ?3",
            )
            .map_err(map_sqlite_error)?;

        let bodies = stmt
            .query_map(params![table, path, wanted], |row| row.get::<_, String>(0))
            .map_err(map_sqlite_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(map_sqlite_error)?;

        decode_all(&bodies)
    }
}
