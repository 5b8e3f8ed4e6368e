//! SQLite-backed persistence gateway.

use super::{Filter, PersistenceGateway};
use crate::config::StorageConfig;
use crate::context::RequestContext;
use crate::entity::{
    Entity, ProjectRecord, RecordMeta, RoleRecord, StackRecord, VirtualMachineRecord,
};
use crate::error::{InventoryError, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Columns every inventory table starts with, ahead of the semantic ones.
const META_COLUMNS: &str = "id, created_at, updated_at, deleted_at";
const META_COLUMN_COUNT: usize = 4;

/// Inventory store on a single SQLite connection.
///
/// Thread-safe via internal mutex on the connection. Clones share the
/// connection.
#[derive(Clone)]
pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteGateway {
    /// Open (or create) the database at `db_path`.
    ///
    /// The value `":memory:"` opens a private in-memory database instead.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if db_path.as_os_str() == StorageConfig::IN_MEMORY {
            return Self::in_memory();
        }

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| InventoryError::Io {
                message: format!("Failed to create database directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| InventoryError::Storage {
            message: format!("Failed to open database {}: {}", db_path.display(), e),
            source: Some(e),
        })?;
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;

        info!("Opened inventory database at {}", db_path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(db_path.to_path_buf()),
        })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| InventoryError::Storage {
            message: format!("Failed to open in-memory database: {}", e),
            source: Some(e),
        })?;
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;

        debug!("Opened in-memory inventory database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Database file path, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.busy_timeout(Duration::from_millis(u64::from(
            StorageConfig::BUSY_TIMEOUT_MS,
        )))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            ",
        )
        .map_err(|e| InventoryError::Storage {
            message: format!("Failed to set pragmas: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        create_table::<ProjectRecord>(conn)?;
        create_table::<StackRecord>(conn)?;
        create_table::<RoleRecord>(conn)?;
        create_table::<VirtualMachineRecord>(conn)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| InventoryError::Storage {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }
}

/// One table per kind. Natural keys are unique among live rows only, so a
/// deleted record never blocks re-creating it.
fn create_table<E: Entity>(conn: &Connection) -> Result<()> {
    let columns = E::COLUMNS
        .iter()
        .map(|f| format!("{} TEXT NOT NULL DEFAULT ''", f.column()))
        .collect::<Vec<_>>()
        .join(",\n                ");
    let key = E::KEY
        .iter()
        .map(|f| f.column())
        .collect::<Vec<_>>()
        .join(", ");

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                {columns}
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_live_key
                ON {table}({key}) WHERE deleted_at IS NULL;",
        table = E::TABLE,
    ))
    .map_err(|e| InventoryError::Storage {
        message: format!("Failed to initialize {} schema: {}", E::TABLE, e),
        source: Some(e),
    })
}

fn semantic_columns<E: Entity>() -> String {
    E::COLUMNS
        .iter()
        .map(|f| f.column())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `WHERE` clause over live rows plus its bound values, in order.
fn where_live(filter: &Filter) -> (String, Vec<String>) {
    let mut clause = String::from("deleted_at IS NULL");
    let mut values = Vec::new();
    for (field, value) in filter.terms() {
        clause.push_str(&format!(" AND {} = ?", field.column()));
        values.push(value.to_string());
    }
    (clause, values)
}

/// Read an RFC 3339 column. A corrupt value fails the row rather than being
/// replaced.
fn timestamp_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let Some(value) = row.get::<_, Option<String>>(index)? else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn required_timestamp(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    timestamp_column(row, index)?.ok_or(rusqlite::Error::InvalidColumnType(
        index,
        "timestamp".to_string(),
        Type::Null,
    ))
}

fn row_to_record<E: Entity>(row: &Row<'_>) -> rusqlite::Result<E> {
    let meta = RecordMeta {
        id: row.get(0)?,
        created_at: required_timestamp(row, 1)?,
        updated_at: required_timestamp(row, 2)?,
        deleted_at: timestamp_column(row, 3)?,
    };
    let mut values = Vec::with_capacity(E::COLUMNS.len());
    for index in 0..E::COLUMNS.len() {
        values.push(row.get::<_, String>(META_COLUMN_COUNT + index)?);
    }
    Ok(E::from_columns(meta, values))
}

/// First live record matching `filter`, in arrival order.
fn find_live<E: Entity>(conn: &Connection, filter: &Filter) -> Result<Option<E>> {
    let (clause, values) = where_live(filter);
    let sql = format!(
        "SELECT {}, {} FROM {} WHERE {} ORDER BY id LIMIT 1",
        META_COLUMNS,
        semantic_columns::<E>(),
        E::TABLE,
        clause
    );
    let record = conn
        .query_row(&sql, params_from_iter(values.iter()), row_to_record::<E>)
        .optional()?;
    Ok(record)
}

/// Whether a live record other than `exclude` holds `record`'s natural key.
fn key_taken<E: Entity>(conn: &Connection, record: &E, exclude: Option<i64>) -> Result<bool> {
    let (mut clause, values) = where_live(&Filter::from_terms(record.key_values()));
    if let Some(id) = exclude {
        clause.push_str(&format!(" AND id != {}", id));
    }
    let sql = format!("SELECT 1 FROM {} WHERE {} LIMIT 1", E::TABLE, clause);
    let taken = conn
        .query_row(&sql, params_from_iter(values.iter()), |_| Ok(()))
        .optional()?
        .is_some();
    Ok(taken)
}

fn conflict<E: Entity>(record: &E) -> InventoryError {
    InventoryError::Conflict {
        kind: E::KIND.to_string(),
        key: record.display_key(),
    }
}

fn not_found<E: Entity>(key: &Filter) -> InventoryError {
    InventoryError::NotFound {
        kind: E::KIND.to_string(),
        key: key.describe(),
    }
}

/// A unique-index violation that slipped past the check is still a conflict.
fn write_error<E: Entity>(err: rusqlite::Error, record: &E) -> InventoryError {
    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        conflict(record)
    } else {
        err.into()
    }
}

impl PersistenceGateway for SqliteGateway {
    fn list<E: Entity>(&self, ctx: &RequestContext, filter: &Filter) -> Result<Vec<E>> {
        ctx.check()?;
        let conn = self.lock()?;

        let (clause, values) = where_live(filter);
        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} ORDER BY id",
            META_COLUMNS,
            semantic_columns::<E>(),
            E::TABLE,
            clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            ctx.check()?;
            records.push(row_to_record::<E>(row)?);
        }

        Ok(records)
    }

    fn get<E: Entity>(&self, ctx: &RequestContext, key: &Filter) -> Result<E> {
        ctx.check()?;
        let conn = self.lock()?;

        find_live::<E>(&conn, key)?.ok_or_else(|| not_found::<E>(key))
    }

    fn create<E: Entity>(&self, ctx: &RequestContext, record: &E) -> Result<E> {
        ctx.check()?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if key_taken(&tx, record, None)? {
            return Err(conflict(record));
        }

        let now = Utc::now();
        let placeholders = vec!["?"; E::COLUMNS.len() + 2].join(", ");
        let sql = format!(
            "INSERT INTO {} (created_at, updated_at, {}) VALUES ({})",
            E::TABLE,
            semantic_columns::<E>(),
            placeholders
        );
        let mut values = vec![now.to_rfc3339(), now.to_rfc3339()];
        values.extend(E::COLUMNS.iter().map(|f| record.field(*f).to_string()));

        ctx.check()?;
        tx.execute(&sql, params_from_iter(values.iter()))
            .map_err(|e| write_error(e, record))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        let mut stored = record.clone();
        *stored.meta_mut() = RecordMeta {
            id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        debug!("Inserted {} row {}: {}", E::KIND, id, stored.display_key());
        Ok(stored)
    }

    fn update<E: Entity>(&self, ctx: &RequestContext, key: &Filter, record: &E) -> Result<E> {
        ctx.check()?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let target = find_live::<E>(&tx, key)?.ok_or_else(|| not_found::<E>(key))?;
        let id = target.meta().id;
        if key_taken(&tx, record, Some(id))? {
            return Err(conflict(record));
        }

        let now = Utc::now();
        let assignments = E::COLUMNS
            .iter()
            .map(|f| format!("{} = ?", f.column()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET updated_at = ?, {} WHERE id = ?",
            E::TABLE,
            assignments
        );
        let mut values = vec![now.to_rfc3339()];
        values.extend(E::COLUMNS.iter().map(|f| record.field(*f).to_string()));
        values.push(id.to_string());

        ctx.check()?;
        tx.execute(&sql, params_from_iter(values.iter()))
            .map_err(|e| write_error(e, record))?;
        tx.commit()?;

        let mut stored = record.clone();
        *stored.meta_mut() = RecordMeta {
            id,
            created_at: target.meta().created_at,
            updated_at: now,
            deleted_at: None,
        };

        debug!(
            "Updated {} row {}: {} -> {}",
            E::KIND,
            id,
            target.display_key(),
            stored.display_key()
        );
        Ok(stored)
    }

    fn delete<E: Entity>(&self, ctx: &RequestContext, key: &Filter) -> Result<usize> {
        ctx.check()?;
        let conn = self.lock()?;

        let (clause, filter_values) = where_live(key);
        let sql = format!(
            "UPDATE {table} SET deleted_at = ?, updated_at = ?
             WHERE id = (SELECT id FROM {table} WHERE {clause} ORDER BY id LIMIT 1)",
            table = E::TABLE,
        );
        let now = Utc::now().to_rfc3339();
        let mut values = vec![now.clone(), now];
        values.extend(filter_values);

        let rows_affected = conn.execute(&sql, params_from_iter(values.iter()))?;
        if rows_affected > 0 {
            debug!("Soft-deleted {}: {}", E::KIND, key.describe());
        }

        Ok(rows_affected)
    }
}
