//! SQLite-backed entity store

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::application::BoxError;
use crate::domain::{EntityRecord, IcdEntity};
use crate::infrastructure::traits::EntityStore;
use crate::infrastructure::{InfraError, InfraResult};

const ENTITY_COLUMNS: &str = "who_id, parent_who_id, code, title, definition, release_id, \
     release_date, raw_json, content_hash, created_at, updated_at";

/// Store of disease leaves in table `icd_entities`.
#[derive(Debug)]
pub struct SqliteEntityStore {
    path: Option<PathBuf>,
    conn: Connection,
}

impl SqliteEntityStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> InfraResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
            }
        }
        debug!("open: {}", path.display());
        let conn = Connection::open(&path)
            .map_err(|e| InfraError::sqlite(format!("open {}", path.display()), e))?;
        let store = Self {
            path: Some(path),
            conn,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> InfraResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| InfraError::sqlite("open in-memory database", e))?;
        let store = Self { path: None, conn };
        store.migrate()?;
        Ok(store)
    }

    /// Database file, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn migrate(&self) -> InfraResult<()> {
        self.conn
            .execute_batch(
                r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS icd_entities (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              who_id INTEGER NOT NULL UNIQUE,
              parent_who_id INTEGER,
              code TEXT,
              title TEXT,
              definition TEXT,
              release_id TEXT,
              release_date TEXT,
              raw_json TEXT NOT NULL,
              content_hash TEXT NOT NULL,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_icd_entities_parent
              ON icd_entities(parent_who_id);
            "#,
            )
            .map_err(|e| InfraError::sqlite("create schema", e))
    }
}

fn to_key(id: u64) -> Result<i64, BoxError> {
    i64::try_from(id).map_err(|_| format!("identifier {} exceeds SQLite integer range", id).into())
}

fn from_key(idx: usize, value: i64) -> rusqlite::Result<u64> {
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<IcdEntity> {
    let parent: Option<i64> = row.get(1)?;
    Ok(IcdEntity {
        who_id: from_key(0, row.get(0)?)?,
        parent_who_id: parent.map(|p| from_key(1, p)).transpose()?,
        code: row.get(2)?,
        title: row.get(3)?,
        definition: row.get(4)?,
        release_id: row.get(5)?,
        release_date: row.get::<_, Option<NaiveDate>>(6)?,
        raw_json: row.get(7)?,
        content_hash: row.get(8)?,
        created_at: row.get::<_, DateTime<Utc>>(9)?,
        updated_at: row.get::<_, DateTime<Utc>>(10)?,
    })
}

impl EntityStore for SqliteEntityStore {
    fn find(&self, who_id: u64) -> Result<Option<IcdEntity>, BoxError> {
        let sql = format!("SELECT {} FROM icd_entities WHERE who_id = ?1", ENTITY_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![to_key(who_id)?], entity_from_row)
            .optional()?)
    }

    fn content_hash(&self, who_id: u64) -> Result<Option<String>, BoxError> {
        Ok(self
            .conn
            .query_row(
                "SELECT content_hash FROM icd_entities WHERE who_id = ?1",
                params![to_key(who_id)?],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }

    fn upsert(&self, record: &EntityRecord) -> Result<(), BoxError> {
        let now = Utc::now();
        let parent = record.parent_who_id.map(to_key).transpose()?;
        self.conn.execute(
            r#"
            INSERT INTO icd_entities(
              who_id, parent_who_id, code, title, definition, release_id,
              release_date, raw_json, content_hash, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            ON CONFLICT(who_id) DO UPDATE SET
              parent_who_id=excluded.parent_who_id,
              code=excluded.code,
              title=excluded.title,
              definition=excluded.definition,
              release_id=excluded.release_id,
              release_date=excluded.release_date,
              raw_json=excluded.raw_json,
              content_hash=excluded.content_hash,
              updated_at=excluded.updated_at
            "#,
            params![
                to_key(record.who_id)?,
                parent,
                record.code,
                record.title,
                record.definition,
                record.release_id,
                record.release_date,
                record.raw_json,
                record.content_hash,
                now,
            ],
        )?;
        Ok(())
    }

    fn children_of(&self, parent_who_id: u64) -> Result<Vec<IcdEntity>, BoxError> {
        let sql = format!(
            "SELECT {} FROM icd_entities WHERE parent_who_id = ?1 ORDER BY id",
            ENTITY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![to_key(parent_who_id)?], entity_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn count(&self) -> Result<u64, BoxError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM icd_entities", [], |row| row.get(0))?;
        Ok(from_key(0, n)?)
    }
}
