//! SQLite storage for memory records

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::memory::{Memory, MemorySource};

const SELECT_COLUMNS: &str = r#"
    SELECT id, summary, full_text, level, topics, keywords, source,
           parent_ids, child_ids, created_at, access_count
    FROM memories
"#;

/// SQLite storage backend
///
/// Records are keyed by `id` and come back in insertion order. Every
/// write is a single statement, so readers never see a partial record.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open or create the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| Error::storage(e.to_string()))
    }

    /// Insert or overwrite a record by id
    ///
    /// `created_at` keeps its first stored value and `access_count`
    /// never moves backwards.
    pub fn put(&self, memory: &Memory) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO memories (
                id, summary, full_text, level, topics, keywords, source,
                parent_ids, child_ids, created_at, access_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                summary = excluded.summary,
                full_text = excluded.full_text,
                level = excluded.level,
                topics = excluded.topics,
                keywords = excluded.keywords,
                source = excluded.source,
                parent_ids = excluded.parent_ids,
                child_ids = excluded.child_ids,
                access_count = MAX(memories.access_count, excluded.access_count)
            "#,
            params![
                memory.id,
                memory.summary,
                memory.full_text,
                memory.level,
                serde_json::to_string(&memory.topics)?,
                serde_json::to_string(&memory.keywords)?,
                memory.source.to_string(),
                serde_json::to_string(&memory.parent_ids)?,
                serde_json::to_string(&memory.child_ids)?,
                memory.created_at.to_rfc3339(),
                memory.access_count,
            ],
        )?;

        tracing::debug!(id = %memory.id, "stored memory");
        Ok(())
    }

    /// Get a record by id
    pub fn get(&self, id: &str) -> Result<Option<Memory>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                MemoryRow::from_row,
            )
            .optional()?;

        row.map(MemoryRow::into_memory).transpose()
    }

    /// Whether a record with this id exists
    pub fn contains(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM memories WHERE id = ?1",
                params![id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of stored records
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Scan records in insertion order
    ///
    /// Records rejected by `predicate` do not count toward `limit`.
    pub fn scan<F>(&self, predicate: F, limit: Option<usize>) -> Result<Vec<Memory>>
    where
        F: Fn(&Memory) -> bool,
    {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY seq ASC"))?;
        let rows = stmt.query_map([], MemoryRow::from_row)?;

        let limit = limit.unwrap_or(usize::MAX);
        let mut memories = Vec::new();
        for row in rows {
            if memories.len() >= limit {
                break;
            }
            let memory = row?.into_memory()?;
            if predicate(&memory) {
                memories.push(memory);
            }
        }

        Ok(memories)
    }

    /// Scan every record in insertion order
    pub fn scan_all(&self) -> Result<Vec<Memory>> {
        self.scan(|_| true, None)
    }

    /// Bump the access counter; returns false if the id is unknown
    pub fn increment_access(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE memories SET access_count = access_count + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(changed > 0)
    }
}

/// Intermediate struct for reading from SQLite
struct MemoryRow {
    id: String,
    summary: String,
    full_text: String,
    level: u32,
    topics: String,
    keywords: String,
    source: String,
    parent_ids: String,
    child_ids: String,
    created_at: String,
    access_count: u32,
}

impl MemoryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            summary: row.get(1)?,
            full_text: row.get(2)?,
            level: row.get(3)?,
            topics: row.get(4)?,
            keywords: row.get(5)?,
            source: row.get(6)?,
            parent_ids: row.get(7)?,
            child_ids: row.get(8)?,
            created_at: row.get(9)?,
            access_count: row.get(10)?,
        })
    }

    fn into_memory(self) -> Result<Memory> {
        let source: MemorySource = self
            .source
            .parse()
            .map_err(|_| Error::storage(format!("Unknown source: {}", self.source)))?;

        Ok(Memory {
            id: self.id,
            summary: self.summary,
            full_text: self.full_text,
            level: self.level,
            topics: serde_json::from_str(&self.topics)?,
            keywords: serde_json::from_str(&self.keywords)?,
            source,
            parent_ids: serde_json::from_str(&self.parent_ids)?,
            child_ids: serde_json::from_str(&self.child_ids)?,
            created_at: chrono::DateTime::parse_from_rfc3339(&self.created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| Error::storage(e.to_string()))?,
            access_count: self.access_count,
        })
    }
}
