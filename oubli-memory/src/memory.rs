//! Memory records and the store that coordinates them

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::{Graph, HalfEdge, IntegrityWarning};
use crate::retrieval::{RetrievalEngine, ScoredMemory};
use crate::stats::MemoryStats;
use crate::storage::{JsonlArchive, SqliteStorage};

/// Where a memory came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    /// Observed during a conversation
    #[default]
    Conversation,

    /// Brought in from outside (files, archives)
    Import,

    /// Derived from other memories
    Synthesis,
}

impl std::fmt::Display for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemorySource::Conversation => write!(f, "conversation"),
            MemorySource::Import => write!(f, "import"),
            MemorySource::Synthesis => write!(f, "synthesis"),
        }
    }
}

impl FromStr for MemorySource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "conversation" => Ok(MemorySource::Conversation),
            "import" => Ok(MemorySource::Import),
            "synthesis" => Ok(MemorySource::Synthesis),
            other => Err(Error::invalid_input(format!("Unknown source: {}", other))),
        }
    }
}

/// A stored memory
///
/// Level 0 is a raw observation; level 1 and up are insights
/// synthesized from the memories listed in `parent_ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique memory ID, never reused
    pub id: String,

    /// Short description, never empty
    pub summary: String,

    #[serde(default)]
    pub full_text: String,

    #[serde(default)]
    pub level: u32,

    /// Tags used for grouping
    #[serde(default)]
    pub topics: Vec<String>,

    /// Terms used for search matching
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub source: MemorySource,

    /// Memories this one was derived from
    #[serde(default)]
    pub parent_ids: Vec<String>,

    /// Memories derived from this one
    #[serde(default)]
    pub child_ids: Vec<String>,

    /// Set once when the memory is created
    pub created_at: DateTime<Utc>,

    /// How many times this memory has been fetched by id
    #[serde(default)]
    pub access_count: u32,
}

impl Memory {
    fn validate(&self) -> Result<()> {
        if self.summary.trim().is_empty() {
            return Err(Error::invalid_input("summary must not be empty"));
        }
        if self.id.trim().is_empty() {
            return Err(Error::invalid_input("id must not be empty"));
        }
        Ok(())
    }
}

/// Trim tags, drop blanks and duplicates, keep first-seen order
pub(crate) fn tag_set(values: Vec<String>) -> Vec<String> {
    let mut set: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !set.iter().any(|v| v == value) {
            set.push(value.to_string());
        }
    }
    set
}

/// Drop blank and duplicate ids, keep first-seen order
pub(crate) fn id_set(values: Vec<String>) -> Vec<String> {
    let mut set: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !value.trim().is_empty() && !set.contains(&value) {
            set.push(value);
        }
    }
    set
}

/// Input for adding a memory
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    summary: String,
    level: u32,
    full_text: String,
    topics: Vec<String>,
    keywords: Vec<String>,
    source: MemorySource,
    parent_ids: Vec<String>,
}

impl NewMemory {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn full_text(mut self, full_text: impl Into<String>) -> Self {
        self.full_text = full_text.into();
        self
    }

    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn source(mut self, source: MemorySource) -> Self {
        self.source = source;
        self
    }

    pub fn parent_ids(mut self, parent_ids: Vec<String>) -> Self {
        self.parent_ids = parent_ids;
        self
    }

    /// Validate and stamp a new record with a fresh id and timestamp
    pub fn into_memory(self) -> Result<Memory> {
        let memory = Memory {
            id: Uuid::new_v4().to_string(),
            summary: self.summary,
            full_text: self.full_text,
            level: self.level,
            topics: tag_set(self.topics),
            keywords: tag_set(self.keywords),
            source: self.source,
            parent_ids: id_set(self.parent_ids),
            child_ids: Vec::new(),
            created_at: Utc::now(),
            access_count: 0,
        };
        memory.validate()?;
        Ok(memory)
    }
}

/// Partial replacement of a memory's mutable fields
///
/// `None` leaves the field as it is. `id`, `created_at` and
/// `access_count` cannot be changed.
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    pub summary: Option<String>,
    pub full_text: Option<String>,
    pub level: Option<u32>,
    pub topics: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub source: Option<MemorySource>,
    pub parent_ids: Option<Vec<String>>,
    pub child_ids: Option<Vec<String>>,
}

impl MemoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.full_text.is_none()
            && self.level.is_none()
            && self.topics.is_none()
            && self.keywords.is_none()
            && self.source.is_none()
            && self.parent_ids.is_none()
            && self.child_ids.is_none()
    }

    fn validate(&self) -> Result<()> {
        match &self.summary {
            Some(summary) if summary.trim().is_empty() => {
                Err(Error::invalid_input("summary must not be empty"))
            }
            _ => Ok(()),
        }
    }

    fn apply_to(self, memory: &mut Memory) {
        if let Some(summary) = self.summary {
            memory.summary = summary;
        }
        if let Some(full_text) = self.full_text {
            memory.full_text = full_text;
        }
        if let Some(level) = self.level {
            memory.level = level;
        }
        if let Some(topics) = self.topics {
            memory.topics = tag_set(topics);
        }
        if let Some(keywords) = self.keywords {
            memory.keywords = tag_set(keywords);
        }
        if let Some(source) = self.source {
            memory.source = source;
        }
        if let Some(parent_ids) = self.parent_ids {
            Graph::set_parent_ids_raw(memory, parent_ids);
        }
        if let Some(child_ids) = self.child_ids {
            Graph::set_child_ids_raw(memory, child_ids);
        }
    }
}

/// Result of adding a memory
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub id: String,
    /// Parents that did not exist when the memory was added
    pub warnings: Vec<IntegrityWarning>,
}

/// Counts from an archive import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    /// Records whose id was already present
    pub skipped: usize,
}

/// The main memory store
///
/// Constructed explicitly and handed to whoever serves tool calls;
/// dropping it closes the database.
pub struct MemoryStore {
    sqlite: SqliteStorage,
}

impl MemoryStore {
    /// Open the store kept under `data_dir`, creating it if needed
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&Config::with_data_dir(data_dir.as_ref()))
    }

    /// Open the store at the location described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        config.ensure_dirs()?;
        let sqlite = SqliteStorage::open(config.sqlite_path())?;
        tracing::info!("Opened memory store at {:?}", config.sqlite_path());
        Ok(Self { sqlite })
    }

    /// Create a store backed by an in-memory database
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            sqlite: SqliteStorage::in_memory()?,
        })
    }

    /// Get the SQLite storage
    pub fn sqlite(&self) -> &SqliteStorage {
        &self.sqlite
    }

    /// Graph view over this store
    pub fn graph(&self) -> Graph<'_> {
        Graph::new(&self.sqlite)
    }

    /// Add a memory and return its id
    pub fn add(&self, new: NewMemory) -> Result<String> {
        self.add_detailed(new).map(|outcome| outcome.id)
    }

    /// Add a memory, reporting parents that could not be linked
    ///
    /// The child is written before its parents are updated; a crash in
    /// between leaves one-sided edges, which [`Graph::half_edges`] finds.
    pub fn add_detailed(&self, new: NewMemory) -> Result<AddOutcome> {
        let memory = new.into_memory()?;
        self.sqlite.put(&memory)?;
        let warnings = self.graph().link_parents(&memory)?;

        tracing::debug!(id = %memory.id, level = memory.level, "added memory");
        Ok(AddOutcome {
            id: memory.id,
            warnings,
        })
    }

    /// Fetch a memory by id, counting the access
    pub fn get(&self, id: &str) -> Result<Option<Memory>> {
        if !self.sqlite.increment_access(id)? {
            return Ok(None);
        }
        self.sqlite.get(id)
    }

    /// Fetch a memory by id without counting the access
    pub fn peek(&self, id: &str) -> Result<Option<Memory>> {
        self.sqlite.get(id)
    }

    /// Best keyword matches for `query`
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Memory>> {
        Ok(self
            .search_scored(query, limit)?
            .into_iter()
            .map(|hit| hit.memory)
            .collect())
    }

    /// Best keyword matches along with where each one matched
    pub fn search_scored(&self, query: &str, limit: usize) -> Result<Vec<ScoredMemory>> {
        RetrievalEngine::new(&self.sqlite).search(query, limit)
    }

    /// Memories at exactly `level`, in insertion order
    pub fn get_by_level(&self, level: u32, limit: usize) -> Result<Vec<Memory>> {
        self.sqlite.scan(|m| m.level == level, Some(limit))
    }

    /// Memories in insertion order
    pub fn get_all(&self, limit: usize) -> Result<Vec<Memory>> {
        self.sqlite.scan(|_| true, Some(limit))
    }

    /// Replace the supplied fields; returns false if the id is unknown
    ///
    /// A `child_ids` overwrite is taken as-is: the listed children are not
    /// given a matching parent pointer.
    pub fn update(&self, id: &str, update: MemoryUpdate) -> Result<bool> {
        update.validate()?;

        let Some(mut memory) = self.sqlite.get(id)? else {
            return Ok(false);
        };
        if update.is_empty() {
            return Ok(true);
        }

        update.apply_to(&mut memory);
        self.sqlite.put(&memory)?;

        tracing::debug!(id, "updated memory");
        Ok(true)
    }

    /// Grouped counts over every stored memory
    pub fn get_stats(&self) -> Result<MemoryStats> {
        MemoryStats::compute(&self.sqlite)
    }

    /// Memories derived, directly or not, from `id`
    pub fn descendants(&self, id: &str) -> Result<Vec<Memory>> {
        self.graph().descendants(id)
    }

    /// Memories `id` was derived from, directly or not
    pub fn ancestors(&self, id: &str) -> Result<Vec<Memory>> {
        self.graph().ancestors(id)
    }

    /// Edges recorded on only one of their two records
    pub fn half_edges(&self) -> Result<Vec<HalfEdge>> {
        self.graph().half_edges()
    }

    /// Write every memory to a JSONL archive
    pub fn export_jsonl(&self, path: impl AsRef<Path>) -> Result<usize> {
        let memories = self.sqlite.scan_all()?;
        let count = JsonlArchive::new(path.as_ref()).write_all(&memories)?;
        tracing::info!("Exported {} memories to {:?}", count, path.as_ref());
        Ok(count)
    }

    /// Load memories from a JSONL archive, skipping ids already present
    ///
    /// Records are stored exactly as archived, edges included. Nothing is
    /// written if any record in the archive is invalid.
    pub fn import_jsonl(&self, path: impl AsRef<Path>) -> Result<ImportSummary> {
        let memories = JsonlArchive::new(path.as_ref()).read_all()?;
        for memory in &memories {
            memory.validate()?;
        }

        let mut summary = ImportSummary::default();
        for memory in memories {
            if self.sqlite.contains(&memory.id)? {
                summary.skipped += 1;
                continue;
            }
            self.sqlite.put(&memory)?;
            summary.imported += 1;
        }

        tracing::info!(
            "Imported {} memories from {:?} ({} already present)",
            summary.imported,
            path.as_ref(),
            summary.skipped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_summary_rejected_before_write() {
        let store = MemoryStore::in_memory().unwrap();

        let result = store.add(NewMemory::new("   "));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(store.sqlite().count().unwrap(), 0);
    }

    #[test]
    fn test_new_memory_defaults() {
        let memory = NewMemory::new("s").into_memory().unwrap();
        assert_eq!(memory.level, 0);
        assert_eq!(memory.full_text, "");
        assert!(memory.topics.is_empty());
        assert!(memory.keywords.is_empty());
        assert!(memory.parent_ids.is_empty());
        assert!(memory.child_ids.is_empty());
        assert_eq!(memory.source, MemorySource::Conversation);
        assert_eq!(memory.access_count, 0);
    }

    #[test]
    fn test_tag_sets_are_ordered_and_unique() {
        let memory = NewMemory::new("s")
            .topics(vec![" rust ".into(), "db".into(), "rust".into(), "".into()])
            .into_memory()
            .unwrap();
        assert_eq!(memory.topics, vec!["rust", "db"]);
    }

    #[test]
    fn test_source_round_trips_through_str() {
        for source in [
            MemorySource::Conversation,
            MemorySource::Import,
            MemorySource::Synthesis,
        ] {
            assert_eq!(source.to_string().parse::<MemorySource>().unwrap(), source);
        }
        assert!("dream".parse::<MemorySource>().is_err());
    }

    #[test]
    fn test_get_counts_access_but_search_and_list_do_not() {
        let store = MemoryStore::in_memory().unwrap();
        let id = store.add(NewMemory::new("coffee order")).unwrap();

        store.search("coffee", 5).unwrap();
        store.get_all(10).unwrap();
        store
            .update(&id, MemoryUpdate {
                full_text: Some("oat latte".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.peek(&id).unwrap().unwrap().access_count, 0);

        store.get(&id).unwrap();
        assert_eq!(store.get(&id).unwrap().unwrap().access_count, 2);
    }

    #[test]
    fn test_update_rejects_blank_summary() {
        let store = MemoryStore::in_memory().unwrap();
        let id = store.add(NewMemory::new("keep me")).unwrap();

        let result = store.update(&id, MemoryUpdate {
            summary: Some(String::new()),
            full_text: Some("changed".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let memory = store.peek(&id).unwrap().unwrap();
        assert_eq!(memory.summary, "keep me");
        assert_eq!(memory.full_text, "");
    }

    #[test]
    fn test_get_by_level_and_get_all() {
        let store = MemoryStore::in_memory().unwrap();
        store.add(NewMemory::new("raw 1")).unwrap();
        store.add(NewMemory::new("insight").level(1)).unwrap();
        store.add(NewMemory::new("raw 2")).unwrap();

        let raw = store.get_by_level(0, 10).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].summary, "raw 1");

        let all = store.get_all(2).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].summary, "insight");
    }
}
