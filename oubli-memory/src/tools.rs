//! Tool-call surface over the memory store
//!
//! Each tool takes JSON arguments and returns a JSON value. Lookups of
//! unknown ids answer with an `{"error": ...}` object; invalid arguments
//! and storage failures are returned as `Err`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::memory::{Memory, MemorySource, MemoryStore, MemoryUpdate, NewMemory};
use crate::retrieval::filter_min_level;
use crate::storage::CoreMemory;

/// Names accepted by [`MemoryTools::call`]
pub const TOOL_NAMES: &[&str] = &[
    "memory_save",
    "memory_search",
    "memory_get",
    "memory_list",
    "memory_stats",
    "memory_update",
    "core_memory_get",
    "core_memory_save",
];

#[derive(Debug, Deserialize)]
pub struct SaveArgs {
    pub summary: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub parent_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub min_level: u32,
}

#[derive(Debug, Deserialize)]
pub struct GetArgs {
    pub memory_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListArgs {
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArgs {
    pub memory_id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub child_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CoreSaveArgs {
    pub content: String,
}

/// Short form of a memory used in search and list results
#[derive(Debug, Clone, Serialize)]
pub struct MemoryBrief {
    pub id: String,
    pub summary: String,
    pub level: u32,
    pub topics: Vec<String>,
    pub source: MemorySource,
}

impl From<Memory> for MemoryBrief {
    fn from(m: Memory) -> Self {
        Self {
            id: m.id,
            summary: m.summary,
            level: m.level,
            topics: m.topics,
            source: m.source,
        }
    }
}

/// The tools an assistant calls to read and write memories
pub struct MemoryTools {
    store: MemoryStore,
    core: CoreMemory,
    config: Config,
}

impl MemoryTools {
    /// Open the store and core memory described by `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let store = MemoryStore::from_config(&config)?;
        let core = CoreMemory::new(config.core_memory_path());
        Ok(Self::with_parts(store, core, config))
    }

    pub fn with_parts(store: MemoryStore, core: CoreMemory, config: Config) -> Self {
        Self {
            store,
            core,
            config,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Dispatch a tool call by name
    pub fn call(&self, name: &str, args: Value) -> Result<Value> {
        match name {
            "memory_save" => self.memory_save(parse_args(name, args)?),
            "memory_search" => self.memory_search(parse_args(name, args)?),
            "memory_get" => self.memory_get(parse_args(name, args)?),
            "memory_list" => self.memory_list(parse_args(name, args)?),
            "memory_stats" => self.memory_stats(),
            "memory_update" => self.memory_update(parse_args(name, args)?),
            "core_memory_get" => self.core_memory_get(),
            "core_memory_save" => self.core_memory_save(parse_args(name, args)?),
            other => Err(Error::invalid_input(format!("Unknown tool: {}", other))),
        }
    }

    pub fn memory_save(&self, args: SaveArgs) -> Result<Value> {
        let source = match args.source.as_deref() {
            Some(source) => source.parse()?,
            None => MemorySource::default(),
        };

        let new = NewMemory::new(args.summary)
            .level(args.level)
            .full_text(args.full_text.unwrap_or_default())
            .topics(args.topics.unwrap_or_default())
            .keywords(args.keywords.unwrap_or_default())
            .source(source)
            .parent_ids(args.parent_ids.unwrap_or_default());

        let outcome = self.store.add_detailed(new)?;
        let mut response = json!({ "id": outcome.id, "status": "saved" });
        if !outcome.warnings.is_empty() {
            response["warnings"] = outcome
                .warnings
                .iter()
                .map(|w| Value::String(w.to_string()))
                .collect();
        }
        Ok(response)
    }

    /// Overfetches so that the level filter can still fill `limit`
    pub fn memory_search(&self, args: SearchArgs) -> Result<Value> {
        let limit = args.limit.unwrap_or(self.config.default_search_limit);
        let candidates = self
            .store
            .search(&args.query, limit.saturating_mul(self.config.search_overfetch))?;

        let briefs: Vec<MemoryBrief> = filter_min_level(candidates, args.min_level, limit)
            .into_iter()
            .map(MemoryBrief::from)
            .collect();
        Ok(serde_json::to_value(briefs)?)
    }

    pub fn memory_get(&self, args: GetArgs) -> Result<Value> {
        match self.store.get(&args.memory_id)? {
            Some(memory) => Ok(serde_json::to_value(memory)?),
            None => Ok(not_found(&args.memory_id)),
        }
    }

    pub fn memory_list(&self, args: ListArgs) -> Result<Value> {
        let limit = args.limit.unwrap_or(self.config.default_list_limit);
        let memories = match args.level {
            Some(level) => self.store.get_by_level(level, limit)?,
            None => self.store.get_all(limit)?,
        };

        let briefs: Vec<MemoryBrief> = memories.into_iter().map(MemoryBrief::from).collect();
        Ok(serde_json::to_value(briefs)?)
    }

    pub fn memory_stats(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.store.get_stats()?)?)
    }

    pub fn memory_update(&self, args: UpdateArgs) -> Result<Value> {
        let update = MemoryUpdate {
            summary: args.summary,
            full_text: args.full_text,
            topics: args.topics,
            keywords: args.keywords,
            child_ids: args.child_ids,
            ..Default::default()
        };

        if update.is_empty() {
            tracing::warn!(id = %args.memory_id, "update with no fields");
            return Ok(json!({ "error": "No updates provided" }));
        }

        if self.store.update(&args.memory_id, update)? {
            Ok(json!({ "status": "updated", "id": args.memory_id }))
        } else {
            Ok(not_found(&args.memory_id))
        }
    }

    pub fn core_memory_get(&self) -> Result<Value> {
        let exists = self.core.exists();
        let content = if exists { self.core.load()? } else { String::new() };
        Ok(json!({ "exists": exists, "content": content }))
    }

    pub fn core_memory_save(&self, args: CoreSaveArgs) -> Result<Value> {
        self.core.save(&args.content)?;
        Ok(json!({ "status": "saved", "length": args.content.chars().count() }))
    }
}

fn not_found(id: &str) -> Value {
    json!({ "error": format!("Memory {} not found", id) })
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args)
        .map_err(|e| Error::invalid_input(format!("Invalid arguments for {}: {}", tool, e)))
}
