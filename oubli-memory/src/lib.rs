//! # Oubli Memory
//!
//! A persistent memory store for AI assistants.
//!
//! ## Architecture
//!
//! - **Memories** - records at different abstraction levels: level 0 for
//!   raw observations, level 1 and up for insights synthesized from them
//! - **Derivation graph** - parent/child links between memories, kept
//!   symmetric when a memory is added
//! - **Keyword search** - case-insensitive matching ranked by where the
//!   query matched
//! - **Core memory** - one markdown document always loaded at session start
//!
//! Everything lives under one data directory: `$OUBLI_DATA_DIR` when set,
//! otherwise `.oubli/` in the current project.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use oubli_memory::{MemoryStore, NewMemory};
//!
//! # fn main() -> oubli_memory::Result<()> {
//! let store = MemoryStore::open(".oubli")?;
//!
//! let raw = store.add(NewMemory::new("Prefers short commit messages"))?;
//! let insight = store.add(
//!     NewMemory::new("Values terse communication")
//!         .level(1)
//!         .parent_ids(vec![raw.clone()]),
//! )?;
//!
//! let hits = store.search("commit", 5)?;
//! let stats = store.get_stats()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod memory;
pub mod retrieval;
pub mod serve;
pub mod stats;
pub mod storage;
pub mod tools;

pub use config::Config;
pub use error::{Error, Result};
pub use graph::{HalfEdge, IntegrityWarning};
pub use memory::{
    AddOutcome, ImportSummary, Memory, MemorySource, MemoryStore, MemoryUpdate, NewMemory,
};
pub use retrieval::{MatchKind, ScoredMemory};
pub use stats::MemoryStats;
pub use storage::CoreMemory;
pub use tools::MemoryTools;
