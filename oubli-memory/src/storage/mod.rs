//! Storage backends for oubli-memory

mod core_memory;
mod jsonl;
mod sqlite;

pub use core_memory::CoreMemory;
pub use jsonl::JsonlArchive;
pub use sqlite::SqliteStorage;
