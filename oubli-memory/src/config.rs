//! Configuration for oubli-memory

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "OUBLI_DATA_DIR";

/// Per-project directory name used when no override is set
pub const DATA_DIR_NAME: &str = ".oubli";

const SQLITE_FILENAME: &str = "memories.db";
const CORE_MEMORY_FILENAME: &str = "core_memory.md";

/// Configuration for the memory system
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for all storage
    pub data_dir: PathBuf,

    /// Number of search results returned when the caller gives no limit
    pub default_search_limit: usize,

    /// Number of records listed when the caller gives no limit
    pub default_list_limit: usize,

    /// Multiplier applied to the search limit before level filtering
    pub search_overfetch: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = std::env::current_dir()
            .map(|cwd| cwd.join(DATA_DIR_NAME))
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("oubli")
            });

        Self {
            data_dir,
            default_search_limit: 5,
            default_list_limit: 50,
            search_overfetch: 2,
        }
    }
}

impl Config {
    /// Create a new config with a custom data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Default config with `OUBLI_DATA_DIR` applied when it is set
    pub fn from_env() -> Self {
        match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::with_data_dir(dir),
            _ => Self::default(),
        }
    }

    /// Reject settings the tool layer cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.default_search_limit == 0 {
            return Err(Error::config("default_search_limit must be at least 1"));
        }
        if self.search_overfetch == 0 {
            return Err(Error::config("search_overfetch must be at least 1"));
        }
        if self.data_dir.is_file() {
            return Err(Error::config(format!(
                "data directory {:?} is a file",
                self.data_dir
            )));
        }
        Ok(())
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join(SQLITE_FILENAME)
    }

    /// Get the path to the core memory document
    pub fn core_memory_path(&self) -> PathBuf {
        self.data_dir.join(CORE_MEMORY_FILENAME)
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_live_under_data_dir() {
        let config = Config::with_data_dir("/tmp/project/.oubli");
        assert_eq!(
            config.sqlite_path(),
            PathBuf::from("/tmp/project/.oubli/memories.db")
        );
        assert_eq!(
            config.core_memory_path(),
            PathBuf::from("/tmp/project/.oubli/core_memory.md")
        );
    }

    #[test]
    fn test_default_is_per_project() {
        let config = Config::default();
        assert!(config.data_dir.ends_with(DATA_DIR_NAME) || config.data_dir.ends_with("oubli"));
        assert_eq!(config.default_search_limit, 5);
        assert_eq!(config.default_list_limit, 50);
    }

    #[test]
    fn test_validate_rejects_zero_overfetch() {
        let mut config = Config::with_data_dir("/tmp/none");
        config.search_overfetch = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
