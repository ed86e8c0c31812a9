//! The core memory document: one always-loaded markdown blob

use std::path::PathBuf;

use crate::error::Result;

/// Single mutable text document kept next to the memory database
pub struct CoreMemory {
    path: PathBuf,
}

impl CoreMemory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Current content, or an empty string if nothing was saved yet
    pub fn load(&self) -> Result<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        Ok(std::fs::read_to_string(&self.path)?)
    }

    /// Replace the whole document
    pub fn save(&self, content: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        tracing::debug!(path = ?self.path, bytes = content.len(), "saved core memory");
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreMemory::new(dir.path().join("core_memory.md"));

        assert!(!core.exists());
        assert_eq!(core.load().unwrap(), "");
    }

    #[test]
    fn test_save_creates_dir_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreMemory::new(dir.path().join(".oubli").join("core_memory.md"));

        core.save("# About the user\n- prefers Rust\n").unwrap();
        assert!(core.exists());

        core.save("short").unwrap();
        assert_eq!(core.load().unwrap(), "short");
    }
}
