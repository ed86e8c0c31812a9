//! JSONL archive format for exporting and importing memories

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use crate::error::Result;
use crate::memory::Memory;

/// One memory per line, in the order they were written
pub struct JsonlArchive {
    path: PathBuf,
}

impl JsonlArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write all memories, replacing any existing archive
    pub fn write_all(&self, memories: &[Memory]) -> Result<usize> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        for memory in memories {
            let json = serde_json::to_string(memory)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;

        Ok(memories.len())
    }

    /// Read every memory in the archive
    pub fn read_all(&self) -> Result<Vec<Memory>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut memories = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let memory: Memory = serde_json::from_str(&line)?;
            memories.push(memory);
        }

        Ok(memories)
    }
}
