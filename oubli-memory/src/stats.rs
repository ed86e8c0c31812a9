//! Aggregate counts over the whole store

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::memory::Memory;
use crate::storage::SqliteStorage;

/// Statistics about the memory store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub total: usize,
    pub by_level: BTreeMap<u32, usize>,
    /// A memory counts once for every topic it lists
    pub by_topic: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
}

impl MemoryStats {
    /// Single pass over the given memories
    pub fn from_memories<'a>(memories: impl IntoIterator<Item = &'a Memory>) -> Self {
        let mut stats = Self::default();

        for memory in memories {
            stats.total += 1;
            *stats.by_level.entry(memory.level).or_default() += 1;
            for topic in &memory.topics {
                *stats.by_topic.entry(topic.clone()).or_default() += 1;
            }
            *stats.by_source.entry(memory.source.to_string()).or_default() += 1;
        }

        stats
    }

    /// Count from a fresh scan of storage
    pub fn compute(storage: &SqliteStorage) -> Result<Self> {
        let memories = storage.scan_all()?;
        Ok(Self::from_memories(&memories))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemorySource, NewMemory};

    #[test]
    fn test_grouped_counts() {
        let memories = vec![
            NewMemory::new("a").topics(vec!["a".into()]),
            NewMemory::new("ab").topics(vec!["a".into(), "b".into()]),
            NewMemory::new("b")
                .level(1)
                .topics(vec!["b".into()])
                .source(MemorySource::Synthesis),
        ]
        .into_iter()
        .map(|n| n.into_memory().unwrap())
        .collect::<Vec<_>>();

        let stats = MemoryStats::from_memories(&memories);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_level, BTreeMap::from([(0, 2), (1, 1)]));
        assert_eq!(
            stats.by_topic,
            BTreeMap::from([("a".to_string(), 2), ("b".to_string(), 2)])
        );
        assert_eq!(
            stats.by_source,
            BTreeMap::from([("conversation".to_string(), 2), ("synthesis".to_string(), 1)])
        );
    }

    #[test]
    fn test_empty_store() {
        let storage = SqliteStorage::in_memory().unwrap();
        assert_eq!(MemoryStats::compute(&storage).unwrap(), MemoryStats::default());
    }
}
