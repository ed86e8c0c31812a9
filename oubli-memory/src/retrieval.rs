//! Keyword search and ranking
//!
//! A record matches when the query occurs, ignoring case, in its
//! keywords, topics, summary or full text. Each record is ranked by the
//! strongest place it matched:
//!
//! | Rank | Match |
//! |------|-------|
//! | 1 | a keyword equals the query |
//! | 2 | a topic equals the query |
//! | 3 | a keyword contains the query |
//! | 4 | a topic contains the query |
//! | 5 | the summary contains the query |
//! | 6 | the full text contains the query |
//!
//! Equal ranks are ordered newest first.

use crate::error::Result;
use crate::memory::Memory;
use crate::storage::SqliteStorage;

/// Where a query matched, weakest first so that `Ord` follows strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKind {
    FullText,
    Summary,
    TopicSubstring,
    KeywordSubstring,
    TopicExact,
    KeywordExact,
}

/// A memory that matched a query
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub kind: MatchKind,
}

/// Find the strongest match of an already lowercased needle in a memory
pub fn best_match(memory: &Memory, needle: &str) -> Option<MatchKind> {
    let keywords = lowercase_all(&memory.keywords);
    let topics = lowercase_all(&memory.topics);

    if keywords.iter().any(|k| k == needle) {
        Some(MatchKind::KeywordExact)
    } else if topics.iter().any(|t| t == needle) {
        Some(MatchKind::TopicExact)
    } else if keywords.iter().any(|k| k.contains(needle)) {
        Some(MatchKind::KeywordSubstring)
    } else if topics.iter().any(|t| t.contains(needle)) {
        Some(MatchKind::TopicSubstring)
    } else if memory.summary.to_lowercase().contains(needle) {
        Some(MatchKind::Summary)
    } else if memory.full_text.to_lowercase().contains(needle) {
        Some(MatchKind::FullText)
    } else {
        None
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Rank candidates, given in insertion order, against a query
pub fn rank(candidates: Vec<Memory>, query: &str, limit: usize) -> Vec<ScoredMemory> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, ScoredMemory)> = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(seq, memory)| {
            best_match(&memory, &needle).map(|kind| (seq, ScoredMemory { memory, kind }))
        })
        .collect();

    scored.sort_by(|(seq_a, a), (seq_b, b)| {
        b.kind
            .cmp(&a.kind)
            .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
            .then_with(|| seq_b.cmp(seq_a))
    });
    scored.truncate(limit);

    scored.into_iter().map(|(_, hit)| hit).collect()
}

/// Search engine reading candidates straight from storage
pub struct RetrievalEngine<'a> {
    storage: &'a SqliteStorage,
}

impl<'a> RetrievalEngine<'a> {
    pub fn new(storage: &'a SqliteStorage) -> Self {
        Self { storage }
    }

    /// Best matches for `query`, at most `limit` of them
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredMemory>> {
        let candidates = self.storage.scan_all()?;
        let hits = rank(candidates, query, limit);
        tracing::debug!(query, hits = hits.len(), "keyword search");
        Ok(hits)
    }
}

/// Keep only hits at or above `min_level`, then truncate to `limit`
pub fn filter_min_level(hits: Vec<Memory>, min_level: u32, limit: usize) -> Vec<Memory> {
    hits.into_iter()
        .filter(|m| m.level >= min_level)
        .take(limit)
        .collect()
}
