//! Parent/child derivation edges between memories
//!
//! Two write paths exist on purpose. [`Graph::link_child`] runs when a
//! memory is added and keeps both ends of each edge in step.
//! [`Graph::set_child_ids_raw`] runs when a caller overwrites `child_ids`
//! through an update and touches only the record being updated; the
//! caller is trusted to have computed the back-references already.
//! Merging the two would change what updates do to other records.
//!
//! The graph may contain cycles, so every traversal here keeps a
//! visited set.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::memory::{id_set, Memory};
use crate::storage::SqliteStorage;

/// Result of linking a child under a parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
    /// Parent does not exist; only the child's forward pointer remains
    MissingParent,
}

/// Non-fatal notice that an edge was recorded on one side only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityWarning {
    pub memory_id: String,
    pub missing_parent_id: String,
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parent {} of memory {} does not exist; edge kept on the child only",
            self.missing_parent_id, self.memory_id
        )
    }
}

/// Which record holds the pointer of a one-sided edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeEnd {
    Parent,
    Child,
}

/// An edge that only one of its two records knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HalfEdge {
    pub parent_id: String,
    pub child_id: String,
    pub recorded_on: EdgeEnd,
}

/// Graph operations over a storage backend
pub struct Graph<'a> {
    storage: &'a SqliteStorage,
}

impl<'a> Graph<'a> {
    pub fn new(storage: &'a SqliteStorage) -> Self {
        Self { storage }
    }

    /// Append `child_id` to the parent's `child_ids` and persist the parent
    pub fn link_child(&self, parent_id: &str, child_id: &str) -> Result<LinkOutcome> {
        let Some(mut parent) = self.storage.get(parent_id)? else {
            return Ok(LinkOutcome::MissingParent);
        };

        if parent.child_ids.iter().any(|id| id == child_id) {
            return Ok(LinkOutcome::AlreadyLinked);
        }

        parent.child_ids.push(child_id.to_string());
        self.storage.put(&parent)?;
        tracing::debug!(parent = parent_id, child = child_id, "linked child");

        Ok(LinkOutcome::Linked)
    }

    /// Back-fill every parent listed by a freshly added memory
    pub fn link_parents(&self, child: &Memory) -> Result<Vec<IntegrityWarning>> {
        let mut warnings = Vec::new();

        for parent_id in &child.parent_ids {
            if self.link_child(parent_id, &child.id)? == LinkOutcome::MissingParent {
                let warning = IntegrityWarning {
                    memory_id: child.id.clone(),
                    missing_parent_id: parent_id.clone(),
                };
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
        }

        Ok(warnings)
    }

    /// Overwrite `child_ids` on one record without touching the children
    pub fn set_child_ids_raw(record: &mut Memory, child_ids: Vec<String>) {
        record.child_ids = id_set(child_ids);
        tracing::debug!(id = %record.id, count = record.child_ids.len(), "child ids overwritten");
    }

    /// Overwrite `parent_ids` on one record without touching the parents
    pub fn set_parent_ids_raw(record: &mut Memory, parent_ids: Vec<String>) {
        record.parent_ids = id_set(parent_ids);
    }

    /// Every memory reachable through `child_ids`, nearest first
    pub fn descendants(&self, id: &str) -> Result<Vec<Memory>> {
        self.walk(id, |memory| &memory.child_ids)
    }

    /// Every memory reachable through `parent_ids`, nearest first
    pub fn ancestors(&self, id: &str) -> Result<Vec<Memory>> {
        self.walk(id, |memory| &memory.parent_ids)
    }

    fn walk<F>(&self, start: &str, next: F) -> Result<Vec<Memory>>
    where
        F: Fn(&Memory) -> &Vec<String>,
    {
        let Some(root) = self.storage.get(start)? else {
            return Ok(Vec::new());
        };

        let mut visited: HashSet<String> = HashSet::from([root.id.clone()]);
        let mut queue: VecDeque<String> = next(&root).iter().cloned().collect();
        let mut found = Vec::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            // unilateral edges may point at nothing
            let Some(memory) = self.storage.get(&id)? else {
                continue;
            };
            queue.extend(
                next(&memory)
                    .iter()
                    .filter(|id| !visited.contains(*id))
                    .cloned(),
            );
            found.push(memory);
        }

        Ok(found)
    }

    /// Audit the whole store for edges recorded on one side only
    pub fn half_edges(&self) -> Result<Vec<HalfEdge>> {
        let memories = self.storage.scan_all()?;
        let by_id: HashMap<&str, &Memory> =
            memories.iter().map(|m| (m.id.as_str(), m)).collect();

        let mut half_edges = Vec::new();
        for memory in &memories {
            for parent_id in &memory.parent_ids {
                let symmetric = by_id
                    .get(parent_id.as_str())
                    .is_some_and(|parent| parent.child_ids.contains(&memory.id));
                if !symmetric {
                    half_edges.push(HalfEdge {
                        parent_id: parent_id.clone(),
                        child_id: memory.id.clone(),
                        recorded_on: EdgeEnd::Child,
                    });
                }
            }
            for child_id in &memory.child_ids {
                let symmetric = by_id
                    .get(child_id.as_str())
                    .is_some_and(|child| child.parent_ids.contains(&memory.id));
                if !symmetric {
                    half_edges.push(HalfEdge {
                        parent_id: memory.id.clone(),
                        child_id: child_id.clone(),
                        recorded_on: EdgeEnd::Parent,
                    });
                }
            }
        }

        Ok(half_edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NewMemory;

    fn stored(storage: &SqliteStorage, new: NewMemory) -> Memory {
        let memory = new.into_memory().unwrap();
        storage.put(&memory).unwrap();
        memory
    }

    #[test]
    fn test_link_child_is_symmetric_and_idempotent() {
        let storage = SqliteStorage::in_memory().unwrap();
        let parent = stored(&storage, NewMemory::new("parent"));
        let child = stored(
            &storage,
            NewMemory::new("child").level(1).parent_ids(vec![parent.id.clone()]),
        );
        let graph = Graph::new(&storage);

        assert!(graph.link_parents(&child).unwrap().is_empty());
        assert_eq!(
            graph.link_child(&parent.id, &child.id).unwrap(),
            LinkOutcome::AlreadyLinked
        );

        let parent = storage.get(&parent.id).unwrap().unwrap();
        assert_eq!(parent.child_ids, vec![child.id.clone()]);
        assert!(graph.half_edges().unwrap().is_empty());
    }

    #[test]
    fn test_missing_parent_yields_warning() {
        let storage = SqliteStorage::in_memory().unwrap();
        let orphan = stored(
            &storage,
            NewMemory::new("orphan").parent_ids(vec!["does-not-exist".to_string()]),
        );
        let graph = Graph::new(&storage);

        let warnings = graph.link_parents(&orphan).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].missing_parent_id, "does-not-exist");

        let half = graph.half_edges().unwrap();
        assert_eq!(
            half,
            vec![HalfEdge {
                parent_id: "does-not-exist".to_string(),
                child_id: orphan.id.clone(),
                recorded_on: EdgeEnd::Child,
            }]
        );
    }

    #[test]
    fn test_raw_child_overwrite_leaves_children_alone() {
        let storage = SqliteStorage::in_memory().unwrap();
        let mut parent = stored(&storage, NewMemory::new("parent"));
        let other = stored(&storage, NewMemory::new("other"));

        Graph::set_child_ids_raw(&mut parent, vec![other.id.clone(), other.id.clone()]);
        storage.put(&parent).unwrap();

        assert_eq!(parent.child_ids, vec![other.id.clone()]);
        let other = storage.get(&other.id).unwrap().unwrap();
        assert!(other.parent_ids.is_empty());

        let half = Graph::new(&storage).half_edges().unwrap();
        assert_eq!(half.len(), 1);
        assert_eq!(half[0].recorded_on, EdgeEnd::Parent);
    }

    #[test]
    fn test_traversal_survives_cycles() {
        let storage = SqliteStorage::in_memory().unwrap();
        let mut a = stored(&storage, NewMemory::new("a"));
        let mut b = stored(&storage, NewMemory::new("b"));
        let mut c = stored(&storage, NewMemory::new("c"));

        // a -> b -> c -> a
        Graph::set_child_ids_raw(&mut a, vec![b.id.clone()]);
        Graph::set_child_ids_raw(&mut b, vec![c.id.clone(), "ghost".to_string()]);
        Graph::set_child_ids_raw(&mut c, vec![a.id.clone()]);
        Graph::set_parent_ids_raw(&mut a, vec![c.id.clone()]);
        Graph::set_parent_ids_raw(&mut b, vec![a.id.clone()]);
        Graph::set_parent_ids_raw(&mut c, vec![b.id.clone()]);
        for m in [&a, &b, &c] {
            storage.put(m).unwrap();
        }

        let graph = Graph::new(&storage);
        let down: Vec<_> = graph
            .descendants(&a.id)
            .unwrap()
            .into_iter()
            .map(|m| m.summary)
            .collect();
        assert_eq!(down, vec!["b", "c"]);

        let up: Vec<_> = graph
            .ancestors(&a.id)
            .unwrap()
            .into_iter()
            .map(|m| m.summary)
            .collect();
        assert_eq!(up, vec!["c", "b"]);

        assert!(graph.descendants("unknown").unwrap().is_empty());
    }
}
