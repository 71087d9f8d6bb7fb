//! Level-by-level walk state shared by the forward and reverse resolvers.

use crate::{
    config::EngineConfig,
    error::{Result, ZanzibarError},
    models::Set,
};
use ahash::AHashSet;
use tracing::warn;

/// Visited-set plus the pending frontier of a breadth-first walk, with the
/// depth and width guards applied as the walk advances.
pub(crate) struct Traversal {
    visited: AHashSet<Set>,
    pending: Vec<Set>,
    depth: u32,
    max_depth: u32,
    max_visited: usize,
}

impl Traversal {
    pub(crate) fn new(root: &Set, config: &EngineConfig) -> Self {
        let mut visited = AHashSet::new();
        visited.insert(root.clone());
        Self {
            visited,
            pending: vec![root.clone()],
            depth: 0,
            max_depth: config.max_depth,
            max_visited: config.max_visited,
        }
    }

    /// Take the next level to expand, or `None` once nothing is pending.
    pub(crate) fn next_level(&mut self) -> Result<Option<Vec<Set>>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        if self.depth >= self.max_depth {
            warn!("Traversal depth limit of {} reached", self.max_depth);
            return Err(ZanzibarError::MaxDepthExceeded {
                max_depth: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(Some(std::mem::take(&mut self.pending)))
    }

    /// Queue `set` for the next level unless it was already seen.
    pub(crate) fn push(&mut self, set: Set) -> Result<()> {
        if self.visited.contains(&set) {
            return Ok(());
        }
        if self.visited.len() >= self.max_visited {
            warn!("Traversal width limit of {} reached", self.max_visited);
            return Err(ZanzibarError::TraversalLimitExceeded {
                max_visited: self.max_visited,
            });
        }
        self.visited.insert(set.clone());
        self.pending.push(set);
        Ok(())
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }

    /// Every set reached so far, root included
    pub(crate) fn into_visited(self) -> Vec<Set> {
        self.visited.into_iter().collect()
    }
}
