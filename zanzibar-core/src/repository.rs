use crate::{error::Result, models::*};
use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub mod postgres;

pub use postgres::PostgresRepository;

/// Storage for relationship tuples
#[async_trait]
pub trait TupleRepository: Send + Sync {
    /// Apply all adds, then all removes, in one transaction.
    /// Adding an existing tuple or removing a missing one is a no-op.
    async fn write_tuples(&self, request: WriteRequest) -> Result<()>;
}

/// Storage for the namespace schema (relation -> permission rows)
#[async_trait]
pub trait RelationRepository: Send + Sync {
    /// Apply all adds, then all removes, in one transaction. Idempotent per row.
    async fn write_relations(&self, request: WriteRelationsRequest) -> Result<()>;

    /// Every declared row, in no particular order
    async fn list_relations(&self) -> Result<Vec<Relation>>;
}

/// A tuple and relation store that can hand out consistent read views
#[async_trait]
pub trait Repository: TupleRepository + RelationRepository {
    /// Open a read view that stays consistent for its whole lifetime.
    async fn snapshot(&self) -> Result<Box<dyn Snapshot>>;

    async fn health_check(&self) -> bool {
        true
    }
}

/// One consistent view of tuples and relations. Dropping it releases the view.
#[async_trait]
pub trait Snapshot: Send {
    /// Tuples whose parent side equals `parent` (namespace, id and relation)
    async fn tuples_with_parent(&mut self, parent: &Set) -> Result<Vec<Tuple>>;

    /// Tuples whose child side equals `child`
    async fn tuples_with_child(&mut self, child: &Set) -> Result<Vec<Tuple>>;

    /// Schema rows conferred by stored edges `parent_namespace:parent_id#R -> child`:
    /// every row of `parent_namespace` whose relation is one such `R`.
    async fn relations_for_edge(
        &mut self,
        parent_namespace: &str,
        parent_id: &str,
        child: &Set,
    ) -> Result<Vec<Relation>>;

    /// Schema rows declared on one namespace
    async fn relations_in_namespace(&mut self, namespace: &str) -> Result<Vec<Relation>>;
}

#[derive(Debug, Clone, Default)]
struct GraphState {
    children: AHashMap<Set, BTreeSet<Set>>,
    parents: AHashMap<Set, BTreeSet<Set>>,
    relations: BTreeSet<Relation>,
    tuple_count: usize,
}

impl GraphState {
    fn add_tuple(&mut self, tuple: Tuple) {
        let inserted = self
            .children
            .entry(tuple.parent.clone())
            .or_default()
            .insert(tuple.child.clone());
        if inserted {
            self.parents.entry(tuple.child).or_default().insert(tuple.parent);
            self.tuple_count += 1;
        }
    }

    fn remove_tuple(&mut self, tuple: &Tuple) {
        let removed = remove_edge(&mut self.children, &tuple.parent, &tuple.child);
        if removed {
            remove_edge(&mut self.parents, &tuple.child, &tuple.parent);
            self.tuple_count -= 1;
        }
    }

    fn tuples_with_parent(&self, parent: &Set) -> Vec<Tuple> {
        self.children
            .get(parent)
            .map(|children| {
                children
                    .iter()
                    .map(|child| Tuple::new(parent.clone(), child.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn tuples_with_child(&self, child: &Set) -> Vec<Tuple> {
        self.parents
            .get(child)
            .map(|parents| {
                parents
                    .iter()
                    .map(|parent| Tuple::new(parent.clone(), child.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn relations_in_namespace<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a Relation> {
        self.relations.iter().filter(move |r| r.namespace == namespace)
    }
}

fn remove_edge(index: &mut AHashMap<Set, BTreeSet<Set>>, from: &Set, to: &Set) -> bool {
    let Some(targets) = index.get_mut(from) else {
        return false;
    };
    let removed = targets.remove(to);
    if targets.is_empty() {
        index.remove(from);
    }
    removed
}

/// In-memory repository for testing and development.
///
/// Writers build the next state from the current one and swap it in, so a
/// snapshot keeps pointing at the state it was opened on.
pub struct InMemoryRepository {
    state: RwLock<Arc<GraphState>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(GraphState::default())),
        }
    }

    pub fn tuple_count(&self) -> usize {
        self.state.read().tuple_count
    }

    fn update(&self, apply: impl FnOnce(&mut GraphState)) {
        // Clones the state only while a snapshot still holds the current one.
        let mut current = self.state.write();
        apply(Arc::make_mut(&mut current));
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TupleRepository for InMemoryRepository {
    async fn write_tuples(&self, request: WriteRequest) -> Result<()> {
        debug!("In-memory write: {} adds, {} removes", request.adds.len(), request.removes.len());

        self.update(|state| {
            for tuple in request.adds {
                state.add_tuple(tuple);
            }
            for tuple in &request.removes {
                state.remove_tuple(tuple);
            }
        });
        Ok(())
    }
}

#[async_trait]
impl RelationRepository for InMemoryRepository {
    async fn write_relations(&self, request: WriteRelationsRequest) -> Result<()> {
        self.update(|state| {
            state.relations.extend(request.adds);
            for relation in &request.removes {
                state.relations.remove(relation);
            }
        });
        Ok(())
    }

    async fn list_relations(&self) -> Result<Vec<Relation>> {
        Ok(self.state.read().relations.iter().cloned().collect())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn snapshot(&self) -> Result<Box<dyn Snapshot>> {
        let state = self.state.read().clone();
        Ok(Box::new(InMemorySnapshot { state }))
    }
}

struct InMemorySnapshot {
    state: Arc<GraphState>,
}

#[async_trait]
impl Snapshot for InMemorySnapshot {
    async fn tuples_with_parent(&mut self, parent: &Set) -> Result<Vec<Tuple>> {
        Ok(self.state.tuples_with_parent(parent))
    }

    async fn tuples_with_child(&mut self, child: &Set) -> Result<Vec<Tuple>> {
        Ok(self.state.tuples_with_child(child))
    }

    async fn relations_for_edge(
        &mut self,
        parent_namespace: &str,
        parent_id: &str,
        child: &Set,
    ) -> Result<Vec<Relation>> {
        let edge_relations: BTreeSet<&str> = self
            .state
            .parents
            .get(child)
            .into_iter()
            .flatten()
            .filter(|parent| parent.namespace == parent_namespace && parent.id == parent_id)
            .map(|parent| parent.relation.as_str())
            .collect();

        Ok(self
            .state
            .relations_in_namespace(parent_namespace)
            .filter(|r| edge_relations.contains(r.relation.as_str()))
            .cloned()
            .collect())
    }

    async fn relations_in_namespace(&mut self, namespace: &str) -> Result<Vec<Relation>> {
        Ok(self.state.relations_in_namespace(namespace).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner_tuple() -> Tuple {
        Tuple::new(
            Set::userset("org.Note", "n1", "owner"),
            Set::entity("org.User", "alice"),
        )
    }

    #[tokio::test]
    async fn test_in_memory_repository() {
        let repo = InMemoryRepository::new();
        let tuple = owner_tuple();

        repo.write_tuples(WriteRequest::add(vec![tuple.clone()])).await.unwrap();
        assert_eq!(repo.tuple_count(), 1);

        let mut snapshot = repo.snapshot().await.unwrap();
        assert_eq!(snapshot.tuples_with_parent(&tuple.parent).await.unwrap(), vec![tuple.clone()]);
        assert_eq!(snapshot.tuples_with_child(&tuple.child).await.unwrap(), vec![tuple.clone()]);

        repo.write_tuples(WriteRequest::remove(vec![tuple.clone()])).await.unwrap();
        assert_eq!(repo.tuple_count(), 0);
    }

    #[tokio::test]
    async fn test_writes_are_idempotent() {
        let repo = InMemoryRepository::new();
        let tuple = owner_tuple();

        repo.write_tuples(WriteRequest::add(vec![tuple.clone(), tuple.clone()])).await.unwrap();
        repo.write_tuples(WriteRequest::add(vec![tuple.clone()])).await.unwrap();
        assert_eq!(repo.tuple_count(), 1);

        repo.write_tuples(WriteRequest::remove(vec![tuple.clone()])).await.unwrap();
        repo.write_tuples(WriteRequest::remove(vec![tuple])).await.unwrap();
        assert_eq!(repo.tuple_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_later_writes() {
        let repo = InMemoryRepository::new();
        let tuple = owner_tuple();

        let mut before = repo.snapshot().await.unwrap();
        repo.write_tuples(WriteRequest::add(vec![tuple.clone()])).await.unwrap();

        assert!(before.tuples_with_parent(&tuple.parent).await.unwrap().is_empty());
        let mut after = repo.snapshot().await.unwrap();
        assert_eq!(after.tuples_with_parent(&tuple.parent).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_relations_for_edge_joins_schema() {
        let repo = InMemoryRepository::new();
        let tuple = owner_tuple();
        repo.write_tuples(WriteRequest::add(vec![tuple.clone()])).await.unwrap();
        repo.write_relations(WriteRelationsRequest {
            adds: vec![
                Relation::new("org.Note", "owner", "read"),
                Relation::new("org.Note", "owner", "write"),
                Relation::new("org.Note", "viewer", "read"),
            ],
            removes: vec![],
        })
        .await
        .unwrap();

        let mut snapshot = repo.snapshot().await.unwrap();
        let mut granted = snapshot
            .relations_for_edge("org.Note", "n1", &tuple.child)
            .await
            .unwrap();
        granted.sort();
        assert_eq!(
            granted,
            vec![
                Relation::new("org.Note", "owner", "read"),
                Relation::new("org.Note", "owner", "write"),
            ]
        );

        assert!(snapshot
            .relations_for_edge("org.Note", "other", &tuple.child)
            .await
            .unwrap()
            .is_empty());
    }
}
