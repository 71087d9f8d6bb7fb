use crate::{
    config::EngineConfig,
    error::ZanzibarError,
    models::*,
    repository::{Repository, Snapshot},
    traversal::Traversal,
};
use std::sync::Arc;
use tracing::debug;

/// Graph resolver: decides whether a set is a member of another set, directly
/// or through nested usersets.
///
/// The walk starts at `parent` and follows stored tuples downward. A tuple
/// whose child equals the target answers the check. A tuple whose child is a
/// userset (e.g. `org.Group:eng#member`) queues that userset to be expanded on
/// the next level. Cycles end at the visited-set; runaway graphs end at the
/// depth and width guards from [`EngineConfig`].
pub struct GraphResolver {
    repository: Arc<dyn Repository>,
    config: EngineConfig,
}

impl GraphResolver {
    pub fn new(repository: Arc<dyn Repository>, config: EngineConfig) -> Self {
        Self { repository, config }
    }

    /// Check membership against a fresh snapshot
    pub async fn check(&self, parent: &Set, child: &Set) -> Result<bool, ZanzibarError> {
        let mut snapshot = self.repository.snapshot().await?;
        self.check_in(snapshot.as_mut(), parent, child).await
    }

    /// Check membership against an already open snapshot
    pub async fn check_in(
        &self,
        snapshot: &mut dyn Snapshot,
        parent: &Set,
        child: &Set,
    ) -> Result<bool, ZanzibarError> {
        debug!("Checking: {} in {}", child, parent);

        let mut traversal = Traversal::new(parent, &self.config);

        while let Some(level) = traversal.next_level()? {
            for set in level {
                for tuple in snapshot.tuples_with_parent(&set).await? {
                    if tuple.child == *child {
                        debug!("Found {} at depth {}", tuple, traversal.depth());
                        return Ok(true);
                    }
                    if tuple.child.is_userset() {
                        traversal.push(tuple.child)?;
                    }
                }
            }
        }

        debug!("No path from {} to {}", parent, child);
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryRepository, TupleRepository};

    async fn resolver_with(tuples: Vec<Tuple>, config: EngineConfig) -> GraphResolver {
        let repo = Arc::new(InMemoryRepository::new());
        repo.write_tuples(WriteRequest::add(tuples)).await.unwrap();
        GraphResolver::new(repo, config)
    }

    fn note_owner() -> Set {
        Set::userset("org.Note", "n1", "owner")
    }

    fn alice() -> Set {
        Set::entity("org.User", "alice")
    }

    fn group(id: &str) -> Set {
        Set::userset("org.Group", id, "member")
    }

    #[tokio::test]
    async fn test_direct_permission() {
        let resolver = resolver_with(vec![], EngineConfig::default()).await;
        assert!(!resolver.check(&note_owner(), &alice()).await.unwrap());

        let resolver = resolver_with(
            vec![Tuple::new(note_owner(), alice())],
            EngineConfig::default(),
        )
        .await;
        assert!(resolver.check(&note_owner(), &alice()).await.unwrap());
    }

    #[tokio::test]
    async fn test_nested_groups() {
        let resolver = resolver_with(
            vec![
                Tuple::new(note_owner(), group("outer")),
                Tuple::new(group("outer"), group("inner")),
                Tuple::new(group("inner"), alice()),
            ],
            EngineConfig::default(),
        )
        .await;

        assert!(resolver.check(&note_owner(), &alice()).await.unwrap());
        assert!(resolver.check(&group("outer"), &alice()).await.unwrap());
        assert!(!resolver
            .check(&note_owner(), &Set::entity("org.User", "bob"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_userset_target_matches_directly() {
        let resolver = resolver_with(
            vec![Tuple::new(note_owner(), group("eng"))],
            EngineConfig::default(),
        )
        .await;

        assert!(resolver.check(&note_owner(), &group("eng")).await.unwrap());
    }

    #[tokio::test]
    async fn test_concrete_child_is_not_expanded() {
        // An edge into a concrete entity must not be followed further down.
        let resolver = resolver_with(
            vec![
                Tuple::new(note_owner(), Set::entity("org.Group", "eng")),
                Tuple::new(Set::entity("org.Group", "eng"), alice()),
            ],
            EngineConfig::default(),
        )
        .await;

        assert!(!resolver.check(&note_owner(), &alice()).await.unwrap());
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let resolver = resolver_with(
            vec![
                Tuple::new(note_owner(), group("a")),
                Tuple::new(group("a"), group("b")),
                Tuple::new(group("b"), group("a")),
                Tuple::new(group("b"), group("b")),
            ],
            EngineConfig::default(),
        )
        .await;

        assert!(!resolver.check(&note_owner(), &alice()).await.unwrap());
    }

    #[tokio::test]
    async fn test_depth_limit_is_an_error() {
        let mut tuples = vec![Tuple::new(note_owner(), group("g0"))];
        for i in 0..5 {
            tuples.push(Tuple::new(group(&format!("g{}", i)), group(&format!("g{}", i + 1))));
        }
        tuples.push(Tuple::new(group("g5"), alice()));

        let resolver = resolver_with(tuples.clone(), EngineConfig::default().with_max_depth(3)).await;
        let err = resolver.check(&note_owner(), &alice()).await.unwrap_err();
        assert!(err.is_resource_exhausted());

        let resolver = resolver_with(tuples, EngineConfig::default().with_max_depth(7)).await;
        assert!(resolver.check(&note_owner(), &alice()).await.unwrap());
    }

    #[tokio::test]
    async fn test_wide_fan_out_trips_visit_limit() {
        let tuples = (0..20)
            .map(|i| Tuple::new(note_owner(), group(&format!("g{}", i))))
            .collect();
        let resolver = resolver_with(tuples, EngineConfig::default().with_max_visited(5)).await;

        let err = resolver.check(&note_owner(), &alice()).await.unwrap_err();
        assert!(matches!(err, ZanzibarError::TraversalLimitExceeded { max_visited: 5 }));
    }
}
