use crate::{
    check::GraphResolver,
    config::EngineConfig,
    error::ZanzibarError,
    models::*,
    repository::{Repository, Snapshot},
    schema::aggregate,
    traversal::Traversal,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reverse resolver: enumerates every relation (and its permissions) a
/// subject holds on one object.
///
/// Rather than running a check per declared relation, it walks upward from
/// the subject once, collecting every userset the subject belongs to, and then
/// asks the store which declared relations the object grants to the subject
/// or to any of those usersets. A relation appears in the result exactly when
/// the graph resolver would allow `object#relation` for the subject.
///
/// The upward walk covers every group the subject belongs to, including ones
/// that never reach the object. When that walk trips a traversal guard, the
/// answer falls back to one forward check per relation declared on the
/// object's namespace, so a guard only surfaces where a check would hit it too.
pub struct ReverseResolver {
    repository: Arc<dyn Repository>,
    checker: GraphResolver,
    config: EngineConfig,
}

impl ReverseResolver {
    pub fn new(repository: Arc<dyn Repository>, config: EngineConfig) -> Self {
        Self {
            checker: GraphResolver::new(repository.clone(), config.clone()),
            repository,
            config,
        }
    }

    /// Relations held by `child` on `parent_namespace:parent_id`, with their permissions
    pub async fn parent_relations(
        &self,
        parent_namespace: &str,
        parent_id: &str,
        child: &Set,
    ) -> Result<ParentRelations, ZanzibarError> {
        let mut snapshot = self.repository.snapshot().await?;
        self.parent_relations_in(snapshot.as_mut(), parent_namespace, parent_id, child)
            .await
    }

    pub async fn parent_relations_in(
        &self,
        snapshot: &mut dyn Snapshot,
        parent_namespace: &str,
        parent_id: &str,
        child: &Set,
    ) -> Result<ParentRelations, ZanzibarError> {
        let memberships = match self.memberships(snapshot, child).await {
            Ok(memberships) => memberships,
            Err(err) if err.is_resource_exhausted() => {
                warn!(
                    "Membership walk from {} stopped ({}), checking relations of {}:{} one by one",
                    child, err, parent_namespace, parent_id
                );
                return self
                    .relations_by_check(snapshot, parent_namespace, parent_id, child)
                    .await;
            }
            Err(err) => return Err(err),
        };
        debug!(
            "{} belongs to {} sets, resolving relations on {}:{}",
            child,
            memberships.len(),
            parent_namespace,
            parent_id
        );

        let mut granted = Vec::new();
        for set in &memberships {
            granted.extend(
                snapshot
                    .relations_for_edge(parent_namespace, parent_id, set)
                    .await?,
            );
        }

        Ok(aggregate(granted)
            .remove(parent_namespace)
            .map(|namespace| namespace.relations)
            .unwrap_or_default())
    }

    /// Flat union of the permissions `child` holds on the object
    pub async fn permissions(
        &self,
        parent_namespace: &str,
        parent_id: &str,
        child: &Set,
    ) -> Result<BTreeSet<String>, ZanzibarError> {
        Ok(self
            .parent_relations(parent_namespace, parent_id, child)
            .await?
            .into_values()
            .flat_map(|r| r.permissions)
            .collect())
    }

    /// Run a forward check for each relation declared on `parent_namespace`.
    async fn relations_by_check(
        &self,
        snapshot: &mut dyn Snapshot,
        parent_namespace: &str,
        parent_id: &str,
        child: &Set,
    ) -> Result<ParentRelations, ZanzibarError> {
        let declared = snapshot.relations_in_namespace(parent_namespace).await?;
        let relations: BTreeSet<&str> = declared.iter().map(|r| r.relation.as_str()).collect();

        let mut held = BTreeSet::new();
        for relation in relations {
            let parent = Set::userset(parent_namespace, parent_id, relation);
            if self.checker.check_in(snapshot, &parent, child).await? {
                held.insert(relation);
            }
        }

        let granted = declared
            .iter()
            .filter(|r| held.contains(r.relation.as_str()))
            .cloned();
        Ok(aggregate(granted)
            .remove(parent_namespace)
            .map(|namespace| namespace.relations)
            .unwrap_or_default())
    }

    /// `child` itself plus every userset that contains it, transitively.
    async fn memberships(
        &self,
        snapshot: &mut dyn Snapshot,
        child: &Set,
    ) -> Result<Vec<Set>, ZanzibarError> {
        let mut traversal = Traversal::new(child, &self.config);

        while let Some(level) = traversal.next_level()? {
            for set in level {
                for tuple in snapshot.tuples_with_child(&set).await? {
                    // Only usersets pass membership on; an edge into a
                    // concrete parent is never expanded by a check.
                    if tuple.parent.is_userset() {
                        traversal.push(tuple.parent)?;
                    }
                }
            }
        }

        Ok(traversal.into_visited())
    }
}
