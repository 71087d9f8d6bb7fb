use crate::{
    check::GraphResolver,
    config::EngineConfig,
    error::ZanzibarError,
    models::*,
    parent_relations::ReverseResolver,
    repository::Repository,
    schema::SchemaRegistry,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Core Zanzibar authorization engine
///
/// Thin orchestration over the schema registry, the tuple store and the two
/// resolvers. Every read operation runs against a single repository snapshot;
/// every write operation is one repository transaction.
pub struct AuthorizationEngine {
    /// Storage for tuples and relations
    repository: Arc<dyn Repository>,

    /// Namespace relation -> permission mapping
    schema: SchemaRegistry,

    /// Forward membership checks
    checker: GraphResolver,

    /// Relation enumeration for a subject on one object
    reverse: ReverseResolver,

    config: EngineConfig,
}

impl AuthorizationEngine {
    /// Create a new authorization engine with the given repository
    pub fn new(repository: Arc<dyn Repository>, config: EngineConfig) -> Result<Self, ZanzibarError> {
        config.validate()?;

        Ok(Self {
            schema: SchemaRegistry::new(repository.clone()),
            checker: GraphResolver::new(repository.clone(), config.clone()),
            reverse: ReverseResolver::new(repository.clone(), config.clone()),
            repository,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =============================================================================
    // Core Authorization Operations
    // =============================================================================

    /// Is `child` a member of `parent`, directly or through nested usersets?
    pub async fn check(&self, parent: &Set, child: &Set) -> Result<bool, ZanzibarError> {
        parent.validate()?;
        child.validate()?;

        let allowed = self.checker.check(parent, child).await?;
        debug!("Check {} in {}: {}", child, parent, allowed);
        Ok(allowed)
    }

    /// Answer several checks against one snapshot
    pub async fn batch_check(
        &self,
        requests: &[CheckRequest],
    ) -> Result<Vec<CheckResponse>, ZanzibarError> {
        for request in requests {
            request.parent.validate()?;
            request.child.validate()?;
        }

        let mut snapshot = self.repository.snapshot().await?;
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            let allowed = self
                .checker
                .check_in(snapshot.as_mut(), &request.parent, &request.child)
                .await?;
            responses.push(CheckResponse { allowed });
        }

        Ok(responses)
    }

    /// Relations, with their permissions, that `child` holds on `parent_namespace:parent_id`
    pub async fn parent_relations(
        &self,
        parent_namespace: &str,
        parent_id: &str,
        child: &Set,
    ) -> Result<ParentRelations, ZanzibarError> {
        Set::entity(parent_namespace, parent_id).validate()?;
        child.validate()?;

        self.reverse
            .parent_relations(parent_namespace, parent_id, child)
            .await
    }

    /// Does any relation `child` holds on the object confer `permission`?
    pub async fn has_permission(
        &self,
        parent_namespace: &str,
        parent_id: &str,
        permission: &str,
        child: &Set,
    ) -> Result<bool, ZanzibarError> {
        Set::entity(parent_namespace, parent_id).validate()?;
        child.validate()?;

        let permissions = self
            .reverse
            .permissions(parent_namespace, parent_id, child)
            .await?;
        Ok(permissions.contains(permission))
    }

    // =============================================================================
    // Tuple Management
    // =============================================================================

    /// Apply tuple adds and removes atomically
    pub async fn write(&self, request: WriteRequest) -> Result<(), ZanzibarError> {
        for tuple in request.adds.iter().chain(&request.removes) {
            tuple.validate()?;
        }
        if request.is_empty() {
            return Ok(());
        }

        info!(
            "Writing tuples: {} adds, {} removes",
            request.adds.len(),
            request.removes.len()
        );
        self.repository.write_tuples(request).await
    }

    // =============================================================================
    // Schema Management
    // =============================================================================

    /// namespace -> relation -> permissions
    pub async fn namespaces(&self) -> Result<Namespaces, ZanzibarError> {
        self.schema.namespaces().await
    }

    /// Apply relation adds and removes atomically
    pub async fn write_namespace_relations(
        &self,
        request: WriteRelationsRequest,
    ) -> Result<(), ZanzibarError> {
        self.schema.write_relations(request).await
    }

    pub async fn health_check(&self) -> bool {
        self.repository.health_check().await
    }
}
