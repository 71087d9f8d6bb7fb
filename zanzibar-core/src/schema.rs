use crate::{error::ZanzibarError, models::*, repository::Repository};
use std::sync::Arc;
use tracing::info;

/// Schema registry: which permissions each `(namespace, relation)` confers.
pub struct SchemaRegistry {
    repository: Arc<dyn Repository>,
}

impl SchemaRegistry {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Declare one relation -> permission row. Declaring it twice is a no-op.
    pub async fn declare_relation(&self, relation: Relation) -> Result<(), ZanzibarError> {
        self.write_relations(WriteRelationsRequest {
            adds: vec![relation],
            removes: Vec::new(),
        })
        .await
    }

    /// Remove one row. Removing a missing row is a no-op.
    pub async fn remove_relation(&self, relation: Relation) -> Result<(), ZanzibarError> {
        self.write_relations(WriteRelationsRequest {
            adds: Vec::new(),
            removes: vec![relation],
        })
        .await
    }

    /// Apply adds and removes atomically
    pub async fn write_relations(&self, request: WriteRelationsRequest) -> Result<(), ZanzibarError> {
        for relation in request.adds.iter().chain(&request.removes) {
            relation.validate()?;
        }

        info!(
            "Writing relations: {} adds, {} removes",
            request.adds.len(),
            request.removes.len()
        );
        self.repository.write_relations(request).await
    }

    pub async fn list_relations(&self) -> Result<Vec<Relation>, ZanzibarError> {
        self.repository.list_relations().await
    }

    /// namespace -> relation -> permissions
    pub async fn namespaces(&self) -> Result<Namespaces, ZanzibarError> {
        Ok(aggregate(self.list_relations().await?))
    }
}

/// Group schema rows by namespace, then relation, collecting permissions.
pub fn aggregate(relations: impl IntoIterator<Item = Relation>) -> Namespaces {
    let mut namespaces = Namespaces::new();
    for row in relations {
        namespaces
            .entry(row.namespace)
            .or_default()
            .relations
            .entry(row.relation)
            .or_default()
            .permissions
            .insert(row.permission);
    }
    namespaces
}
