//! PostgreSQL-backed tuple and relation repository
//!
//! Schema (see `migrations/`):
//! - `relations(namespace, relation, permission)`, unique on all three columns
//! - `tuples(parent_namespace, parent_id, parent_relation,
//!   child_namespace, child_id, child_relation)`, unique on all six columns
//!
//! Every write call runs in one transaction. Every snapshot is a
//! `REPEATABLE READ, READ ONLY` transaction that is rolled back when dropped.

use crate::{
    config::DatabaseConfig,
    error::{Result, ZanzibarError},
    models::*,
    repository::{RelationRepository, Repository, Snapshot, TupleRepository},
};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info, warn};

const INSERT_TUPLE: &str = r#"
    INSERT INTO tuples (
        parent_namespace, parent_id, parent_relation,
        child_namespace, child_id, child_relation
    ) VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT DO NOTHING
"#;

const DELETE_TUPLE: &str = r#"
    DELETE FROM tuples
    WHERE parent_namespace = $1
      AND parent_id = $2
      AND parent_relation = $3
      AND child_namespace = $4
      AND child_id = $5
      AND child_relation = $6
"#;

const TUPLE_COLUMNS: &str = "parent_namespace, parent_id, parent_relation, \
                             child_namespace, child_id, child_relation";

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from configuration and wrap it
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| ZanzibarError::storage("failed to connect", e))?;

        info!("Database connection pool created");
        Ok(Self::new(pool))
    }

    /// Apply the bundled migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ZanzibarError::StorageError(format!("failed to run migrations: {}", e)))?;

        info!("Database migrations applied");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| ZanzibarError::storage("failed to start transaction", e))
    }
}

#[async_trait]
impl TupleRepository for PostgresRepository {
    async fn write_tuples(&self, request: WriteRequest) -> Result<()> {
        debug!("Writing tuples: {} adds, {} removes", request.adds.len(), request.removes.len());

        let mut tx = self.begin().await?;

        for tuple in &request.adds {
            bind_tuple(sqlx::query(INSERT_TUPLE), tuple)
                .execute(&mut *tx)
                .await
                .map_err(|e| ZanzibarError::storage(&format!("failed to add tuple {}", tuple), e))?;
        }

        for tuple in &request.removes {
            bind_tuple(sqlx::query(DELETE_TUPLE), tuple)
                .execute(&mut *tx)
                .await
                .map_err(|e| ZanzibarError::storage(&format!("failed to remove tuple {}", tuple), e))?;
        }

        tx.commit()
            .await
            .map_err(|e| ZanzibarError::storage("failed to commit tuple write", e))?;

        Ok(())
    }
}

#[async_trait]
impl RelationRepository for PostgresRepository {
    async fn write_relations(&self, request: WriteRelationsRequest) -> Result<()> {
        let mut tx = self.begin().await?;

        for relation in &request.adds {
            sqlx::query(
                "INSERT INTO relations (namespace, relation, permission) VALUES ($1, $2, $3) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(&relation.namespace)
            .bind(&relation.relation)
            .bind(&relation.permission)
            .execute(&mut *tx)
            .await
            .map_err(|e| ZanzibarError::storage("failed to create relation", e))?;
        }

        for relation in &request.removes {
            sqlx::query(
                "DELETE FROM relations WHERE namespace = $1 AND relation = $2 AND permission = $3",
            )
            .bind(&relation.namespace)
            .bind(&relation.relation)
            .bind(&relation.permission)
            .execute(&mut *tx)
            .await
            .map_err(|e| ZanzibarError::storage("failed to delete relation", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| ZanzibarError::storage("failed to commit relation write", e))?;

        Ok(())
    }

    async fn list_relations(&self) -> Result<Vec<Relation>> {
        let rows = sqlx::query("SELECT namespace, relation, permission FROM relations")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ZanzibarError::storage("failed to list relations", e))?;

        rows.iter()
            .map(relation_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ZanzibarError::storage("failed to scan relation", e))
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn snapshot(&self) -> Result<Box<dyn Snapshot>> {
        let mut tx = self.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| ZanzibarError::storage("failed to open snapshot", e))?;

        Ok(Box::new(PostgresSnapshot { tx }))
    }

    async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Database health check failed: {}", e);
                false
            }
        }
    }
}

struct PostgresSnapshot {
    tx: Transaction<'static, Postgres>,
}

impl PostgresSnapshot {
    async fn fetch_tuples(&mut self, side: &str, set: &Set) -> Result<Vec<Tuple>> {
        let query = format!(
            "SELECT {cols} FROM tuples \
             WHERE {side}_namespace = $1 AND {side}_id = $2 AND {side}_relation = $3",
            cols = TUPLE_COLUMNS,
            side = side,
        );

        let rows = sqlx::query(&query)
            .bind(&set.namespace)
            .bind(&set.id)
            .bind(&set.relation)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| ZanzibarError::storage("failed to list tuples", e))?;

        rows.iter()
            .map(tuple_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ZanzibarError::storage("failed to scan tuple", e))
    }
}

#[async_trait]
impl Snapshot for PostgresSnapshot {
    async fn tuples_with_parent(&mut self, parent: &Set) -> Result<Vec<Tuple>> {
        self.fetch_tuples("parent", parent).await
    }

    async fn tuples_with_child(&mut self, child: &Set) -> Result<Vec<Tuple>> {
        self.fetch_tuples("child", child).await
    }

    async fn relations_for_edge(
        &mut self,
        parent_namespace: &str,
        parent_id: &str,
        child: &Set,
    ) -> Result<Vec<Relation>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT r.namespace, r.relation, r.permission
            FROM tuples t
            JOIN relations r
              ON r.namespace = t.parent_namespace
             AND r.relation = t.parent_relation
            WHERE t.parent_namespace = $1
              AND t.parent_id = $2
              AND t.child_namespace = $3
              AND t.child_id = $4
              AND t.child_relation = $5
            "#,
        )
        .bind(parent_namespace)
        .bind(parent_id)
        .bind(&child.namespace)
        .bind(&child.id)
        .bind(&child.relation)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| ZanzibarError::storage("failed to list parent relations", e))?;

        rows.iter()
            .map(relation_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ZanzibarError::storage("failed to scan relation", e))
    }

    async fn relations_in_namespace(&mut self, namespace: &str) -> Result<Vec<Relation>> {
        let rows = sqlx::query(
            "SELECT namespace, relation, permission FROM relations WHERE namespace = $1",
        )
        .bind(namespace)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| ZanzibarError::storage("failed to list namespace relations", e))?;

        rows.iter()
            .map(relation_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ZanzibarError::storage("failed to scan relation", e))
    }
}

fn bind_tuple<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    tuple: &'q Tuple,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(&tuple.parent.namespace)
        .bind(&tuple.parent.id)
        .bind(&tuple.parent.relation)
        .bind(&tuple.child.namespace)
        .bind(&tuple.child.id)
        .bind(&tuple.child.relation)
}

fn tuple_from_row(row: &PgRow) -> std::result::Result<Tuple, sqlx::Error> {
    Ok(Tuple {
        parent: Set {
            namespace: row.try_get("parent_namespace")?,
            id: row.try_get("parent_id")?,
            relation: row.try_get("parent_relation")?,
        },
        child: Set {
            namespace: row.try_get("child_namespace")?,
            id: row.try_get("child_id")?,
            relation: row.try_get("child_relation")?,
        },
    })
}

fn relation_from_row(row: &PgRow) -> std::result::Result<Relation, sqlx::Error> {
    Ok(Relation {
        namespace: row.try_get("namespace")?,
        relation: row.try_get("relation")?,
        permission: row.try_get("permission")?,
    })
}
