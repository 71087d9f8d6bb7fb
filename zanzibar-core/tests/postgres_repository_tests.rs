//! PostgreSQL Repository Tests
//!
//! To run these tests:
//! 1. Ensure PostgreSQL is running and `DATABASE_URL` points at it
//! 2. cargo test --test postgres_repository_tests -- --ignored
//!
//! The bundled migrations are applied on connect. Each test uses its own
//! random namespace, so runs do not interfere with each other.

use std::sync::Arc;

use uuid::Uuid;
use zanzibar_core::repository::{PostgresRepository, RelationRepository, Repository, TupleRepository};
use zanzibar_core::*;

async fn setup_test_repo() -> PostgresRepository {
    let config = DatabaseConfig::from_env().expect("Invalid database configuration");
    let repo = PostgresRepository::connect(&config)
        .await
        .expect("Failed to connect to test database");
    repo.migrate().await.expect("Failed to run migrations");
    repo
}

fn test_namespace(kind: &str) -> String {
    format!("test.{}.{}", Uuid::new_v4().simple(), kind)
}

#[tokio::test]
#[ignore] // Run with: cargo test postgres_write_and_list -- --ignored
async fn test_postgres_write_and_list_tuples() {
    let repo = setup_test_repo().await;
    let note = test_namespace("Note");
    let tuple = Tuple::new(
        Set::userset(&note, "n1", "owner"),
        Set::entity(&test_namespace("User"), "alice"),
    );

    repo.write_tuples(WriteRequest::add(vec![tuple.clone(), tuple.clone()]))
        .await
        .unwrap();

    let mut snapshot = repo.snapshot().await.unwrap();
    assert_eq!(snapshot.tuples_with_parent(&tuple.parent).await.unwrap(), vec![tuple.clone()]);
    assert_eq!(snapshot.tuples_with_child(&tuple.child).await.unwrap(), vec![tuple.clone()]);
    drop(snapshot);

    repo.write_tuples(WriteRequest::remove(vec![tuple.clone()])).await.unwrap();
    repo.write_tuples(WriteRequest::remove(vec![tuple.clone()])).await.unwrap();

    let mut snapshot = repo.snapshot().await.unwrap();
    assert!(snapshot.tuples_with_parent(&tuple.parent).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_postgres_snapshot_is_consistent() {
    let repo = setup_test_repo().await;
    let tuple = Tuple::new(
        Set::userset(&test_namespace("Note"), "n1", "owner"),
        Set::entity(&test_namespace("User"), "bob"),
    );

    let mut snapshot = repo.snapshot().await.unwrap();
    // Establish the snapshot before the concurrent write lands.
    assert!(snapshot.tuples_with_parent(&tuple.parent).await.unwrap().is_empty());

    repo.write_tuples(WriteRequest::add(vec![tuple.clone()])).await.unwrap();

    assert!(
        snapshot.tuples_with_parent(&tuple.parent).await.unwrap().is_empty(),
        "an open snapshot must not observe later writes"
    );
    drop(snapshot);

    let mut fresh = repo.snapshot().await.unwrap();
    assert_eq!(fresh.tuples_with_parent(&tuple.parent).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_postgres_relations_for_edge() {
    let repo = setup_test_repo().await;
    let note = test_namespace("Note");
    let user = Set::entity(&test_namespace("User"), "carol");

    repo.write_tuples(WriteRequest::add(vec![Tuple::new(
        Set::userset(&note, "n1", "owner"),
        user.clone(),
    )]))
    .await
    .unwrap();
    repo.write_relations(WriteRelationsRequest {
        adds: vec![
            Relation::new(&note, "owner", "read"),
            Relation::new(&note, "owner", "write"),
            Relation::new(&note, "viewer", "read"),
        ],
        removes: vec![],
    })
    .await
    .unwrap();

    let mut snapshot = repo.snapshot().await.unwrap();
    let mut granted = snapshot.relations_for_edge(&note, "n1", &user).await.unwrap();
    granted.sort();
    assert_eq!(
        granted,
        vec![
            Relation::new(&note, "owner", "read"),
            Relation::new(&note, "owner", "write"),
        ]
    );
}

#[tokio::test]
#[ignore]
async fn test_postgres_engine_group_check() {
    let repo = Arc::new(setup_test_repo().await);
    let engine = AuthorizationEngine::new(repo, EngineConfig::default()).unwrap();

    let owner = Set::userset(&test_namespace("Note"), "n1", "owner");
    let group = Set::userset(&test_namespace("Group"), "g1", "member");
    let user = Set::entity(&test_namespace("User"), "dave");

    engine
        .write(WriteRequest::add(vec![
            Tuple::new(owner.clone(), group.clone()),
            Tuple::new(group, user.clone()),
        ]))
        .await
        .unwrap();

    assert!(engine.check(&owner, &user).await.unwrap());
    assert!(engine.health_check().await);
}

#[tokio::test]
#[ignore]
async fn test_postgres_failed_write_applies_nothing() {
    let repo = setup_test_repo().await;
    let note = test_namespace("Note");
    let user = test_namespace("User");
    let first = Tuple::new(Set::userset(&note, "n1", "owner"), Set::entity(&user, "erin"));
    let second = Tuple::new(Set::userset(&note, "n1", "viewer"), Set::entity(&user, "frank"));
    // PostgreSQL text columns reject NUL bytes, so the third insert fails.
    let rejected = Tuple::new(Set::userset(&note, "n1", "owner"), Set::entity(&user, "bad\0id"));

    let err = repo
        .write_tuples(WriteRequest::add(vec![first.clone(), second.clone(), rejected]))
        .await
        .unwrap_err();
    assert!(err.is_retryable(), "storage failures are reported as StorageError: {}", err);

    let mut snapshot = repo.snapshot().await.unwrap();
    assert!(snapshot.tuples_with_parent(&first.parent).await.unwrap().is_empty());
    assert!(snapshot.tuples_with_parent(&second.parent).await.unwrap().is_empty());
}
