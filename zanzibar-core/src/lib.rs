//! Zanzibar-style relationship-based authorization engine
//!
//! Authorization decisions are answered by walking a graph of stored
//! relationship tuples:
//! - a **Set** is either a concrete entity (`org.User:alice`) or a userset
//!   (`org.Group:eng#member`, everyone holding `member` on `org.Group:eng`)
//! - a **Tuple** `parent@child` asserts that every member of `child` is a
//!   member of `parent`
//! - a **Relation** row declares that holders of a relation on a namespace
//!   get a permission
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use zanzibar_core::{
//!     repository::InMemoryRepository, AuthorizationEngine, EngineConfig, Set, Tuple, WriteRequest,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = AuthorizationEngine::new(Arc::new(InMemoryRepository::new()), EngineConfig::default())?;
//!
//! let owners = Set::userset("org.Note", "n1", "owner");
//! let eng = Set::userset("org.Group", "eng", "member");
//! let alice = Set::entity("org.User", "alice");
//!
//! engine
//!     .write(WriteRequest::add(vec![
//!         Tuple::new(owners.clone(), eng.clone()),
//!         Tuple::new(eng, alice.clone()),
//!     ]))
//!     .await?;
//!
//! assert!(engine.check(&owners, &alice).await?);
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod engine;
pub mod repository;
pub mod schema;
pub mod check;
pub mod parent_relations;
pub mod config;
pub mod error;
mod traversal;

pub use models::*;
pub use engine::*;
pub use schema::*;
pub use config::*;
pub use error::*;
