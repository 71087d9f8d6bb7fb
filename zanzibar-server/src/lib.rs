//! Zanzibar Server - HTTP/JSON API for the relationship-based authorization engine
//!
//! This library builds the axum application; the binary in `main.rs` wires it
//! to a listener, a tuple store and logging.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

// Re-export commonly used types
pub use error::*;
pub use server::ZanzibarServer;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the main application router with all routes and middleware
pub fn create_app(server: ZanzibarServer) -> Router {
    routes::create_routes()
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(server)
}
