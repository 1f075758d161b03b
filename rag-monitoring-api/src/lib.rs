//! HTTP surface of the RAG monitoring service.
//!
//! This crate wires the observability pipeline around the service routes:
//! CORS, then request-received logging, then per-request tracing spans,
//! innermost the router. The order is load-bearing: the received-request
//! line is emitted before any span exists, while everything logged inside
//! the router carries trace and span ids.

pub mod observability;
pub mod routes;

use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};

/// Build the service router with the full middleware stack attached.
///
/// Layers run outermost-first in the order: CORS, request-received log,
/// tracing span, router.
pub fn app() -> Router {
    routes::router()
        .layer(middleware::from_fn(observability::tracing::tracing_middleware))
        .layer(middleware::from_fn(
            observability::logging::request_received_middleware,
        ))
        .layer(cors_layer())
}

/// Permissive CORS policy applied uniformly to every request.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
