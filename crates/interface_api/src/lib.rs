//! HTTP API Layer
//!
//! This crate exposes the settlement engine over REST using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: One module per resource, each a thin call into [`SettlementEngine`]
//! - **Middleware**: Bearer authentication, request audit logging, tracing
//! - **DTOs**: Validated request bodies and response shapes
//! - **Error Handling**: Engine errors mapped onto consistent JSON error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(engine, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use domain_settlement::SettlementEngine;

use crate::config::ApiConfig;
use crate::middleware::{auth_middleware, audit_middleware};
use crate::handlers::{audit, balances, collections, commissions, health, payments, settlements};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SettlementEngine>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `engine` - Settlement engine wired to its store and directory
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(engine: Arc<SettlementEngine>, config: ApiConfig) -> Router {
    let state = AppState { engine, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let collection_routes = Router::new()
        .route("/", post(collections::record_collection));

    let commission_routes = Router::new()
        .route("/quote", post(commissions::quote_commission))
        .route("/:id/approve", post(commissions::approve_commission))
        .route("/:id/cancel", post(commissions::cancel_commission));

    let settlement_routes = Router::new()
        .route("/", post(settlements::create_settlement).get(settlements::list_settlements))
        .route("/:id", get(settlements::get_settlement))
        .route("/:id/confirm", post(settlements::confirm_settlement))
        .route("/:id/reject", post(settlements::reject_settlement));

    let agent_routes = Router::new()
        .route("/:id/outstanding", get(collections::list_outstanding))
        .route("/:id/payments", get(payments::list_payments));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/collections", collection_routes)
        .nest("/commissions", commission_routes)
        .nest("/settlements", settlement_routes)
        .nest("/agents", agent_routes)
        .route("/actors/:id/balance", get(balances::get_balance))
        .route("/payments", post(payments::submit_payment))
        .route("/audit", get(audit::list_audit_entries))
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
