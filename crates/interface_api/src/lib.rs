//! HTTP API Layer
//!
//! This crate provides the REST API for the academy fee ledger using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for the catalog and the student ledger
//! - **Middleware**: Authentication, authorization, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(service, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_fees::FeeLedgerService;

use crate::config::ApiConfig;
use crate::handlers::{fees, health, ledger};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: FeeLedgerService,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `service` - Fee ledger service wired to its adapters
/// * `config` - API configuration
pub fn create_router(service: FeeLedgerService, config: ApiConfig) -> Router {
    let state = AppState { service, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let fee_structure_routes = Router::new()
        .route("/", get(fees::list_fee_structures).post(fees::create_fee_structure))
        .route("/:id", get(fees::get_fee_structure))
        .route("/:id/amount", put(fees::update_fee_structure_amount));

    let enrollment_routes = Router::new()
        .route("/", post(fees::create_enrollment))
        .route("/:id/deactivate", post(fees::deactivate_enrollment));

    let student_routes = Router::new()
        .route("/:id/fee-calculation", get(ledger::fee_calculation))
        .route("/:id/invoices", get(ledger::list_invoices))
        .route("/:id/invoices/generate", post(ledger::generate_invoices))
        .route("/:id/payments", get(ledger::list_payments));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/fee-structures", fee_structure_routes)
        .nest("/enrollments", enrollment_routes)
        .nest("/students", student_routes)
        .route("/payments/collect", post(ledger::collect_payment))
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
