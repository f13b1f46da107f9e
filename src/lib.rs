pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod render;
pub mod schemas;
pub mod services;
pub mod startup;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::services::TransactionService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TransactionService>,
    pub admin_api_key: String,
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction)
                .get(handlers::transactions::search_transactions),
        )
        .route("/transactions/:code", get(handlers::transactions::get_transaction))
        .route("/serials/:serial", get(handlers::transactions::get_by_serial))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(cors)
        .with_state(state)
}
