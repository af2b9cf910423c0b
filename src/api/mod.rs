//! API handlers for the library REST endpoints

pub mod books;
pub mod health;
pub mod loans;
pub mod openapi;

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::AppState;

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books (catalog)
        .route("/book", get(books::list_books))
        .route("/book/:title", get(books::get_book))
        // Loans
        .route("/loans", get(loans::list_loans))
        .route("/borrow", post(loans::borrow_book))
        .route("/extend/:id", post(loans::extend_loan))
        .route("/return/:id", post(loans::return_book))
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
}
