//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library API",
        version = "1.0.0",
        description = "Book lookup, borrowing, loan extension and returns"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        // Loans
        loans::list_loans,
        loans::borrow_book,
        loans::extend_loan,
        loans::return_book,
    ),
    components(
        schemas(
            crate::models::book::Book,
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::CreateLoan,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog lookup"),
        (name = "loans", description = "Loan management")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
