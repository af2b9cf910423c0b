//! Catalog lookup endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::AppResult, models::Book, AppState};

/// List every book with its available copies
#[utoipa::path(
    get,
    path = "/book",
    tag = "books",
    responses(
        (status = 200, description = "Catalog snapshot", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books().await?;
    Ok(Json(books))
}

/// Get a book and its available copies
#[utoipa::path(
    get,
    path = "/book/{title}",
    tag = "books",
    params(
        ("title" = String, Path, description = "Book title (case-insensitive)")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 400, description = "Empty title", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(&title).await?;
    Ok(Json(book))
}
