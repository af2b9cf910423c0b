//! Loan management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{CreateLoan, Loan, LoanId},
    AppState,
};

/// List all loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    responses(
        (status = 200, description = "Every loan, active and closed", body = Vec<Loan>)
    )
)]
pub async fn list_loans(State(state): State<AppState>) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list_loans().await?;
    Ok(Json(loans))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrow",
    tag = "loans",
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Borrower name or title missing", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "No copies available", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state.services.loans.create_loan(request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Extend a loan's due date
#[utoipa::path(
    post,
    path = "/extend/{id}",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan extended", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Loan already closed", body = crate::error::ErrorResponse)
    )
)]
pub async fn extend_loan(
    State(state): State<AppState>,
    Path(loan_id): Path<LoanId>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.extend_loan(loan_id).await?;
    Ok(Json(loan))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/return/{id}",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned, loan closed", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Loan already closed", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    Path(loan_id): Path<LoanId>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.return_loan(loan_id).await?;
    Ok(Json(loan))
}
