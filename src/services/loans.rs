//! Loan management service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{CreateLoan, Loan, LoanId},
    repository::LibraryStore,
};

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn LibraryStore>,
}

impl LoansService {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    /// List every loan, active and closed
    pub async fn list_loans(&self) -> AppResult<Vec<Loan>> {
        self.store.get_all_loans().await
    }

    /// Create a new loan (borrow a book)
    pub async fn create_loan(&self, request: CreateLoan) -> AppResult<Loan> {
        request.validate()?;
        for (field, value) in [("borrower_name", &request.borrower_name), ("title", &request.title)] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} is mandatory", field)));
            }
        }

        self.store.add_loan(&request.borrower_name, &request.title).await
    }

    /// Extend an active loan
    pub async fn extend_loan(&self, loan_id: LoanId) -> AppResult<Loan> {
        self.store.extend_loan(loan_id).await
    }

    /// Return a borrowed book
    pub async fn return_loan(&self, loan_id: LoanId) -> AppResult<Loan> {
        self.store.return_book(loan_id).await
    }
}
