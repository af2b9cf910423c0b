//! Store layer: the catalog and loan ledger behind a common contract

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::{AppConfig, StoreKind},
    error::AppResult,
    models::{Book, Loan, LoanId, LoanPolicy},
};

pub use memory::{LoanIdGenerator, MemoryStore};
pub use postgres::PgStore;

/// Capability set shared by every store variant.
///
/// Variants must agree on error kinds: unknown title or loan id is
/// [`AppError::NotFound`](crate::error::AppError::NotFound), an exhausted title is
/// [`AppError::Conflict`](crate::error::AppError::Conflict) and a closed loan is
/// [`AppError::InvalidState`](crate::error::AppError::InvalidState).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Look up a book, ignoring title case
    async fn get_book_details(&self, title: &str) -> AppResult<Book>;
    /// Snapshot of the whole catalog
    async fn get_all_book_details(&self) -> AppResult<Vec<Book>>;
    /// Snapshot of every loan, active and closed
    async fn get_all_loans(&self) -> AppResult<Vec<Loan>>;
    /// Lend one copy of `title` to `borrower_name`
    async fn add_loan(&self, borrower_name: &str, title: &str) -> AppResult<Loan>;
    /// Push the due date of an active loan back by the extension period
    async fn extend_loan(&self, loan_id: LoanId) -> AppResult<Loan>;
    /// Close an active loan and put the copy back on the shelf
    async fn return_book(&self, loan_id: LoanId) -> AppResult<Loan>;
    /// Release held resources. Called once at shutdown.
    async fn close(&self);
}

/// Build the store selected by configuration
pub async fn create_store(config: &AppConfig) -> AppResult<Arc<dyn LibraryStore>> {
    let policy = LoanPolicy::try_from(&config.loans)?;

    match config.store.kind {
        StoreKind::Memory => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::seeded(policy)))
        }
        StoreKind::Postgres => {
            tracing::info!("Using PostgreSQL store");
            let store = PgStore::connect(&config.database, policy).await?;
            Ok(Arc::new(store))
        }
    }
}
