//! Data models for the library server

pub mod book;
pub mod loan;

// Re-export commonly used types
pub use book::Book;
pub use loan::{CreateLoan, Loan, LoanId, LoanPolicy, LoanStatus};
