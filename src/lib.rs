//! Library Loan Server
//!
//! A REST JSON API over a small lending library: look up books, borrow
//! them, extend loans and return books. The catalog and loan ledger live
//! either in process memory or in PostgreSQL behind one store contract.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
