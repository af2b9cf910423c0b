//! Catalog lookup service

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::Book,
    repository::LibraryStore,
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LibraryStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    /// Get a book by title, ignoring case
    pub async fn get_book(&self, title: &str) -> AppResult<Book> {
        if title.trim().is_empty() {
            return Err(AppError::Validation("title is mandatory".to_string()));
        }
        self.store.get_book_details(title).await
    }

    /// List every book in the catalog
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.store.get_all_book_details().await
    }
}
