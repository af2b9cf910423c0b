//! Business logic services

pub mod catalog;
pub mod loans;

use std::sync::Arc;

use crate::repository::LibraryStore;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    store: Arc<dyn LibraryStore>,
}

impl Services {
    /// Create all services over the given store
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self {
            catalog: catalog::CatalogService::new(store.clone()),
            loans: loans::LoansService::new(store.clone()),
            store,
        }
    }

    /// Release the underlying store
    pub async fn shutdown(&self) {
        self.store.close().await;
    }
}
