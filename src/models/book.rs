//! Book model and catalog key handling

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A catalog entry and its lendable stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    /// Title as shown to borrowers
    pub title: String,
    /// Copies currently on the shelf
    pub available_copies: i32,
}

impl Book {
    pub fn new(title: impl Into<String>, available_copies: i32) -> Self {
        debug_assert!(available_copies >= 0, "copy count must not be negative");
        Self {
            title: title.into(),
            available_copies,
        }
    }

    /// Catalog key for this book
    pub fn key(&self) -> String {
        catalog_key(&self.title)
    }
}

/// Normalize a title into its catalog key. Lookups are case-insensitive.
pub fn catalog_key(title: &str) -> String {
    title.to_lowercase()
}

/// Titles seeded into the in-memory catalog
pub const DEFAULT_CATALOG: &[(&str, i32)] = &[
    ("Alchemist", 10),
    ("Dune", 10),
    ("Siddhartha", 10),
    ("The Hobbit", 10),
    ("War and Peace", 10),
];
