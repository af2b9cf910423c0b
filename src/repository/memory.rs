//! In-memory store.
//!
//! The catalog (lower-cased title -> [`Book`]) and the ledger (loan id -> [`Loan`])
//! live behind one reader/writer lock. Lookups share the read lock; borrowing,
//! extending, returning and closing take the write lock for their whole
//! check-then-act sequence, so two borrowers can never both take the last copy.

use std::collections::{hash_map::Entry, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{catalog_key, DEFAULT_CATALOG},
        Book, Loan, LoanId, LoanPolicy, LoanStatus,
    },
};

use super::LibraryStore;

/// Hands out loan ids: 1, 2, 3, ... never reused.
#[derive(Debug, Default)]
pub struct LoanIdGenerator {
    last: AtomicI64,
}

impl LoanIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume after `last`; the next id handed out is `last + 1`
    pub fn starting_after(last: LoanId) -> Self {
        Self {
            last: AtomicI64::new(last),
        }
    }

    pub fn next_id(&self) -> LoanId {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Debug, Default)]
struct Inventory {
    books: HashMap<String, Book>,
    loans: HashMap<LoanId, Loan>,
}

/// Store keeping the catalog and ledger in process memory
#[derive(Debug)]
pub struct MemoryStore {
    inventory: RwLock<Inventory>,
    ids: LoanIdGenerator,
    policy: LoanPolicy,
}

impl MemoryStore {
    /// Create a store over `books` with an empty ledger
    pub fn new(books: impl IntoIterator<Item = Book>, policy: LoanPolicy) -> Self {
        Self::with_id_generator(books, policy, LoanIdGenerator::new())
    }

    pub fn with_id_generator(
        books: impl IntoIterator<Item = Book>,
        policy: LoanPolicy,
        ids: LoanIdGenerator,
    ) -> Self {
        let mut catalog: HashMap<String, Book> = HashMap::new();
        for book in books {
            if book.available_copies < 0 {
                tracing::warn!(
                    "Skipping '{}': negative copy count {}",
                    book.title,
                    book.available_copies
                );
                continue;
            }
            match catalog.entry(book.key()) {
                Entry::Occupied(existing) => {
                    tracing::warn!(
                        "Skipping '{}': catalog already holds '{}' under the same key",
                        book.title,
                        existing.get().title
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(book);
                }
            }
        }

        Self {
            inventory: RwLock::new(Inventory {
                books: catalog,
                loans: HashMap::new(),
            }),
            ids,
            policy,
        }
    }

    /// Create a store seeded with the default catalog
    pub fn seeded(policy: LoanPolicy) -> Self {
        let books = DEFAULT_CATALOG
            .iter()
            .map(|(title, copies)| Book::new(*title, *copies));
        Self::new(books, policy)
    }

    pub fn policy(&self) -> LoanPolicy {
        self.policy
    }

    pub fn book(&self, title: &str) -> AppResult<Book> {
        self.inventory
            .read()
            .books
            .get(&catalog_key(title))
            .cloned()
            .ok_or_else(|| book_not_found(title))
    }

    pub fn books(&self) -> Vec<Book> {
        self.inventory.read().books.values().cloned().collect()
    }

    pub fn loans(&self) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self.inventory.read().loans.values().cloned().collect();
        loans.sort_by_key(|loan| loan.id);
        loans
    }

    pub fn borrow(&self, borrower_name: &str, title: &str) -> AppResult<Loan> {
        let mut inventory = self.inventory.write();

        let book = inventory
            .books
            .get_mut(&catalog_key(title))
            .ok_or_else(|| book_not_found(title))?;

        if book.available_copies <= 0 {
            tracing::warn!("No copies of '{}' left to lend", book.title);
            return Err(AppError::Conflict(format!(
                "No copies of '{}' available",
                book.title
            )));
        }

        let now = Utc::now();
        let return_date = self.policy.due_date(now)?;

        book.available_copies -= 1;
        let loan = Loan {
            id: self.ids.next_id(),
            borrower_name: borrower_name.to_string(),
            title: book.title.clone(),
            loan_date: now,
            return_date,
            status: LoanStatus::Active,
        };
        inventory.loans.insert(loan.id, loan.clone());

        tracing::info!("Loan {} created for '{}' ({})", loan.id, loan.title, loan.borrower_name);
        Ok(loan)
    }

    pub fn extend(&self, loan_id: LoanId) -> AppResult<Loan> {
        let mut inventory = self.inventory.write();

        let loan = inventory
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| loan_not_found(loan_id))?;
        ensure_active(loan)?;

        loan.return_date = self.policy.extended(loan.return_date)?;

        tracing::info!("Loan {} extended until {}", loan.id, loan.return_date);
        Ok(loan.clone())
    }

    pub fn return_loan(&self, loan_id: LoanId) -> AppResult<Loan> {
        let mut guard = self.inventory.write();
        let inventory = &mut *guard;

        let loan = inventory
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| loan_not_found(loan_id))?;
        ensure_active(loan)?;

        let book = inventory
            .books
            .get_mut(&catalog_key(&loan.title))
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Loan {} refers to '{}' which is missing from the catalog",
                    loan.id, loan.title
                ))
            })?;

        book.available_copies += 1;
        loan.status = LoanStatus::Closed;

        tracing::info!("Loan {} closed, '{}' returned", loan.id, loan.title);
        Ok(loan.clone())
    }

    /// Drop the catalog and ledger
    pub fn clear(&self) {
        tracing::info!("Clearing in-memory store");
        let mut inventory = self.inventory.write();
        *inventory = Inventory::default();
    }
}

fn ensure_active(loan: &Loan) -> AppResult<()> {
    if loan.is_active() {
        return Ok(());
    }
    tracing::warn!("Loan {} is already closed", loan.id);
    Err(AppError::InvalidState(format!("Loan {} is already closed", loan.id)))
}

fn book_not_found(title: &str) -> AppError {
    AppError::NotFound(format!("Book with title '{}' not found", title))
}

fn loan_not_found(loan_id: LoanId) -> AppError {
    AppError::NotFound(format!("Loan {} not found", loan_id))
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn get_book_details(&self, title: &str) -> AppResult<Book> {
        self.book(title)
    }

    async fn get_all_book_details(&self) -> AppResult<Vec<Book>> {
        Ok(self.books())
    }

    async fn get_all_loans(&self) -> AppResult<Vec<Loan>> {
        Ok(self.loans())
    }

    async fn add_loan(&self, borrower_name: &str, title: &str) -> AppResult<Loan> {
        self.borrow(borrower_name, title)
    }

    async fn extend_loan(&self, loan_id: LoanId) -> AppResult<Loan> {
        self.extend(loan_id)
    }

    async fn return_book(&self, loan_id: LoanId) -> AppResult<Loan> {
        self.return_loan(loan_id)
    }

    async fn close(&self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LoanPolicy {
        LoanPolicy::default()
    }

    fn store_with(title: &str, copies: i32) -> MemoryStore {
        MemoryStore::new([Book::new(title, copies)], policy())
    }

    #[test]
    fn test_id_generator_is_strictly_increasing() {
        let ids = LoanIdGenerator::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);

        let resumed = LoanIdGenerator::starting_after(41);
        assert_eq!(resumed.next_id(), 42);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let store = MemoryStore::seeded(policy());
        let upper = store.book("Alchemist").unwrap();
        let lower = store.book("alchemist").unwrap();
        let shouting = store.book("ALCHEMIST").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(lower, shouting);
    }

    #[test]
    fn test_unknown_title_not_found() {
        let store = MemoryStore::seeded(policy());
        let err = store.book("book_xyz").unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg.contains("book_xyz")));
    }

    #[test]
    fn test_empty_catalog_lists_nothing() {
        let store = MemoryStore::new(Vec::new(), policy());
        assert!(store.books().is_empty());
        assert!(store.loans().is_empty());
    }

    #[test]
    fn test_borrow_takes_one_copy_and_records_loan() {
        let store = store_with("Dune", 2);

        let loan = store.borrow("alice", "DUNE").unwrap();

        assert_eq!(loan.title, "Dune");
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.return_date - loan.loan_date, policy().loan_period);
        assert_eq!(store.book("dune").unwrap().available_copies, 1);
        assert_eq!(store.loans(), vec![loan]);
    }

    #[test]
    fn test_borrow_without_copies_conflicts() {
        let store = store_with("Dune", 1);
        store.borrow("alice", "dune").unwrap();

        let err = store.borrow("bob", "dune").unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.loans().len(), 1);
        assert_eq!(store.book("dune").unwrap().available_copies, 0);
    }

    #[test]
    fn test_extend_pushes_due_date() {
        let store = store_with("Dune", 3);
        let loan = store.borrow("alice", "dune").unwrap();

        let extended = store.extend(loan.id).unwrap();

        assert_eq!(extended.return_date - loan.return_date, policy().extension);
        assert_eq!(extended.loan_date, loan.loan_date);
        assert_eq!(store.book("dune").unwrap().available_copies, 2);
    }

    #[test]
    fn test_unknown_loan_not_found() {
        let store = store_with("Dune", 3);
        assert!(matches!(store.extend(99), Err(AppError::NotFound(_))));
        assert!(matches!(store.return_loan(99), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_return_restores_copy_and_closes_loan() {
        let store = store_with("Dune", 1);
        let loan = store.borrow("alice", "dune").unwrap();

        let returned = store.return_loan(loan.id).unwrap();

        assert_eq!(returned.status, LoanStatus::Closed);
        assert_eq!(store.book("dune").unwrap().available_copies, 1);
        assert!(matches!(store.return_loan(loan.id), Err(AppError::InvalidState(_))));
        assert!(matches!(store.extend(loan.id), Err(AppError::InvalidState(_))));
        assert_eq!(store.book("dune").unwrap().available_copies, 1);
    }

    #[test]
    fn test_ids_not_reused_after_close() {
        let store = store_with("Dune", 5);
        let first = store.borrow("alice", "dune").unwrap();
        store.return_loan(first.id).unwrap();
        let second = store.borrow("bob", "dune").unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_injected_generator_is_used() {
        let store = MemoryStore::with_id_generator(
            [Book::new("Dune", 1)],
            policy(),
            LoanIdGenerator::starting_after(100),
        );
        assert_eq!(store.borrow("alice", "dune").unwrap().id, 101);
    }

    #[test]
    fn test_due_date_overflow_leaves_store_untouched() {
        let policy = LoanPolicy::from_days(100_000_000, 21).unwrap();
        let store = MemoryStore::new([Book::new("Dune", 1)], policy);

        let err = store.borrow("alice", "dune").unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.book("dune").unwrap().available_copies, 1);
        assert!(store.loans().is_empty());
    }

    #[test]
    fn test_extension_overflow_keeps_due_date() {
        let store = store_with("Dune", 1);
        let loan = store.borrow("alice", "dune").unwrap();
        store.inventory.write().loans.get_mut(&loan.id).unwrap().return_date =
            chrono::DateTime::<Utc>::MAX_UTC;

        let err = store.extend(loan.id).unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        let stored = store.loans().remove(0);
        assert_eq!(stored.return_date, chrono::DateTime::<Utc>::MAX_UTC);
        assert_eq!(stored.status, LoanStatus::Active);
    }

    #[test]
    fn test_seed_keeps_first_of_case_variants() {
        let store = MemoryStore::new(
            [Book::new("Dune", 1), Book::new("DUNE", 5), Book::new("Siddhartha", 2)],
            policy(),
        );

        assert_eq!(store.books().len(), 2);
        let dune = store.book("dune").unwrap();
        assert_eq!(dune.title, "Dune");
        assert_eq!(dune.available_copies, 1);
    }

    #[test]
    fn test_seed_skips_negative_counts() {
        let broken = Book {
            title: "Dune".to_string(),
            available_copies: -1,
        };
        let store = MemoryStore::new([broken, Book::new("Siddhartha", 2)], policy());

        assert!(matches!(store.book("dune"), Err(AppError::NotFound(_))));
        assert!(store.books().iter().all(|b| b.available_copies >= 0));
    }

    #[tokio::test]
    async fn test_close_releases_everything() {
        let store = store_with("Dune", 3);
        store.add_loan("alice", "dune").await.unwrap();

        store.close().await;

        assert!(store.get_all_book_details().await.unwrap().is_empty());
        assert!(store.get_all_loans().await.unwrap().is_empty());
        assert!(matches!(
            store.get_book_details("dune").await,
            Err(AppError::NotFound(_))
        ));
    }
}
