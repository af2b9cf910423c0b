//! Concurrency tests for the in-memory store.
//!
//! Many borrowers race for fewer copies than there are requests; the store
//! must lend exactly the copies it has and never go negative.

use std::sync::{Arc, Barrier};
use std::thread;

use library_server::{
    error::AppError,
    models::{Book, LoanPolicy, LoanStatus},
    repository::{LibraryStore, MemoryStore},
};

const TITLE: &str = "Alchemist";

fn store(copies: i32, policy: LoanPolicy) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new([Book::new(TITLE, copies)], policy))
}

fn race_borrowers(copies: i32, borrowers: usize, policy: LoanPolicy) {
    let store = store(copies, policy);
    let barrier = Arc::new(Barrier::new(borrowers));

    let handles: Vec<_> = (0..borrowers)
        .map(|i| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.borrow(&format!("borrower-{}", i), "alchemist")
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let granted = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(_))))
        .count();

    assert_eq!(granted, copies as usize);
    assert_eq!(refused, borrowers - copies as usize);
    assert_eq!(store.book(TITLE).unwrap().available_copies, 0);

    let loans = store.loans();
    assert_eq!(loans.len(), copies as usize);
    let mut ids: Vec<_> = loans.iter().map(|l| l.id).collect();
    ids.dedup();
    assert_eq!(ids.len(), copies as usize);
    assert!(loans.iter().all(|l| l.status == LoanStatus::Active));
    assert!(loans
        .iter()
        .all(|l| l.return_date - l.loan_date == policy.loan_period));
}

#[test]
fn test_concurrent_borrows_never_over_lend() {
    for policy in [LoanPolicy::default(), LoanPolicy::from_days(7, 3).unwrap()] {
        race_borrowers(5, 32, policy);
        race_borrowers(1, 16, policy);
    }
}

#[test]
fn test_concurrent_returns_restore_every_copy() {
    let store = store(8, LoanPolicy::default());
    let loans: Vec<_> = (0..8)
        .map(|i| store.borrow(&format!("borrower-{}", i), TITLE).unwrap())
        .collect();
    assert_eq!(store.book(TITLE).unwrap().available_copies, 0);

    // Every loan is returned twice concurrently; exactly one return wins.
    let handles: Vec<_> = loans
        .iter()
        .flat_map(|loan| [loan.id, loan.id])
        .map(|id| {
            let store = store.clone();
            thread::spawn(move || store.return_loan(id))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let closed = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::InvalidState(_))))
        .count();

    assert_eq!(closed, 8);
    assert_eq!(rejected, 8);
    assert_eq!(store.book(TITLE).unwrap().available_copies, 8);
    assert!(store.loans().iter().all(|l| l.status == LoanStatus::Closed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrow_and_return_tasks() {
    let store: Arc<dyn LibraryStore> = store(3, LoanPolicy::default());

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                match store.add_loan(&format!("borrower-{}", i), TITLE).await {
                    Ok(loan) => {
                        store.extend_loan(loan.id).await.unwrap();
                        store.return_book(loan.id).await.unwrap();
                        true
                    }
                    Err(AppError::Conflict(_)) => false,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            })
        })
        .collect();

    let mut granted = 0;
    for task in tasks {
        if task.await.unwrap() {
            granted += 1;
        }
    }

    assert!(granted >= 3);
    let book = store.get_book_details(TITLE).await.unwrap();
    assert_eq!(book.available_copies, 3);
    let loans = store.get_all_loans().await.unwrap();
    assert_eq!(loans.len(), granted);
    assert!(loans.iter().all(|l| l.status == LoanStatus::Closed));
}

#[test]
fn test_trait_calls_from_plain_threads() {
    let store: Arc<dyn LibraryStore> = store(2, LoanPolicy::default());

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || {
                tokio_test::block_on(store.add_loan(&format!("borrower-{}", i), "ALCHEMIST"))
            })
        })
        .collect();

    let granted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(Result::is_ok)
        .count();

    assert_eq!(granted, 2);
    let book = tokio_test::block_on(store.get_book_details("alchemist")).unwrap();
    assert_eq!(book.available_copies, 0);
}
