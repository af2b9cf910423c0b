//! PostgreSQL store

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
    models::{Book, Loan, LoanId, LoanPolicy, LoanStatus},
};

use super::LibraryStore;

/// Store backed by a books table and a loans table.
///
/// Titles are matched with `LOWER(title) = LOWER($1)`. Each borrow, extension
/// and return runs in a single transaction that locks the rows it checks.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
    books_table: String,
    books_title_index: String,
    loans_table: String,
    policy: LoanPolicy,
}

/// Quote a configured table name for use as an SQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl PgStore {
    /// Connect, verify connectivity and make sure both tables exist
    pub async fn connect(config: &DatabaseConfig, policy: LoanPolicy) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create PostgreSQL connection pool: {}", e);
                AppError::Database(e)
            })?;

        tracing::info!("Connected to database");

        let store = Self::new(pool, &config.books_table, &config.loans_table, policy);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn new(pool: Pool<Postgres>, books_table: &str, loans_table: &str, policy: LoanPolicy) -> Self {
        Self {
            pool,
            books_table: quote_ident(books_table),
            books_title_index: quote_ident(&format!("{}_lower_title_key", books_table)),
            loans_table: quote_ident(loans_table),
            policy,
        }
    }

    /// Create the books and loans tables if they do not exist
    pub async fn ensure_schema(&self) -> AppResult<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                title TEXT PRIMARY KEY,
                available_copies INTEGER NOT NULL CHECK (available_copies >= 0)
            )
            "#,
            self.books_table
        ))
        .execute(&self.pool)
        .await?;

        // Titles are unique ignoring case, as in the in-memory catalog
        sqlx::query(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} (LOWER(title))",
            self.books_title_index, self.books_table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                name_of_borrower TEXT NOT NULL,
                loan_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                return_date TIMESTAMPTZ NOT NULL,
                status TEXT NOT NULL DEFAULT 'active'
            )
            "#,
            self.loans_table
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn select_loan(&self) -> String {
        format!(
            r#"
            SELECT id, name_of_borrower AS borrower_name, title, loan_date, return_date, status
            FROM {}
            "#,
            self.loans_table
        )
    }
}

#[async_trait]
impl LibraryStore for PgStore {
    async fn get_book_details(&self, title: &str) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            "SELECT title, available_copies FROM {} WHERE LOWER(title) = LOWER($1)",
            self.books_table
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with title '{}' not found", title)))
    }

    async fn get_all_book_details(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT title, available_copies FROM {} ORDER BY title",
            self.books_table
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn get_all_loans(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!("{} ORDER BY id", self.select_loan()))
            .fetch_all(&self.pool)
            .await?;

        Ok(loans)
    }

    async fn add_loan(&self, borrower_name: &str, title: &str) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT title, available_copies FROM {} WHERE LOWER(title) = LOWER($1) FOR UPDATE",
            self.books_table
        ))
        .bind(title)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with title '{}' not found", title)))?;

        if book.available_copies <= 0 {
            tracing::warn!("No copies of '{}' left to lend", book.title);
            return Err(AppError::Conflict(format!(
                "No copies of '{}' available",
                book.title
            )));
        }

        let now = chrono::Utc::now();
        let return_date = self.policy.due_date(now)?;

        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO {} (title, name_of_borrower, loan_date, return_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name_of_borrower AS borrower_name, title, loan_date, return_date, status
            "#,
            self.loans_table
        ))
        .bind(&book.title)
        .bind(borrower_name)
        .bind(now)
        .bind(return_date)
        .bind(LoanStatus::Active)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "UPDATE {} SET available_copies = available_copies - 1 WHERE title = $1",
            self.books_table
        ))
        .bind(&book.title)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Loan {} created for '{}' ({})", loan.id, loan.title, loan.borrower_name);
        Ok(loan)
    }

    async fn extend_loan(&self, loan_id: LoanId) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>(&format!(
            "{} WHERE id = $1 FOR UPDATE",
            self.select_loan()
        ))
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", loan_id)))?;

        if !loan.is_active() {
            tracing::warn!("Loan {} is already closed", loan.id);
            return Err(AppError::InvalidState(format!("Loan {} is already closed", loan.id)));
        }

        let return_date = self.policy.extended(loan.return_date)?;

        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            UPDATE {} SET return_date = $1
            WHERE id = $2
            RETURNING id, name_of_borrower AS borrower_name, title, loan_date, return_date, status
            "#,
            self.loans_table
        ))
        .bind(return_date)
        .bind(loan_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Loan {} extended until {}", loan.id, loan.return_date);
        Ok(loan)
    }

    async fn return_book(&self, loan_id: LoanId) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>(&format!(
            "{} WHERE id = $1 FOR UPDATE",
            self.select_loan()
        ))
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", loan_id)))?;

        if !loan.is_active() {
            tracing::warn!("Loan {} is already closed", loan.id);
            return Err(AppError::InvalidState(format!("Loan {} is already closed", loan.id)));
        }

        let restocked = sqlx::query(&format!(
            "UPDATE {} SET available_copies = available_copies + 1 WHERE title = $1",
            self.books_table
        ))
        .bind(&loan.title)
        .execute(&mut *tx)
        .await?;

        if restocked.rows_affected() == 0 {
            return Err(AppError::Internal(format!(
                "Loan {} refers to '{}' which is missing from the catalog",
                loan.id, loan.title
            )));
        }

        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            UPDATE {} SET status = $1
            WHERE id = $2
            RETURNING id, name_of_borrower AS borrower_name, title, loan_date, return_date, status
            "#,
            self.loans_table
        ))
        .bind(LoanStatus::Closed)
        .bind(loan_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Loan {} closed, '{}' returned", loan.id, loan.title);
        Ok(loan)
    }

    async fn close(&self) {
        tracing::info!("Closing the PostgreSQL connection pool");
        self.pool.close().await;
    }
}
