//! Loan model, lifecycle status and lending periods

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
};

pub type LoanId = i64;

/// Default borrowing period in days
pub const DEFAULT_LOAN_PERIOD_DAYS: i64 = 28;
/// Default extension granted per renewal, in days
pub const DEFAULT_EXTENSION_DAYS: i64 = 21;

/// Loan lifecycle. Only `Active -> Closed` is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Closed,
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LoanStatus::Active => "active",
            LoanStatus::Closed => "closed",
        };
        write!(f, "{}", label)
    }
}

/// A book lent to a borrower
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Loan {
    pub id: LoanId,
    pub borrower_name: String,
    /// Catalog title of the borrowed book
    pub title: String,
    /// Seconds since the Unix epoch
    #[serde(with = "chrono::serde::ts_seconds")]
    #[schema(value_type = i64)]
    pub loan_date: DateTime<Utc>,
    /// Seconds since the Unix epoch
    #[serde(with = "chrono::serde::ts_seconds")]
    #[schema(value_type = i64)]
    pub return_date: DateTime<Utc>,
    pub status: LoanStatus,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

/// Borrow request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    #[validate(length(min = 1, message = "borrower_name is mandatory"))]
    #[serde(default)]
    pub borrower_name: String,
    #[validate(length(min = 1, message = "title is mandatory"))]
    #[serde(default)]
    pub title: String,
}

/// Lending periods applied by the stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    pub loan_period: Duration,
    pub extension: Duration,
}

impl LoanPolicy {
    /// Build a policy from whole days. The loan period must be positive and
    /// the extension must not be negative.
    pub fn from_days(loan_period_days: i64, extension_days: i64) -> AppResult<Self> {
        if loan_period_days <= 0 {
            return Err(AppError::Validation(format!(
                "loan period must be at least one day, got {}",
                loan_period_days
            )));
        }
        if extension_days < 0 {
            return Err(AppError::Validation(format!(
                "loan extension must not be negative, got {}",
                extension_days
            )));
        }

        let loan_period = Duration::try_days(loan_period_days).ok_or_else(|| {
            AppError::Validation(format!("loan period of {} days is too long", loan_period_days))
        })?;
        let extension = Duration::try_days(extension_days).ok_or_else(|| {
            AppError::Validation(format!("loan extension of {} days is too long", extension_days))
        })?;

        Ok(Self {
            loan_period,
            extension,
        })
    }

    /// Due date for a loan starting at `start`
    pub fn due_date(&self, start: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        start.checked_add_signed(self.loan_period).ok_or_else(|| {
            AppError::Internal(format!("due date out of range for loan starting {}", start))
        })
    }

    /// Due date after one extension of `current`
    pub fn extended(&self, current: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        current.checked_add_signed(self.extension).ok_or_else(|| {
            AppError::Internal(format!("due date {} cannot be extended further", current))
        })
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_period: Duration::days(DEFAULT_LOAN_PERIOD_DAYS),
            extension: Duration::days(DEFAULT_EXTENSION_DAYS),
        }
    }
}

impl TryFrom<&LoansConfig> for LoanPolicy {
    type Error = AppError;

    fn try_from(config: &LoansConfig) -> AppResult<Self> {
        Self::from_days(config.period_days, config.extension_days)
    }
}
