//! Core types and data structures for the banking system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer account holding a balance in a single currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: i64,
    /// Owner of the account
    pub owner: String,
    /// Current balance in minor currency units
    pub balance: i64,
    /// Currency code, e.g. "USD"
    pub currency: String,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

/// Immutable audit record of a single balance movement on one account
///
/// A negative amount is a debit, a positive amount a credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of money moved from one account to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Always positive
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for a transfer between two accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl TransferRequest {
    /// Create a new transfer request
    pub fn new(from_account_id: i64, to_account_id: i64, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }
}

/// Everything a committed transfer produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    /// Source account as it stands after the transfer
    pub from_account: Account,
    /// Destination account as it stands after the transfer
    pub to_account: Account,
    /// Debit entry on the source account
    pub from_entry: Entry,
    /// Credit entry on the destination account
    pub to_entry: Entry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

impl CreateAccountParams {
    pub fn new(owner: impl Into<String>, balance: i64, currency: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            balance,
            currency: currency.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl From<TransferRequest> for CreateTransferParams {
    fn from(request: TransferRequest) -> Self {
        Self {
            from_account_id: request.from_account_id,
            to_account_id: request.to_account_id,
            amount: request.amount,
        }
    }
}

/// Atomic balance delta on one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAccountBalanceParams {
    pub id: i64,
    pub amount: i64,
}

/// Page of accounts ordered by id, optionally restricted to one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAccountsParams {
    pub owner: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Page of entries on one account ordered by id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntriesParams {
    pub account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Page of transfers leaving `from_account_id` or arriving at `to_account_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTransfersParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Errors raised by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("insufficient balance: account {account_id} has {balance}, trying to transfer {amount}")]
    InsufficientFunds {
        account_id: i64,
        balance: i64,
        amount: i64,
    },
    #[error("{operation} failed: {source}")]
    DataAccess {
        operation: &'static str,
        #[source]
        source: StorageError,
    },
    #[error("tx err: {source}, rb err: {rollback}")]
    Rollback {
        #[source]
        source: Box<LedgerError>,
        rollback: StorageError,
    },
}

impl LedgerError {
    pub fn data_access(operation: &'static str, source: StorageError) -> Self {
        LedgerError::DataAccess { operation, source }
    }

    /// Whether a caller may reasonably retry the same request.
    ///
    /// Business-rule failures are permanent for a given input. Constraint
    /// violations and missing rows will fail again the same way.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::DataAccess { source, .. } => match source {
                StorageError::Backend(_) => true,
                #[cfg(feature = "postgres")]
                StorageError::Sqlx(_) => true,
                _ => false,
            },
            _ => false,
        }
    }
}

/// Attach the failing operation name to a storage result
pub trait StorageResultExt<T> {
    fn during(self, operation: &'static str) -> LedgerResult<T>;
}

impl<T> StorageResultExt<T> for StorageResult<T> {
    fn during(self, operation: &'static str) -> LedgerResult<T> {
        self.map_err(|source| LedgerError::data_access(operation, source))
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
