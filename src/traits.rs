//! Traits for storage abstraction

use async_trait::async_trait;

use crate::types::*;

/// Point reads and writes on accounts, entries and transfers
///
/// Implemented both by direct store handles and by units of work bound to a
/// single transaction, so the same code runs against either.
#[async_trait]
pub trait Querier: Send {
    /// Insert a new account
    async fn create_account(&mut self, params: CreateAccountParams) -> StorageResult<Account>;

    /// Read an account, failing with `NotFound` when absent
    async fn get_account(&mut self, id: i64) -> StorageResult<Account>;

    /// Read an account and take its row lock
    ///
    /// Blocks until the lock is available. Inside a unit of work the lock is
    /// held until commit or rollback.
    async fn get_account_for_update(&mut self, id: i64) -> StorageResult<Account>;

    /// List accounts ordered by id
    async fn list_accounts(&mut self, params: ListAccountsParams) -> StorageResult<Vec<Account>>;

    /// Add `amount` to the balance and return the updated row
    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> StorageResult<Account>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> StorageResult<Entry>;

    async fn get_entry(&mut self, id: i64) -> StorageResult<Entry>;

    /// List entries on one account ordered by id
    async fn list_entries(&mut self, params: ListEntriesParams) -> StorageResult<Vec<Entry>>;

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StorageResult<Transfer>;

    async fn get_transfer(&mut self, id: i64) -> StorageResult<Transfer>;

    /// List transfers ordered by id
    async fn list_transfers(&mut self, params: ListTransfersParams)
        -> StorageResult<Vec<Transfer>>;
}

/// A storage backend that can open transactions
///
/// Stores are shared between tasks, so unlike units of work they must be
/// `Sync`.
#[async_trait]
pub trait Store: Querier + Sync {
    /// Transaction-scoped accessor handed out by [`Store::begin`]
    type Tx: UnitOfWork;

    /// Begin a transaction with the backend's default isolation level
    async fn begin(&self) -> StorageResult<Self::Tx>;
}

/// A [`Querier`] whose lifetime is one transaction
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] rolls it
/// back.
#[async_trait]
pub trait UnitOfWork: Querier + Sized {
    async fn commit(self) -> StorageResult<()>;

    async fn rollback(self) -> StorageResult<()>;
}
