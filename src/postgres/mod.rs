//! PostgreSQL storage backend
//!
//! Expects the `accounts`, `entries` and `transfers` tables to exist already:
//!
//! | table | columns |
//! |-------|---------|
//! | accounts | `id bigserial`, `owner varchar`, `balance bigint`, `currency varchar`, `created_at timestamptz` |
//! | entries | `id bigserial`, `account_id bigint references accounts`, `amount bigint`, `created_at timestamptz` |
//! | transfers | `id bigserial`, `from_account_id bigint references accounts`, `to_account_id bigint references accounts`, `amount bigint`, `created_at timestamptz` |
//!
//! ## Thread Safety
//!
//! `PgStore` wraps a `PgPool` and is cheap to clone. A `PgTx` owns one pooled
//! connection for the lifetime of its transaction.

mod queries;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use crate::config::DatabaseConfig;
use crate::traits::*;
use crate::types::*;

/// Direct accessor over a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            "PostgreSQL connection pool established"
        );
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Querier for PgStore {
    async fn create_account(&mut self, params: CreateAccountParams) -> StorageResult<Account> {
        queries::create_account(&self.pool, params).await
    }

    async fn get_account(&mut self, id: i64) -> StorageResult<Account> {
        queries::get_account(&self.pool, id).await
    }

    async fn get_account_for_update(&mut self, id: i64) -> StorageResult<Account> {
        queries::get_account_for_update(&self.pool, id).await
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> StorageResult<Vec<Account>> {
        queries::list_accounts(&self.pool, params).await
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> StorageResult<Account> {
        queries::add_account_balance(&self.pool, params).await
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> StorageResult<Entry> {
        queries::create_entry(&self.pool, params).await
    }

    async fn get_entry(&mut self, id: i64) -> StorageResult<Entry> {
        queries::get_entry(&self.pool, id).await
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> StorageResult<Vec<Entry>> {
        queries::list_entries(&self.pool, params).await
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StorageResult<Transfer> {
        queries::create_transfer(&self.pool, params).await
    }

    async fn get_transfer(&mut self, id: i64) -> StorageResult<Transfer> {
        queries::get_transfer(&self.pool, id).await
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> StorageResult<Vec<Transfer>> {
        queries::list_transfers(&self.pool, params).await
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> StorageResult<PgTx> {
        Ok(PgTx {
            tx: self.pool.begin().await?,
        })
    }
}

/// Unit of work over one PostgreSQL transaction
///
/// Rolled back by sqlx when dropped without commit.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Querier for PgTx {
    async fn create_account(&mut self, params: CreateAccountParams) -> StorageResult<Account> {
        queries::create_account(&mut *self.tx, params).await
    }

    async fn get_account(&mut self, id: i64) -> StorageResult<Account> {
        queries::get_account(&mut *self.tx, id).await
    }

    async fn get_account_for_update(&mut self, id: i64) -> StorageResult<Account> {
        queries::get_account_for_update(&mut *self.tx, id).await
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> StorageResult<Vec<Account>> {
        queries::list_accounts(&mut *self.tx, params).await
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> StorageResult<Account> {
        queries::add_account_balance(&mut *self.tx, params).await
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> StorageResult<Entry> {
        queries::create_entry(&mut *self.tx, params).await
    }

    async fn get_entry(&mut self, id: i64) -> StorageResult<Entry> {
        queries::get_entry(&mut *self.tx, id).await
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> StorageResult<Vec<Entry>> {
        queries::list_entries(&mut *self.tx, params).await
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StorageResult<Transfer> {
        queries::create_transfer(&mut *self.tx, params).await
    }

    async fn get_transfer(&mut self, id: i64) -> StorageResult<Transfer> {
        queries::get_transfer(&mut *self.tx, id).await
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> StorageResult<Vec<Transfer>> {
        queries::list_transfers(&mut *self.tx, params).await
    }
}

#[async_trait]
impl UnitOfWork for PgTx {
    async fn commit(self) -> StorageResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StorageResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
