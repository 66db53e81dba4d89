//! In-memory storage implementation for testing and development
//!
//! Behaves like a small transactional database: every account row has its own
//! async lock, units of work stage their writes until commit, and id
//! sequences are shared and never rolled back.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
    account_seq: i64,
    entry_seq: i64,
    transfer_seq: i64,
}

fn next_id(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<i64, Arc<RowLock<()>>>>,
}

impl Shared {
    fn tables(&self) -> StorageResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Backend("table lock poisoned".to_string()))
    }

    async fn lock_row(&self, account_id: i64) -> StorageResult<OwnedMutexGuard<()>> {
        let row = {
            let mut locks = self
                .row_locks
                .lock()
                .map_err(|_| StorageError::Backend("row lock table poisoned".to_string()))?;
            locks.entry(account_id).or_default().clone()
        };
        Ok(row.lock_owned().await)
    }
}

fn account_not_found(id: i64) -> StorageError {
    StorageError::NotFound {
        entity: "account",
        id,
    }
}

fn apply_delta(account: &mut Account, amount: i64) -> StorageResult<()> {
    account.balance = account.balance.checked_add(amount).ok_or_else(|| {
        StorageError::CheckViolation(format!(
            "balance of account {} out of range after adding {}",
            account.id, amount
        ))
    })?;
    Ok(())
}

fn page<T>(rows: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    rows.skip(offset).take(limit).collect()
}

fn owned_by(account: &Account, owner: &Option<String>) -> bool {
    owner.as_deref().is_none_or(|o| account.owner == o)
}

fn check_foreign_key(exists: bool, table: &str, account_id: i64) -> StorageResult<()> {
    if exists {
        Ok(())
    } else {
        Err(StorageError::ForeignKeyViolation(format!(
            "{table} references missing account {account_id}"
        )))
    }
}

/// Row counts across all committed tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCounts {
    pub accounts: usize,
    pub entries: usize,
    pub transfers: usize,
}

/// In-memory store for testing and development
///
/// Cloning yields another handle onto the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create a new, empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Count committed rows in every table
    pub fn row_counts(&self) -> StorageResult<RowCounts> {
        let tables = self.shared.tables()?;
        Ok(RowCounts {
            accounts: tables.accounts.len(),
            entries: tables.entries.len(),
            transfers: tables.transfers.len(),
        })
    }
}

#[async_trait]
impl Querier for MemoryStore {
    async fn create_account(&mut self, params: CreateAccountParams) -> StorageResult<Account> {
        let mut tables = self.shared.tables()?;
        let account = Account {
            id: next_id(&mut tables.account_seq),
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> StorageResult<Account> {
        self.shared
            .tables()?
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| account_not_found(id))
    }

    async fn get_account_for_update(&mut self, id: i64) -> StorageResult<Account> {
        // Outside a unit of work the lock only lasts for the read itself.
        self.get_account(id).await?;
        let _row = self.shared.lock_row(id).await?;
        self.get_account(id).await
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> StorageResult<Vec<Account>> {
        let tables = self.shared.tables()?;
        Ok(page(
            tables
                .accounts
                .values()
                .filter(|a| owned_by(a, &params.owner))
                .cloned(),
            params.limit,
            params.offset,
        ))
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> StorageResult<Account> {
        self.get_account(params.id).await?;
        let _row = self.shared.lock_row(params.id).await?;
        let mut tables = self.shared.tables()?;
        let account = tables
            .accounts
            .get_mut(&params.id)
            .ok_or_else(|| account_not_found(params.id))?;
        apply_delta(account, params.amount)?;
        Ok(account.clone())
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> StorageResult<Entry> {
        let mut tables = self.shared.tables()?;
        check_foreign_key(
            tables.accounts.contains_key(&params.account_id),
            "entry",
            params.account_id,
        )?;
        let entry = Entry {
            id: next_id(&mut tables.entry_seq),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        tables.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> StorageResult<Entry> {
        self.shared
            .tables()?
            .entries
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound { entity: "entry", id })
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> StorageResult<Vec<Entry>> {
        let tables = self.shared.tables()?;
        Ok(page(
            tables
                .entries
                .values()
                .filter(|e| e.account_id == params.account_id)
                .cloned(),
            params.limit,
            params.offset,
        ))
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StorageResult<Transfer> {
        let mut tables = self.shared.tables()?;
        for account_id in [params.from_account_id, params.to_account_id] {
            check_foreign_key(
                tables.accounts.contains_key(&account_id),
                "transfer",
                account_id,
            )?;
        }
        let transfer = Transfer {
            id: next_id(&mut tables.transfer_seq),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        tables.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> StorageResult<Transfer> {
        self.shared
            .tables()?
            .transfers
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "transfer",
                id,
            })
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> StorageResult<Vec<Transfer>> {
        let tables = self.shared.tables()?;
        Ok(page(
            tables
                .transfers
                .values()
                .filter(|t| {
                    t.from_account_id == params.from_account_id
                        || t.to_account_id == params.to_account_id
                })
                .cloned(),
            params.limit,
            params.offset,
        ))
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StorageResult<MemoryTx> {
        Ok(MemoryTx {
            shared: Arc::clone(&self.shared),
            accounts: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
            held: HashMap::new(),
        })
    }
}

/// Unit of work over a [`MemoryStore`]
///
/// Writes are staged and become visible to others only on commit. Row locks
/// taken by the unit of work are held until it commits, rolls back or is
/// dropped.
#[derive(Debug)]
pub struct MemoryTx {
    shared: Arc<Shared>,
    accounts: BTreeMap<i64, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    held: HashMap<i64, OwnedMutexGuard<()>>,
}

impl MemoryTx {
    /// Account ids whose row locks this unit of work currently holds
    pub fn held_locks(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.held.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn visible_account(&self, tables: &Tables, id: i64) -> Option<Account> {
        self.accounts
            .get(&id)
            .or_else(|| tables.accounts.get(&id))
            .cloned()
    }

    fn account(&self, id: i64) -> StorageResult<Account> {
        let tables = self.shared.tables()?;
        self.visible_account(&tables, id)
            .ok_or_else(|| account_not_found(id))
    }

    fn account_exists(&self, id: i64) -> StorageResult<bool> {
        let tables = self.shared.tables()?;
        Ok(self.accounts.contains_key(&id) || tables.accounts.contains_key(&id))
    }

    async fn acquire(&mut self, account_id: i64) -> StorageResult<()> {
        if !self.held.contains_key(&account_id) {
            let guard = self.shared.lock_row(account_id).await?;
            self.held.insert(account_id, guard);
        }
        Ok(())
    }
}

#[async_trait]
impl Querier for MemoryTx {
    async fn create_account(&mut self, params: CreateAccountParams) -> StorageResult<Account> {
        let id = next_id(&mut self.shared.tables()?.account_seq);
        let account = Account {
            id,
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> StorageResult<Account> {
        self.account(id)
    }

    async fn get_account_for_update(&mut self, id: i64) -> StorageResult<Account> {
        if !self.account_exists(id)? {
            return Err(account_not_found(id));
        }
        self.acquire(id).await?;
        self.account(id)
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> StorageResult<Vec<Account>> {
        let tables = self.shared.tables()?;
        let mut rows: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| owned_by(a, &params.owner))
            .map(|a| self.accounts.get(&a.id).unwrap_or(a).clone())
            .collect();
        rows.extend(
            self.accounts
                .values()
                .filter(|a| !tables.accounts.contains_key(&a.id) && owned_by(a, &params.owner))
                .cloned(),
        );
        rows.sort_by_key(|a| a.id);
        Ok(page(rows.into_iter(), params.limit, params.offset))
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> StorageResult<Account> {
        if !self.account_exists(params.id)? {
            return Err(account_not_found(params.id));
        }
        self.acquire(params.id).await?;
        let mut account = self.account(params.id)?;
        apply_delta(&mut account, params.amount)?;
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> StorageResult<Entry> {
        check_foreign_key(
            self.account_exists(params.account_id)?,
            "entry",
            params.account_id,
        )?;
        let entry = Entry {
            id: next_id(&mut self.shared.tables()?.entry_seq),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> StorageResult<Entry> {
        if let Some(entry) = self.entries.iter().find(|e| e.id == id) {
            return Ok(entry.clone());
        }
        self.shared
            .tables()?
            .entries
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound { entity: "entry", id })
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> StorageResult<Vec<Entry>> {
        let tables = self.shared.tables()?;
        let mut rows: Vec<Entry> = tables
            .entries
            .values()
            .chain(self.entries.iter())
            .filter(|e| e.account_id == params.account_id)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.id);
        Ok(page(rows.into_iter(), params.limit, params.offset))
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StorageResult<Transfer> {
        for account_id in [params.from_account_id, params.to_account_id] {
            check_foreign_key(self.account_exists(account_id)?, "transfer", account_id)?;
        }
        let transfer = Transfer {
            id: next_id(&mut self.shared.tables()?.transfer_seq),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> StorageResult<Transfer> {
        if let Some(transfer) = self.transfers.iter().find(|t| t.id == id) {
            return Ok(transfer.clone());
        }
        self.shared
            .tables()?
            .transfers
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "transfer",
                id,
            })
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> StorageResult<Vec<Transfer>> {
        let tables = self.shared.tables()?;
        let mut rows: Vec<Transfer> = tables
            .transfers
            .values()
            .chain(self.transfers.iter())
            .filter(|t| {
                t.from_account_id == params.from_account_id
                    || t.to_account_id == params.to_account_id
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.id);
        Ok(page(rows.into_iter(), params.limit, params.offset))
    }
}

#[async_trait]
impl UnitOfWork for MemoryTx {
    async fn commit(mut self) -> StorageResult<()> {
        {
            let mut tables = self.shared.tables()?;
            tables.accounts.append(&mut self.accounts);
            for entry in self.entries.drain(..) {
                tables.entries.insert(entry.id, entry);
            }
            for transfer in self.transfers.drain(..) {
                tables.transfers.insert(transfer.id, transfer);
            }
        }
        // Row locks are released only once the writes are visible.
        self.held.clear();
        Ok(())
    }

    async fn rollback(self) -> StorageResult<()> {
        Ok(())
    }
}
