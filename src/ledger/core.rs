//! Main ledger orchestrator that coordinates accounts and transfers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::transfer::transfer_tx;
use crate::ledger::AccountManager;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::MAX_PAGE_SIZE;

/// Main ledger system over one storage backend
///
/// `Ledger` is `Send + Sync` whenever its store is, so a single instance can
/// be shared through an `Arc` by concurrent tasks.
pub struct Ledger<S: Store> {
    account_manager: AccountManager<S>,
}

impl<S: Store + Clone> Ledger<S> {
    /// Create a new ledger with the given storage backend
    pub fn new(storage: S) -> Self {
        Self {
            account_manager: AccountManager::new(storage),
        }
    }

    /// The underlying storage backend
    pub fn store(&self) -> &S {
        &self.account_manager.storage
    }

    // Account operations
    /// Open a new account
    pub async fn create_account(&self, params: CreateAccountParams) -> LedgerResult<Account> {
        self.account_manager.create_account(params).await
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: i64) -> LedgerResult<Account> {
        self.account_manager.get_account(account_id).await
    }

    /// List accounts
    pub async fn list_accounts(&self, params: ListAccountsParams) -> LedgerResult<Vec<Account>> {
        self.account_manager.list_accounts(params).await
    }

    /// Entries recorded against an account
    pub async fn list_entries(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> LedgerResult<Vec<Entry>> {
        self.account_manager
            .list_entries(account_id, limit, offset)
            .await
    }

    pub async fn get_entry(&self, entry_id: i64) -> LedgerResult<Entry> {
        self.account_manager.get_entry(entry_id).await
    }

    /// Transfers leaving `from_account_id` or arriving at `to_account_id`
    pub async fn list_transfers(
        &self,
        from_account_id: i64,
        to_account_id: i64,
        limit: i64,
        offset: i64,
    ) -> LedgerResult<Vec<Transfer>> {
        self.account_manager
            .list_transfers(from_account_id, to_account_id, limit, offset)
            .await
    }

    pub async fn get_transfer(&self, transfer_id: i64) -> LedgerResult<Transfer> {
        self.account_manager.get_transfer(transfer_id).await
    }

    // Transfer operations
    /// Move money between two accounts in a single transaction
    pub async fn transfer_tx(&self, request: TransferRequest) -> LedgerResult<TransferResult> {
        transfer_tx(self.store(), request).await
    }

    /// Validate the integrity of the ledger
    ///
    /// Reads are not taken from one snapshot, so run this while no transfers
    /// are in flight.
    pub async fn validate_integrity(&self) -> LedgerResult<LedgerIntegrityReport> {
        let accounts = self.all_accounts().await?;

        let mut issues = Vec::new();
        let mut total_balance: i128 = 0;
        let mut entry_sum: i128 = 0;
        let mut entry_count = 0usize;
        let mut transfer_count = 0usize;

        for account in &accounts {
            total_balance += i128::from(account.balance);
            if account.balance < 0 {
                issues.push(format!(
                    "Account {} has negative balance {}",
                    account.id, account.balance
                ));
            }

            let entries = self.all_entries(account.id).await?;
            entry_count += entries.len();
            entry_sum += entries.iter().map(|e| i128::from(e.amount)).sum::<i128>();

            // Each transfer is counted once, on its source account.
            for transfer in self.all_transfers(account.id).await? {
                if transfer.from_account_id != account.id {
                    continue;
                }
                transfer_count += 1;
                if transfer.amount <= 0 {
                    issues.push(format!(
                        "Transfer {} has non-positive amount {}",
                        transfer.id, transfer.amount
                    ));
                }
                if transfer.from_account_id == transfer.to_account_id {
                    issues.push(format!(
                        "Transfer {} moves funds within account {}",
                        transfer.id, transfer.from_account_id
                    ));
                }
            }
        }

        if entry_sum != 0 {
            issues.push(format!("Entries do not net to zero: sum = {entry_sum}"));
        }

        if entry_count != transfer_count * 2 {
            issues.push(format!(
                "Expected two entries per transfer: {entry_count} entries for {transfer_count} transfers"
            ));
        }

        Ok(LedgerIntegrityReport {
            checked_at: Utc::now(),
            is_valid: issues.is_empty(),
            issues,
            account_count: accounts.len(),
            total_balance,
            entry_count,
            entry_sum,
            transfer_count,
        })
    }

    async fn all_accounts(&self) -> LedgerResult<Vec<Account>> {
        let mut rows = Vec::new();
        loop {
            let page = self
                .list_accounts(ListAccountsParams {
                    owner: None,
                    limit: MAX_PAGE_SIZE,
                    offset: rows.len() as i64,
                })
                .await?;
            let done = (page.len() as i64) < MAX_PAGE_SIZE;
            rows.extend(page);
            if done {
                return Ok(rows);
            }
        }
    }

    async fn all_entries(&self, account_id: i64) -> LedgerResult<Vec<Entry>> {
        let mut rows = Vec::new();
        loop {
            let page = self
                .list_entries(account_id, MAX_PAGE_SIZE, rows.len() as i64)
                .await?;
            let done = (page.len() as i64) < MAX_PAGE_SIZE;
            rows.extend(page);
            if done {
                return Ok(rows);
            }
        }
    }

    async fn all_transfers(&self, account_id: i64) -> LedgerResult<Vec<Transfer>> {
        let mut rows = Vec::new();
        loop {
            let page = self
                .list_transfers(account_id, account_id, MAX_PAGE_SIZE, rows.len() as i64)
                .await?;
            let done = (page.len() as i64) < MAX_PAGE_SIZE;
            rows.extend(page);
            if done {
                return Ok(rows);
            }
        }
    }
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub checked_at: DateTime<Utc>,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub account_count: usize,
    pub total_balance: i128,
    pub entry_count: usize,
    pub entry_sum: i128,
    pub transfer_count: usize,
}
