//! Account management functionality

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_create_account, validate_page};

/// Account manager for opening accounts and reading their history
pub struct AccountManager<S: Store> {
    pub(crate) storage: S,
}

impl<S: Store + Clone> AccountManager<S> {
    /// Create a new account manager
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn querier(&self) -> S {
        self.storage.clone()
    }

    /// Open a new account
    pub async fn create_account(&self, params: CreateAccountParams) -> LedgerResult<Account> {
        validate_create_account(&params)?;
        self.querier()
            .create_account(params)
            .await
            .during("create account")
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: i64) -> LedgerResult<Account> {
        self.querier()
            .get_account(account_id)
            .await
            .during("get account")
    }

    /// List accounts, optionally restricted to one owner
    pub async fn list_accounts(&self, params: ListAccountsParams) -> LedgerResult<Vec<Account>> {
        validate_page(params.limit, params.offset)?;
        self.querier()
            .list_accounts(params)
            .await
            .during("list accounts")
    }

    /// Audit history of one account, oldest first
    pub async fn list_entries(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> LedgerResult<Vec<Entry>> {
        validate_page(limit, offset)?;
        self.querier()
            .list_entries(ListEntriesParams {
                account_id,
                limit,
                offset,
            })
            .await
            .during("list entries")
    }

    pub async fn get_entry(&self, entry_id: i64) -> LedgerResult<Entry> {
        self.querier()
            .get_entry(entry_id)
            .await
            .during("get entry")
    }

    /// Transfers leaving `from_account_id` or arriving at `to_account_id`
    pub async fn list_transfers(
        &self,
        from_account_id: i64,
        to_account_id: i64,
        limit: i64,
        offset: i64,
    ) -> LedgerResult<Vec<Transfer>> {
        validate_page(limit, offset)?;
        self.querier()
            .list_transfers(ListTransfersParams {
                from_account_id,
                to_account_id,
                limit,
                offset,
            })
            .await
            .during("list transfers")
    }

    pub async fn get_transfer(&self, transfer_id: i64) -> LedgerResult<Transfer> {
        self.querier()
            .get_transfer(transfer_id)
            .await
            .during("get transfer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStore;

    #[tokio::test]
    async fn test_create_and_get_account() {
        let manager = AccountManager::new(MemoryStore::new());
        let account = manager
            .create_account(CreateAccountParams::new("alice", 250, "USD"))
            .await
            .unwrap();

        let fetched = manager.get_account(account.id).await.unwrap();
        assert_eq!(fetched, account);
        assert_eq!(fetched.balance, 250);
        assert_eq!(fetched.currency, "USD");
    }

    #[tokio::test]
    async fn test_invalid_account_is_not_written() {
        let store = MemoryStore::new();
        let manager = AccountManager::new(store.clone());
        let err = manager
            .create_account(CreateAccountParams::new("", 0, "USD"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
        assert_eq!(store.row_counts().unwrap().accounts, 0);
    }

    #[tokio::test]
    async fn test_missing_account_is_data_access_not_found() {
        let manager = AccountManager::new(MemoryStore::new());
        match manager.get_account(5).await.unwrap_err() {
            LedgerError::DataAccess { operation, source } => {
                assert_eq!(operation, "get account");
                assert!(source.is_not_found());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_accounts_by_owner_and_page() {
        let manager = AccountManager::new(MemoryStore::new());
        for (owner, currency) in [("alice", "USD"), ("bob", "USD"), ("alice", "EUR")] {
            manager
                .create_account(CreateAccountParams::new(owner, 0, currency))
                .await
                .unwrap();
        }

        let alice = manager
            .list_accounts(ListAccountsParams {
                owner: Some("alice".to_string()),
                limit: 5,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|a| a.owner == "alice"));

        let page = manager
            .list_accounts(ListAccountsParams {
                owner: None,
                limit: 2,
                offset: 2,
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].currency, "EUR");

        assert!(manager
            .list_accounts(ListAccountsParams {
                owner: None,
                limit: 0,
                offset: 0,
            })
            .await
            .is_err());
    }
}
