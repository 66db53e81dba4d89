//! Integration tests for banking-core

use banking_core::{
    utils::MemoryStore, Account, CreateAccountParams, Ledger, LedgerError, ListAccountsParams,
    StorageError, TransferRequest,
};

async fn open(ledger: &Ledger<MemoryStore>, owner: &str, balance: i64) -> Account {
    ledger
        .create_account(CreateAccountParams::new(owner, balance, "USD"))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_worked_example() {
    let store = MemoryStore::new();
    let ledger = Ledger::new(store.clone());
    let x = open(&ledger, "x", 1000).await;
    let y = open(&ledger, "y", 500).await;

    let result = ledger
        .transfer_tx(TransferRequest::new(x.id, y.id, 200))
        .await
        .unwrap();

    assert_eq!(ledger.get_account(x.id).await.unwrap().balance, 800);
    assert_eq!(ledger.get_account(y.id).await.unwrap().balance, 700);

    let counts = store.row_counts().unwrap();
    assert_eq!(counts.transfers, 1);
    assert_eq!(counts.entries, 2);

    let transfer = ledger.get_transfer(result.transfer.id).await.unwrap();
    assert_eq!(
        (transfer.from_account_id, transfer.to_account_id, transfer.amount),
        (x.id, y.id, 200)
    );

    let x_entries = ledger.list_entries(x.id, 10, 0).await.unwrap();
    let y_entries = ledger.list_entries(y.id, 10, 0).await.unwrap();
    assert_eq!(x_entries.len(), 1);
    assert_eq!(x_entries[0].amount, -200);
    assert_eq!(y_entries.len(), 1);
    assert_eq!(y_entries[0].amount, 200);
}

#[tokio::test]
async fn test_result_matches_committed_state() {
    let ledger = Ledger::new(MemoryStore::new());
    let x = open(&ledger, "x", 1000).await;
    let y = open(&ledger, "y", 500).await;

    let result = ledger
        .transfer_tx(TransferRequest::new(y.id, x.id, 125))
        .await
        .unwrap();

    assert_eq!(result.from_account, ledger.get_account(y.id).await.unwrap());
    assert_eq!(result.to_account, ledger.get_account(x.id).await.unwrap());
    assert_eq!(
        result.from_account.balance + result.to_account.balance,
        x.balance + y.balance
    );
}

#[tokio::test]
async fn test_same_account_transfer_is_rejected_without_writes() {
    let store = MemoryStore::new();
    let ledger = Ledger::new(store.clone());
    let x = open(&ledger, "x", 1000).await;

    let err = ledger
        .transfer_tx(TransferRequest::new(x.id, x.id, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidRequest(_)));

    let counts = store.row_counts().unwrap();
    assert_eq!((counts.transfers, counts.entries), (0, 0));
    assert_eq!(ledger.get_account(x.id).await.unwrap().balance, 1000);
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected() {
    let store = MemoryStore::new();
    let ledger = Ledger::new(store.clone());
    let x = open(&ledger, "x", 1000).await;
    let y = open(&ledger, "y", 0).await;

    for amount in [0, -1, i64::MIN] {
        let err = ledger
            .transfer_tx(TransferRequest::new(x.id, y.id, amount))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)), "{amount}");
    }
    assert_eq!(store.row_counts().unwrap().transfers, 0);
}

#[tokio::test]
async fn test_insufficient_funds_changes_nothing() {
    let store = MemoryStore::new();
    let ledger = Ledger::new(store.clone());
    let x = open(&ledger, "x", 100).await;
    let y = open(&ledger, "y", 0).await;

    let err = ledger
        .transfer_tx(TransferRequest::new(x.id, y.id, 101))
        .await
        .unwrap_err();
    match err {
        LedgerError::InsufficientFunds {
            account_id,
            balance,
            amount,
        } => assert_eq!((account_id, balance, amount), (x.id, 100, 101)),
        other => panic!("unexpected error: {other:?}"),
    }

    let counts = store.row_counts().unwrap();
    assert_eq!((counts.transfers, counts.entries), (0, 0));
    assert_eq!(ledger.get_account(x.id).await.unwrap().balance, 100);
    assert_eq!(ledger.get_account(y.id).await.unwrap().balance, 0);
    assert!(!err_is_retryable(&ledger, x.id, y.id).await);
}

async fn err_is_retryable(ledger: &Ledger<MemoryStore>, from: i64, to: i64) -> bool {
    ledger
        .transfer_tx(TransferRequest::new(from, to, i64::MAX))
        .await
        .unwrap_err()
        .is_retryable()
}

#[tokio::test]
async fn test_repeated_transfers_are_independent() {
    let store = MemoryStore::new();
    let ledger = Ledger::new(store.clone());
    let x = open(&ledger, "x", 1000).await;
    let y = open(&ledger, "y", 500).await;
    let request = TransferRequest::new(x.id, y.id, 150);

    let first = ledger.transfer_tx(request).await.unwrap();
    let second = ledger.transfer_tx(request).await.unwrap();

    assert_ne!(first.transfer.id, second.transfer.id);
    assert_ne!(first.from_entry.id, second.from_entry.id);
    assert_ne!(first.to_entry.id, second.to_entry.id);
    assert_eq!(second.from_account.balance, 700);
    assert_eq!(second.to_account.balance, 800);

    let counts = store.row_counts().unwrap();
    assert_eq!((counts.transfers, counts.entries), (2, 4));
    assert_eq!(ledger.list_transfers(x.id, y.id, 10, 0).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_balance_overflow_is_permanent_and_rolled_back() {
    let store = MemoryStore::new();
    let ledger = Ledger::new(store.clone());
    let x = open(&ledger, "x", 10).await;
    let full = open(&ledger, "full", i64::MAX).await;

    let err = ledger
        .transfer_tx(TransferRequest::new(x.id, full.id, 5))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::DataAccess {
            operation: "credit to account",
            source: StorageError::CheckViolation(_),
        }
    ));
    assert!(!err.is_retryable());

    let counts = store.row_counts().unwrap();
    assert_eq!((counts.transfers, counts.entries), (0, 0));
    assert_eq!(ledger.get_account(x.id).await.unwrap().balance, 10);
    assert_eq!(ledger.get_account(full.id).await.unwrap().balance, i64::MAX);
}

#[tokio::test]
async fn test_unknown_account_is_data_access_failure() {
    let ledger = Ledger::new(MemoryStore::new());
    let x = open(&ledger, "x", 1000).await;

    let err = ledger
        .transfer_tx(TransferRequest::new(404, x.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DataAccess { .. }), "{err:?}");
    assert_eq!(ledger.get_account(x.id).await.unwrap().balance, 1000);
}

#[tokio::test]
async fn test_integrity_holds_after_mixed_workload() {
    let ledger = Ledger::new(MemoryStore::new());
    let mut accounts = Vec::new();
    for (owner, balance) in [("a", 500), ("b", 300), ("c", 0), ("d", 1200)] {
        accounts.push(open(&ledger, owner, balance).await.id);
    }

    let moves = [(0, 1, 100), (3, 2, 700), (2, 0, 50), (1, 3, 400), (2, 1, 9999)];
    for (from, to, amount) in moves {
        let _ = ledger
            .transfer_tx(TransferRequest::new(accounts[from], accounts[to], amount))
            .await;
    }

    let report = ledger.validate_integrity().await.unwrap();
    assert!(report.is_valid, "{:?}", report.issues);
    assert_eq!(report.total_balance, 2000);
    assert_eq!(report.transfer_count, 4);

    let all = ledger
        .list_accounts(ListAccountsParams {
            owner: None,
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();
    assert!(all.iter().all(|a| a.balance >= 0));
}

#[tokio::test]
async fn test_transfer_result_serializes_with_snake_case_fields() {
    let ledger = Ledger::new(MemoryStore::new());
    let x = open(&ledger, "x", 10).await;
    let y = open(&ledger, "y", 0).await;
    let result = ledger
        .transfer_tx(TransferRequest::new(x.id, y.id, 10))
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    for key in ["transfer", "from_account", "to_account", "from_entry", "to_entry"] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["transfer"]["from_account_id"], x.id);
    assert_eq!(json["from_entry"]["amount"], -10);
}
