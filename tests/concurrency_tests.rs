//! Concurrent transfers over shared accounts

use std::sync::Arc;
use std::time::Duration;

use banking_core::{utils::MemoryStore, CreateAccountParams, Ledger, TransferRequest};

const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(10);

async fn ledger_with(balances: &[i64]) -> (Arc<Ledger<MemoryStore>>, Vec<i64>) {
    let ledger = Ledger::new(MemoryStore::new());
    let mut ids = Vec::new();
    for (i, balance) in balances.iter().enumerate() {
        let account = ledger
            .create_account(CreateAccountParams::new(format!("owner-{i}"), *balance, "USD"))
            .await
            .unwrap();
        ids.push(account.id);
    }
    (Arc::new(ledger), ids)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_in_one_direction() {
    let (ledger, ids) = ledger_with(&[1000, 1000]).await;
    let (a, b) = (ids[0], ids[1]);
    let n = 10;
    let amount = 10;

    let handles: Vec<_> = (0..n)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.transfer_tx(TransferRequest::new(a, b, amount)).await })
        })
        .collect();

    let mut seen_balances = Vec::new();
    for handle in handles {
        let result = tokio::time::timeout(DEADLOCK_TIMEOUT, handle)
            .await
            .expect("transfer timed out")
            .unwrap()
            .unwrap();
        // Every intermediate source balance is a distinct multiple of the amount.
        let diff = 1000 - result.from_account.balance;
        assert_eq!(diff % amount, 0);
        assert!((1..=n).contains(&(diff / amount)));
        assert!(!seen_balances.contains(&diff));
        seen_balances.push(diff);
    }

    assert_eq!(ledger.get_account(a).await.unwrap().balance, 1000 - n * amount);
    assert_eq!(ledger.get_account(b).await.unwrap().balance, 1000 + n * amount);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_direction_transfers_do_not_deadlock() {
    let (ledger, ids) = ledger_with(&[1000, 1000]).await;
    let (a, b) = (ids[0], ids[1]);
    let n = 20;
    let amount = 10;

    let handles: Vec<_> = (0..n)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let (from, to) = if i % 2 == 1 { (b, a) } else { (a, b) };
            tokio::spawn(async move {
                ledger
                    .transfer_tx(TransferRequest::new(from, to, amount))
                    .await
            })
        })
        .collect();

    let all = futures::future::join_all(handles);
    let results = tokio::time::timeout(DEADLOCK_TIMEOUT, all)
        .await
        .expect("transfers deadlocked");
    for result in results {
        result.unwrap().unwrap();
    }

    // Equal numbers in each direction cancel out.
    assert_eq!(ledger.get_account(a).await.unwrap().balance, 1000);
    assert_eq!(ledger.get_account(b).await.unwrap().balance, 1000);

    let report = ledger.validate_integrity().await.unwrap();
    assert!(report.is_valid, "{:?}", report.issues);
    assert_eq!(report.transfer_count, n as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_ring_of_transfers_conserves_money() {
    let (ledger, ids) = ledger_with(&[500, 500, 500, 500, 500]).await;

    let mut handles = Vec::new();
    for round in 0..6i64 {
        for (i, &from) in ids.iter().enumerate() {
            let to = ids[(i + 1 + round as usize % 3) % ids.len()];
            if to == from {
                continue;
            }
            let ledger = Arc::clone(&ledger);
            let amount = 1 + round;
            handles.push(tokio::spawn(async move {
                ledger.transfer_tx(TransferRequest::new(from, to, amount)).await
            }));
        }
    }

    let results = tokio::time::timeout(DEADLOCK_TIMEOUT, futures::future::join_all(handles))
        .await
        .expect("transfers deadlocked");
    let committed = results
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|r| r.is_ok())
        .count();

    let report = ledger.validate_integrity().await.unwrap();
    assert!(report.is_valid, "{:?}", report.issues);
    assert_eq!(report.total_balance, 2500);
    assert_eq!(report.transfer_count, committed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_withdrawals_never_overdraw() {
    let (ledger, ids) = ledger_with(&[100, 0]).await;
    let (a, b) = (ids[0], ids[1]);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.transfer_tx(TransferRequest::new(a, b, 30)).await })
        })
        .collect();

    let results = tokio::time::timeout(DEADLOCK_TIMEOUT, futures::future::join_all(handles))
        .await
        .expect("transfers deadlocked");
    let succeeded = results.into_iter().filter(|r| matches!(r, Ok(Ok(_)))).count();

    assert_eq!(succeeded, 3);
    assert_eq!(ledger.get_account(a).await.unwrap().balance, 10);
    assert_eq!(ledger.get_account(b).await.unwrap().balance, 90);
}
