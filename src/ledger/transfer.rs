//! Money transfers between two accounts
//!
//! A transfer writes a transfer record, a debit and a credit entry, and moves
//! the balances of both accounts inside one unit of work. Account rows are
//! always locked in ascending id order, so two transfers over the same pair
//! of accounts in opposite directions cannot wait on each other.

use tracing::debug;

use crate::ledger::transaction::exec_tx;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_transfer_request;

/// Move `request.amount` from one account to another atomically
///
/// Returns the created records and both accounts as they stand after the
/// transfer. Nothing is written when an error is returned.
pub async fn transfer_tx<S>(store: &S, request: TransferRequest) -> LedgerResult<TransferResult>
where
    S: Store + ?Sized,
{
    validate_transfer_request(&request)?;

    debug!(
        from_account_id = request.from_account_id,
        to_account_id = request.to_account_id,
        amount = request.amount,
        "starting transfer"
    );

    let result = exec_tx(store, |tx| Box::pin(apply_transfer(tx, request))).await?;

    debug!(
        transfer_id = result.transfer.id,
        from_balance = result.from_account.balance,
        to_balance = result.to_account.balance,
        "transfer committed"
    );
    Ok(result)
}

/// The writes of a transfer, run against an already open unit of work
///
/// Callers are responsible for validation and for committing. Only units of
/// work are accepted, so a failed transfer can always be rolled back:
///
/// ```compile_fail
/// use banking_core::utils::MemoryStore;
/// use banking_core::{apply_transfer, TransferRequest};
///
/// async fn direct(mut store: MemoryStore) {
///     let _ = apply_transfer(&mut store, TransferRequest::new(1, 2, 50)).await;
/// }
/// ```
pub async fn apply_transfer<Q>(q: &mut Q, request: TransferRequest) -> LedgerResult<TransferResult>
where
    Q: UnitOfWork + ?Sized,
{
    let transfer = q
        .create_transfer(CreateTransferParams::from(request))
        .await
        .during("create transfer")?;

    let from_entry = q
        .create_entry(CreateEntryParams {
            account_id: request.from_account_id,
            amount: -request.amount,
        })
        .await
        .during("create from entry")?;

    let to_entry = q
        .create_entry(CreateEntryParams {
            account_id: request.to_account_id,
            amount: request.amount,
        })
        .await
        .during("create to entry")?;

    let (from_account, to_account) = update_balances(q, &request).await?;

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Canonical lock order for a pair of accounts: smaller id first
pub fn lock_order(a: i64, b: i64) -> [i64; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

async fn update_balances<Q>(q: &mut Q, request: &TransferRequest) -> LedgerResult<(Account, Account)>
where
    Q: Querier + ?Sized,
{
    let mut locked = Vec::with_capacity(2);
    for account_id in lock_order(request.from_account_id, request.to_account_id) {
        let account = q
            .get_account_for_update(account_id)
            .await
            .during("lock account")?;
        debug!(account_id, balance = account.balance, "account locked");
        locked.push(account);
    }

    // Both rows are locked, so the balance cannot move until commit.
    let balance = locked
        .iter()
        .find(|account| account.id == request.from_account_id)
        .map(|account| account.balance)
        .ok_or_else(|| {
            LedgerError::data_access(
                "lock account",
                StorageError::NotFound {
                    entity: "account",
                    id: request.from_account_id,
                },
            )
        })?;
    if balance < request.amount {
        return Err(LedgerError::InsufficientFunds {
            account_id: request.from_account_id,
            balance,
            amount: request.amount,
        });
    }

    let from_account = q
        .add_account_balance(AddAccountBalanceParams {
            id: request.from_account_id,
            amount: -request.amount,
        })
        .await
        .during("debit from account")?;

    let to_account = q
        .add_account_balance(AddAccountBalanceParams {
            id: request.to_account_id,
            amount: request.amount,
        })
        .await
        .during("credit to account")?;

    Ok((from_account, to_account))
}
