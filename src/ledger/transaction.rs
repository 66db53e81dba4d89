//! Transaction scoping: run work inside a unit of work and commit or roll back

use futures::future::BoxFuture;

use crate::traits::*;
use crate::types::*;

/// Run `f` against a fresh unit of work from `store`
///
/// Commits when `f` succeeds and rolls back when it fails. If the rollback
/// fails too, both errors are returned together as [`LedgerError::Rollback`].
/// If the returned future is dropped midway, the unit of work is dropped with
/// it and rolls back.
///
/// ```ignore
/// let account = exec_tx(&store, |tx| {
///     Box::pin(async move {
///         tx.add_account_balance(params).await.during("add account balance")
///     })
/// })
/// .await?;
/// ```
pub async fn exec_tx<S, T, F>(store: &S, f: F) -> LedgerResult<T>
where
    S: Store + ?Sized,
    F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, LedgerResult<T>>,
{
    let mut tx = store.begin().await.during("begin transaction")?;

    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await.during("commit transaction")?;
            Ok(value)
        }
        Err(err) => match tx.rollback().await {
            Ok(()) => Err(err),
            Err(rollback) => Err(LedgerError::Rollback {
                source: Box::new(err),
                rollback,
            }),
        },
    }
}
