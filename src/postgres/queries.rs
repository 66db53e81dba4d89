//! SQL shared by the pooled store and its transactions
//!
//! Every function is generic over [`PgExecutor`], so the same query runs
//! against a `&PgPool` or a connection borrowed from an open transaction.

use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};

use crate::types::*;

const CREATE_ACCOUNT: &str = r#"
    INSERT INTO accounts (owner, balance, currency)
    VALUES ($1, $2, $3)
    RETURNING id, owner, balance, currency, created_at
"#;

const GET_ACCOUNT: &str = r#"
    SELECT id, owner, balance, currency, created_at FROM accounts
    WHERE id = $1 LIMIT 1
"#;

// NO KEY UPDATE does not conflict with the KEY SHARE lock taken by inserts
// into entries/transfers that reference the same account.
const GET_ACCOUNT_FOR_UPDATE: &str = r#"
    SELECT id, owner, balance, currency, created_at FROM accounts
    WHERE id = $1 LIMIT 1
    FOR NO KEY UPDATE
"#;

const LIST_ACCOUNTS: &str = r#"
    SELECT id, owner, balance, currency, created_at FROM accounts
    WHERE ($1::varchar IS NULL OR owner = $1)
    ORDER BY id
    LIMIT $2 OFFSET $3
"#;

const ADD_ACCOUNT_BALANCE: &str = r#"
    UPDATE accounts SET balance = balance + $2
    WHERE id = $1
    RETURNING id, owner, balance, currency, created_at
"#;

const CREATE_ENTRY: &str = r#"
    INSERT INTO entries (account_id, amount)
    VALUES ($1, $2)
    RETURNING id, account_id, amount, created_at
"#;

const GET_ENTRY: &str = r#"
    SELECT id, account_id, amount, created_at FROM entries
    WHERE id = $1 LIMIT 1
"#;

const LIST_ENTRIES: &str = r#"
    SELECT id, account_id, amount, created_at FROM entries
    WHERE account_id = $1
    ORDER BY id
    LIMIT $2 OFFSET $3
"#;

const CREATE_TRANSFER: &str = r#"
    INSERT INTO transfers (from_account_id, to_account_id, amount)
    VALUES ($1, $2, $3)
    RETURNING id, from_account_id, to_account_id, amount, created_at
"#;

const GET_TRANSFER: &str = r#"
    SELECT id, from_account_id, to_account_id, amount, created_at FROM transfers
    WHERE id = $1 LIMIT 1
"#;

const LIST_TRANSFERS: &str = r#"
    SELECT id, from_account_id, to_account_id, amount, created_at FROM transfers
    WHERE from_account_id = $1 OR to_account_id = $2
    ORDER BY id
    LIMIT $3 OFFSET $4
"#;

/// Map a sqlx error onto the storage taxonomy
///
/// | sqlx error | SQLSTATE | StorageError |
/// |------------|----------|--------------|
/// | RowNotFound | n/a | `NotFound` |
/// | Database | `23503` | `ForeignKeyViolation` |
/// | Database | `23505` | `UniqueViolation` |
/// | Database | `23514`, `22003` | `CheckViolation` |
/// | anything else | | `Sqlx` |
pub(crate) fn map_sqlx_error(err: sqlx::Error, entity: &'static str, id: i64) -> StorageError {
    match err {
        sqlx::Error::RowNotFound => StorageError::NotFound { entity, id },
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned());
            match code.as_deref() {
                Some("23503") => StorageError::ForeignKeyViolation(db.message().to_string()),
                Some("23505") => StorageError::UniqueViolation(db.message().to_string()),
                Some("23514") | Some("22003") => {
                    StorageError::CheckViolation(db.message().to_string())
                }
                _ => StorageError::Sqlx(sqlx::Error::Database(db)),
            }
        }
        other => StorageError::Sqlx(other),
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        balance: row.try_get("balance")?,
        currency: row.try_get("currency")?,
        created_at: row.try_get("created_at")?,
    })
}

fn entry_from_row(row: &PgRow) -> Result<Entry, sqlx::Error> {
    Ok(Entry {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        amount: row.try_get("amount")?,
        created_at: row.try_get("created_at")?,
    })
}

fn transfer_from_row(row: &PgRow) -> Result<Transfer, sqlx::Error> {
    Ok(Transfer {
        id: row.try_get("id")?,
        from_account_id: row.try_get("from_account_id")?,
        to_account_id: row.try_get("to_account_id")?,
        amount: row.try_get("amount")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) async fn create_account<'e, E>(
    executor: E,
    params: CreateAccountParams,
) -> StorageResult<Account>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(CREATE_ACCOUNT)
        .bind(params.owner)
        .bind(params.balance)
        .bind(params.currency)
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "account", 0))?;
    Ok(account_from_row(&row)?)
}

pub(crate) async fn get_account<'e, E>(executor: E, id: i64) -> StorageResult<Account>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(GET_ACCOUNT)
        .bind(id)
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "account", id))?;
    Ok(account_from_row(&row)?)
}

pub(crate) async fn get_account_for_update<'e, E>(executor: E, id: i64) -> StorageResult<Account>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(GET_ACCOUNT_FOR_UPDATE)
        .bind(id)
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "account", id))?;
    Ok(account_from_row(&row)?)
}

pub(crate) async fn list_accounts<'e, E>(
    executor: E,
    params: ListAccountsParams,
) -> StorageResult<Vec<Account>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(LIST_ACCOUNTS)
        .bind(params.owner)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "account", 0))?;
    Ok(rows
        .iter()
        .map(account_from_row)
        .collect::<Result<Vec<_>, sqlx::Error>>()?)
}

pub(crate) async fn add_account_balance<'e, E>(
    executor: E,
    params: AddAccountBalanceParams,
) -> StorageResult<Account>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(ADD_ACCOUNT_BALANCE)
        .bind(params.id)
        .bind(params.amount)
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "account", params.id))?;
    Ok(account_from_row(&row)?)
}

pub(crate) async fn create_entry<'e, E>(
    executor: E,
    params: CreateEntryParams,
) -> StorageResult<Entry>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(CREATE_ENTRY)
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "entry", 0))?;
    Ok(entry_from_row(&row)?)
}

pub(crate) async fn get_entry<'e, E>(executor: E, id: i64) -> StorageResult<Entry>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(GET_ENTRY)
        .bind(id)
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "entry", id))?;
    Ok(entry_from_row(&row)?)
}

pub(crate) async fn list_entries<'e, E>(
    executor: E,
    params: ListEntriesParams,
) -> StorageResult<Vec<Entry>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(LIST_ENTRIES)
        .bind(params.account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "entry", 0))?;
    Ok(rows
        .iter()
        .map(entry_from_row)
        .collect::<Result<Vec<_>, sqlx::Error>>()?)
}

pub(crate) async fn create_transfer<'e, E>(
    executor: E,
    params: CreateTransferParams,
) -> StorageResult<Transfer>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(CREATE_TRANSFER)
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "transfer", 0))?;
    Ok(transfer_from_row(&row)?)
}

pub(crate) async fn get_transfer<'e, E>(executor: E, id: i64) -> StorageResult<Transfer>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(GET_TRANSFER)
        .bind(id)
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "transfer", id))?;
    Ok(transfer_from_row(&row)?)
}

pub(crate) async fn list_transfers<'e, E>(
    executor: E,
    params: ListTransfersParams,
) -> StorageResult<Vec<Transfer>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(LIST_TRANSFERS)
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "transfer", 0))?;
    Ok(rows
        .iter()
        .map(transfer_from_row)
        .collect::<Result<Vec<_>, sqlx::Error>>()?)
}
