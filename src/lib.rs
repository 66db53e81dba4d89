//! # Banking Core
//!
//! The money-transfer core of a ledger-style banking service: moves funds
//! between two accounts atomically while recording immutable audit entries.
//!
//! ## Features
//!
//! - **Atomic transfers**: transfer record, debit and credit entries and both
//!   balance updates commit together or not at all
//! - **Deadlock-safe locking**: account rows are always locked in ascending id
//!   order
//! - **Storage abstraction**: the [`Querier`] trait is implemented by direct
//!   store handles and by transaction-scoped units of work alike
//! - **In-memory store**: a transactional store with row locks, for tests and
//!   development
//! - **PostgreSQL store**: behind the `postgres` feature, built on `sqlx`
//!
//! ## Quick Start
//!
//! ```rust
//! use banking_core::utils::MemoryStore;
//! use banking_core::{CreateAccountParams, Ledger, TransferRequest};
//!
//! # tokio_test_block_on(async {
//! let ledger = Ledger::new(MemoryStore::new());
//! let x = ledger.create_account(CreateAccountParams::new("x", 1000, "USD")).await?;
//! let y = ledger.create_account(CreateAccountParams::new("y", 500, "USD")).await?;
//!
//! let result = ledger.transfer_tx(TransferRequest::new(x.id, y.id, 200)).await?;
//! assert_eq!(result.from_account.balance, 800);
//! assert_eq!(result.to_account.balance, 700);
//! # Ok::<(), banking_core::LedgerError>(())
//! # })
//! # .unwrap();
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod ledger;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use ledger::*;
pub use traits::*;
pub use types::*;
