//! Ledger module containing account management and transfer processing

pub mod account;
pub mod core;
pub mod transaction;
pub mod transfer;

pub use account::*;
pub use core::*;
pub use transaction::*;
pub use transfer::*;
