//! Validation utilities

use crate::types::*;

/// Largest page a list call may request
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Validate a transfer request before any I/O happens
pub fn validate_transfer_request(request: &TransferRequest) -> LedgerResult<()> {
    if request.from_account_id == request.to_account_id {
        return Err(LedgerError::InvalidRequest(
            "cannot transfer to the same account".to_string(),
        ));
    }
    if request.amount <= 0 {
        return Err(LedgerError::InvalidRequest(
            "amount must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Validate the fields of a new account
pub fn validate_create_account(params: &CreateAccountParams) -> LedgerResult<()> {
    if params.owner.trim().is_empty() {
        return Err(LedgerError::InvalidRequest(
            "account owner cannot be empty".to_string(),
        ));
    }

    if params.currency.trim().is_empty() {
        return Err(LedgerError::InvalidRequest(
            "account currency cannot be empty".to_string(),
        ));
    }

    if params.balance < 0 {
        return Err(LedgerError::InvalidRequest(format!(
            "initial balance cannot be negative: {}",
            params.balance
        )));
    }

    Ok(())
}

/// Validate pagination arguments
pub fn validate_page(limit: i64, offset: i64) -> LedgerResult<()> {
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(LedgerError::InvalidRequest(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
        )));
    }
    if offset < 0 {
        return Err(LedgerError::InvalidRequest(format!(
            "offset cannot be negative, got {offset}"
        )));
    }
    Ok(())
}
