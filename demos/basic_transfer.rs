//! Basic transfer example

use banking_core::utils::MemoryStore;
use banking_core::{CreateAccountParams, Ledger, LedgerError, TransferRequest};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_target(false)
        .init();

    println!("Banking Core - Basic Transfer Example\n");

    let ledger = Ledger::new(MemoryStore::new());

    // 1. Open accounts
    println!("Opening accounts...");
    let alice = ledger
        .create_account(CreateAccountParams::new("alice", 1000, "USD"))
        .await?;
    let bob = ledger
        .create_account(CreateAccountParams::new("bob", 500, "USD"))
        .await?;
    for account in [&alice, &bob] {
        println!(
            "  Opened account {} for {} with {} {}",
            account.id, account.owner, account.balance, account.currency
        );
    }
    println!();

    // 2. Move money both ways
    println!("Recording transfers...");
    let result = ledger
        .transfer_tx(TransferRequest::new(alice.id, bob.id, 200))
        .await?;
    println!(
        "  Transfer {}: alice {} -> {}, bob {} -> {}",
        result.transfer.id,
        alice.balance,
        result.from_account.balance,
        bob.balance,
        result.to_account.balance
    );

    let result = ledger
        .transfer_tx(TransferRequest::new(bob.id, alice.id, 50))
        .await?;
    println!(
        "  Transfer {}: bob now {}, alice now {}",
        result.transfer.id, result.from_account.balance, result.to_account.balance
    );
    println!();

    // 3. A transfer the source cannot cover
    println!("Attempting an overdraft...");
    match ledger
        .transfer_tx(TransferRequest::new(bob.id, alice.id, 10_000))
        .await
    {
        Err(err @ LedgerError::InsufficientFunds { .. }) => println!("  Rejected: {err}"),
        Err(err) => return Err(err.into()),
        Ok(_) => println!("  Unexpectedly accepted"),
    }
    println!();

    // 4. Audit trail and integrity
    println!("Alice's entries:");
    for entry in ledger.list_entries(alice.id, 100, 0).await? {
        println!("  #{} {:+}", entry.id, entry.amount);
    }

    let report = ledger.validate_integrity().await?;
    println!(
        "\nIntegrity: valid={} accounts={} transfers={} total_balance={}",
        report.is_valid, report.account_count, report.transfer_count, report.total_balance
    );
    for issue in &report.issues {
        println!("  issue: {issue}");
    }

    Ok(())
}
