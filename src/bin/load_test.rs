//! Load Testing Tool
//!
//! Drives concurrent crossing transfers through the transaction engine
//! against PostgreSQL and checks that no coins were created or lost.
//!
//! Run with: cargo run --bin load_test --release -- --transfers 1000 --accounts 10

use std::sync::Arc;
use std::time::Instant;

use coin_ledger::cache::MemoryCache;
use coin_ledger::db;
use coin_ledger::domain::{LedgerError, OperationContext};
use coin_ledger::handlers::{TransferCommand, TransferHandler};
use coin_ledger::store::{CredentialStore, PgLedgerStore};

const INITIAL_BALANCE: i64 = 1000;

fn arg(args: &[String], name: &str, default: usize) -> usize {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let transfer_count = arg(&args, "--transfers", 1000);
    let account_count = arg(&args, "--accounts", 10).max(2);

    let database_url = std::env::var("DATABASE_URL")?;

    println!(
        "Load Test - {} transfers across {} accounts",
        transfer_count, account_count
    );
    println!("Connecting to database...");

    let pool = db::connect(&database_url, 20).await?;
    if !db::check_schema(&pool).await? {
        anyhow::bail!("Database schema incomplete, apply migrations/0001_init.sql first");
    }

    let store = Arc::new(PgLedgerStore::new(pool.clone()));

    // Fresh accounts per run so repeated runs do not collide
    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let usernames: Vec<String> = (0..account_count)
        .map(|i| format!("load_{}_{}", &run_id[..8], i))
        .collect();
    for username in &usernames {
        store.create_account(username, "", INITIAL_BALANCE).await?;
    }

    let handler = Arc::new(TransferHandler::new(store.clone(), Arc::new(MemoryCache::new())));
    let start = Instant::now();

    let mut tasks = Vec::with_capacity(transfer_count);
    for i in 0..transfer_count {
        let sender = usernames[i % account_count].clone();
        // Alternate direction so pairs of transfers cross the same accounts
        let offset = if i % 2 == 0 { 1 } else { account_count - 1 };
        let recipient = usernames[(i + offset) % account_count].clone();
        let amount = (i % 50 + 1) as i64;
        let handler = handler.clone();

        tasks.push(tokio::spawn(async move {
            handler
                .execute(
                    TransferCommand::new(sender, recipient, amount),
                    &OperationContext::new(),
                )
                .await
        }));
    }

    let mut committed = 0u64;
    let mut rejected = 0u64;
    let mut failed = 0u64;
    for task in tasks {
        match task.await? {
            Ok(_) => committed += 1,
            Err(LedgerError::InsufficientFunds { .. }) => rejected += 1,
            Err(e) => {
                failed += 1;
                eprintln!("Transfer failed: {}", e);
            }
        }
    }

    let elapsed = start.elapsed();
    let rate = transfer_count as f64 / elapsed.as_secs_f64();

    let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(balance), 0)::BIGINT FROM users WHERE username = ANY($1)")
        .bind(&usernames)
        .fetch_one(&pool)
        .await?;
    let expected = INITIAL_BALANCE * account_count as i64;

    println!("\n=== Load Test Results ===");
    println!("Total transfers: {}", transfer_count);
    println!("Committed: {}", committed);
    println!("Rejected (insufficient funds): {}", rejected);
    println!("Failed: {}", failed);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} transfers/sec", rate);
    println!("Balance total: {} (expected {})", total, expected);

    pool.close().await;

    if total != expected {
        anyhow::bail!("Conservation violated: {} != {}", total, expected);
    }

    Ok(())
}
