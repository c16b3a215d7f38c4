mod args;
mod money;

use std::sync::Arc;

use args::Args;
use bank_core::{Bank, BankError, MinorUnits};
use clap::Parser;
use eyre::{eyre, Result};
use futures::stream::{self, StreamExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let storm_size = args.storm_size;
    let config = args
        .into_bank_config()
        .map_err(|e| eyre!("invalid configuration: {e}"))?;

    let bank = Arc::new(Bank::new(config));

    let alice = money::validate_identifier("alice").map_err(|e| eyre!("{e}"))?;
    let bob = money::validate_identifier("bob").map_err(|e| eyre!("{e}"))?;
    let currency = "USD";

    bank.create_user(alice)?;
    bank.create_user(bob)?;
    tracing::info!(alice, bob, "seeded demo users");

    let opening_deposit = money::parse_decimal_to_minor_units("500.00")?;
    let alice_balance = bank.deposit(alice, opening_deposit, currency).await?;
    tracing::info!(%alice_balance, "alice funded");

    let withdrawal = money::parse_decimal_to_minor_units("50.00")?;
    let alice_balance = bank.withdraw(alice, withdrawal, currency).await?;
    tracing::info!(%alice_balance, "alice withdrew");

    let transfer_amount = money::parse_decimal_to_minor_units("10.00")?;
    let (alice_balance, bob_balance) = bank
        .send_money(alice, bob, transfer_amount, currency)
        .await?;
    tracing::info!(%alice_balance, %bob_balance, "single transfer settled");

    run_transfer_storm(&bank, alice, bob, currency, storm_size).await;

    let final_alice = bank.get_balance(alice, currency).await?;
    let final_bob = bank.get_balance(bob, currency).await?;
    println!("alice final balance: {final_alice} {currency}");
    println!("bob final balance:   {final_bob} {currency}");

    Ok(())
}

/// Fires `storm_size` concurrent transfers from `from` to `to` and reports how many were
/// admitted versus rejected by the per-user backlog cap. Demonstrates that a busy receiver
/// degrades into fast, typed rejections rather than unbounded queuing.
async fn run_transfer_storm(bank: &Arc<Bank>, from: &str, to: &str, currency: &str, storm_size: usize) {
    let cent = MinorUnits(1);
    let mut admitted = 0u32;
    let mut rejected = 0u32;

    let results: Vec<_> = stream::iter(0..storm_size)
        .map(|_| {
            let bank = bank.clone();
            async move { bank.send_money(from, to, cent, currency).await }
        })
        .buffer_unordered(storm_size.max(1))
        .collect()
        .await;

    for result in results {
        match result {
            Ok(_) => admitted += 1,
            Err(BankError::TooManyRequestsToSender) | Err(BankError::TooManyRequestsToReceiver) => {
                rejected += 1;
            }
            Err(other) => tracing::warn!(error = %other, "unexpected transfer failure"),
        }
    }

    tracing::info!(admitted, rejected, "transfer storm finished");
}
