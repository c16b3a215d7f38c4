use dashmap::DashMap;

use crate::error::{BankError, Result};
use crate::types::{Currency, MinorUnits};

/// Pure updates on one account's balances. Only ever invoked from the Worker that owns the
/// account (see `worker.rs`); no cross-user interaction.
pub(crate) fn deposit(
    balances: &DashMap<Currency, MinorUnits>,
    currency: &Currency,
    amount: MinorUnits,
) -> Result<MinorUnits> {
    let mut entry = balances.entry(currency.clone()).or_insert(MinorUnits::ZERO);
    let new_balance = entry
        .checked_add(amount)
        .ok_or_else(|| BankError::Internal("balance overflow on deposit".to_string()))?;
    *entry = new_balance;
    Ok(new_balance)
}

pub(crate) fn withdraw(
    balances: &DashMap<Currency, MinorUnits>,
    currency: &Currency,
    amount: MinorUnits,
) -> Result<MinorUnits> {
    let mut entry = balances.entry(currency.clone()).or_insert(MinorUnits::ZERO);
    let new_balance = entry.checked_sub(amount).ok_or(BankError::NotEnoughMoney)?;
    *entry = new_balance;
    Ok(new_balance)
}

/// Missing key reports zero, not an error. The balance of an unused currency for an existing
/// user is simply zero.
pub(crate) fn get(balances: &DashMap<Currency, MinorUnits>, currency: &Currency) -> MinorUnits {
    balances
        .get(currency)
        .map(|v| *v)
        .unwrap_or(MinorUnits::ZERO)
}
