use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::backlog::Backlog;
use crate::error::{BankError, Result};
use crate::types::{Currency, MinorUnits, UserId};
use crate::worker::WorkerRequest;

/// A live Worker's inbox plus the installation generation that identifies it, so the Reaper can
/// tell a current Worker's exit apart from a stale one's (I5).
#[derive(Clone)]
pub(crate) struct WorkerHandle {
    pub generation: u64,
    pub sender: mpsc::Sender<WorkerRequest>,
}

/// One user's account record. `balances` is only ever mutated by the Worker assigned to this
/// user (I3); the `DashMap` itself would tolerate concurrent writers, but nothing in this crate
/// hands out a second writer.
pub(crate) struct Account {
    pub id: UserId,
    pub backlog: Backlog,
    pub worker: Mutex<Option<WorkerHandle>>,
    pub balances: DashMap<Currency, MinorUnits>,
}

impl Account {
    fn new(id: UserId) -> Self {
        Self {
            id,
            backlog: Backlog::new(),
            worker: Mutex::new(None),
            balances: DashMap::new(),
        }
    }

    /// Clears the `worker` slot only if it still holds the exact generation that is terminating,
    /// so a stale Worker's shutdown can never clear a newer installation (I5). Returns whether it
    /// cleared anything.
    pub fn clear_worker_if_current(&self, generation: u64) -> bool {
        let mut slot = self.worker.lock().unwrap();
        if matches!(slot.as_ref(), Some(handle) if handle.generation == generation) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

/// Process-wide mapping from user identifier to account record. Owns creation, existence
/// checks, and lookup; the per-account `worker` slot doubles as the Dispatcher/Reaper handoff
/// point described in `worker.rs`.
pub(crate) struct Registry {
    accounts: DashMap<UserId, Arc<Account>>,
    next_generation: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Atomic insert-if-absent. Concurrent creations of the same user resolve such that exactly
    /// one call returns `Ok`.
    pub fn create_user(&self, user: UserId) -> Result<()> {
        match self.accounts.entry(user.clone()) {
            Entry::Occupied(_) => Err(BankError::UserAlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Account::new(user)));
                Ok(())
            }
        }
    }

    pub fn lookup(&self, user: &UserId) -> Result<Arc<Account>> {
        self.accounts
            .get(user)
            .map(|entry| entry.value().clone())
            .ok_or(BankError::UserDoesNotExist)
    }

    /// Single atomic admission step: existence check, then the backlog's CAS increment. A
    /// caller that already holds an `Arc<Account>` from a prior `lookup` should prefer
    /// `admit_account` to avoid a second map lookup.
    pub fn try_add(&self, user: &UserId) -> Result<()> {
        self.admit_account(&self.lookup(user)?)
    }

    pub fn admit_account(&self, account: &Account) -> Result<()> {
        if account.backlog.try_add() {
            Ok(())
        } else {
            Err(BankError::TooManyRequestsToUser)
        }
    }

    /// Releasing a non-existent user is a no-op.
    pub fn release(&self, user: &UserId) {
        if let Ok(account) = self.lookup(user) {
            account.backlog.release();
        }
    }

    pub fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Looks the user up and delegates to `Account::clear_worker_if_current`. A missing user is
    /// a no-op (the account, and whatever Worker it had, is already gone).
    pub fn clear_worker(&self, user: &UserId, generation: u64) {
        if let Ok(account) = self.lookup(user) {
            account.clear_worker_if_current(generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_is_exclusive() {
        let registry = Registry::new();
        assert!(registry.create_user(UserId::new("alice")).is_ok());
        assert_eq!(
            registry.create_user(UserId::new("alice")).unwrap_err(),
            BankError::UserAlreadyExists
        );
    }

    #[test]
    fn lookup_missing_user_is_an_error() {
        let registry = Registry::new();
        assert_eq!(
            registry.lookup(&UserId::new("ghost")).unwrap_err(),
            BankError::UserDoesNotExist
        );
    }

    #[test]
    fn clear_worker_ignores_stale_generation() {
        let registry = Registry::new();
        registry.create_user(UserId::new("alice")).unwrap();
        let account = registry.lookup(&UserId::new("alice")).unwrap();

        let (tx, _rx) = mpsc::channel(1);
        let current_generation = registry.next_generation();
        *account.worker.lock().unwrap() = Some(WorkerHandle {
            generation: current_generation,
            sender: tx,
        });

        // A stale generation (e.g. from a Worker that already lost the race) must not clear the
        // handle that was installed after it.
        registry.clear_worker(&UserId::new("alice"), current_generation.wrapping_sub(1));
        assert!(account.worker.lock().unwrap().is_some());

        registry.clear_worker(&UserId::new("alice"), current_generation);
        assert!(account.worker.lock().unwrap().is_none());
    }
}
