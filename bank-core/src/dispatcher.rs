use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::config::BankConfig;
use crate::error::{BankError, Result};
use crate::registry::{Account, Registry, WorkerHandle};
use crate::types::{Currency, MinorUnits, UserId};
use crate::worker::{self, Op};

/// Releases a user's backlog slot on drop, so every early return (a worker-level error, a
/// panic unwind) still satisfies I2: exactly one release per successful admission.
struct BacklogGuard<'a> {
    registry: &'a Registry,
    user: UserId,
}

impl<'a> BacklogGuard<'a> {
    fn new(registry: &'a Registry, user: UserId) -> Self {
        Self { registry, user }
    }
}

impl Drop for BacklogGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.user);
    }
}

/// The front-side coordinator invoked by the public API. See `bank-core::Bank` for the thin
/// public wrapper around this type.
pub(crate) struct Dispatcher {
    registry: Arc<Registry>,
    config: BankConfig,
    exit_tx: mpsc::UnboundedSender<(UserId, u64)>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        config: BankConfig,
        exit_tx: mpsc::UnboundedSender<(UserId, u64)>,
    ) -> Self {
        Self {
            registry,
            config,
            exit_tx,
        }
    }

    pub fn create_user(&self, user: UserId) -> Result<()> {
        self.registry.create_user(user)
    }

    /// `Lookup` -> `TryAdd` -> enqueue -> await reply -> `Release`, in that order, matching the
    /// single-user operation protocol.
    pub async fn single_op(&self, user: &UserId, op: Op) -> Result<MinorUnits> {
        let account = self.registry.lookup(user)?;
        self.registry.admit_account(&account)?;
        let _guard = BacklogGuard::new(&self.registry, user.clone());

        self.send_to_worker(&account, op).await
    }

    /// Two-sided admission followed by withdraw-then-deposit, with compensating redeposit if
    /// the deposit stage fails. Sender and receiver may be the same account (self-transfer).
    pub async fn send_money(
        &self,
        from: &UserId,
        to: &UserId,
        amount: MinorUnits,
        currency: &Currency,
    ) -> Result<(MinorUnits, MinorUnits)> {
        let sender_account = self
            .registry
            .lookup(from)
            .map_err(|_| BankError::SenderDoesNotExist)?;
        let receiver_account = self
            .registry
            .lookup(to)
            .map_err(|_| BankError::ReceiverDoesNotExist)?;

        self.registry
            .admit_account(&sender_account)
            .map_err(remap_sender)?;

        if let Err(err) = self.registry.admit_account(&receiver_account) {
            self.registry.release(from);
            return Err(remap_receiver(err));
        }

        let _sender_guard = BacklogGuard::new(&self.registry, from.clone());
        let _receiver_guard = BacklogGuard::new(&self.registry, to.clone());

        let sender_balance = self
            .send_to_worker(&sender_account, Op::Withdraw(amount, currency.clone()))
            .await?;

        match self
            .send_to_worker(&receiver_account, Op::Deposit(amount, currency.clone()))
            .await
        {
            Ok(receiver_balance) => {
                if from == to {
                    // Net-zero effect: both values are the single account's final balance.
                    Ok((receiver_balance, receiver_balance))
                } else {
                    Ok((sender_balance, receiver_balance))
                }
            }
            Err(err) => {
                // Deposit stage failed (reserved for future error kinds; the current Ledger's
                // deposit never fails on amount-only grounds). Restore the sender's funds.
                let _ = self
                    .send_to_worker(&sender_account, Op::Deposit(amount, currency.clone()))
                    .await;
                Err(err)
            }
        }
    }

    /// Resolves the account's live Worker, installing a fresh one on first demand. The returned
    /// handle's `generation` lets the caller tell a stale handle apart after a failed send.
    fn worker_for(&self, account: &Arc<Account>) -> WorkerHandle {
        let mut slot = account.worker.lock().unwrap();
        if let Some(handle) = slot.as_ref() {
            return handle.clone();
        }

        let generation = self.registry.next_generation();
        let sender = worker::spawn_worker(
            account.clone(),
            generation,
            self.config.stale_handler_timeout,
            self.config.worker_inbox_capacity,
            self.exit_tx.clone(),
        );
        let handle = WorkerHandle { generation, sender };
        *slot = Some(handle.clone());
        handle
    }

    /// Enqueues `op` against `account`'s Worker and awaits the reply. If the Worker has begun
    /// draining (enqueue fails because its inbox is closed), installs a fresh Worker and retries
    /// exactly once.
    async fn send_to_worker(&self, account: &Arc<Account>, op: Op) -> Result<MinorUnits> {
        for attempt in 0..2u8 {
            let handle = self.worker_for(account);
            let (reply_tx, reply_rx) = oneshot::channel();
            let request = op.clone().into_request(reply_tx);

            if handle.sender.send(request).await.is_ok() {
                return reply_rx.await.map_err(|_| {
                    BankError::Internal("worker dropped the reply channel".to_string())
                })?;
            }

            // The Worker we targeted has already exited (its Receiver was dropped). Clear the
            // stale handle and retry against a freshly installed Worker.
            self.registry.clear_worker(&account.id, handle.generation);
            if attempt == 1 {
                return Err(BankError::Internal(
                    "worker unavailable after one retry".to_string(),
                ));
            }
        }

        unreachable!("the loop above always returns within two attempts")
    }
}

fn remap_sender(err: BankError) -> BankError {
    match err {
        BankError::UserDoesNotExist => BankError::SenderDoesNotExist,
        BankError::TooManyRequestsToUser => BankError::TooManyRequestsToSender,
        other => other,
    }
}

fn remap_receiver(err: BankError) -> BankError {
    match err {
        BankError::UserDoesNotExist => BankError::ReceiverDoesNotExist,
        BankError::TooManyRequestsToUser => BankError::TooManyRequestsToReceiver,
        other => other,
    }
}
