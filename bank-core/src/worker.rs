use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::Result;
use crate::ledger;
use crate::registry::Account;
use crate::types::{Currency, MinorUnits, UserId};

/// A single-user operation as seen by the Worker, with its one-shot reply channel embedded.
pub(crate) enum WorkerRequest {
    Deposit {
        amount: MinorUnits,
        currency: Currency,
        reply: oneshot::Sender<Result<MinorUnits>>,
    },
    Withdraw {
        amount: MinorUnits,
        currency: Currency,
        reply: oneshot::Sender<Result<MinorUnits>>,
    },
    GetBalance {
        currency: Currency,
        reply: oneshot::Sender<Result<MinorUnits>>,
    },
}

/// The operation a Dispatcher wants executed, before it has been paired with a reply channel.
/// Kept separate from `WorkerRequest` so a failed send (closed inbox) can be retried against a
/// freshly installed Worker without the caller having to rebuild the request by hand.
#[derive(Clone)]
pub(crate) enum Op {
    Deposit(MinorUnits, Currency),
    Withdraw(MinorUnits, Currency),
    GetBalance(Currency),
}

impl Op {
    pub fn into_request(self, reply: oneshot::Sender<Result<MinorUnits>>) -> WorkerRequest {
        match self {
            Op::Deposit(amount, currency) => WorkerRequest::Deposit {
                amount,
                currency,
                reply,
            },
            Op::Withdraw(amount, currency) => WorkerRequest::Withdraw {
                amount,
                currency,
                reply,
            },
            Op::GetBalance(currency) => WorkerRequest::GetBalance { currency, reply },
        }
    }
}

/// Spawns the per-user serialization task and returns the `mpsc::Sender` half of its inbox.
///
/// `generation` and `exit_tx` let the Reaper clear the right Registry entry after this task
/// exits, even if a newer Worker has since been installed for the same user (see `registry.rs`).
pub(crate) fn spawn_worker(
    account: Arc<Account>,
    generation: u64,
    idle_timeout: Duration,
    inbox_capacity: usize,
    exit_tx: mpsc::UnboundedSender<(UserId, u64)>,
) -> mpsc::Sender<WorkerRequest> {
    let (tx, rx) = mpsc::channel(inbox_capacity);
    tokio::spawn(run(account, rx, generation, idle_timeout, exit_tx));
    tx
}

async fn run(
    account: Arc<Account>,
    mut inbox: mpsc::Receiver<WorkerRequest>,
    generation: u64,
    idle_timeout: Duration,
    exit_tx: mpsc::UnboundedSender<(UserId, u64)>,
) {
    tracing::info!(user = %account.id, generation, "worker started");

    loop {
        tokio::select! {
            // `biased` keeps recv() ahead of the idle timer so a message already sitting in the
            // inbox is always drained before the idle branch can observe an empty inbox and exit.
            biased;

            maybe_request = inbox.recv() => {
                match maybe_request {
                    Some(request) => handle(&account, request),
                    None => break,
                }
            }

            _ = tokio::time::sleep(idle_timeout) => {
                match inbox.try_recv() {
                    Ok(request) => handle(&account, request),
                    Err(_) => {
                        // Clear the slot before we stop consuming, not after, so a racing
                        // Dispatcher that checks the slot from this point on installs a fresh
                        // Worker instead of sending into our about-to-close inbox.
                        account.clear_worker_if_current(generation);
                        break;
                    }
                }
            }
        }
    }

    // A Sender clone obtained before the clear above may still be mid-send. `recv()` only
    // returns `None` once every such clone has been dropped, so draining here guarantees we
    // never discard a request a caller believes it successfully enqueued.
    while let Some(request) = inbox.recv().await {
        handle(&account, request);
    }

    tracing::info!(user = %account.id, generation, "worker idle-shutdown");
    let _ = exit_tx.send((account.id.clone(), generation));
}

fn handle(account: &Account, request: WorkerRequest) {
    match request {
        WorkerRequest::Deposit {
            amount,
            currency,
            reply,
        } => {
            let result = ledger::deposit(&account.balances, &currency, amount);
            let _ = reply.send(result);
        }
        WorkerRequest::Withdraw {
            amount,
            currency,
            reply,
        } => {
            let result = ledger::withdraw(&account.balances, &currency, amount);
            let _ = reply.send(result);
        }
        WorkerRequest::GetBalance { currency, reply } => {
            let balance = ledger::get(&account.balances, &currency);
            let _ = reply.send(Ok(balance));
        }
    }
}
