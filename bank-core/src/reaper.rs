use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::registry::Registry;
use crate::types::UserId;

/// Watches for Worker exit notifications and clears the corresponding Registry bookkeeping.
/// Never touches balances or backlog. See `registry::Registry::clear_worker` for the
/// generation-keyed compare-and-clear that makes this safe across install/terminate races.
pub(crate) struct ReaperHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    #[allow(dead_code)]
    join: tokio::task::JoinHandle<()>,
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub(crate) fn spawn(
    registry: Arc<Registry>,
    mut exit_rx: mpsc::UnboundedReceiver<(UserId, u64)>,
) -> ReaperHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                maybe_exit = exit_rx.recv() => {
                    match maybe_exit {
                        Some((user, generation)) => {
                            registry.clear_worker(&user, generation);
                            tracing::debug!(user = %user, generation, "reaper cleared worker entry");
                        }
                        None => break,
                    }
                }

                _ = &mut shutdown_rx => {
                    break;
                }
            }
        }
    });

    ReaperHandle {
        shutdown_tx: Some(shutdown_tx),
        join,
    }
}
