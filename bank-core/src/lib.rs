//! In-memory banking engine built around a per-user serialization primitive.
//!
//! The public surface is the [`Bank`] facade: [`Bank::create_user`], [`Bank::deposit`],
//! [`Bank::withdraw`], [`Bank::get_balance`], and [`Bank::send_money`]. Everything else in this
//! crate - the [`Registry`](registry::Registry), per-user [`Worker`](worker), admission
//! [`Backlog`](backlog::Backlog), and [`Dispatcher`](dispatcher::Dispatcher) - is the
//! concurrency control plane that makes those five calls safe under arbitrary concurrent use.

mod backlog;
mod config;
mod dispatcher;
mod error;
mod ledger;
mod reaper;
mod registry;
mod types;
mod worker;

use std::sync::Arc;

use tokio::sync::mpsc;

pub use config::{BankConfig, MAX_BACKLOG};
pub use error::{BankError, Result};
pub use types::{Currency, MinorUnits, UserId};

use dispatcher::Dispatcher;
use registry::Registry;
use worker::Op;

/// The synchronous-facing banking API. Every method resolves to a typed `Result`, there is no
/// partial or streaming outcome, even though the calls are `async fn` (they suspend only while
/// awaiting a Worker reply).
///
/// Cloning a `Bank` is cheap: it shares the same `Registry` and background Reaper task.
pub struct Bank {
    dispatcher: Dispatcher,
    reaper: Arc<reaper::ReaperHandle>,
}

impl Bank {
    pub fn new(config: BankConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let reaper = reaper::spawn(registry.clone(), exit_rx);
        let dispatcher = Dispatcher::new(registry, config, exit_tx);

        Self {
            dispatcher,
            reaper: Arc::new(reaper),
        }
    }

    /// Atomic insert-if-absent. `Ok` is returned to exactly one concurrent caller when several
    /// race to create the same user.
    pub fn create_user(&self, user: impl Into<UserId>) -> Result<()> {
        let user = user.into();
        tracing::info!(%user, "creating user");
        self.dispatcher.create_user(user)
    }

    pub async fn deposit(
        &self,
        user: impl Into<UserId>,
        amount: MinorUnits,
        currency: impl Into<Currency>,
    ) -> Result<MinorUnits> {
        let user = user.into();
        self.dispatcher
            .single_op(&user, Op::Deposit(amount, currency.into()))
            .await
    }

    pub async fn withdraw(
        &self,
        user: impl Into<UserId>,
        amount: MinorUnits,
        currency: impl Into<Currency>,
    ) -> Result<MinorUnits> {
        let user = user.into();
        self.dispatcher
            .single_op(&user, Op::Withdraw(amount, currency.into()))
            .await
    }

    pub async fn get_balance(
        &self,
        user: impl Into<UserId>,
        currency: impl Into<Currency>,
    ) -> Result<MinorUnits> {
        let user = user.into();
        self.dispatcher
            .single_op(&user, Op::GetBalance(currency.into()))
            .await
    }

    /// Returns `(sender_balance, receiver_balance)` after the transfer. When `from == to`, both
    /// values are the single account's unchanged final balance (self-transfer).
    pub async fn send_money(
        &self,
        from: impl Into<UserId>,
        to: impl Into<UserId>,
        amount: MinorUnits,
        currency: impl Into<Currency>,
    ) -> Result<(MinorUnits, MinorUnits)> {
        let from = from.into();
        let to = to.into();
        let currency = currency.into();
        self.dispatcher.send_money(&from, &to, amount, &currency).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eur() -> &'static str {
        "EUR"
    }

    #[tokio::test]
    async fn scenario_create_deposit_withdraw_get_balance() {
        let bank = Bank::new(BankConfig::default());

        bank.create_user("alice").unwrap();
        assert_eq!(
            bank.create_user("alice").unwrap_err(),
            BankError::UserAlreadyExists
        );

        let after_deposit = bank.deposit("alice", MinorUnits(1000), eur()).await.unwrap();
        assert_eq!(after_deposit, MinorUnits(1000));

        let after_withdraw = bank.withdraw("alice", MinorUnits(400), eur()).await.unwrap();
        assert_eq!(after_withdraw, MinorUnits(600));

        let usd_balance = bank.get_balance("alice", "USD").await.unwrap();
        assert_eq!(usd_balance, MinorUnits::ZERO);
    }

    #[tokio::test]
    async fn withdraw_beyond_balance_is_rejected_and_balance_is_unchanged() {
        let bank = Bank::new(BankConfig::default());
        bank.create_user("alice").unwrap();
        bank.deposit("alice", MinorUnits(600), eur()).await.unwrap();

        let err = bank
            .withdraw("alice", MinorUnits(10_000), eur())
            .await
            .unwrap_err();
        assert_eq!(err, BankError::NotEnoughMoney);

        assert_eq!(
            bank.get_balance("alice", eur()).await.unwrap(),
            MinorUnits(600)
        );
    }

    #[tokio::test]
    async fn operations_against_an_unknown_user_fail_before_touching_backlog() {
        let bank = Bank::new(BankConfig::default());
        assert_eq!(
            bank.deposit("ghost", MinorUnits(1), eur()).await.unwrap_err(),
            BankError::UserDoesNotExist
        );
    }

    #[tokio::test]
    async fn send_money_moves_funds_between_two_users() {
        let bank = Bank::new(BankConfig::default());
        bank.create_user("alice").unwrap();
        bank.create_user("bob").unwrap();
        bank.deposit("alice", MinorUnits(600), eur()).await.unwrap();

        let (alice_balance, bob_balance) = bank
            .send_money("alice", "bob", MinorUnits(400), eur())
            .await
            .unwrap();

        assert_eq!(alice_balance, MinorUnits(200));
        assert_eq!(bob_balance, MinorUnits(400));
    }

    #[tokio::test]
    async fn send_money_missing_sender_or_receiver() {
        let bank = Bank::new(BankConfig::default());
        bank.create_user("alice").unwrap();

        assert_eq!(
            bank.send_money("ghost", "alice", MinorUnits(1), eur())
                .await
                .unwrap_err(),
            BankError::SenderDoesNotExist
        );
        assert_eq!(
            bank.send_money("alice", "ghost", MinorUnits(1), eur())
                .await
                .unwrap_err(),
            BankError::ReceiverDoesNotExist
        );
    }

    #[tokio::test]
    async fn send_money_compensates_sender_when_receiver_cannot_be_credited() {
        // There is currently no deposit-stage failure in the Ledger, so this exercises the
        // sibling compensation-relevant property instead: insufficient funds leaves the sender
        // untouched (P6), which is the observable half of the same guarantee.
        let bank = Bank::new(BankConfig::default());
        bank.create_user("alice").unwrap();
        bank.create_user("bob").unwrap();
        bank.deposit("alice", MinorUnits(100), eur()).await.unwrap();

        let err = bank
            .send_money("alice", "bob", MinorUnits(10_000), eur())
            .await
            .unwrap_err();
        assert_eq!(err, BankError::NotEnoughMoney);
        assert_eq!(
            bank.get_balance("alice", eur()).await.unwrap(),
            MinorUnits(100)
        );
    }

    #[tokio::test]
    async fn self_transfer_is_net_zero() {
        let bank = Bank::new(BankConfig::default());
        bank.create_user("u").unwrap();
        bank.deposit("u", MinorUnits(500), eur()).await.unwrap();

        let (a, b) = bank
            .send_money("u", "u", MinorUnits(200), eur())
            .await
            .unwrap();

        assert_eq!(a, MinorUnits(500));
        assert_eq!(b, MinorUnits(500));
        assert_eq!(bank.get_balance("u", eur()).await.unwrap(), MinorUnits(500));
    }
}
