use thiserror::Error;

/// The closed set of outcomes a public `Bank` operation can return.
///
/// `WrongArguments` is never raised by this crate itself, it exists so an outer validation
/// layer (see `bank-cli`) can report rejected input through the same error type the rest of the
/// API uses. `Internal` covers states that the type system cannot otherwise rule out (an amount
/// overflow beyond `u64` minor units, a worker reply channel dropped without a send) rather than
/// panicking on the public API path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("arguments are invalid")]
    WrongArguments,
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("user does not exist")]
    UserDoesNotExist,
    #[error("not enough money")]
    NotEnoughMoney,
    #[error("too many requests to user")]
    TooManyRequestsToUser,
    #[error("sender does not exist")]
    SenderDoesNotExist,
    #[error("receiver does not exist")]
    ReceiverDoesNotExist,
    #[error("too many requests to sender")]
    TooManyRequestsToSender,
    #[error("too many requests to receiver")]
    TooManyRequestsToReceiver,
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BankError>;
