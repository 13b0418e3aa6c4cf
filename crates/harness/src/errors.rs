//! Errors surfaced by the network driver.

use restaking_consumer::errors::ConsumerError;
use restaking_coordinator::errors::CoordinatorError;
use restaking_params::errors::ParamsError;
use restaking_primitives::{errors::BankError, types::ChainId};
use thiserror::Error;

/// Errors from driving the network.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// No consumer with this chain id is part of the network.
    #[error("unknown consumer chain {0}")]
    UnknownConsumer(ChainId),

    /// The parameter set was rejected.
    #[error("invalid params: {0}")]
    Params(#[from] ParamsError),

    /// The coordinator rejected a request.
    #[error("coordinator: {0}")]
    Coordinator(#[from] CoordinatorError),

    /// A consumer rejected a request.
    #[error("consumer: {0}")]
    Consumer(#[from] ConsumerError),

    /// A bank operation the driver made failed.
    #[error("bank: {0}")]
    Bank(#[from] BankError),
}

/// Result alias for the network driver.
pub type HarnessResult<T> = Result<T, HarnessError>;
