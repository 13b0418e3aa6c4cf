//! Errors raised by the shared building blocks and the collaborator traits.

use thiserror::Error;

use crate::{
    coin::{Amount, Coin, Shares},
    types::{Address, ChannelEnd},
};

/// Errors from [`SharePool`](crate::share_pool::SharePool) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SharePoolError {
    /// Zero amounts or zero shares are never accepted.
    #[error("amount must be positive")]
    ZeroAmount,

    /// The holder has no shares in the pool.
    #[error("holder has no shares")]
    NoShares,

    /// The holder has fewer shares than requested.
    #[error("insufficient shares: requested {requested}, held {held}")]
    InsufficientShares {
        /// Shares the caller tried to burn.
        requested: Shares,

        /// Shares actually held.
        held: Shares,
    },

    /// The deposit is too small to be worth a single share at the current price.
    #[error("deposit of {0} is worth zero shares")]
    DepositTooSmall(Amount),

    /// Shares are outstanding but the pool holds nothing, so a price cannot be set.
    #[error("pool is insolvent: {shares} shares outstanding against zero stake")]
    Insolvent {
        /// Outstanding shares.
        shares: Shares,
    },
}

/// Errors from a [`Bank`](crate::interfaces::Bank).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    /// The account does not hold enough.
    #[error("{account} holds {available} but {needed} is needed")]
    InsufficientFunds {
        /// The debited account.
        account: Address,

        /// What was requested.
        needed: Coin,

        /// What the account holds of that denomination.
        available: Amount,
    },

    /// A balance would exceed 256 bits.
    #[error("balance overflow for {0}")]
    Overflow(Address),
}

/// Errors from a [`Messenger`](crate::interfaces::Messenger) or
/// [`TokenTransfer`](crate::interfaces::TokenTransfer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessengerError {
    /// The channel is unknown or closed.
    #[error("channel {0} is not open")]
    ChannelClosed(ChannelEnd),

    /// The transfer could not escrow the sender's funds.
    #[error("transfer escrow failed: {0}")]
    Escrow(#[from] BankError),
}
