//! Errors returned by the consumer ledger. On the packet path they become error
//! acknowledgements.

use restaking_primitives::{
    coin::{Coin, Shares},
    decimal::Decimal,
    errors::{BankError, MessengerError, SharePoolError},
    types::{Address, ChannelEnd, Denom, ValidatorId},
};
use thiserror::Error;

use crate::agent::AgentKey;

/// Errors raised by the consumer's staking module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    /// The validator does not exist.
    #[error("validator {0} does not exist")]
    UnknownValidator(ValidatorId),

    /// The delegator has nothing bonded to the validator.
    #[error("{delegator} has no delegation with {validator}")]
    NoDelegation {
        /// The delegator.
        delegator: Address,

        /// The validator.
        validator: ValidatorId,
    },

    /// More was asked to unbond than is bonded.
    #[error("cannot unbond {requested}, only {bonded} bonded")]
    InsufficientStake {
        /// Requested amount.
        requested: Coin,

        /// Bonded amount.
        bonded: Coin,
    },

    /// Moving the tokens failed.
    #[error(transparent)]
    Bank(#[from] BankError),
}

/// Errors that can occur in the consumer ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumerError {
    /// A packet arrived on a channel end other than the coordinator's.
    #[error("packet on {0}, expected the coordinator channel")]
    WrongChannel(ChannelEnd),

    /// The packet is not one the coordinator sends.
    #[error("unexpected packet {0}")]
    UnexpectedPacket(String),

    /// Zero amount.
    #[error("amount must be positive")]
    ZeroAmount,

    /// The validator is not in the local validator set.
    #[error("unknown validator {0}")]
    UnknownValidator(ValidatorId),

    /// The denomination has no native price.
    #[error("no native price for {0}")]
    NoPrice(Denom),

    /// The collateral is worth less than one native unit.
    #[error("{0} is worth nothing in native stake")]
    NothingToBond(Coin),

    /// No agent exists for the denomination and validator.
    #[error("no agent for {0}")]
    NotExistedAgent(AgentKey),

    /// The operator holds fewer agent shares than the request needs.
    #[error("needs {requested} agent shares, {held} held")]
    InsufficientShares {
        /// Shares needed.
        requested: Shares,

        /// Shares held.
        held: Shares,
    },

    /// Slash fractions are at most one.
    #[error("slash fraction {0} is above one")]
    InvalidSlashFraction(Decimal),

    /// The agent pool refused the operation.
    #[error(transparent)]
    SharePool(SharePoolError),

    /// The staking module refused the operation.
    #[error(transparent)]
    Staking(#[from] StakingError),

    /// A bank operation failed.
    #[error(transparent)]
    Bank(#[from] BankError),

    /// A packet or transfer could not be sent.
    #[error(transparent)]
    Messenger(#[from] MessengerError),
}

impl From<SharePoolError> for ConsumerError {
    fn from(err: SharePoolError) -> Self {
        match err {
            SharePoolError::InsufficientShares { requested, held } => {
                Self::InsufficientShares { requested, held }
            }
            SharePoolError::NoShares => Self::InsufficientShares {
                requested: Shares::ONE,
                held: Shares::ZERO,
            },
            SharePoolError::ZeroAmount => Self::ZeroAmount,
            other => Self::SharePool(other),
        }
    }
}

/// Result type for the consumer ledger.
pub type ConsumerResult<T> = Result<T, ConsumerError>;
