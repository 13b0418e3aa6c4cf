//! Errors returned by the coordinator ledger.
//!
//! These are the synchronous failures: the request is rejected and nothing is mutated. Failures
//! that happen on a consumer come back as error acknowledgements and are logged instead.

use restaking_primitives::{
    coin::{Amount, Shares},
    decimal::Decimal,
    errors::BankError,
    types::{Address, ChainId, ChannelEnd, Denom, PacketKey, ValidatorId},
};
use thiserror::Error;

/// Errors that can occur in the coordinator ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// A consumer with this chain id is already registered.
    #[error("consumer {0} is already registered")]
    ConsumerExists(ChainId),

    /// The channel end is already bound to another consumer.
    #[error("channel end {0} is already bound to a consumer")]
    ChannelInUse(ChannelEnd),

    /// Packets arrived on a channel end that belongs to no consumer.
    #[error("no consumer is bound to channel end {0}")]
    UnknownChannel(ChannelEnd),

    /// The consumer chain is not registered.
    #[error("unknown consumer {0}")]
    UnknownConsumer(ChainId),

    /// Chain ids and validators were empty or of different lengths.
    #[error("need one validator per consumer chain, got {chains} chains and {validators} validators")]
    MismatchedValidators {
        /// Number of chain ids given.
        chains: usize,

        /// Number of validators given.
        validators: usize,
    },

    /// The same consumer was listed twice.
    #[error("consumer {0} is listed more than once")]
    DuplicateConsumer(ChainId),

    /// The validator is not in the consumer's cached validator set.
    #[error("validator {validator} does not exist on {chain_id}")]
    NotExistedValidator {
        /// The consumer.
        chain_id: ChainId,

        /// The unknown validator.
        validator: ValidatorId,
    },

    /// The consumer does not accept the denomination.
    #[error("{chain_id} does not accept {denom} for restaking")]
    UnsupportedRestakingToken {
        /// The consumer.
        chain_id: ChainId,

        /// The rejected denomination.
        denom: Denom,
    },

    /// The derived operator address is already taken.
    #[error("operator {0} already exists")]
    OperatorExists(Address),

    /// No operator with this address.
    #[error("unknown operator {0}")]
    UnknownOperator(Address),

    /// Zero amounts are never accepted.
    #[error("amount must be positive")]
    ZeroAmount,

    /// The coin is not the operator's restaking denomination.
    #[error("expected {expected}, got {got}")]
    WrongDenom {
        /// The operator's restaking denomination.
        expected: Denom,

        /// What was sent.
        got: Denom,
    },

    /// The delegator holds no shares of the operator.
    #[error("{delegator} has no delegation to {operator}")]
    NoDelegation {
        /// The delegator.
        delegator: Address,

        /// The operator.
        operator: Address,
    },

    /// Burning the requested amount needs more shares than the delegator holds.
    #[error("insufficient shares: need {requested}, hold {held}")]
    InsufficientShares {
        /// Shares the request would burn.
        requested: Shares,

        /// Shares held.
        held: Shares,
    },

    /// The delegation would be worth zero shares.
    #[error("delegation of {0} is worth zero shares")]
    DelegationTooSmall(Amount),

    /// The operator has shares outstanding but nothing staked.
    #[error("operator {0} has been slashed to zero")]
    OperatorInsolvent(Address),

    /// Slash fractions must lie in `[0, 1]`.
    #[error("invalid slash fraction {0}")]
    InvalidSlashFraction(Decimal),

    /// The operator does not run a validator on this consumer.
    #[error("operator {operator} does not serve {chain_id}")]
    NotServed {
        /// The operator.
        operator: Address,

        /// The consumer.
        chain_id: ChainId,
    },

    /// The packet is not one the coordinator accepts.
    #[error("unexpected packet {0}")]
    UnexpectedPacket(String),

    /// A callback was already registered for this packet.
    #[error("callback already registered for {0}")]
    DuplicateCallback(PacketKey),

    /// The bank refused a movement of funds.
    #[error("bank: {0}")]
    Bank(#[from] BankError),
}

/// The result type for operations on the coordinator ledger.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
