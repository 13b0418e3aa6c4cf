//! Logical packets exchanged between the coordinator and its consumers, and their
//! acknowledgements. Encoding on the wire is the transport's business; everything here is plain
//! serde data.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{
    coin::Coin,
    decimal::Decimal,
    types::{Address, ChannelId, Denom, PortId, Sequence, Timestamp, ValidatorId},
};

/// Coordinator → consumer: bond `amount` to `validator` on behalf of `operator`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatePacket {
    /// Operator whose agent holding grows.
    pub operator: Address,

    /// Local validator to bond to.
    pub validator: ValidatorId,

    /// Amount in the restaking denomination.
    pub amount: Coin,
}

/// Coordinator → consumer: unbond `amount` from `validator` on behalf of `operator`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndelegatePacket {
    /// Operator whose agent holding shrinks.
    pub operator: Address,

    /// Local validator to unbond from.
    pub validator: ValidatorId,

    /// Amount in the restaking denomination.
    pub amount: Coin,
}

/// Coordinator → consumer: the operator was slashed elsewhere and its stake here must shrink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashPacket {
    /// The slashed operator.
    pub operator: Address,

    /// Validator the operator's stake is bonded to on this consumer.
    pub validator: ValidatorId,

    /// Amount removed, in the restaking denomination.
    pub amount: Coin,
}

/// Coordinator → consumer: send the operator's accrued rewards of `reward_denom` back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRewardPacket {
    /// Operator whose rewards are collected.
    pub operator: Address,

    /// Validator the rewards accrued on.
    pub validator: ValidatorId,

    /// Denomination to collect.
    pub reward_denom: Denom,
}

/// A change to a consumer's validator set. Power 0 removes the validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    /// The validator.
    pub identity: ValidatorId,

    /// Its new voting power.
    pub power: u64,
}

/// Consumer → coordinator: validator set changes since the previous report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSetChangePacket {
    /// The changes.
    pub updates: Vec<ValidatorUpdate>,

    /// Strictly increasing per consumer; stale reports are ignored.
    pub update_sequence_id: u64,
}

/// Consumer → coordinator: a validator misbehaved and the operator behind it must be slashed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSlashNotice {
    /// The operator to slash.
    pub operator: Address,

    /// Fraction of the operator's stake to remove.
    pub slash_fraction: Decimal,
}

/// Every packet that travels over a restaking channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    /// See [`DelegatePacket`].
    Delegate(DelegatePacket),

    /// See [`UndelegatePacket`].
    Undelegate(UndelegatePacket),

    /// See [`SlashPacket`].
    Slash(SlashPacket),

    /// See [`WithdrawRewardPacket`].
    WithdrawReward(WithdrawRewardPacket),

    /// See [`ValidatorSetChangePacket`].
    ValidatorSetChange(ValidatorSetChangePacket),

    /// See [`ConsumerSlashNotice`].
    ConsumerSlash(ConsumerSlashNotice),
}

impl Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Packet::Delegate(p) => write!(f, "Delegate({} of {} to {})", p.amount, p.operator, p.validator),
            Packet::Undelegate(p) => {
                write!(f, "Undelegate({} of {} from {})", p.amount, p.operator, p.validator)
            }
            Packet::Slash(p) => write!(f, "Slash({} of {} on {})", p.amount, p.operator, p.validator),
            Packet::WithdrawReward(p) => write!(
                f,
                "WithdrawReward({} for {} on {})",
                p.reward_denom, p.operator, p.validator
            ),
            Packet::ValidatorSetChange(p) => write!(
                f,
                "ValidatorSetChange(#{}, {} updates)",
                p.update_sequence_id,
                p.updates.len()
            ),
            Packet::ConsumerSlash(p) => {
                write!(f, "ConsumerSlash({} by {})", p.operator, p.slash_fraction)
            }
        }
    }
}

/// Success payload of an undelegate acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndelegateAck {
    /// When the consumer's own unbonding completes.
    pub completion_time_unix_nano: Timestamp,
}

/// Success payload of a withdraw-reward acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRewardAck {
    /// Channel the reward transfer left the consumer on.
    pub transfer_channel: ChannelId,

    /// Port the reward transfer left the consumer on.
    pub transfer_port: PortId,

    /// Sequence of the reward transfer, `None` when nothing was sent.
    pub transfer_sequence: Option<Sequence>,

    /// What was sent.
    pub balance: Coin,
}

/// The success payload carried by an acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckPayload {
    /// No result data.
    Empty,

    /// Result of an undelegate packet.
    Undelegate(UndelegateAck),

    /// Result of a withdraw-reward packet.
    WithdrawReward(WithdrawRewardAck),
}

/// The receiver's answer to a packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acknowledgement {
    /// The packet was applied.
    Success(AckPayload),

    /// The packet was rejected; nothing was applied on the receiving side.
    Error(String),
}

impl Acknowledgement {
    /// A success ack with no payload.
    pub const fn empty() -> Self {
        Self::Success(AckPayload::Empty)
    }

    /// An error ack carrying the display form of `err`.
    pub fn error(err: impl Display) -> Self {
        Self::Error(err.to_string())
    }

    /// Whether the packet was applied.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl Display for Acknowledgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acknowledgement::Success(AckPayload::Empty) => f.write_str("ok"),
            Acknowledgement::Success(AckPayload::Undelegate(ack)) => {
                write!(f, "ok(completes at {})", ack.completion_time_unix_nano)
            }
            Acknowledgement::Success(AckPayload::WithdrawReward(ack)) => {
                write!(f, "ok(sent {})", ack.balance)
            }
            Acknowledgement::Error(reason) => write!(f, "error({reason})"),
        }
    }
}
