//! Collaborators the ledgers rely on but do not implement.

use crate::{
    coin::{Amount, Coin},
    errors::{BankError, MessengerError},
    packets::Packet,
    types::{Address, ChannelEnd, Denom, Sequence, Timestamp},
};

/// Token balances on the executing chain.
pub trait Bank {
    /// What `owner` holds of `denom`.
    fn balance(&self, owner: &Address, denom: &Denom) -> Amount;

    /// Moves `coin` from `from` to `to`.
    fn transfer(&mut self, from: &Address, to: &Address, coin: &Coin) -> Result<(), BankError>;

    /// Creates `coin` in `to`.
    fn mint(&mut self, to: &Address, coin: &Coin) -> Result<(), BankError>;

    /// Destroys `coin` held by `from`.
    fn burn(&mut self, from: &Address, coin: &Coin) -> Result<(), BankError>;
}

/// Sends packets over an ordered channel. Acknowledgements and timeouts come back later through
/// the receiving ledger's callbacks.
pub trait Messenger {
    /// Queues `packet` on `end` and returns its sequence number.
    fn send(
        &mut self,
        end: &ChannelEnd,
        packet: Packet,
        timeout: Timestamp,
    ) -> Result<Sequence, MessengerError>;
}

/// Moves tokens to another chain.
pub trait TokenTransfer {
    /// Escrows `coin` from `sender`, sends it over `end` to `receiver` and returns the transfer's
    /// sequence number.
    fn send_transfer(
        &mut self,
        end: &ChannelEnd,
        sender: &Address,
        receiver: &Address,
        coin: &Coin,
        timeout: Timestamp,
    ) -> Result<Sequence, MessengerError>;
}
