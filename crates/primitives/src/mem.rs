//! In-memory implementations of the collaborator traits, used by tests and the devnet.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ethnum::U256;
use tracing::trace;

use crate::{
    coin::{Amount, Coin},
    errors::{BankError, MessengerError},
    interfaces::{Bank, Messenger},
    packets::Packet,
    types::{Address, ChannelEnd, Denom, PacketKey, Sequence, Timestamp},
};

/// A [`Bank`] backed by a map, tracking total supply per denomination.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBank {
    balances: BTreeMap<(Address, Denom), Amount>,
    supply: BTreeMap<Denom, Amount>,
}

impl InMemoryBank {
    /// Creates an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total amount of `denom` in existence.
    pub fn supply(&self, denom: &Denom) -> Amount {
        self.supply.get(denom).copied().unwrap_or(U256::ZERO)
    }

    fn debit(&mut self, from: &Address, coin: &Coin) -> Result<(), BankError> {
        let key = (from.clone(), coin.denom.clone());
        let available = self.balances.get(&key).copied().unwrap_or(U256::ZERO);
        let Some(left) = available.checked_sub(coin.amount) else {
            return Err(BankError::InsufficientFunds {
                account: from.clone(),
                needed: coin.clone(),
                available,
            });
        };

        if left == U256::ZERO {
            self.balances.remove(&key);
        } else {
            self.balances.insert(key, left);
        }
        Ok(())
    }

    fn credit(&mut self, to: &Address, coin: &Coin) -> Result<(), BankError> {
        let entry = self
            .balances
            .entry((to.clone(), coin.denom.clone()))
            .or_insert(U256::ZERO);
        *entry = entry
            .checked_add(coin.amount)
            .ok_or_else(|| BankError::Overflow(to.clone()))?;
        Ok(())
    }
}

impl Bank for InMemoryBank {
    fn balance(&self, owner: &Address, denom: &Denom) -> Amount {
        self.balances
            .get(&(owner.clone(), denom.clone()))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn transfer(&mut self, from: &Address, to: &Address, coin: &Coin) -> Result<(), BankError> {
        trace!(%from, %to, %coin, "transfer");
        self.debit(from, coin)?;
        self.credit(to, coin)
    }

    fn mint(&mut self, to: &Address, coin: &Coin) -> Result<(), BankError> {
        trace!(%to, %coin, "mint");
        let supply = self.supply(&coin.denom);
        let supply = supply
            .checked_add(coin.amount)
            .ok_or_else(|| BankError::Overflow(to.clone()))?;
        self.credit(to, coin)?;
        self.supply.insert(coin.denom.clone(), supply);
        Ok(())
    }

    fn burn(&mut self, from: &Address, coin: &Coin) -> Result<(), BankError> {
        trace!(%from, %coin, "burn");
        self.debit(from, coin)?;
        let supply = self.supply(&coin.denom);
        self.supply
            .insert(coin.denom.clone(), supply.saturating_sub(coin.amount));
        Ok(())
    }
}

/// A packet waiting to be relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    /// Where the packet left from and its sequence.
    pub key: PacketKey,

    /// The payload.
    pub packet: Packet,

    /// Timeout as given by the sender.
    pub timeout: Timestamp,
}

/// A [`Messenger`] that queues packets until a relayer drains them. Sequences start at 1 per
/// channel end.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    queued: VecDeque<OutboundPacket>,
    next_sequence: BTreeMap<ChannelEnd, Sequence>,
    closed: BTreeSet<ChannelEnd>,
}

impl Outbox {
    /// Creates an empty outbox with every channel open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later send on `end` fail.
    pub fn close(&mut self, end: ChannelEnd) {
        self.closed.insert(end);
    }

    /// Undoes [`Outbox::close`].
    pub fn reopen(&mut self, end: &ChannelEnd) {
        self.closed.remove(end);
    }

    /// Takes every queued packet in send order.
    pub fn drain(&mut self) -> Vec<OutboundPacket> {
        self.queued.drain(..).collect()
    }

    /// Queued packets in send order.
    pub fn pending(&self) -> impl Iterator<Item = &OutboundPacket> {
        self.queued.iter()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

impl Messenger for Outbox {
    fn send(
        &mut self,
        end: &ChannelEnd,
        packet: Packet,
        timeout: Timestamp,
    ) -> Result<Sequence, MessengerError> {
        if self.closed.contains(end) {
            return Err(MessengerError::ChannelClosed(end.clone()));
        }

        let next = self.next_sequence.entry(end.clone()).or_insert(1);
        let sequence = *next;
        *next += 1;

        trace!(%end, %sequence, %packet, "queued packet");
        self.queued.push_back(OutboundPacket {
            key: PacketKey::new(end.clone(), sequence),
            packet,
            timeout,
        });

        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::{ValidatorSetChangePacket, ValidatorUpdate};

    fn coin(amount: u128) -> Coin {
        Coin::new("ustake", amount)
    }

    #[test]
    fn bank_moves_and_tracks_supply() {
        let mut bank = InMemoryBank::new();
        let alice = Address::new("alice");
        let bob = Address::new("bob");
        let denom = Denom::new("ustake");

        bank.mint(&alice, &coin(100)).unwrap();
        bank.transfer(&alice, &bob, &coin(40)).unwrap();
        bank.burn(&bob, &coin(10)).unwrap();

        assert_eq!(bank.balance(&alice, &denom), U256::new(60));
        assert_eq!(bank.balance(&bob, &denom), U256::new(30));
        assert_eq!(bank.supply(&denom), U256::new(90));

        let err = bank.transfer(&bob, &alice, &coin(31)).unwrap_err();
        assert!(matches!(err, BankError::InsufficientFunds { .. }));
        assert_eq!(bank.balance(&bob, &denom), U256::new(30));
    }

    #[test]
    fn outbox_sequences_per_channel() {
        let mut outbox = Outbox::new();
        let a = ChannelEnd::new("channel-0", "restaking");
        let b = ChannelEnd::new("channel-1", "restaking");
        let packet = Packet::ValidatorSetChange(ValidatorSetChangePacket {
            updates: vec![ValidatorUpdate {
                identity: "val".into(),
                power: 1,
            }],
            update_sequence_id: 1,
        });

        assert_eq!(outbox.send(&a, packet.clone(), 0).unwrap(), 1);
        assert_eq!(outbox.send(&a, packet.clone(), 0).unwrap(), 2);
        assert_eq!(outbox.send(&b, packet.clone(), 0).unwrap(), 1);

        outbox.close(b.clone());
        assert_eq!(
            outbox.send(&b, packet, 0),
            Err(MessengerError::ChannelClosed(b))
        );

        let drained = outbox.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[1].key.sequence, 2);
        assert!(outbox.is_empty());
    }
}
