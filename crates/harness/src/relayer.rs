//! Packet routing between the coordinator and its consumers.
//!
//! The relayer only keeps what is in flight from the coordinator to each consumer; everything a
//! consumer sends is delivered as soon as it is drained. Per-channel order is preserved because
//! each consumer has exactly one queue and it is only ever drained front to back.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use restaking_primitives::{
    mem::OutboundPacket,
    types::{ChainId, ChannelEnd},
};
use tracing::{debug, warn};

/// What one relay pass carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Packets delivered to either side.
    pub packets: usize,

    /// Packets that timed out instead.
    pub timeouts: usize,

    /// Token transfers delivered.
    pub transfers: usize,

    /// Token transfers refunded to their sender.
    pub refunds: usize,
}

impl RelayStats {
    /// Whether nothing moved.
    pub const fn is_idle(&self) -> bool {
        self.packets == 0 && self.timeouts == 0 && self.transfers == 0 && self.refunds == 0
    }

    /// Adds `other` to these counts.
    pub fn absorb(&mut self, other: Self) {
        self.packets += other.packets;
        self.timeouts += other.timeouts;
        self.transfers += other.transfers;
        self.refunds += other.refunds;
    }
}

/// Packets on their way from the coordinator to the consumers.
#[derive(Debug, Clone, Default)]
pub struct Relayer {
    routes: BTreeMap<ChannelEnd, ChainId>,
    held: BTreeSet<ChainId>,
    in_flight: BTreeMap<ChainId, VecDeque<OutboundPacket>>,
}

impl Relayer {
    /// A relayer without routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes packets leaving the coordinator on `end` to `chain_id`.
    pub fn add_route(&mut self, end: ChannelEnd, chain_id: ChainId) {
        self.in_flight.entry(chain_id.clone()).or_default();
        self.routes.insert(end, chain_id);
    }

    /// Consumer reached over the coordinator-side end `end`.
    pub fn route(&self, end: &ChannelEnd) -> Option<&ChainId> {
        self.routes.get(end)
    }

    /// Stops delivering to `chain_id` until [`Relayer::release`] is called. Packets keep queueing.
    pub fn hold(&mut self, chain_id: &ChainId) {
        debug!(%chain_id, "holding packets");
        self.held.insert(chain_id.clone());
    }

    /// Resumes delivery to `chain_id`.
    pub fn release(&mut self, chain_id: &ChainId) {
        debug!(%chain_id, "releasing packets");
        self.held.remove(chain_id);
    }

    /// Whether delivery to `chain_id` is held.
    pub fn is_held(&self, chain_id: &ChainId) -> bool {
        self.held.contains(chain_id)
    }

    /// Packets queued for `chain_id`.
    pub fn in_flight(&self, chain_id: &ChainId) -> usize {
        self.in_flight.get(chain_id).map_or(0, VecDeque::len)
    }

    /// Queues packets the coordinator sent. Returns how many had no route and were dropped.
    pub(crate) fn enqueue(&mut self, packets: Vec<OutboundPacket>) -> usize {
        let mut dropped = 0;
        for out in packets {
            let Some(chain_id) = self.routes.get(&out.key.end) else {
                warn!(key = %out.key, packet = %out.packet, "no route for packet, dropping");
                dropped += 1;
                continue;
            };
            self.in_flight
                .entry(chain_id.clone())
                .or_default()
                .push_back(out);
        }
        dropped
    }

    /// Takes the packets that can be delivered to `chain_id` now, oldest first.
    pub(crate) fn take_deliverable(&mut self, chain_id: &ChainId) -> Vec<OutboundPacket> {
        if self.is_held(chain_id) {
            return Vec::new();
        }
        self.take_all(chain_id)
    }

    /// Takes every packet queued for `chain_id`, held or not.
    pub(crate) fn take_all(&mut self, chain_id: &ChainId) -> Vec<OutboundPacket> {
        self.in_flight
            .get_mut(chain_id)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }
}
