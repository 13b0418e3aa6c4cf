//! An in-process restaking network: one coordinator, any number of consumers and a relayer
//! carrying packets, acknowledgements and token transfers between them.
//!
//! Every chain shares one block clock. [`Network::end_block`](network::Network::end_block) ends
//! the block everywhere, moves the clock and relays until nothing is left to carry, so a test can
//! step the whole system the way a devnet would.

pub mod errors;
pub mod genesis;
pub mod network;
pub mod relayer;

pub use network::Network;
