//! Persistence of ledger snapshots.
//!
//! Ledgers are plain values, so persisting one is a matter of serializing it at a block boundary.
//! [`snapshot::SnapshotDb`] stores opaque blobs per namespace and height; the typed helpers in
//! [`snapshot`] put bincode on top.

pub mod errors;
pub mod inmemory;
pub mod persistent;
pub mod snapshot;
