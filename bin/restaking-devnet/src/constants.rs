use restaking_primitives::types::Timestamp;

/// Block time of the first block, unix nanoseconds.
pub(crate) const GENESIS_TIME: Timestamp = 1_700_000_000_000_000_000;

pub(crate) const DB_NAME: &str = "devnet.db";

pub(crate) const COORDINATOR_NAMESPACE: &str = "coordinator";
