//! Defaults of the persistence layer.

use std::time::Duration;

/// How many times a failed statement is retried before the error is returned.
pub const DEFAULT_MAX_RETRY_COUNT: usize = 5;

/// How long to wait between retries.
pub const DEFAULT_BACKOFF_PERIOD: Duration = Duration::from_millis(200);

/// Name of the snapshot table.
pub const SNAPSHOT_TABLE: &str = "snapshots";
