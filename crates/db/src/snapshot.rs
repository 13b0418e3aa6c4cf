//! The snapshot store interface and its typed helpers.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::errors::DbResult;

/// Stores serialized ledger state by namespace and block height.
#[async_trait]
pub trait SnapshotDb {
    /// Stores `state` for `namespace` at `height`, replacing what was there.
    async fn put_snapshot(&self, namespace: &str, height: u64, state: Vec<u8>) -> DbResult<()>;

    /// The snapshot of `namespace` at `height`.
    async fn get_snapshot(&self, namespace: &str, height: u64) -> DbResult<Option<Vec<u8>>>;

    /// The snapshot of `namespace` with the greatest height.
    async fn latest_snapshot(&self, namespace: &str) -> DbResult<Option<(u64, Vec<u8>)>>;

    /// Deletes the snapshots of `namespace` below `height` and returns how many were deleted.
    async fn prune_below(&self, namespace: &str, height: u64) -> DbResult<u64>;
}

/// Serializes `value` and stores it.
pub async fn save<D, T>(db: &D, namespace: &str, height: u64, value: &T) -> DbResult<()>
where
    D: SnapshotDb + ?Sized,
    T: Serialize,
{
    let state = bincode::serialize(value)?;
    debug!(%namespace, %height, bytes = state.len(), "saving snapshot");
    db.put_snapshot(namespace, height, state).await
}

/// Loads and deserializes the snapshot of `namespace` at `height`.
pub async fn load<D, T>(db: &D, namespace: &str, height: u64) -> DbResult<Option<T>>
where
    D: SnapshotDb + ?Sized,
    T: DeserializeOwned,
{
    db.get_snapshot(namespace, height)
        .await?
        .map(|state| bincode::deserialize(&state))
        .transpose()
        .map_err(Into::into)
}

/// Loads and deserializes the newest snapshot of `namespace`.
pub async fn load_latest<D, T>(db: &D, namespace: &str) -> DbResult<Option<(u64, T)>>
where
    D: SnapshotDb + ?Sized,
    T: DeserializeOwned,
{
    let Some((height, state)) = db.latest_snapshot(namespace).await? else {
        return Ok(None);
    };

    Ok(Some((height, bincode::deserialize(&state)?)))
}
