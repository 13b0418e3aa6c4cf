//! In-memory snapshot store.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::{errors::DbResult, snapshot::SnapshotDb};

/// A [`SnapshotDb`] that keeps everything in a map. Clones share the map.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDbInMemory {
    snapshots: Arc<RwLock<BTreeMap<(String, u64), Vec<u8>>>>,
}

#[async_trait]
impl SnapshotDb for SnapshotDbInMemory {
    async fn put_snapshot(&self, namespace: &str, height: u64, state: Vec<u8>) -> DbResult<()> {
        trace!(%namespace, %height, "storing snapshot in memory");
        self.snapshots
            .write()
            .await
            .insert((namespace.to_owned(), height), state);

        Ok(())
    }

    async fn get_snapshot(&self, namespace: &str, height: u64) -> DbResult<Option<Vec<u8>>> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(&(namespace.to_owned(), height))
            .cloned())
    }

    async fn latest_snapshot(&self, namespace: &str) -> DbResult<Option<(u64, Vec<u8>)>> {
        let snapshots = self.snapshots.read().await;
        let latest = snapshots
            .range((namespace.to_owned(), 0)..=(namespace.to_owned(), u64::MAX))
            .next_back()
            .map(|((_, height), state)| (*height, state.clone()));

        Ok(latest)
    }

    async fn prune_below(&self, namespace: &str, height: u64) -> DbResult<u64> {
        let mut snapshots = self.snapshots.write().await;
        let before = snapshots.len();
        snapshots.retain(|(ns, h), _| ns != namespace || *h >= height);

        Ok((before - snapshots.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{load, load_latest, save};

    #[tokio::test]
    async fn latest_is_per_namespace() {
        let db = SnapshotDbInMemory::default();

        save(&db, "coordinator", 5, &"five".to_owned()).await.unwrap();
        save(&db, "coordinator", 9, &"nine".to_owned()).await.unwrap();
        save(&db, "consumer/osmo", 12, &"twelve".to_owned()).await.unwrap();

        let latest: Option<(u64, String)> = load_latest(&db, "coordinator").await.unwrap();
        assert_eq!(latest, Some((9, "nine".to_owned())));

        let at_five: Option<String> = load(&db, "coordinator", 5).await.unwrap();
        assert_eq!(at_five.as_deref(), Some("five"));

        let missing: Option<(u64, String)> = load_latest(&db, "consumer/juno").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn prune_keeps_recent_snapshots() {
        let db = SnapshotDbInMemory::default();
        for height in 1..=5 {
            db.put_snapshot("coordinator", height, vec![height as u8])
                .await
                .unwrap();
        }
        db.put_snapshot("other", 1, vec![0]).await.unwrap();

        assert_eq!(db.prune_below("coordinator", 4).await.unwrap(), 3);
        assert!(db.get_snapshot("coordinator", 3).await.unwrap().is_none());
        assert_eq!(db.get_snapshot("coordinator", 4).await.unwrap(), Some(vec![4]));
        assert!(db.get_snapshot("other", 1).await.unwrap().is_some());
    }
}
