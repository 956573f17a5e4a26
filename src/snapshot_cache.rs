use crate::prelude::*;
use crate::sink::SnapshotSink;

use async_trait::async_trait;
use tokio::sync::watch;

/// Single-slot, last-value-wins hand-off of the newest snapshot. The poll
/// loop pushes, any number of readers pull on their own schedule; nothing
/// older than the latest snapshot is kept.
#[derive(Clone)]
pub struct SnapshotCache {
    tx: watch::Sender<Option<Arc<Snapshot>>>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, snapshot: Snapshot) {
        self.tx.send_replace(Some(Arc::new(snapshot)));
    }

    pub fn reader(&self) -> CacheReader {
        CacheReader {
            rx: self.tx.subscribe(),
        }
    }
}

#[async_trait]
impl SnapshotSink for SnapshotCache {
    fn name(&self) -> &str {
        "cache"
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.publish(snapshot.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub struct CacheReader {
    rx: watch::Receiver<Option<Arc<Snapshot>>>,
}

impl CacheReader {
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.rx.borrow().clone()
    }

    /// Newest decoded value of `name`, or `None` if nothing has been
    /// published yet or that read failed.
    pub fn get_latest_value(&self, name: &str) -> Option<f64> {
        self.rx.borrow().as_ref().and_then(|s| s.value(name))
    }

    /// Waits until a snapshot newer than the last one seen is published.
    /// Errors once the cache has been dropped.
    pub async fn changed(&mut self) -> Result<()> {
        self.rx.changed().await?;
        Ok(())
    }
}
