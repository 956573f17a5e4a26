use crate::prelude::*;

use async_trait::async_trait;

/// Somewhere a finished snapshot goes: the database, a datalog file, the
/// in-memory cache. A failing sink never stops the scheduler; the reading
/// happened even if it wasn't kept.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    fn name(&self) -> &str;

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()>;
}
