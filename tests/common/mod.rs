#![allow(dead_code)]

use v20_bridge::prelude::*;
use v20_bridge::register::{Access, ParameterDescriptor, Range, Registry};
use v20_bridge::sink::SnapshotSink;
use v20_bridge::transport::RegisterTransport;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// What the mock answers for one address.
#[derive(Debug, Clone)]
pub enum Reply {
    Value(u16),
    Fail(TransportError),
}

/// Scripted stand-in for the serial link. Unscripted addresses answer
/// `address - 40000`.
#[derive(Clone, Default)]
pub struct MockTransport {
    pub replies: HashMap<u16, Reply>,
    pub connect_ok: bool,
    /// Every block read fails with a timeout when set.
    pub fail_blocks: bool,
    /// Reads after this many succeed-or-fail calls report NotConnected.
    pub disconnect_after: Option<usize>,
    /// Time every read takes.
    pub read_delay: Option<Duration>,
    pub reads: Arc<Mutex<Vec<(u16, u16)>>>,
    pub read_times: Arc<Mutex<Vec<Instant>>>,
    pub connects: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            connect_ok: true,
            ..Default::default()
        }
    }

    pub fn reply(mut self, address: u16, reply: Reply) -> Self {
        self.replies.insert(address, reply);
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.lock().unwrap().len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn answer(&self, address: u16) -> Result<u16, TransportError> {
        match self.replies.get(&address) {
            Some(Reply::Value(v)) => Ok(*v),
            Some(Reply::Fail(e)) => Err(e.clone()),
            None => Ok(address - 40000),
        }
    }
}

#[async_trait]
impl RegisterTransport for MockTransport {
    async fn connect(&mut self) -> Result<bool, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.connect_ok)
    }

    async fn read_block(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        self.read_times.lock().unwrap().push(Instant::now());
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }

        let done = {
            let mut reads = self.reads.lock().unwrap();
            reads.push((address, count));
            reads.len()
        };

        if let Some(limit) = self.disconnect_after {
            if done > limit {
                return Err(TransportError::NotConnected);
            }
        }

        if count > 1 && self.fail_blocks {
            return Err(TransportError::Timeout);
        }

        (address..address + count).map(|a| self.answer(a)).collect()
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// A sink that refuses every snapshot.
#[derive(Clone, Default)]
pub struct FailingSink {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl SnapshotSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn write_snapshot(&self, _snapshot: &Snapshot) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        bail!("database is locked")
    }
}

pub struct Factory();

impl Factory {
    /// A small slice of the V20 map: two contiguous runs and a gap.
    pub fn registry() -> Arc<Registry> {
        Arc::new(
            Registry::new(vec![
                ParameterDescriptor::new(40003, "FREQ_REF", Access::ReadWrite, "%", 100.0, Some(Range::new(0.0, 100.0))),
                ParameterDescriptor::new(40004, "RUN_ENABLE", Access::ReadWrite, "_", 1.0, Some(Range::new(0.0, 1.0))),
                ParameterDescriptor::new(40025, "SPEED", Access::ReadOnly, "RPM", 1.0, Some(Range::new(-16250.0, 16250.0))),
                ParameterDescriptor::new(40026, "CURRENT", Access::ReadOnly, "A", 100.0, Some(Range::new(0.0, 163.83))),
                ParameterDescriptor::new(40030, "TORQUE", Access::ReadOnly, "Nm", 100.0, Some(Range::new(-325.0, 325.0))),
            ])
            .unwrap(),
        )
    }

    pub fn database_config(dir: &tempfile::TempDir) -> config::Database {
        config::Database {
            enabled: true,
            path: dir.path().join("data").join("inverter.db").to_string_lossy().to_string(),
            row_id: 0,
            history: false,
        }
    }

    pub fn snapshot(speed: Option<f64>) -> Snapshot {
        Snapshot::new(
            Utc::now(),
            vec![
                ("FREQ_REF", Some(50.0)),
                ("RUN_ENABLE", Some(1.0)),
                ("SPEED", speed),
                ("CURRENT", Some(1.25)),
                ("TORQUE", Some(0.5)),
            ],
        )
    }
}
