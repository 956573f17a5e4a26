use crate::prelude::*;
use crate::poller::Poller;
use crate::sink::SnapshotSink;
use crate::transport::{self, RegisterTransport};

use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::Instant;

const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Totals over the life of one [`Scheduler::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub failed_reads: u64,
    pub sink_errors: u64,
}

/// Time left to sleep after a cycle that took `elapsed`, so cycle starts
/// stay `interval` apart. An overrun means no sleep, not a negative one.
pub fn sleep_time(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Resolves once shutdown is requested. A closed channel means nobody is
/// left to ask for a stop: the receiver is dropped and this never resolves.
pub async fn wait_for_shutdown(shutdown_rx: &mut Option<broadcast::Receiver<()>>) {
    let res = match shutdown_rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    };

    if let Err(broadcast::error::RecvError::Closed) = res {
        *shutdown_rx = None;
        std::future::pending::<()>().await;
    }
}

/// Polls the whole registry every `interval` and hands each snapshot to
/// the sinks, until shutdown, `max_cycles`, or a lost connection.
pub struct Scheduler<T: RegisterTransport> {
    poller: Poller<T>,
    sinks: Vec<Box<dyn SnapshotSink>>,
    interval: Duration,
    max_cycles: Option<u64>,
    connect_attempts: u32,
    shutdown_rx: Option<broadcast::Receiver<()>>,
    state: SchedulerState,
    stats: CycleStats,
}

impl<T: RegisterTransport> Scheduler<T> {
    pub fn new(poller: Poller<T>, interval: Duration, shutdown_rx: broadcast::Receiver<()>) -> Self {
        Self {
            poller,
            sinks: Vec::new(),
            interval,
            max_cycles: None,
            connect_attempts: 1,
            shutdown_rx: Some(shutdown_rx),
            state: SchedulerState::Idle,
            stats: CycleStats::default(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn into_poller(self) -> Poller<T> {
        self.poller
    }

    /// Connects, then loops until cancelled. Cancellation is only noticed
    /// between cycles or while sleeping; a cycle in progress always
    /// finishes. The transport is closed exactly once on every exit path.
    pub async fn run(&mut self) -> Result<CycleStats> {
        info!(
            "collector starting: {} parameters every {:?}",
            self.poller.registry().len(),
            self.interval
        );

        if let Err(e) = transport::connect_with_retry(
            self.poller.transport_mut(),
            self.connect_attempts,
            CONNECT_BACKOFF,
        )
        .await
        {
            error!("unable to connect to inverter: {}", e);
            self.state = SchedulerState::Stopped;
            bail!("unable to connect to inverter: {}", e);
        }

        info!("connected to inverter");
        self.state = SchedulerState::Running;

        loop {
            if self.cancelled() {
                info!("shutdown requested");
                break;
            }

            let started = Instant::now();
            if let Err(e) = self.cycle().await {
                self.poller.close().await;
                self.state = SchedulerState::Stopped;
                self.log_summary();
                return Err(e);
            }

            if let Some(max) = self.max_cycles {
                if self.stats.cycles >= max {
                    info!("reached {} cycles", max);
                    break;
                }
            }

            let pause = sleep_time(self.interval, started.elapsed());
            if pause.is_zero() {
                debug!("cycle overran interval {:?}", self.interval);
            }
            if self.sleep_or_shutdown(pause).await {
                info!("shutdown requested");
                break;
            }
        }

        self.poller.close().await;
        self.state = SchedulerState::Stopped;
        self.log_summary();
        Ok(self.stats)
    }

    async fn cycle(&mut self) -> Result<()> {
        let started = Instant::now();

        let snapshot = match self.poller.poll_all().await {
            Ok(snapshot) => snapshot,
            Err(PollError::Fatal(e)) => {
                error!("lost connection to inverter: {}", e);
                bail!("lost connection to inverter: {}", e);
            }
            Err(PollError::Decode(e)) => {
                error!("decode failed: {}", e);
                return Err(e.into());
            }
        };

        self.stats.cycles += 1;
        let failed = snapshot.failed_count();
        self.stats.failed_reads += failed as u64;

        for sink in &self.sinks {
            if let Err(e) = sink.write_snapshot(&snapshot).await {
                warn!("{} sink failed: {}", sink.name(), e);
                self.stats.sink_errors += 1;
            }
        }

        info!(
            "cycle {}: {} values, {} failed, SPEED={} ({:?})",
            self.stats.cycles,
            snapshot.len(),
            failed,
            snapshot
                .value("SPEED")
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            started.elapsed()
        );

        Ok(())
    }

    fn cancelled(&mut self) -> bool {
        let Some(rx) = self.shutdown_rx.as_mut() else {
            return false;
        };
        match rx.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => true,
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Closed) => {
                // nobody left to ask for a stop
                self.shutdown_rx = None;
                false
            }
        }
    }

    /// True if shutdown arrived before `pause` elapsed.
    async fn sleep_or_shutdown(&mut self, pause: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(pause) => false,
            _ = wait_for_shutdown(&mut self.shutdown_rx) => true,
        }
    }

    fn log_summary(&self) {
        info!(
            "collector stopped after {} cycles ({} failed reads, {} sink errors)",
            self.stats.cycles, self.stats.failed_reads, self.stats.sink_errors
        );
    }
}
