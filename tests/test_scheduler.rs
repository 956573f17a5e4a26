mod common;
use common::*;

use v20_bridge::poller::Poller;
use v20_bridge::prelude::*;
use v20_bridge::scheduler::{Scheduler, SchedulerState};
use v20_bridge::snapshot_cache::SnapshotCache;

use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(10);

#[tokio::test]
async fn runs_bounded_cycles() {
    common_setup();
    let (_tx, rx) = broadcast::channel(1);
    let transport = MockTransport::new();
    let cache = SnapshotCache::new();
    let reader = cache.reader();

    let mut scheduler = Scheduler::new(Poller::new(Factory::registry(), transport.clone()), INTERVAL, rx)
        .with_sink(Box::new(cache))
        .with_max_cycles(Some(3));
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.failed_reads, 0);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(transport.read_count(), 15);
    assert_eq!(transport.close_count(), 1);
    assert_eq!(reader.get_latest_value("SPEED"), Some(25.0));
}

#[tokio::test]
async fn busy_register_does_not_stop_the_loop() {
    common_setup();
    let (_tx, rx) = broadcast::channel(1);
    let transport = MockTransport::new()
        .reply(40025, Reply::Fail(TransportError::Exception("ServerDeviceBusy".to_string())));
    let cache = SnapshotCache::new();
    let reader = cache.reader();

    let mut scheduler = Scheduler::new(Poller::new(Factory::registry(), transport.clone()), INTERVAL, rx)
        .with_sink(Box::new(cache))
        .with_max_cycles(Some(2));

    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.failed_reads, 2);
    assert_eq!(reader.latest().unwrap().get("SPEED"), Some(None));
    assert_eq!(reader.get_latest_value("TORQUE"), Some(0.3));
}

#[tokio::test]
async fn lost_connection_stops_and_closes_once() {
    common_setup();
    let (_tx, rx) = broadcast::channel(1);
    let transport = MockTransport {
        disconnect_after: Some(7),
        ..MockTransport::new()
    };

    let mut scheduler = Scheduler::new(Poller::new(Factory::registry(), transport.clone()), INTERVAL, rx)
        .with_max_cycles(Some(10));

    assert!(scheduler.run().await.is_err());
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(scheduler.stats().cycles, 1);
    assert_eq!(transport.close_count(), 1);
    // stopped on the first NotConnected, nothing read after it
    assert_eq!(transport.read_count(), 8);
}

#[tokio::test]
async fn connect_failure_exits() {
    common_setup();
    let (_tx, rx) = broadcast::channel(1);
    let transport = MockTransport {
        connect_ok: false,
        ..MockTransport::new()
    };

    let mut scheduler = Scheduler::new(Poller::new(Factory::registry(), transport.clone()), INTERVAL, rx)
        .with_connect_attempts(1);

    assert!(scheduler.run().await.is_err());
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(transport.read_count(), 0);
    assert_eq!(transport.connects.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_during_sleep() {
    common_setup();
    let (tx, rx) = broadcast::channel(1);
    let transport = MockTransport::new();

    let mut scheduler = Scheduler::new(
        Poller::new(Factory::registry(), transport.clone()),
        Duration::from_secs(3600),
        rx,
    );

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
    });

    let stats = tokio::time::timeout(Duration::from_secs(5), scheduler.run())
        .await
        .expect("scheduler ignored shutdown")
        .unwrap();
    stopper.await.unwrap();

    assert_eq!(stats.cycles, 1);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn shutdown_before_first_cycle() {
    common_setup();
    let (tx, rx) = broadcast::channel(1);
    tx.send(()).unwrap();
    let transport = MockTransport::new();

    let mut scheduler = Scheduler::new(Poller::new(Factory::registry(), transport.clone()), INTERVAL, rx);
    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.cycles, 0);
    assert_eq!(transport.read_count(), 0);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn sink_errors_do_not_stop_the_loop() {
    common_setup();
    let (_tx, rx) = broadcast::channel(1);
    let failing = FailingSink::default();
    let cache = SnapshotCache::new();
    let reader = cache.reader();

    let mut scheduler = Scheduler::new(Poller::new(Factory::registry(), MockTransport::new()), INTERVAL, rx)
        .with_sink(Box::new(failing.clone()))
        .with_sink(Box::new(cache))
        .with_max_cycles(Some(3));

    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.sink_errors, 3);
    assert_eq!(failing.attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    // later sinks still get every snapshot
    assert_eq!(reader.get_latest_value("SPEED"), Some(25.0));
}

#[tokio::test]
async fn closed_shutdown_channel_keeps_running() {
    common_setup();
    let (tx, rx) = broadcast::channel::<()>(1);
    drop(tx);
    let transport = MockTransport::new();

    let mut scheduler = Scheduler::new(Poller::new(Factory::registry(), transport.clone()), INTERVAL, rx)
        .with_max_cycles(Some(4));

    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.cycles, 4);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cycle_starts_stay_one_interval_apart() {
    common_setup();
    let (_tx, rx) = broadcast::channel(1);
    // 5 reads of 15ms each: a 75ms cycle inside a 100ms interval
    let transport = MockTransport {
        read_delay: Some(Duration::from_millis(15)),
        ..MockTransport::new()
    };

    let mut scheduler = Scheduler::new(
        Poller::new(Factory::registry(), transport.clone()),
        Duration::from_millis(100),
        rx,
    )
    .with_max_cycles(Some(3));
    scheduler.run().await.unwrap();

    let times = transport.read_times.lock().unwrap().clone();
    assert_eq!(times.len(), 15);
    assert_eq!(times[5] - times[0], Duration::from_millis(100));
    assert_eq!(times[10] - times[5], Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn overrunning_cycle_starts_the_next_at_once() {
    common_setup();
    let (_tx, rx) = broadcast::channel(1);
    // 5 reads of 30ms each: a 150ms cycle overruns the 100ms interval
    let transport = MockTransport {
        read_delay: Some(Duration::from_millis(30)),
        ..MockTransport::new()
    };

    let mut scheduler = Scheduler::new(
        Poller::new(Factory::registry(), transport.clone()),
        Duration::from_millis(100),
        rx,
    )
    .with_max_cycles(Some(2));
    scheduler.run().await.unwrap();

    let times = transport.read_times.lock().unwrap().clone();
    assert_eq!(times[5] - times[0], Duration::from_millis(150));
}
