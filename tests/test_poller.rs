mod common;
use common::*;

use v20_bridge::poller::{Poller, ReadStrategy};
use v20_bridge::prelude::*;

#[tokio::test]
async fn one_read_per_register() {
    common_setup();
    let transport = MockTransport::new().reply(40025, Reply::Value(1450));
    let mut poller = Poller::new(Factory::registry(), transport.clone());

    let snapshot = poller.poll_all().await.unwrap();

    assert_eq!(snapshot.len(), 5);
    assert_eq!(snapshot.value("SPEED"), Some(1450.0));
    assert_eq!(snapshot.value("FREQ_REF"), Some(0.03));
    assert_eq!(transport.read_count(), 5);
    assert!(transport.reads.lock().unwrap().iter().all(|&(_, count)| count == 1));
}

#[tokio::test]
async fn busy_register_is_none_and_poll_continues() {
    common_setup();
    let transport = MockTransport::new()
        .reply(40003, Reply::Fail(TransportError::Exception("ServerDeviceBusy".to_string())))
        .reply(40026, Reply::Fail(TransportError::Timeout));
    let mut poller = Poller::new(Factory::registry(), transport);

    let snapshot = poller.poll_all().await.unwrap();

    assert_eq!(snapshot.len(), 5);
    assert_eq!(snapshot.get("FREQ_REF"), Some(None));
    assert_eq!(snapshot.get("CURRENT"), Some(None));
    assert_eq!(snapshot.value("SPEED"), Some(25.0));
    assert_eq!(snapshot.failed_count(), 2);
}

#[tokio::test]
async fn every_read_failing_keeps_length() {
    common_setup();
    let mut transport = MockTransport::new();
    for address in Factory::registry().all_addresses() {
        transport = transport.reply(address, Reply::Fail(TransportError::Io("bad crc".to_string())));
    }
    let mut poller = Poller::new(Factory::registry(), transport);

    let samples = poller.read_many(&[40025, 40003, 40030]).await.unwrap();

    assert_eq!(
        samples,
        vec![
            RawSample::failed(40025),
            RawSample::failed(40003),
            RawSample::failed(40030)
        ]
    );
}

#[tokio::test]
async fn not_connected_is_fatal() {
    common_setup();
    let transport = MockTransport::new().reply(40025, Reply::Fail(TransportError::NotConnected));
    let mut poller = Poller::new(Factory::registry(), transport);

    match poller.poll_all().await {
        Err(PollError::Fatal(TransportError::NotConnected)) => {}
        other => panic!("expected fatal error, got {:?}", other.map(|s| s.len())),
    }
}

#[tokio::test]
async fn contiguous_reads_group_runs() {
    common_setup();
    let transport = MockTransport::new();
    let mut poller =
        Poller::new(Factory::registry(), transport.clone()).with_strategy(ReadStrategy::Contiguous);

    let snapshot = poller.poll_all().await.unwrap();

    assert_eq!(
        *transport.reads.lock().unwrap(),
        vec![(40003, 2), (40025, 2), (40030, 1)]
    );
    assert_eq!(snapshot.value("RUN_ENABLE"), Some(4.0));
    assert_eq!(snapshot.value("CURRENT"), Some(0.26));
}

#[tokio::test]
async fn contiguous_falls_back_to_single_reads() {
    common_setup();
    let transport = MockTransport {
        fail_blocks: true,
        ..MockTransport::new()
    }
    .reply(40026, Reply::Fail(TransportError::Exception("IllegalDataAddress".to_string())));
    let mut poller =
        Poller::new(Factory::registry(), transport.clone()).with_strategy(ReadStrategy::Contiguous);

    let snapshot = poller.poll_all().await.unwrap();

    assert_eq!(snapshot.names().collect::<Vec<_>>(), vec!["FREQ_REF", "RUN_ENABLE", "SPEED", "CURRENT", "TORQUE"]);
    assert_eq!(snapshot.failed_count(), 1);
    assert_eq!(snapshot.get("CURRENT"), Some(None));
    assert_eq!(snapshot.value("SPEED"), Some(25.0));
    // 2 failed blocks + 4 singles + 1 single-register run
    assert_eq!(transport.read_count(), 7);
}

#[tokio::test]
async fn poll_by_name() {
    common_setup();
    let mut poller = Poller::new(Factory::registry(), MockTransport::new());

    let snapshot = poller.poll_names(&["TORQUE", "SPEED"]).await.unwrap();
    assert_eq!(snapshot.names().collect::<Vec<_>>(), vec!["TORQUE", "SPEED"]);

    assert!(matches!(
        poller.poll_names(&["NOPE"]).await,
        Err(PollError::Decode(DecodeError::Registry(RegistryError::UnknownParameter(_))))
    ));
}
