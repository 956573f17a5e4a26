mod common;
use common::*;

use v20_bridge::decoder;
use v20_bridge::prelude::*;
use v20_bridge::sinamics;

#[test]
fn scaled_values() {
    common_setup();
    let registry = sinamics::registry().unwrap();

    let speed = registry.lookup_by_name("SPEED").unwrap();
    let freq = registry.lookup_by_name("FREQ_REF").unwrap();

    assert_eq!(decoder::decode(speed, Some(81)), Some(81.0));
    assert_eq!(decoder::decode(freq, Some(5000)), Some(50.0));
    assert_eq!(decoder::decode(freq, None), None);
}

#[test]
fn raw_values_are_unsigned() {
    let registry = Factory::registry();
    let torque = registry.lookup_by_name("TORQUE").unwrap();
    assert_eq!(decoder::decode(torque, Some(0xFFFF)), Some(655.35));
}

#[test]
fn named_snapshot_keeps_request_order() {
    let registry = Factory::registry();
    let taken_at = Utc::now();

    let snapshot = decoder::to_named_snapshot(
        &registry,
        &[40025, 40003, 40026],
        &[Some(1450), None, Some(250)],
        taken_at,
    )
    .unwrap();

    assert_eq!(snapshot.names().collect::<Vec<_>>(), vec!["SPEED", "FREQ_REF", "CURRENT"]);
    assert_eq!(snapshot.get("SPEED"), Some(Some(1450.0)));
    assert_eq!(snapshot.get("FREQ_REF"), Some(None));
    assert_eq!(snapshot.get("CURRENT"), Some(Some(2.5)));
    assert_eq!(snapshot.taken_at(), taken_at);
}

#[test]
fn length_mismatch() {
    let registry = Factory::registry();

    let err = decoder::to_named_snapshot(&registry, &[40025, 40003], &[Some(1)], Utc::now())
        .unwrap_err();
    assert_eq!(err, DecodeError::LengthMismatch { expected: 2, actual: 1 });
}

#[test]
fn unknown_address() {
    let registry = Factory::registry();

    let err = decoder::to_named_snapshot(&registry, &[40013], &[Some(1)], Utc::now()).unwrap_err();
    assert_eq!(err, DecodeError::Registry(RegistryError::UnknownAddress(40013)));
}
