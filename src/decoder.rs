use crate::prelude::*;
use crate::register::{ParameterDescriptor, Registry};

/// raw / scale. A failed read stays failed: `None` is never turned into a
/// zero. Range limits are not applied here.
pub fn decode(descriptor: &ParameterDescriptor, raw_value: Option<u16>) -> Option<f64> {
    raw_value.map(|raw| f64::from(raw) / descriptor.scale)
}

pub fn decode_many(
    descriptors: &[&ParameterDescriptor],
    raw_values: &[Option<u16>],
) -> Result<Vec<Option<f64>>, DecodeError> {
    if descriptors.len() != raw_values.len() {
        return Err(DecodeError::LengthMismatch {
            expected: descriptors.len(),
            actual: raw_values.len(),
        });
    }

    Ok(descriptors
        .iter()
        .zip(raw_values)
        .map(|(d, raw)| decode(d, *raw))
        .collect())
}

/// Zips addresses with raw values and keys the decoded result by parameter
/// name. Key order follows `addresses`.
pub fn to_named_snapshot(
    registry: &Registry,
    addresses: &[u16],
    raw_values: &[Option<u16>],
    taken_at: DateTime<Utc>,
) -> Result<Snapshot, DecodeError> {
    let descriptors = addresses
        .iter()
        .map(|&a| registry.lookup_by_address(a))
        .collect::<Result<Vec<_>, _>>()?;

    let values = decode_many(&descriptors, raw_values)?;

    Ok(Snapshot::new(
        taken_at,
        descriptors.iter().map(|d| d.name).zip(values).collect(),
    ))
}

/// Same as [`to_named_snapshot`] but straight from poller output.
pub fn samples_to_snapshot(
    registry: &Registry,
    samples: &[RawSample],
    taken_at: DateTime<Utc>,
) -> Result<Snapshot, DecodeError> {
    let addresses: Vec<u16> = samples.iter().map(|s| s.address).collect();
    let raw_values: Vec<Option<u16>> = samples.iter().map(|s| s.raw_value).collect();
    to_named_snapshot(registry, &addresses, &raw_values, taken_at)
}
