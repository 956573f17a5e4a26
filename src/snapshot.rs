use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeStruct, Serializer};

/// Result of reading one register. `raw_value` is `None` when that read
/// failed; the rest of the poll is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub address: u16,
    pub raw_value: Option<u16>,
}

impl RawSample {
    pub fn ok(address: u16, raw_value: u16) -> Self {
        Self {
            address,
            raw_value: Some(raw_value),
        }
    }

    pub fn failed(address: u16) -> Self {
        Self {
            address,
            raw_value: None,
        }
    }
}

/// One decoded reading of a set of parameters, keyed by name in the order
/// the addresses were requested. Column alignment downstream depends on
/// that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    values: Vec<(&'static str, Option<f64>)>,
}

impl Snapshot {
    pub fn new(taken_at: DateTime<Utc>, values: Vec<(&'static str, Option<f64>)>) -> Self {
        Self { taken_at, values }
    }

    /// Wall-clock time at which collection started.
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// `None` if the name isn't in the snapshot, `Some(None)` if it is but
    /// the read failed.
    pub fn get(&self, name: &str) -> Option<Option<f64>> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).flatten()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(n, _)| *n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<f64>)> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.values.iter().filter(|(_, v)| v.is_none()).count()
    }
}

struct OrderedValues<'a>(&'a [(&'static str, Option<f64>)]);

impl Serialize for OrderedValues<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for Snapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Snapshot", 2)?;
        s.serialize_field("taken_at", &self.taken_at)?;
        s.serialize_field("values", &OrderedValues(&self.values))?;
        s.end()
    }
}
