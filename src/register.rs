use crate::prelude::*;

use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Access {
    #[serde(rename = "R")]
    ReadOnly,
    #[serde(rename = "RW")]
    ReadWrite,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::ReadOnly => write!(f, "R"),
            Access::ReadWrite => write!(f, "RW"),
        }
    }
}

/// Inclusive (min, max) bounds in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One holding register: where it lives and how to turn its raw value into
/// a physical quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDescriptor {
    pub address: u16,
    pub name: &'static str,
    pub access: Access,
    pub unit: &'static str,
    /// physical = raw / scale
    pub scale: f64,
    pub valid_range: Option<Range>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeViolation {
    pub name: &'static str,
    pub value: f64,
    pub range: Range,
}

impl std::fmt::Display for RangeViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = {} outside [{}, {}]",
            self.name, self.value, self.range.min, self.range.max
        )
    }
}

impl ParameterDescriptor {
    pub const fn new(
        address: u16,
        name: &'static str,
        access: Access,
        unit: &'static str,
        scale: f64,
        valid_range: Option<Range>,
    ) -> Self {
        Self {
            address,
            name,
            access,
            unit,
            scale,
            valid_range,
        }
    }

    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    /// Opt-in range check. Decoding never calls this; out-of-range readings
    /// are passed through untouched.
    pub fn check_range(&self, value: f64) -> Option<RangeViolation> {
        match self.valid_range {
            Some(range) if !range.contains(value) => Some(RangeViolation {
                name: self.name,
                value,
                range,
            }),
            _ => None,
        }
    }
}

/// Ordered, immutable parameter table with O(1) lookup by address and by
/// name. Built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct Registry {
    descriptors: Vec<ParameterDescriptor>,
    by_address: HashMap<u16, usize>,
    by_name: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn new(descriptors: Vec<ParameterDescriptor>) -> Result<Self, RegistryError> {
        let mut by_address = HashMap::with_capacity(descriptors.len());
        let mut by_name = HashMap::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.iter().enumerate() {
            if descriptor.scale == 0.0 || !descriptor.scale.is_finite() {
                return Err(RegistryError::ZeroScale(descriptor.name.to_string()));
            }
            if let Some(range) = descriptor.valid_range {
                if range.min > range.max {
                    return Err(RegistryError::InvalidRange {
                        name: descriptor.name.to_string(),
                        min: range.min,
                        max: range.max,
                    });
                }
            }
            if by_address.insert(descriptor.address, index).is_some() {
                return Err(RegistryError::DuplicateAddress(descriptor.address));
            }
            if by_name.insert(descriptor.name, index).is_some() {
                return Err(RegistryError::DuplicateName(descriptor.name.to_string()));
            }
        }

        Ok(Self {
            descriptors,
            by_address,
            by_name,
        })
    }

    pub fn lookup_by_address(&self, address: u16) -> Result<&ParameterDescriptor, RegistryError> {
        self.by_address
            .get(&address)
            .map(|&i| &self.descriptors[i])
            .ok_or(RegistryError::UnknownAddress(address))
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<&ParameterDescriptor, RegistryError> {
        self.by_name
            .get(name)
            .map(|&i| &self.descriptors[i])
            .ok_or_else(|| RegistryError::UnknownParameter(name.to_string()))
    }

    pub fn address_of(&self, name: &str) -> Result<u16, RegistryError> {
        self.lookup_by_name(name).map(|d| d.address)
    }

    /// Every address in construction order; "read everything".
    pub fn all_addresses(&self) -> Vec<u16> {
        self.descriptors.iter().map(|d| d.address).collect()
    }

    pub fn descriptors(&self) -> &[ParameterDescriptor] {
        &self.descriptors
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Explicit validation step over a decoded snapshot. Names the snapshot
    /// carries that the registry doesn't know are ignored, as are missing
    /// values.
    pub fn out_of_range(&self, snapshot: &Snapshot) -> Vec<RangeViolation> {
        snapshot
            .iter()
            .filter_map(|(name, value)| {
                let value = value?;
                self.lookup_by_name(name).ok()?.check_range(value)
            })
            .collect()
    }
}
