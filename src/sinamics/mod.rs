pub mod inverter;
pub mod parameters;

use crate::register::Registry;

/// First holding register in the vendor's 4xxxx numbering.
pub const ADDRESS_MIN: u16 = 40001;
/// Last holding register the V20 documents.
pub const ADDRESS_MAX: u16 = 40522;

/// Builds the V20 registry. The table is static, so a failure here is a bug
/// in [`parameters::PARAMETERS`], not a runtime condition.
pub fn registry() -> Result<Registry, crate::error::RegistryError> {
    Registry::new(parameters::PARAMETERS.to_vec())
}
