use thiserror::Error;

/// Problems with the parameter table itself. These are programmer errors:
/// they surface at construction time or from a lookup with a bad key, never
/// from a flaky device.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("duplicate register address {0}")]
    DuplicateAddress(u16),
    #[error("duplicate parameter name {0}")]
    DuplicateName(String),
    #[error("parameter {0} has a scale of zero")]
    ZeroScale(String),
    #[error("parameter {name} has min {min} > max {max}")]
    InvalidRange { name: String, min: f64, max: f64 },
    #[error("unknown register address {0}")]
    UnknownAddress(u16),
    #[error("unknown parameter {0}")]
    UnknownParameter(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("length mismatch: {expected} descriptors/addresses but {actual} raw values")]
    LengthMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors reported by a [`crate::transport::RegisterTransport`].
///
/// Only [`TransportError::NotConnected`] is fatal; every other variant is a
/// per-register failure that the poller turns into a missing value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,
    #[error("device returned modbus exception {0}")]
    Exception(String),
    #[error("read timed out")]
    Timeout,
    #[error("i/o error: {0}")]
    Io(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("address {0} is outside the holding register range")]
    InvalidAddress(u16),
    #[error("device returned {got} registers, expected {expected}")]
    ShortRead { expected: u16, got: usize },
}

impl TransportError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::NotConnected)
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("fatal transport error: {0}")]
    Fatal(TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Creates an anyhow error prefixed with the current file and line number
#[macro_export]
macro_rules! file_error {
    ($($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}",
            std::path::Path::new(file!())
                .file_name()
                .map(|f| f.to_string_lossy())
                .unwrap_or_default(),
            line!(),
            format!($($arg)*)
        )
    };
}
