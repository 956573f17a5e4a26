pub use anyhow::{anyhow, bail, Result};
pub use chrono::{DateTime, Utc};
pub use log::{debug, error, info, trace, warn};
pub use std::sync::Arc;
pub use tokio::sync::broadcast;

pub use crate::config::{self, Config};
pub use crate::error::{DecodeError, PollError, RegistryError, TransportError};
pub use crate::file_error;
pub use crate::snapshot::{RawSample, Snapshot};
