use crate::prelude::*;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `MODCON_MODBUS_PORT`.
pub const ENV_PREFIX: &str = "MODCON_";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub modbus: Modbus,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub collector: Collector,
    #[serde(default)]
    pub maintainer: Maintainer,
    #[serde(default)]
    pub trace: Trace,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    /// Optional path to append every snapshot to as JSON lines
    pub datalog_file: Option<String>,
}

// Modbus {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Modbus {
    #[serde(default = "Config::default_port")]
    pub port: String,
    #[serde(default = "Config::default_baudrate")]
    pub baudrate: u32,
    #[serde(default = "Config::default_parity")]
    pub parity: String,
    #[serde(default = "Config::default_stopbits")]
    pub stopbits: u8,
    #[serde(default = "Config::default_bytesize")]
    pub bytesize: u8,
    #[serde(default = "Config::default_slave_id")]
    pub slave_id: u8,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "Config::default_timeout")]
    pub timeout: Duration,
    pub connect_attempts: Option<u32>,
    pub block_reads: Option<bool>,
}

impl Default for Modbus {
    fn default() -> Self {
        Self {
            port: Config::default_port(),
            baudrate: Config::default_baudrate(),
            parity: Config::default_parity(),
            stopbits: Config::default_stopbits(),
            bytesize: Config::default_bytesize(),
            slave_id: Config::default_slave_id(),
            timeout: Config::default_timeout(),
            connect_attempts: None,
            block_reads: None,
        }
    }
}

impl Modbus {
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }

    /// First character of the configured parity, upper-cased ('N', 'E', 'O').
    pub fn parity(&self) -> char {
        self.parity
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('N')
    }

    pub fn stopbits(&self) -> u8 {
        self.stopbits
    }

    pub fn bytesize(&self) -> u8 {
        self.bytesize
    }

    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.unwrap_or(1)
    }

    pub fn block_reads(&self) -> bool {
        self.block_reads == Some(true)
    }
} // }}}

// Database {{{
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Database {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,
    #[serde(default = "Config::default_database_path")]
    pub path: String,
    #[serde(default)]
    pub row_id: i64,
    #[serde(default)]
    pub history: bool,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            enabled: Config::default_enabled(),
            path: Config::default_database_path(),
            row_id: 0,
            history: false,
        }
    }
}

impl Database {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.path)
    }

    pub fn row_id(&self) -> i64 {
        self.row_id
    }

    pub fn history(&self) -> bool {
        self.history
    }
} // }}}

// Collector {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Collector {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "Config::default_collector_interval")]
    pub interval: Duration,
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            interval: Config::default_collector_interval(),
        }
    }
}

impl Collector {
    pub fn interval(&self) -> Duration {
        self.interval
    }
} // }}}

// Maintainer {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Maintainer {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "Config::default_maintainer_interval")]
    pub interval: Duration,
    #[serde(default = "Config::default_rpm_conversion_factor")]
    pub rpm_conversion_factor: f64,
    #[serde(default = "Config::default_model_path")]
    pub model_path: String,
    #[serde(default)]
    pub check_ranges: bool,
}

impl Default for Maintainer {
    fn default() -> Self {
        Self {
            interval: Config::default_maintainer_interval(),
            rpm_conversion_factor: Config::default_rpm_conversion_factor(),
            model_path: Config::default_model_path(),
            check_ranges: false,
        }
    }
}

impl Maintainer {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn rpm_conversion_factor(&self) -> f64 {
        self.rpm_conversion_factor
    }

    pub fn model_path(&self) -> &Path {
        Path::new(&self.model_path)
    }

    pub fn check_ranges(&self) -> bool {
        self.check_ranges
    }
} // }}}

// Trace {{{
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Trace {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "Config::default_trace_parameter")]
    pub parameter: String,
    #[serde(default = "Config::default_trace_update_interval_ms")]
    pub update_interval_ms: u64,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            enabled: false,
            parameter: Config::default_trace_parameter(),
            update_interval_ms: Config::default_trace_update_interval_ms(),
        }
    }
}

impl Trace {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
} // }}}

impl Default for Config {
    fn default() -> Self {
        Self {
            modbus: Modbus::default(),
            database: Database::default(),
            collector: Collector::default(),
            maintainer: Maintainer::default(),
            trace: Trace::default(),
            loglevel: Config::default_loglevel(),
            datalog_file: None,
        }
    }
}

impl Config {
    /// Loads `file` (all defaults if it doesn't exist), applies `MODCON_*`
    /// environment overrides and validates the result.
    pub fn new(file: impl Into<PathBuf>) -> Result<Self> {
        Self::load(file.into(), std::env::vars())
    }

    pub fn load<I>(file: PathBuf, env: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut document = if file.exists() {
            info!("Reading configuration from {}", file.display());
            let content = std::fs::read_to_string(&file)
                .map_err(|err| file_error!("error reading {}: {}", file.display(), err))?;
            serde_yaml::from_str::<Value>(&content)?
        } else {
            info!("{} not found, using defaults", file.display());
            Value::Mapping(Mapping::new())
        };

        // an empty file parses as null
        if document.is_null() {
            document = Value::Mapping(Mapping::new());
        }

        apply_env_overrides(&mut document, env)?;

        let config: Self = serde_yaml::from_value(document)?;
        config.log_summary();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("  Modbus:");
        info!("    Port: {}", self.modbus.port);
        info!(
            "    Line: {} baud, {}{}{}",
            self.modbus.baudrate,
            self.modbus.bytesize,
            self.modbus.parity(),
            self.modbus.stopbits
        );
        info!("    Slave ID: {}", self.modbus.slave_id);
        info!("    Timeout: {:?}", self.modbus.timeout);
        info!("    Connect attempts: {}", self.modbus.connect_attempts());
        info!("    Block reads: {}", self.modbus.block_reads());
        info!(
            "  Database: {}",
            if self.database.enabled { "enabled" } else { "disabled" }
        );
        if self.database.enabled {
            info!("    Path: {}", self.database.path);
            info!("    Row ID: {}", self.database.row_id);
            info!("    History: {}", self.database.history);
        }
        info!("  Collector interval: {:?}", self.collector.interval);
        info!("  Maintainer interval: {:?}", self.maintainer.interval);
        info!(
            "  Trace: {}",
            if self.trace.enabled { "enabled" } else { "disabled" }
        );
        if let Some(file) = &self.datalog_file {
            info!("  Datalog file: {}", file);
        }
        info!("  Log Level: {}", self.loglevel);
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.modbus;
        if m.port.is_empty() {
            bail!("modbus.port cannot be empty");
        }
        if m.baudrate == 0 {
            bail!("modbus.baudrate must be positive");
        }
        if m.slave_id == 0 || m.slave_id > 247 {
            bail!("modbus.slave_id must be between 1 and 247");
        }
        if !matches!(m.parity(), 'N' | 'E' | 'O') {
            bail!("modbus.parity must be one of N, E, O (got {})", m.parity);
        }
        if !(1..=2).contains(&m.stopbits) {
            bail!("modbus.stopbits must be 1 or 2");
        }
        if !(5..=8).contains(&m.bytesize) {
            bail!("modbus.bytesize must be between 5 and 8");
        }
        if m.timeout.is_zero() {
            bail!("modbus.timeout must be positive");
        }
        if m.connect_attempts == Some(0) {
            bail!("modbus.connect_attempts must be at least 1");
        }

        if self.collector.interval.is_zero() {
            bail!("collector.interval must be positive");
        }
        if self.maintainer.interval.is_zero() {
            bail!("maintainer.interval must be positive");
        }
        if self.database.enabled && self.database.path.is_empty() {
            bail!("database.path cannot be empty");
        }
        if self.trace.enabled && self.trace.update_interval_ms == 0 {
            bail!("trace.update_interval_ms must be positive");
        }

        Ok(())
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    pub fn datalog_file(&self) -> Option<&str> {
        self.datalog_file.as_deref()
    }

    fn default_port() -> String {
        "/dev/ttyUSB0".to_string()
    }

    fn default_baudrate() -> u32 {
        9600
    }

    fn default_parity() -> String {
        "N".to_string()
    }

    fn default_stopbits() -> u8 {
        1
    }

    fn default_bytesize() -> u8 {
        8
    }

    fn default_slave_id() -> u8 {
        2
    }

    fn default_timeout() -> Duration {
        Duration::from_secs(3)
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_database_path() -> String {
        "data/inverter.db".to_string()
    }

    fn default_collector_interval() -> Duration {
        Duration::from_secs(1)
    }

    fn default_maintainer_interval() -> Duration {
        Duration::from_secs(2)
    }

    fn default_rpm_conversion_factor() -> f64 {
        8.10 / 242.0
    }

    fn default_model_path() -> String {
        "models/model.json".to_string()
    }

    fn default_trace_parameter() -> String {
        "SPEED".to_string()
    }

    fn default_trace_update_interval_ms() -> u64 {
        500
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

/// Applies `MODCON_<SECTION>_<KEY>=value` pairs onto the parsed document.
/// Section names are single words, so everything after the second
/// underscore is the key (`MODCON_MODBUS_SLAVE_ID` -> modbus.slave_id).
/// A value for a key whose default is a string is taken verbatim; anything
/// else is parsed as a YAML scalar so numbers and booleans keep their types.
pub fn apply_env_overrides<I>(document: &mut Value, env: I) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    let defaults = serde_yaml::to_value(Config::default())?;
    let root = document
        .as_mapping_mut()
        .ok_or_else(|| file_error!("configuration root must be a mapping"))?;

    for (name, raw) in env {
        let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let rest = rest.to_ascii_lowercase();
        let Some((section, key)) = rest.split_once('_') else {
            continue;
        };
        if key.is_empty() {
            continue;
        }

        let string_field = defaults
            .get(section)
            .and_then(|s| s.get(key))
            .is_some_and(Value::is_string);
        let value = if string_field {
            Value::String(raw)
        } else {
            serde_yaml::from_str(&raw).unwrap_or(Value::String(raw))
        };
        debug!("override {}.{} from {}", section, key, name);

        let section_value = root
            .entry(Value::String(section.to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        match section_value.as_mapping_mut() {
            Some(section_map) => {
                section_map.insert(Value::String(key.to_string()), value);
            }
            None => bail!("cannot override {}: {} is not a section", name, section),
        }
    }

    Ok(())
}
