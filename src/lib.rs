pub mod config;
pub mod database;
pub mod datalog_writer;
pub mod decoder;
pub mod error;
pub mod maintainer;
pub mod options;
pub mod poller;
pub mod prelude;
pub mod register;
pub mod scheduler;
pub mod sinamics;
pub mod sink;
pub mod snapshot;
pub mod snapshot_cache;
pub mod transport;

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;

use crate::database::Database;
use crate::datalog_writer::DatalogWriter;
use crate::maintainer::Maintainer;
use crate::options::{Command, Options};
use crate::poller::{Poller, ReadStrategy};
use crate::register::Registry;
use crate::scheduler::Scheduler;
use crate::sinamics::inverter::ModbusRtu;
use crate::snapshot_cache::{CacheReader, SnapshotCache};

use log::LevelFilter;
use std::io::Write;
use std::time::Duration;

const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Installs the logger. Everything is let through to env_logger (RUST_LOG
/// still applies on top) and the global max level does the filtering, so
/// the level can be changed once the config has been read.
pub fn setup_logging(level: LevelFilter) {
    let result = env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .parse_env(env_logger::Env::default())
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();

    if let Err(e) = result {
        warn!("logger already initialised: {}", e);
    }
    log::set_max_level(level);
}

/// "info", "DEBUG", "warning"... Unknown names fall back to info.
pub fn parse_loglevel(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "warning" => LevelFilter::Warn,
        "critical" | "fatal" => LevelFilter::Error,
        other => other.parse().unwrap_or_else(|_| {
            warn!("unknown loglevel {}, using info", level);
            LevelFilter::Info
        }),
    }
}

/// Folds command line flags into the loaded config. Flags win over the file
/// and the environment.
pub fn apply_options(config: &mut Config, command: &Command) -> Result<()> {
    match command {
        Command::Collect {
            interval,
            port,
            db_path,
            ..
        } => {
            if let Some(interval) = interval {
                config.collector.interval = seconds(*interval)?;
            }
            if let Some(port) = port {
                config.modbus.port = port.clone();
            }
            if let Some(path) = db_path {
                config.database.path = path.clone();
            }
        }
        Command::Maintain {
            interval,
            db_path,
            model_path,
            ..
        } => {
            if let Some(interval) = interval {
                config.maintainer.interval = seconds(*interval)?;
            }
            if let Some(path) = db_path {
                config.database.path = path.clone();
            }
            if let Some(path) = model_path {
                config.maintainer.model_path = path.clone();
            }
        }
        Command::Read | Command::Registry => {}
    }

    config.validate()
}

fn seconds(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|e| anyhow!("invalid interval {}: {}", value, e))
}

fn read_strategy(config: &Config) -> ReadStrategy {
    if config.modbus.block_reads() {
        ReadStrategy::Contiguous
    } else {
        ReadStrategy::PerRegister
    }
}

/// Main application entry point
pub async fn app(shutdown_rx: broadcast::Receiver<()>, options: Options) -> Result<()> {
    let initial = if options.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    setup_logging(initial);

    info!(
        "v20-bridge {} starting with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );

    let mut config = Config::new(&options.config_file)?;
    apply_options(&mut config, &options.command)?;
    if !options.verbose {
        log::set_max_level(parse_loglevel(config.loglevel()));
    }

    let registry = Arc::new(sinamics::registry()?);
    debug!("registry holds {} parameters", registry.len());

    match options.command {
        Command::Collect { cycles, .. } => collect(&config, registry, cycles, shutdown_rx).await,
        Command::Maintain { cycles, .. } => maintain(&config, registry, cycles, shutdown_rx).await,
        Command::Read => read(&config, registry).await,
        Command::Registry => {
            print_registry(&registry);
            Ok(())
        }
    }
}

async fn collect(
    config: &Config,
    registry: Arc<Registry>,
    cycles: Option<u64>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    info!("Initializing components...");

    if config.trace.enabled() {
        registry.lookup_by_name(config.trace.parameter())?;
    }

    let database = if config.database.enabled() {
        info!("  Opening database...");
        Some(Database::open(config.database.clone(), registry.clone()).await?)
    } else {
        None
    };

    let poller = Poller::new(registry.clone(), ModbusRtu::new(config.modbus.clone()))
        .with_strategy(read_strategy(config));
    let mut scheduler = Scheduler::new(poller, config.collector.interval(), shutdown_rx.resubscribe())
        .with_max_cycles(cycles)
        .with_connect_attempts(config.modbus.connect_attempts());

    if let Some(database) = &database {
        scheduler = scheduler.with_sink(Box::new(database.clone()));
    }
    if let Some(file) = config.datalog_file() {
        info!("  Creating datalog writer...");
        scheduler = scheduler.with_sink(Box::new(DatalogWriter::new(file)?));
    }

    let cache = SnapshotCache::new();
    scheduler = scheduler.with_sink(Box::new(cache.clone()));

    let trace_handle = if config.trace.enabled() {
        info!("  Starting trace of {}...", config.trace.parameter());
        Some(tokio::spawn(trace(
            cache.reader(),
            config.trace.clone(),
            shutdown_rx.resubscribe(),
        )))
    } else {
        None
    };

    let result = scheduler.run().await;

    if let Some(handle) = trace_handle {
        handle.abort();
        let _ = handle.await;
    }
    if let Some(database) = database {
        database.close().await;
    }

    result.map(|stats| debug!("final stats: {:?}", stats))
}

/// Logs the traced parameter from the cache at a fixed rate, independent of
/// the poll interval.
async fn trace(reader: CacheReader, settings: config::Trace, shutdown_rx: broadcast::Receiver<()>) {
    let mut shutdown_rx = Some(shutdown_rx);
    let mut ticker = tokio::time::interval(settings.update_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => match reader.latest() {
                Some(snapshot) => info!(
                    "trace {} = {} at {}",
                    settings.parameter(),
                    snapshot
                        .value(settings.parameter())
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    snapshot.taken_at().format("%H:%M:%S%.3f")
                ),
                None => debug!("trace waiting for first snapshot"),
            },
            _ = scheduler::wait_for_shutdown(&mut shutdown_rx) => break,
        }
    }
}

async fn maintain(
    config: &Config,
    registry: Arc<Registry>,
    cycles: Option<u64>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let database = Database::open(config.database.clone(), registry.clone()).await?;

    let mut maintainer = Maintainer::new(
        config.maintainer.clone(),
        registry,
        database.clone(),
        shutdown_rx,
    )
    .with_max_cycles(cycles);

    let result = maintainer.run().await;
    database.close().await;
    result.map(|checks| debug!("{} maintenance checks", checks))
}

async fn read(config: &Config, registry: Arc<Registry>) -> Result<()> {
    let mut poller = Poller::new(registry, ModbusRtu::new(config.modbus.clone()))
        .with_strategy(read_strategy(config));

    transport::connect_with_retry(
        poller.transport_mut(),
        config.modbus.connect_attempts(),
        CONNECT_BACKOFF,
    )
    .await
    .map_err(|e| anyhow!("unable to connect to inverter: {}", e))?;

    let result = poller.poll_all().await;
    poller.close().await;

    let snapshot = result?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn print_registry(registry: &Registry) {
    println!(
        "{:<7} {:<16} {:<3} {:<5} {:>6}  RANGE",
        "ADDRESS", "NAME", "R/W", "UNIT", "SCALE"
    );
    for d in registry.iter() {
        let range = d
            .valid_range
            .map(|r| format!("{} .. {}", r.min, r.max))
            .unwrap_or_default();
        println!(
            "{:<7} {:<16} {:<3} {:<5} {:>6}  {}",
            d.address,
            d.name,
            d.access.to_string(),
            d.unit,
            d.scale,
            range
        );
    }
}
