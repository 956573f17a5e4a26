use clap::{Parser, Subcommand};

/// V20 Bridge - polls a Sinamics V20 inverter over Modbus RTU
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Force debug logging
    #[clap(short = 'v', long = "verbose")]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the inverter on a fixed interval and store every snapshot
    Collect {
        /// Seconds between cycle starts
        #[clap(long)]
        interval: Option<f64>,

        /// Serial port, e.g. /dev/ttyUSB0
        #[clap(long)]
        port: Option<String>,

        /// SQLite database file
        #[clap(long = "db-path")]
        db_path: Option<String>,

        /// Stop after this many cycles
        #[clap(long)]
        cycles: Option<u64>,
    },

    /// Watch the stored values and report on motor speed
    Maintain {
        /// Seconds between checks
        #[clap(long)]
        interval: Option<f64>,

        /// SQLite database file
        #[clap(long = "db-path")]
        db_path: Option<String>,

        /// Linear model JSON file
        #[clap(long = "model-path")]
        model_path: Option<String>,

        /// Stop after this many checks
        #[clap(long)]
        cycles: Option<u64>,
    },

    /// Poll every parameter once and print the result as JSON
    Read,

    /// Print the parameter table
    Registry,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}
