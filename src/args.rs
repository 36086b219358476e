//! A1 — command-line arguments for the demo binary.
//!
//! Mirrors the teacher's own `clap`-derived `Args`
//! (`examples/ozontech-pg_doorman/src/app/args.rs`): a config file path plus
//! a log level/format pair, with environment-variable fallbacks.

use clap::{Parser, ValueEnum};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Demo client for the async connection pool", long_about = None)]
pub struct Args {
    /// Path to a TOML config file (see `config::Config`).
    #[arg(default_value_t = String::from("pool.toml"), env)]
    pub config_file: String,

    #[arg(short, long, value_enum, default_value_t = LogLevel::Info, env)]
    pub log_level: LogLevel,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Info,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Info => LevelFilter::Info,
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
