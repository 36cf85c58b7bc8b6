//! Command-line front end for the facade.
//!
//! Loads a facade configuration, applies overrides, and runs one operation
//! through the policy-gated facade.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ferrite_facade::{CommandFacade, FacadeConfig, LogFormat, SetOptions};
use tracing::{error, info};

/// Policy-gated master/replica client for Redis-compatible stores.
#[derive(Parser, Debug)]
#[command(name = "ferrite-facade")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Master host (overrides config file)
    #[arg(
        short = 'H',
        long = "host",
        value_name = "HOST",
        env = "FACADE_HOST",
        global = true
    )]
    host: Option<String>,

    /// Master port (overrides config file)
    #[arg(
        short = 'p',
        long = "port",
        value_name = "PORT",
        env = "FACADE_PORT",
        global = true
    )]
    port: Option<u16>,

    /// Log level: trace, debug, info, warn, error (overrides config file)
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        env = "FACADE_LOG_LEVEL",
        global = true
    )]
    loglevel: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that the store answers by reading its clock
    Ping,

    /// Print the string at a key (empty when missing)
    Get {
        /// Key to read
        key: String,
    },

    /// Store a string
    Set {
        /// Key to write
        key: String,
        /// Value to store
        value: String,
        /// Expire after this many seconds
        #[arg(long = "ex", value_name = "SECONDS")]
        ex: Option<u64>,
    },

    /// Print the server clock in epoch milliseconds
    Time,

    /// Merge values into a list without duplicates
    LpushUnique {
        /// List key
        key: String,
        /// Values to merge
        #[arg(required = true)]
        values: Vec<String>,
        /// Reapply this expiry (seconds) after the rewrite
        #[arg(long = "ttl", value_name = "SECONDS")]
        ttl: Option<u64>,
    },

    /// Print messages published to channels matching the patterns
    Psubscribe {
        /// Glob-style channel patterns
        #[arg(required = true)]
        patterns: Vec<String>,
    },
}

impl Cli {
    fn apply_to_config(&self, config: &mut FacadeConfig) {
        if let Some(ref host) = self.host {
            config.master.host = host.clone();
        }
        if let Some(port) = self.port {
            config.master.port = port;
        }
        if let Some(ref level) = self.loglevel {
            config.logging.level = level.clone();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match FacadeConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => FacadeConfig::default(),
    };
    cli.apply_to_config(&mut config);

    init_logging(&config);

    let facade = match CommandFacade::from_config(config) {
        Ok(facade) => facade,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(&facade, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(facade: &CommandFacade, command: Commands) -> ferrite_facade::Result<()> {
    match command {
        Commands::Ping => {
            let now = facade.current_time()?;
            info!(server_time_ms = now, "store reachable");
            println!("PONG");
        }
        Commands::Get { key } => {
            println!("{}", facade.get(key.as_str())?);
        }
        Commands::Set { key, value, ex } => {
            let options = match ex {
                Some(seconds) => SetOptions::new().ex(seconds),
                None => SetOptions::new(),
            };
            facade.set_with_options(key.as_str(), value.as_str(), options)?;
            println!("OK");
        }
        Commands::Time => {
            println!("{}", facade.current_time()?);
        }
        Commands::LpushUnique { key, values, ttl } => {
            println!("{}", facade.lpush_unique(&key, &values, ttl)?);
        }
        Commands::Psubscribe { patterns } => {
            let mut print = |message: &str, pattern: &str| {
                println!("{}\t{}", pattern, message);
            };
            facade.pattern_subscribe(&mut print, &patterns)?;
        }
    }
    Ok(())
}

fn init_logging(config: &FacadeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
