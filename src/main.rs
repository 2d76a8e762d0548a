//! logwrap demo
//!
//! Registers a logger, prints its version and output paths, then emits a
//! numbered series of records and detaches the console sink half way
//! through.
//!
//! ## Usage
//!
//! ```bash
//! # Console only
//! logwrap-demo
//!
//! # Console plus a dated log file under ./logs
//! logwrap-demo --file logs/demo.log
//!
//! # Also forward to a syslog daemon over UDP
//! logwrap-demo --syslog localhost:514
//!
//! # Load the logger from a JSON config
//! logwrap-demo --config logging.json
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use logwrap_core::{
    log_info, InstanceLogger, Level, LoggerBuilder, LoggerConfig, Registry, RegistryLayer, Sink,
    SinkKind, SyslogAddress,
};
use tracing_subscriber::prelude::*;

/// logwrap - shared named loggers
#[derive(Parser, Debug)]
#[command(name = "logwrap-demo")]
#[command(version)]
#[command(about = "Exercise a logwrap logger with a series of records")]
struct Cli {
    /// Increase verbosity of internal diagnostics (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON logger configuration (overrides the sink flags)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logger name
    #[arg(short, long, default_value = logwrap_core::DEFAULT_LOGGER_NAME)]
    name: String,

    /// Application label
    #[arg(long)]
    app_name: Option<String>,

    /// Instance label stamped on every record
    #[arg(short, long, default_value = "demo")]
    instance: String,

    /// Minimum level (debug, info, warning, error, critical)
    #[arg(short, long, default_value = "debug")]
    level: Level,

    /// Leave out pid, thread and call-site fields
    #[arg(long)]
    no_meta: bool,

    /// Keep file names as given instead of adding a timestamp suffix
    #[arg(long)]
    no_date_filename: bool,

    /// Do not attach a console sink
    #[arg(long)]
    no_console: bool,

    /// Log file (repeatable)
    #[arg(short, long)]
    file: Vec<PathBuf>,

    /// Syslog daemon address (host:port over UDP)
    #[arg(long)]
    syslog: Option<String>,

    /// Number of records to emit
    #[arg(long, default_value_t = 10)]
    count: u32,

    /// Pause between records in milliseconds
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_logger(cli: &Cli) -> Result<InstanceLogger> {
    if let Some(path) = &cli.config {
        let mut config = LoggerConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        config.instance_name.get_or_insert_with(|| cli.instance.clone());
        return Ok(InstanceLogger::from_config(&config)?);
    }

    let mut builder = LoggerBuilder::new(&cli.name)
        .level(cli.level)
        .meta(!cli.no_meta)
        .date_filename(!cli.no_date_filename)
        .no_sinks();
    if let Some(app_name) = &cli.app_name {
        builder = builder.app_name(app_name);
    }
    if !cli.no_console {
        builder = builder.sink(Sink::console());
    }
    for path in &cli.file {
        builder = builder.sink(Sink::file(path));
    }
    if let Some(address) = &cli.syslog {
        builder = builder.sink(Sink::syslog(SyslogAddress::Udp(address.clone())));
    }

    Ok(builder.instance(&cli.instance)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let log = build_logger(&cli)?;

    println!("version: {}", log.version());
    println!("{:?}", log.output_paths(None));

    for count in 0..cli.count {
        if count > 0 && cli.interval_ms > 0 {
            std::thread::sleep(Duration::from_millis(cli.interval_ms));
        }
        if count == cli.count / 2 {
            log.remove_sinks(Some(SinkKind::Console));
        }
        log_info!(log, "test of {}", count);
    }

    // Events from tracing-instrumented code land in the same sinks
    let layer = RegistryLayer::new(log.entry().clone(), "tracing");
    tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), || {
        tracing::info!(target: "demo", registered = ?Registry::global().names(), "done");
    });

    log.entry().flush()?;
    Ok(())
}
