use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use portassassin::AppOptions;

/// Watch listening TCP ports and terminate the processes holding them.
#[derive(Debug, Parser)]
#[command(name = "portassassin", version, about)]
struct Args {
    /// Config file (default: ~/.portassassin.json)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Poll interval in milliseconds, overriding the config file
    #[arg(short, long, value_name = "MS")]
    interval_ms: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if let Some(ms) = args.interval_ms
        && ms < 250
    {
        bail!("--interval-ms must be at least 250");
    }

    portassassin::run(AppOptions {
        config_path: args.config,
        poll_interval: args.interval_ms.map(Duration::from_millis),
    })
}
