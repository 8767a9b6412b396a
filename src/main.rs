//! # portal-sync
//!
//! Command line entry point for the portal notification and ticket sync client.

use clap::Parser;
use portal_realtime::cli::{self, Cli};
use portal_realtime::config::ConfigLoader;
use portal_realtime::telemetry::{TraceContext, init_tracing, with_trace_context};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Load configuration from layered env files and variables
    let loader = match &args.env_dir {
        Some(dir) => ConfigLoader::with_base_dir(dir.clone()),
        None => ConfigLoader::new(),
    };
    let config = loader.load()?;

    init_tracing(&config)?;
    info!(profile = %config.profile, "configuration loaded");
    if let Ok(redacted_json) = config.redacted_json() {
        debug!(config = %redacted_json, "effective configuration");
    }

    with_trace_context(TraceContext::generate(), cli::run(args.command, config)).await
}
