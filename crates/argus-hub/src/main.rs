//! ARGUS notification hub - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Notification-first market intelligence hub.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ARGUS_CONFIG).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    argus_telemetry::init_logging()?;

    info!("Starting ARGUS hub v{}", env!("CARGO_PKG_VERSION"));

    let config = argus_hub::AppConfig::load(args.config.as_deref())?;
    info!(port = config.port, "Configuration loaded");

    let app = argus_hub::Application::new(config)?;
    app.run().await?;

    Ok(())
}
