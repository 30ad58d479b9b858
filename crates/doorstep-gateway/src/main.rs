use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use doorstep_config::ConfigLoader;
use doorstep_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "doorstep", version, about = "Anonymous visitor chat relay gateway")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    GatewayServer::new(config).run().await?;
    Ok(())
}
