//! Blind Trial Server
//!
//! Issues blind trials and records blind submissions.
//! The hidden assignment of every trial stays server-side.

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use blind_trial::{ServerConfig, TrialServer, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let mut config = ServerConfig::default();
    if let Ok(addr) = std::env::var("BIND_ADDR") {
        config.bind_addr = addr.parse()?;
    }

    info!("Blind Trial Server v{}", VERSION);
    info!("Listening on {}", config.bind_addr);
    info!("Duplicate policy: {:?}", config.recorder.duplicate_policy);

    let server = TrialServer::new(config);
    server.run().await?;

    Ok(())
}
