use anyhow::Result;
use nexus_agent_core::NexusConfig;
use nexus_agent_server::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let config = NexusConfig::load()?;
    logging::init_logging(&config)?;
    tracing::info!(
        "Starting nexus-agent {}: environment={}",
        nexus_agent_core::VERSION,
        config.environment
    );
    nexus_agent_server::run(config).await
}
