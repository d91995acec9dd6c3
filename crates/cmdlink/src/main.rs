use std::sync::Arc;

use cmdlink::{AppConfig, AppSyncChannel, app};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()
        .inspect_err(|err| tracing::error!(target: "cmdlink::app", "{}", err))?;
    let channel = Arc::new(AppSyncChannel::from_config(&config.endpoint)?);

    let exchange = app::start(channel, &config.exchange);

    tokio::signal::ctrl_c().await?;
    exchange.shutdown().await;
    Ok(())
}
