use apparent_wind::{config::ServerConfig, run_server};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = ServerConfig::from_env();
    tracing::info!(
        "Wind providers: {} / {} (timeout {:?})",
        config.provider.reanalysis_url,
        config.provider.forecast_url,
        config.provider.timeout
    );

    run_server(config).await
}
