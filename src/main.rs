use std::path::PathBuf;

use tessera::adapters::rabbitmq::RabbitMqConsumer;
use tessera::config::Configuration;
use tessera::{initialize_state, telemetry};

const CONFIG_PATH_ENV: &str = "TESSERA_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_default();
    let config = Configuration::default().path(path).read()?;

    let guard = telemetry::init(&config.telemetry)?;
    tracing::info!(name = %config.name, version = config.version(), "starting worker");

    let state = initialize_state(config).await?;

    let Some(broker) = &state.config.broker else {
        tracing::error!("missing `broker` entry on `config.yaml` file");
        guard.shutdown();
        return Ok(());
    };
    let consumer = RabbitMqConsumer::new(broker).await?;

    let result: Result<(), Box<dyn std::error::Error + Send + Sync>> = tokio::select! {
        result = consumer.run(&state.dispatcher) => result.map_err(Into::into),
        signal = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            signal.map_err(Into::into)
        },
    };

    guard.shutdown();
    result
}
