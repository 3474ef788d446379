use common::TelemetryGuard;
use gateway::{config::get_configuration, logging::setup_logging, serve};
use inference::OrtLoader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration()?;

    let _telemetry = match &config.otel_endpoint {
        Some(endpoint) => Some(TelemetryGuard::init(env!("CARGO_PKG_NAME"), endpoint)?),
        None => None,
    };
    setup_logging(&config);

    tracing::info!(
        environment = config.environment.as_str(),
        models_dir = %config.models_dir.display(),
        default_model = %config.default_model,
        "Gateway starting"
    );

    let loader = OrtLoader::new(config.loader_config())?;
    serve(config, loader).await
}
