use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yolo_dispatch::{config, start_app};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::get_configuration().expect("failed to load config");
    let log_level = config.log_level.as_str();

    // stdout carries the message protocol, so diagnostics go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_level(true),
        )
        .init();

    start_app(config)?;

    Ok(())
}
