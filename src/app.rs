use crate::{config::Settings, registry::DetectorRegistry, worker::Worker};
use std::io;

pub fn start_app(config: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let registry = DetectorRegistry::load(&config.models)
        .expect("failed to load detection models, cannot start");
    tracing::info!("serving {} detection models", registry.len());

    let mut worker = Worker::new(registry);
    let stdin = io::stdin();
    let stdout = io::stdout();
    worker.run(stdin.lock(), stdout.lock())?;

    Ok(())
}
