use std::net::TcpListener;
use std::sync::Arc;

use taskforge::configuration::get_configuration;
use taskforge::startup::run;
use taskforge::telemetry::init_telemetry;
use taskforge::users::{InMemoryUserStore, TracingAuditSink};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    // Missing or misconfigured secrets are fatal here, never per-request.
    if let Err(e) = configuration.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Configuration error",
        ));
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(
        listener,
        configuration,
        Arc::new(InMemoryUserStore::new()),
        Arc::new(TracingAuditSink),
    )?;
    tracing::info!("Server started successfully");

    server.await
}
