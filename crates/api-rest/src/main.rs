//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Development and debugging with the OpenAPI/Swagger UI at `/swagger-ui/`. The workspace's main
//! `clinic-run` binary serves the same router.

use clinic_core::config::ConfigValues;
use clinic_core::{ClinicRecords, CoreConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the clinic records REST API server
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CLINIC_GRAPH_*`, `CLINIC_DOCUMENT_*`, `CLINIC_FILES_DIR`: store locations, see
///   `clinic_core::config`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the store configuration is incomplete or the stores cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("clinic_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::resolve(ConfigValues::from_env())?;
    let records = ClinicRecords::open(&config)?;

    api_rest::serve(records, &api_rest::rest_addr_from_env()).await
}
