//! Clinic records process entry point.
//!
//! Resolves the store configuration, opens the stores and serves the REST API.

use clinic_core::config::ConfigValues;
use clinic_core::{ClinicRecords, CoreConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the clinic records manager
///
/// A `memory:` graph store starts with the default accounts; a file graph store must have been
/// created with `clinic bootstrap` first.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_GRAPH_URI`, `CLINIC_GRAPH_USER`, `CLINIC_GRAPH_PASSWORD`: graph store connection,
///   falling back to `CLINIC_CREDENTIALS_FILE`
/// - `CLINIC_DOCUMENT_URI`, `CLINIC_DOCUMENT_DB`: message log location
/// - `CLINIC_FILES_DIR`: attachment content directory
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, store opening or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = api_rest::rest_addr_from_env();
    tracing::info!("++ Starting clinic records REST on {}", rest_addr);

    let config = CoreConfig::resolve(ConfigValues::from_env())?;
    let records = ClinicRecords::open(&config)?;

    api_rest::serve(records, &rest_addr).await
}
