//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level when set.

use crate::config::ObservabilityConfig;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Returns an error if a global subscriber has already been set.
pub fn init_tracing(
    config: &ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().try_init()?;
    } else {
        builder.try_init()?;
    }

    tracing::info!(
        service_name = %config.service_name,
        json = config.json_logging,
        "Tracing initialized"
    );

    Ok(())
}
