//! Logging bootstrap.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::error::{ReconcileError, ReconcileResult};

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG` wins over `default_directive` (for example
/// `"junos_reconcile=info"`). Fails instead of panicking when a global
/// subscriber is already installed.
pub fn init_logging(default_directive: &str) -> ReconcileResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| ReconcileError::invalid_config("log_filter", e.to_string()))?,
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ReconcileError::internal(format!("Failed to set logger: {}", e)))?;

    Ok(())
}
