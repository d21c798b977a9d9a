pub mod api; // Backend HTTP client + BackendApi seam
pub mod config;
pub mod models;
pub mod probe; // Availability prober with bounded retry
pub mod upload; // PDF selection and validation
pub mod workflow; // Upload → analyze → ask controller

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Honors `RUST_LOG`, falling back to [`config::default_log_filter`].
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
