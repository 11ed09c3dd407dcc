pub mod config;
pub mod pipeline_config;
pub mod models;
pub mod pipeline;

pub use pipeline::{VerificationFailure, VerificationOrchestrator, VerificationOutcome, VerificationService};
pub use pipeline_config::VerificationConfig;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. Logs go to stderr so stdout stays
/// free for results. `RUST_LOG` overrides `config::default_log_filter()`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
