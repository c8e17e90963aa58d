pub mod catalog;
pub mod composer;
pub mod config;
pub mod display_date;
pub mod error;
pub mod export;
pub mod layout;
pub mod models;
pub mod providers;
pub mod save;
pub mod session;
pub mod upload;

pub use error::ReportError;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
