//! Folio CLI Library
//!
//! This library provides the command implementations for the Folio static
//! site builder. It is used by the binary entry point and exposes the dev
//! server pieces for integration purposes.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (build, serve, routes, query)
//! - [`server`] - Development server with on-demand rendering and live reload
//! - [`debounce`] - Timer-coalescing queue for file change notifications
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! # async fn run() -> color_eyre::eyre::Result<()> {
//! folio::cmd::build::run(Path::new("folio.toml"), Path::new("."), None, None, false).await?;
//! # Ok(())
//! # }
//! ```

pub mod cmd;
pub mod debounce;
pub mod server;

// Re-export core types for convenience
pub use folio_core::Config;
pub use folio_generator::{BuildStats, Builder};

/// Initialize tracing with the specified verbosity level.
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE)
///
/// # Example
///
/// ```no_run
/// folio::init_tracing(2); // Enable DEBUG level logging
/// ```
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
