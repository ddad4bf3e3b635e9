//! Logging setup for the command line tool
//!
//! Diagnostics go to stderr so that stdout stays free for progress lines and
//! JSON reports.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber
///
/// `RUST_LOG` takes precedence. Without it only warnings are shown, or debug
/// output of this crate when `verbose` is set.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "warn,pbskids_archive=debug"
    } else {
        "warn"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
