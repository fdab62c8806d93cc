//! Subscriber setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `verbose`.
/// Calling this twice is harmless.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose {
        "debug,ureq=info"
    } else {
        "info,ureq=warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}
