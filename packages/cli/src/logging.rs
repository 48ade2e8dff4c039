//! Log output on stderr, filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise only warnings are shown, or
/// everything from the otadash crates at `debug` with `--verbose`.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "warn,otadash_http=debug,otadash_query=debug,otadash_state=debug,otadash_api=debug,otadash_cli=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // Ignored when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}
