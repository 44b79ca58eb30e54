use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for the application.
///
/// Output goes to stderr so it never interleaves with the remote session on
/// stdout. `RUST_LOG` takes precedence over the default filter.
pub fn init(verbose: bool) {
    let default_filter = if verbose {
        "warn,lwshell=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::debug!("Logging initialized (verbose={})", verbose);
}
