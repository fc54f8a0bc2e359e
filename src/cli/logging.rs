use tracing_subscriber::EnvFilter;

/// Install the stderr diagnostic subscriber.
///
/// `RUST_LOG` wins; otherwise `--verbose` means debug, else the configured
/// level. Stdout stays reserved for echoed audit records.
pub fn init(level: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { level };
        EnvFilter::new(format!("torflux={level}"))
    });

    // A subscriber may already be installed (tests); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
