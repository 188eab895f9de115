//! Structured logging setup.
//!
//! Grounded on `kotadb::observability`'s `tracing`/`tracing-subscriber`
//! initialization, trimmed to this crate's needs: no metrics counters, no
//! operation-log enum, just a filter and a formatter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber. Safe to call more than once (e.g.
/// once per test binary); a second call is a no-op.
pub fn init_logging() -> anyhow::Result<()> {
    init_logging_with_level(false)
}

/// Initialize logging with an explicit verbosity flag. `RUST_LOG`, when
/// set, always takes precedence over the flag.
pub fn init_logging_with_level(verbose: bool) -> anyhow::Result<()> {
    let default_filter = if verbose {
        "codegraph_engine=debug,info"
    } else {
        "codegraph_engine=info,warn"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => Ok(()),
        // Already initialized — fine in tests where multiple modules call this.
        Err(_) => Ok(()),
    }
}
