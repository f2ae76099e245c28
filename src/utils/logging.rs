use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Default directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. `verbose` lowers the default to `debug`,
/// which also surfaces why a credential fell back to anonymous.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt_layer = fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
