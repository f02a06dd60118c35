// THEORY:
// The library only emits `tracing` events; it never installs a subscriber. Binaries
// and hosts call `init_logging` once at startup. `RUST_LOG` wins when set, otherwise
// the crate logs at `info` and everything else at `warn`.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "warn,adaptive_accent=info";

/// Installs a formatted subscriber filtered by `RUST_LOG`.
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging() -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
}
