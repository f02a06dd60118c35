// THEORY:
// Errors are split along the only line that matters to a host: things the
// pipeline recovers from on its own, and things the host did wrong.
//
// `ProbeError` covers everything that can go wrong while looking at content.
// None of it ever reaches the caller of `Coordinator::resolve`; each variant makes
// the pipeline fall through to the next strategy or to the default palette, and is
// reported through `tracing` instead.
//
// `ConfigError` is a programmer error. It is returned loudly from `configure` and
// from settings loading, and never swallowed.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Locally recovered failures of a single probe step.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("content snapshot unavailable: {0}")]
    SourceUnavailable(String),

    #[error("probe step `{step}` exceeded {}ms", .limit.as_millis())]
    ExtractionTimeout { step: &'static str, limit: Duration },

    #[error("icon could not be decoded: {0}")]
    DecodeFailure(String),

    #[error("color {0} rejected by validity filter")]
    InvalidColor(String),
}

/// Rejected settings or quantizer parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be within 0..=100, got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("sampling stride must be at least one pixel")]
    ZeroStride,

    #[error("bucket width must be 16 or 32, got {0}")]
    BucketWidth(u8),

    #[error("failed to read settings from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;
