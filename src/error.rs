// Crate-wide error taxonomy

use std::io;

use thiserror::Error;

/// Errors surfaced by the measurement subsystem.
///
/// `Bind` is fatal for the component that raised it and is never retried.
/// `Dial` and `Timeout` are per-probe failures; the owning worker records
/// them as counters and keeps running.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to bind {proto} socket on port {port}: {source}")]
    Bind {
        proto: &'static str,
        port: u16,
        source: io::Error,
    },

    #[error("failed to dial {target}:{port}: {source}")]
    Dial {
        target: String,
        port: u16,
        source: io::Error,
    },

    #[error("no echo received within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("probe I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("packet encoding failed: {0}")]
    Encode(#[from] bincode::Error),

    #[error("statistics store holds no samples")]
    NoSamples,

    #[error("component is already running")]
    AlreadyRunning,

    #[error("worker started without options set")]
    NotConfigured,
}

impl Error {
    /// True for the timeout variant; callers use this to keep the
    /// timeout/error distinction when recording outcomes.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
