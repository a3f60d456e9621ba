// Reflector and probe configuration structures

use std::time::Duration;

/// Default target port when the collaborator layer leaves it unset.
pub const DEFAULT_PORT: u16 = 9000;
/// Default seconds between scheduled probes.
pub const DEFAULT_INTERVAL_SECS: u64 = 30;
/// Default per-probe timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 2;
/// Default probe payload filler size in bytes.
pub const DEFAULT_PAYLOAD_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// Configuration for one echo reflector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectorConfig {
    pub protocol: Protocol,
    pub port: u16,
}

impl ReflectorConfig {
    pub fn new(protocol: Protocol, port: u16) -> Self {
        ReflectorConfig { protocol, port }
    }
}

/// Fully populated configuration for one probe worker. The worker assumes
/// every field is set; defaults are resolved by the registry layer from
/// [`ProbeOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    pub target: String,
    pub port: u16,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub payload_size: usize,
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Partial probe configuration as supplied by collaborators. Only the
/// target is mandatory; everything else falls back to the documented
/// defaults when resolved.
#[derive(Debug, Clone, Default)]
pub struct ProbeOptions {
    pub target: String,
    pub port: Option<u16>,
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub payload_size: Option<usize>,
}

impl ProbeOptions {
    pub fn new(target: impl Into<String>) -> Self {
        ProbeOptions {
            target: target.into(),
            ..Default::default()
        }
    }

    /// Fill unset fields with defaults, yielding a config the worker can
    /// run with as-is.
    pub fn resolve(self) -> ProbeConfig {
        ProbeConfig {
            target: self.target,
            port: self.port.unwrap_or(DEFAULT_PORT),
            interval_secs: self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            payload_size: self.payload_size.unwrap_or(DEFAULT_PAYLOAD_SIZE),
        }
    }
}
