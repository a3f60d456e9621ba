// This is the core library crate for netprobe.
// It contains the active measurement subsystem: echo reflectors,
// timed round-trip probes, scheduled probe workers, and their
// rolling statistics stores.

pub mod config; // Reflector and probe configuration structures
pub mod error; // Crate-wide error taxonomy
pub mod packet; // Probe packet definitions, serialization/deserialization
pub mod probe; // One-shot timed round-trip probe
pub mod reflector; // UDP/TCP echo services
pub mod registry; // Identifier -> worker registry (collaborator layer)
pub mod stats; // Rolling RTT statistics store
pub mod worker; // Recurring probe scheduling loop

pub use config::{ProbeConfig, ProbeOptions, Protocol, ReflectorConfig};
pub use error::Error;
pub use probe::{send_timed_packet, ProbeOutcome};
pub use reflector::Reflector;
pub use registry::WorkerRegistry;
pub use stats::StatsStore;
pub use worker::ProbeWorker;
