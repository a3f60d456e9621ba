// Probe packet definitions, serialization/deserialization
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

// Using bincode for serialization for efficiency; the reflector echoes the
// bytes verbatim so the wire format only has to round-trip through itself.

/// One probe request as it travels to a reflector and back. The embedded
/// send timestamp lets a capture or a remote peer attribute the packet;
/// RTT itself is measured from a monotonic clock on the sending side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProbePacket {
    pub sequence: u64,
    /// Sender wall-clock timestamp, milliseconds since the Unix epoch.
    pub sent_at_ms: u64,
    /// Implementation-defined filler, sized by the probe configuration.
    pub payload: Vec<u8>,
}

impl ProbePacket {
    /// Builds a probe packet stamped with the current wall-clock time and
    /// carrying `payload_size` random filler bytes.
    pub fn new(sequence: u64, payload_size: usize) -> Self {
        let mut payload = vec![0u8; payload_size];
        rand::thread_rng().fill_bytes(&mut payload);
        ProbePacket {
            sequence,
            sent_at_ms: unix_millis(),
            payload,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
