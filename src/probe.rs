// One-shot timed round-trip probe against an echo reflector.

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::Error;
use crate::packet::ProbePacket;

/// Outcome of a single probe, kept as a tagged variant so the statistics
/// layer can tell timeouts from other failures instead of collapsing both
/// into one sentinel value.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Echo received; round-trip time in milliseconds.
    Success(f64),
    /// No echo within the configured window.
    Timeout,
    /// Dial or I/O failure before the window elapsed.
    Error(String),
}

/// Executes exactly one timed request/response cycle.
///
/// Opens a fresh connection, stamps and sends a probe packet, and waits up
/// to `timeout` for the first echoed bytes. Returns the observed RTT in
/// milliseconds. The connection is closed on every exit path.
///
/// Connect refusal surfaces as [`Error::Dial`]; an expired window, whether
/// while connecting or waiting for the echo, surfaces as [`Error::Timeout`].
pub async fn send_timed_packet(
    target: &str,
    port: u16,
    timeout: Duration,
    payload_size: usize,
) -> Result<f64, Error> {
    let addr = format!("{}:{}", target, port);
    let timeout_ms = timeout.as_millis() as u64;

    let mut stream = match tokio::time::timeout(timeout, TcpStream::connect(addr.as_str())).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(Error::Dial {
                target: target.to_string(),
                port,
                source,
            })
        }
        Err(_elapsed) => return Err(Error::Timeout { timeout_ms }),
    };

    let packet = ProbePacket::new(0, payload_size);
    let bytes = packet.to_bytes()?;

    let sent_at = Instant::now();
    stream.write_all(&bytes).await?;

    // First read marks the receive timestamp; the echo payload itself is
    // not inspected.
    let mut buf = vec![0u8; bytes.len().max(64)];
    match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
        Ok(Ok(0)) => Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "reflector closed the connection before echoing",
        ))),
        Ok(Ok(n)) => {
            let rtt_ms = sent_at.elapsed().as_nanos() as f64 / 1e6;
            debug!(addr = %addr, echoed = n, rtt_ms, "probe completed");
            Ok(rtt_ms)
        }
        Ok(Err(source)) => Err(Error::Io(source)),
        Err(_elapsed) => Err(Error::Timeout { timeout_ms }),
    }
}

/// Worker-facing wrapper: runs one probe and folds the result into a
/// recordable [`ProbeOutcome`]. Never returns an error.
pub async fn run_probe(
    target: &str,
    port: u16,
    timeout: Duration,
    payload_size: usize,
) -> ProbeOutcome {
    match send_timed_packet(target, port, timeout, payload_size).await {
        Ok(rtt_ms) => ProbeOutcome::Success(rtt_ms),
        Err(err) if err.is_timeout() => ProbeOutcome::Timeout,
        Err(err) => ProbeOutcome::Error(err.to_string()),
    }
}
