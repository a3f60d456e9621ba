// UDP/TCP echo services used as round-trip timing targets.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Protocol, ReflectorConfig};
use crate::error::Error;

/// Receive buffer for one inbound datagram or TCP read.
const ECHO_BUFFER_SIZE: usize = 2048;

/// Passive echo service: every byte received is sent straight back to its
/// source. Created once per protocol at agent startup and expected to run
/// for the process lifetime.
///
/// `stop()` cancels a token that every blocking accept/receive selects
/// against, so shutdown is observed promptly even when no traffic arrives.
pub struct Reflector {
    proto: Protocol,
    port: AtomicU16,
    running: Arc<AtomicBool>,
    token: CancellationToken,
    started: AtomicBool,
}

impl Reflector {
    pub fn new(config: ReflectorConfig) -> Self {
        Reflector {
            proto: config.protocol,
            port: AtomicU16::new(config.port),
            running: Arc::new(AtomicBool::new(false)),
            token: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn proto(&self) -> Protocol {
        self.proto
    }

    /// Configured port; after `start()` this is the actually bound port
    /// (relevant when configured with port 0).
    pub fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    /// Changes the port. Only permitted before `start()`.
    pub fn set_port(&self, port: u16) -> Result<(), Error> {
        if self.started.load(Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }
        self.port.store(port, Ordering::SeqCst);
        Ok(())
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Binds the socket and spawns the serve loop without blocking the
    /// caller. A bind or listen failure is fatal for this reflector: it is
    /// surfaced here once and never retried.
    pub async fn start(&self) -> Result<(), Error> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }

        let port = self.port.load(Ordering::SeqCst);
        let addr = format!("0.0.0.0:{}", port);
        let running = Arc::clone(&self.running);
        let token = self.token.clone();

        match self.proto {
            Protocol::Udp => {
                let socket = UdpSocket::bind(&addr).await.map_err(|source| {
                    self.started.store(false, Ordering::SeqCst);
                    Error::Bind {
                        proto: "udp",
                        port,
                        source,
                    }
                })?;
                self.port
                    .store(socket.local_addr()?.port(), Ordering::SeqCst);
                info!(port = self.port(), "udp reflector listening");
                running.store(true, Ordering::SeqCst);
                tokio::spawn(async move {
                    udp_serve_loop(socket, token).await;
                    running.store(false, Ordering::SeqCst);
                });
            }
            Protocol::Tcp => {
                let listener = TcpListener::bind(&addr).await.map_err(|source| {
                    self.started.store(false, Ordering::SeqCst);
                    Error::Bind {
                        proto: "tcp",
                        port,
                        source,
                    }
                })?;
                self.port
                    .store(listener.local_addr()?.port(), Ordering::SeqCst);
                info!(port = self.port(), "tcp reflector listening");
                running.store(true, Ordering::SeqCst);
                tokio::spawn(async move {
                    tcp_accept_loop(listener, token).await;
                    running.store(false, Ordering::SeqCst);
                });
            }
        }
        Ok(())
    }

    /// Requests loop exit. Returns immediately; `running()` turns false
    /// once the serve loop has observed the cancellation.
    pub fn stop(&self) -> Result<(), Error> {
        self.token.cancel();
        Ok(())
    }
}

async fn udp_serve_loop(socket: UdpSocket, token: CancellationToken) {
    let mut buf = vec![0u8; ECHO_BUFFER_SIZE];
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!(port = socket.local_addr().map(|a| a.port()).unwrap_or(0), "udp reflector stopping");
                break;
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, src)) => {
                    if let Err(err) = socket.send_to(&buf[..len], src).await {
                        warn!(%src, %err, "failed to echo datagram");
                    }
                }
                // A previous send to a dead peer can surface here; not fatal.
                Err(err) if err.kind() == io::ErrorKind::ConnectionReset => {
                    debug!(%err, "udp receive reset");
                }
                Err(err) => {
                    warn!(%err, "udp receive failed");
                }
            },
        }
    }
}

async fn tcp_accept_loop(listener: TcpListener, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!(port = listener.local_addr().map(|a| a.port()).unwrap_or(0), "tcp reflector stopping");
                break;
            }
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted echo connection");
                    let conn_token = token.child_token();
                    tokio::spawn(async move {
                        tcp_echo_connection(stream, conn_token).await;
                    });
                }
                Err(err) => {
                    warn!(%err, "tcp accept failed");
                }
            },
        }
    }
}

/// Echoes bytes on one accepted connection until the peer closes, a read
/// or write fails, or the reflector shuts down.
async fn tcp_echo_connection(mut stream: TcpStream, token: CancellationToken) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let mut buf = vec![0u8; ECHO_BUFFER_SIZE];
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            result = stream.read(&mut buf) => match result {
                Ok(0) => {
                    debug!(%peer, "echo connection closed by peer");
                    break;
                }
                Ok(n) => {
                    if let Err(err) = stream.write_all(&buf[..n]).await {
                        warn!(%peer, %err, "failed to echo bytes");
                        break;
                    }
                }
                Err(err) => {
                    warn!(%peer, %err, "echo connection read failed");
                    break;
                }
            },
        }
    }
}
