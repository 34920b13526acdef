//! ---
//! radar_section: "04-ingest-runtime"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "UDP receive loop with per-datagram task dispatch."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use radar_metrics::IngestMetrics;
use radar_msg::parse_packet;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::handler::MessageHandler;

/// Receive buffer used unless overridden; the largest UDP payload.
pub const DEFAULT_RECV_BUFFER: usize = 65_535;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to bind ingest socket {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("receive loop terminated abnormally: {0}")]
    Join(#[from] JoinError),
}

/// Lifecycle of a spawned receiver. Unbound receivers never exist: binding
/// either yields a listening [`UdpIngest`] or an [`IngestError::Bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Listening,
    Closed,
}

/// A bound UDP endpoint that parses every datagram and forwards it to a handler.
pub struct UdpIngest {
    socket: UdpSocket,
    local_addr: SocketAddr,
    handler: Arc<dyn MessageHandler>,
    metrics: IngestMetrics,
    recv_buffer: usize,
}

impl std::fmt::Debug for UdpIngest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpIngest")
            .field("local_addr", &self.local_addr)
            .field("recv_buffer", &self.recv_buffer)
            .finish_non_exhaustive()
    }
}

impl UdpIngest {
    /// Bind `addr`. Port `0` asks the OS for an ephemeral port; see [`UdpIngest::local_addr`].
    pub async fn bind(
        addr: SocketAddr,
        handler: Arc<dyn MessageHandler>,
        metrics: IngestMetrics,
    ) -> Result<Self, IngestError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| IngestError::Bind { addr, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| IngestError::Bind { addr, source })?;
        info!(address = %local_addr, "ingest socket listening");
        Ok(Self {
            socket,
            local_addr,
            handler,
            metrics,
            recv_buffer: DEFAULT_RECV_BUFFER,
        })
    }

    /// Datagrams longer than `bytes` are truncated by the kernel and will fail to parse.
    pub fn with_recv_buffer(mut self, bytes: NonZeroUsize) -> Self {
        self.recv_buffer = bytes.get();
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the receive loop until `shutdown` resolves. The socket is closed on return.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut buf = vec![0u8; self.recv_buffer];
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(address = %self.local_addr, "ingest socket closing");
                    break;
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => {
                        self.metrics.observe_received();
                        let payload = buf[..len].to_vec();
                        let handler = self.handler.clone();
                        let metrics = self.metrics.clone();
                        tokio::spawn(async move {
                            dispatch(&payload, peer, handler.as_ref(), &metrics);
                        });
                    }
                    Err(err) => {
                        warn!(address = %self.local_addr, error = %err, "datagram receive failed");
                    }
                },
            }
        }
    }

    /// Move the receive loop onto the runtime and return a handle to close it.
    pub fn spawn(self) -> IngestHandle {
        let local_addr = self.local_addr;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(self.run_until(async move {
            let _ = shutdown_rx.await;
        }));
        IngestHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

fn dispatch(
    payload: &[u8],
    peer: SocketAddr,
    handler: &dyn MessageHandler,
    metrics: &IngestMetrics,
) {
    match parse_packet(payload) {
        Ok(message) => {
            debug!(peer = %peer, kind = %message.kind(), "dispatching datagram");
            handler.handle(message);
        }
        Err(err) => {
            metrics.observe_failure(err.reason());
            match err.validation() {
                Some(failure) => {
                    let fields: Vec<&str> = failure.fields().collect();
                    warn!(
                        peer = %peer,
                        fields = ?fields,
                        error = %err,
                        "discarding invalid datagram"
                    );
                }
                None => warn!(peer = %peer, error = %err, "discarding malformed datagram"),
            }
        }
    }
}

/// Handle to a receive loop started with [`UdpIngest::spawn`].
#[derive(Debug)]
pub struct IngestHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl IngestHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ReceiverState {
        if self.task.is_finished() {
            ReceiverState::Closed
        } else {
            ReceiverState::Listening
        }
    }

    pub fn is_listening(&self) -> bool {
        self.state() == ReceiverState::Listening
    }

    /// Stop the loop and wait for the socket to be released. Datagram tasks
    /// already spawned keep running to completion.
    pub async fn shutdown(mut self) -> Result<(), IngestError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.task).await?;
        Ok(())
    }
}
