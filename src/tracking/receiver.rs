//! Background UDP listener for head-tracking packets.
//!
//! ```text
//! ┌──────────────────────────┐  HeadPosition   ┌───────────────────────┐
//! │ headtrack-osc thread     │ ──────────────▶ │ render thread         │
//! │  • tokio current-thread  │  unbounded mpsc │  • drain() per frame  │
//! │  • decode + validate OSC │                 │  • coordinator.apply  │
//! └──────────────────────────┘                 └───────────────────────┘
//! ```
//!
//! The render thread never waits on the network: it drains whatever has
//! arrived since the last frame, in arrival order.

use bytes::Bytes;
use glam::Vec3;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};

use super::osc::{OscArg, OscPacket};
use crate::input::HeadPosition;
use crate::settings::TrackingSettings;

/// Largest datagram we accept; tracking packets are far smaller.
const MAX_DATAGRAM_SIZE: usize = 8192;

/// Number of arguments in a head message (x, y, z).
const HEAD_ARG_COUNT: usize = 3;

/// Errors starting the tracking receiver.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("failed to bind tracking socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to configure tracking socket: {0}")]
    Socket(std::io::Error),

    #[error("failed to build tracking runtime: {0}")]
    Runtime(std::io::Error),

    #[error("failed to spawn tracking thread: {0}")]
    Thread(std::io::Error),
}

/// Counters shared with the receive thread.
struct ReceiverState {
    running: AtomicBool,
    packets: AtomicU64,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl ReceiverState {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            packets: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
}

/// Snapshot of receiver counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams received.
    pub packets: u64,
    /// Head positions queued for the render thread.
    pub accepted: u64,
    /// Malformed datagrams plus messages with the wrong address or arguments.
    pub dropped: u64,
}

/// Listens for OSC head positions on a background thread.
pub struct TrackingReceiver {
    local_addr: SocketAddr,
    events: mpsc::UnboundedReceiver<HeadPosition>,
    state: Arc<ReceiverState>,
    shutdown: watch::Sender<bool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TrackingReceiver {
    /// Bind the socket and start the receive thread.
    ///
    /// Binding happens before returning, so a taken port is reported here
    /// rather than from the background thread.
    pub fn bind(settings: &TrackingSettings) -> Result<Self, TrackingError> {
        let addr = format!("{}:{}", settings.bind_address, settings.port);
        let socket = std::net::UdpSocket::bind(&addr).map_err(|source| TrackingError::Bind {
            addr: addr.clone(),
            source,
        })?;
        socket.set_nonblocking(true).map_err(TrackingError::Socket)?;
        let local_addr = socket.local_addr().map_err(TrackingError::Socket)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .map_err(TrackingError::Runtime)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(ReceiverState::new());
        let state_clone = Arc::clone(&state);
        let address = settings.address.clone();

        let thread_handle = thread::Builder::new()
            .name("headtrack-osc".into())
            .spawn(move || {
                runtime.block_on(receive_loop(
                    socket,
                    address,
                    event_tx,
                    state_clone,
                    shutdown_rx,
                ));
            })
            .map_err(TrackingError::Thread)?;

        tracing::info!(
            "📡 Tracking receiver listening on {} for '{}'",
            local_addr,
            settings.address
        );

        Ok(Self {
            local_addr,
            events: event_rx,
            state,
            shutdown: shutdown_tx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Address the socket is bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Next queued position, without waiting.
    pub fn try_recv(&mut self) -> Option<HeadPosition> {
        self.events.try_recv().ok()
    }

    /// Every position queued since the last drain, in arrival order.
    pub fn drain(&mut self) -> Vec<HeadPosition> {
        let mut positions = Vec::new();
        while let Some(position) = self.try_recv() {
            positions.push(position);
        }
        positions
    }

    /// Whether the receive thread is still running.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            packets: self.state.packets.load(Ordering::Relaxed),
            accepted: self.state.accepted.load(Ordering::Relaxed),
            dropped: self.state.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for TrackingReceiver {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);

        if let Some(handle) = self.thread_handle.take() {
            tracing::debug!("📡 Waiting for tracking thread to stop ({})", self.local_addr);
            let _ = handle.join();
            tracing::info!("📡 Tracking receiver stopped");
        }
    }
}

/// Background receive loop, run on the receiver's runtime.
async fn receive_loop(
    socket: std::net::UdpSocket,
    address: String,
    events: mpsc::UnboundedSender<HeadPosition>,
    state: Arc<ReceiverState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let socket = match UdpSocket::from_std(socket) {
        Ok(socket) => socket,
        Err(e) => {
            tracing::error!("📡 Tracking socket could not be registered: {}", e);
            state.running.store(false, Ordering::Release);
            return;
        }
    };

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP port-unreachable and friends surface here; keep listening
                        tracing::debug!("📡 Tracking receive error: {}", e);
                        continue;
                    }
                };
                state.packets.fetch_add(1, Ordering::Relaxed);

                let Some(positions) = decode_datagram(&buf[..len], &address, &state, peer) else {
                    continue;
                };
                for position in positions {
                    if events.send(HeadPosition::tracked(position)).is_err() {
                        // Receiver dropped; nothing left to feed
                        state.running.store(false, Ordering::Release);
                        return;
                    }
                    state.accepted.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    state.running.store(false, Ordering::Release);
}

fn decode_datagram(
    data: &[u8],
    address: &str,
    state: &ReceiverState,
    peer: SocketAddr,
) -> Option<Vec<Vec3>> {
    let packet = match OscPacket::decode(Bytes::copy_from_slice(data)) {
        Ok(packet) => packet,
        Err(e) => {
            state.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Dropping malformed packet from {}: {}", peer, e);
            return None;
        }
    };

    let (positions, rejected) = extract_positions(packet, address);
    if rejected > 0 {
        state.dropped.fetch_add(rejected as u64, Ordering::Relaxed);
        tracing::trace!("Dropped {} unexpected message(s) from {}", rejected, peer);
    }
    Some(positions)
}

/// Pull head positions out of a packet.
///
/// A message counts only when its address matches and it carries exactly
/// three numeric arguments. Returns the positions and the number of messages
/// rejected.
pub fn extract_positions(packet: OscPacket, address: &str) -> (Vec<Vec3>, usize) {
    let mut positions = Vec::new();
    let mut rejected = 0;

    for message in packet.into_messages() {
        if message.address != address || message.args.len() != HEAD_ARG_COUNT {
            rejected += 1;
            continue;
        }
        let coords: Vec<f32> = message.args.iter().filter_map(OscArg::as_f32).collect();
        match coords.as_slice() {
            [x, y, z] => positions.push(Vec3::new(*x, *y, *z)),
            _ => rejected += 1,
        }
    }

    (positions, rejected)
}
