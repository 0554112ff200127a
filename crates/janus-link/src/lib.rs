//! The cross-thread transport between the main simulation loop and the
//! network thread.
//!
//! Two unbounded FIFO queues, one per direction, are the only communication
//! path between the threads. Enqueueing never blocks; dequeueing never blocks
//! and returns `None` when empty, so both loops poll on their own cadence.
//! Session ids are the only handles that cross the boundary, always by value.

mod frame;

use janus_codec::CodecError;
use thiserror::Error;

pub use crate::frame::Frame;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("unknown frame opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("malformed frame payload")]
    MalformedFrame,
}

/// Creates the queue pair. The main thread keeps the [`MainLink`], the
/// network thread takes the [`NetLink`].
#[must_use]
pub fn link() -> (MainLink, NetLink) {
    let (to_net, from_main) = flume::unbounded();
    let (to_main, from_net) = flume::unbounded();
    (
        MainLink { to_net, from_net },
        NetLink { to_main, from_main },
    )
}

/// Main-thread end of the transport.
pub struct MainLink {
    to_net: flume::Sender<Vec<u8>>,
    from_net: flume::Receiver<Vec<u8>>,
}

impl MainLink {
    /// Non-blocking enqueue towards the network thread. If the network
    /// thread is already gone the frame is silently dropped.
    pub fn send(&self, frame: &Frame) {
        self.to_net.send(frame.encode()).ok();
    }

    /// Non-blocking dequeue of the next network-to-main frame.
    pub fn poll(&self) -> Option<Result<Frame, LinkError>> {
        self.from_net.try_recv().ok().map(|raw| Frame::decode(&raw))
    }
}

/// Network-thread end of the transport.
pub struct NetLink {
    to_main: flume::Sender<Vec<u8>>,
    from_main: flume::Receiver<Vec<u8>>,
}

impl NetLink {
    pub fn send(&self, frame: &Frame) {
        self.to_main.send(frame.encode()).ok();
    }

    pub fn poll(&self) -> Option<Result<Frame, LinkError>> {
        self.from_main
            .try_recv()
            .ok()
            .map(|raw| Frame::decode(&raw))
    }
}
