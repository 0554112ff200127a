//! Main-thread side of the bridge: the per-player protocol state machine,
//! the outbound packet builders for protocol 340, and the gateway that
//! drives both from the transport link.

mod bridge;
mod chunk;
mod gateway;
pub mod packets;
mod player;

use janus_codec::CodecError;
use thiserror::Error;

pub use crate::bridge::{HostBridge, LogBridge};
pub use crate::gateway::{Gateway, Settings};
pub use crate::player::{Phase, Player, offline_uuid};

/// Protocol number spoken on the client wire.
pub const PROTOCOL_VERSION: u32 = 340;

/// Game version matching [`PROTOCOL_VERSION`].
pub const GAME_VERSION: &str = "1.12.2";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("unexpected packet {id:#04x} during login")]
    UnexpectedLogin { id: u32 },
}
