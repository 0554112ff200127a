//! Packet-id tables and outbound body builders for protocol 340.
//!
//! Ids are namespaced by connection phase; the same number means a
//! different packet in Login and Play. Builders return the packet body
//! (varint id plus fields) with no wire framing; the network thread adds
//! length prefixes, compression, and encryption.

pub mod login;
pub mod play;

use janus_codec::WireWrite;

fn packet(id: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_varint(id);
    out
}
