//! Play-phase packets.

use janus_codec::WireWrite;
use janus_text::Text;

use super::packet;
use crate::chunk;

pub mod serverbound {
    pub const TELEPORT_CONFIRM: u32 = 0x00;
    pub const CHAT: u32 = 0x02;
    pub const KEEP_ALIVE: u32 = 0x0B;
}

pub mod clientbound {
    pub const DIFFICULTY: u32 = 0x0D;
    pub const CHAT: u32 = 0x0F;
    pub const PLUGIN_MESSAGE: u32 = 0x18;
    pub const DISCONNECT: u32 = 0x1A;
    pub const KEEP_ALIVE: u32 = 0x1F;
    pub const CHUNK_DATA: u32 = 0x20;
    pub const JOIN_GAME: u32 = 0x23;
    pub const ABILITIES: u32 = 0x2C;
    pub const POSITION_LOOK: u32 = 0x2F;
    pub const SPAWN_POSITION: u32 = 0x46;
}

/// Chat-box position byte of the clientbound chat packet.
const CHAT_BOX: u8 = 0;

const GAMEMODE_CREATIVE: u8 = 1;
const DIMENSION_OVERWORLD: i32 = 0;
const DIFFICULTY_PEACEFUL: u8 = 0;
const LEVEL_TYPE: &str = "flat";

/// Invulnerable, flying, may fly, creative.
const ABILITY_FLAGS: u8 = 0x0F;
const FLY_SPEED: f32 = 0.05;
const WALK_SPEED: f32 = 0.1;

#[must_use]
pub fn chat(text: &Text) -> Vec<u8> {
    let mut out = packet(clientbound::CHAT);
    out.put_str(&text.to_json());
    out.put_u8(CHAT_BOX);
    out
}

#[must_use]
pub fn difficulty() -> Vec<u8> {
    let mut out = packet(clientbound::DIFFICULTY);
    out.put_u8(DIFFICULTY_PEACEFUL);
    out
}

/// The `MC|Brand` plugin message identifying the server software.
#[must_use]
pub fn brand(brand: &str) -> Vec<u8> {
    let mut out = packet(clientbound::PLUGIN_MESSAGE);
    out.put_str("MC|Brand");
    out.put_str(brand);
    out
}

#[must_use]
pub fn disconnect(reason: &Text) -> Vec<u8> {
    let mut out = packet(clientbound::DISCONNECT);
    out.put_str(&reason.to_json());
    out
}

#[must_use]
pub fn keep_alive(id: i64) -> Vec<u8> {
    let mut out = packet(clientbound::KEEP_ALIVE);
    out.put_i64(id);
    out
}

/// A full synthetic column at the given chunk coordinates.
#[must_use]
pub fn chunk_data(chunk_x: i32, chunk_z: i32) -> Vec<u8> {
    let payload = chunk::column_payload();

    let mut out = packet(clientbound::CHUNK_DATA);
    out.put_i32(chunk_x);
    out.put_i32(chunk_z);
    out.put_bool(true);
    out.put_varint(chunk::SECTION_BITMASK);
    out.put_varint(payload.len() as u32);
    out.extend_from_slice(&payload);
    out.put_varint(0); // no block entities
    out
}

#[must_use]
pub fn join_game(entity_id: i32, max_players: u8) -> Vec<u8> {
    let mut out = packet(clientbound::JOIN_GAME);
    out.put_i32(entity_id);
    out.put_u8(GAMEMODE_CREATIVE);
    out.put_i32(DIMENSION_OVERWORLD);
    out.put_u8(DIFFICULTY_PEACEFUL);
    out.put_u8(max_players);
    out.put_str(LEVEL_TYPE);
    out.put_bool(false);
    out
}

#[must_use]
pub fn abilities() -> Vec<u8> {
    let mut out = packet(clientbound::ABILITIES);
    out.put_u8(ABILITY_FLAGS);
    out.put_f32(FLY_SPEED);
    out.put_f32(WALK_SPEED);
    out
}

#[must_use]
pub fn position_look(x: f64, y: f64, z: f64, teleport_id: u32) -> Vec<u8> {
    let mut out = packet(clientbound::POSITION_LOOK);
    out.put_f64(x);
    out.put_f64(y);
    out.put_f64(z);
    out.put_f32(0.0); // yaw
    out.put_f32(0.0); // pitch
    out.put_u8(0); // absolute coordinates
    out.put_varint(teleport_id);
    out
}

#[must_use]
pub fn spawn_position(x: i32, y: i32, z: i32) -> Vec<u8> {
    let mut out = packet(clientbound::SPAWN_POSITION);
    out.put_position(x, y, z);
    out
}

#[cfg(test)]
mod tests {
    use janus_codec::Reader;

    use super::*;

    #[test]
    fn join_game_field_order() {
        let body = join_game(7, 20);
        let mut reader = Reader::new(&body);
        assert_eq!(reader.get_varint().unwrap(), clientbound::JOIN_GAME);
        assert_eq!(reader.get_i32().unwrap(), 7);
        assert_eq!(reader.get_u8().unwrap(), GAMEMODE_CREATIVE);
        assert_eq!(reader.get_i32().unwrap(), DIMENSION_OVERWORLD);
        assert_eq!(reader.get_u8().unwrap(), DIFFICULTY_PEACEFUL);
        assert_eq!(reader.get_u8().unwrap(), 20);
        assert_eq!(reader.get_str().unwrap(), "flat");
        assert!(!reader.get_bool().unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn chunk_data_wraps_the_column_payload() {
        let body = chunk_data(-2, 1);
        let mut reader = Reader::new(&body);
        assert_eq!(reader.get_varint().unwrap(), clientbound::CHUNK_DATA);
        assert_eq!(reader.get_i32().unwrap(), -2);
        assert_eq!(reader.get_i32().unwrap(), 1);
        assert!(reader.get_bool().unwrap());
        assert_eq!(reader.get_varint().unwrap(), chunk::SECTION_BITMASK);

        let len = reader.get_varint().unwrap() as usize;
        assert_eq!(reader.take(len).unwrap().len(), len);
        assert_eq!(reader.get_varint().unwrap(), 0);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn keep_alive_carries_the_id() {
        let bytes = keep_alive(1234);
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.get_varint().unwrap(), clientbound::KEEP_ALIVE);
        assert_eq!(reader.get_i64().unwrap(), 1234);
    }

    #[test]
    fn chat_carries_json_and_chat_box_position() {
        let body = chat(&Text::plain("<steve> hi"));
        let mut reader = Reader::new(&body);
        assert_eq!(reader.get_varint().unwrap(), clientbound::CHAT);
        assert_eq!(reader.get_str().unwrap(), r#"{"text":"<steve> hi"}"#);
        assert_eq!(reader.get_u8().unwrap(), CHAT_BOX);
    }

    #[test]
    fn spawn_position_packs_coordinates() {
        let body = spawn_position(0, 64, 0);
        let mut reader = Reader::new(&body);
        assert_eq!(reader.get_varint().unwrap(), clientbound::SPAWN_POSITION);
        assert_eq!(reader.get_position().unwrap(), (0, 64, 0));
    }
}
