//! Login-phase packets.

use janus_codec::WireWrite;
use janus_text::Text;
use uuid::Uuid;

use super::packet;

pub mod serverbound {
    pub const LOGIN_START: u32 = 0x00;
}

pub mod clientbound {
    pub const DISCONNECT: u32 = 0x00;
    pub const SUCCESS: u32 = 0x02;
    pub const SET_COMPRESSION: u32 = 0x03;
}

#[must_use]
pub fn disconnect(reason: &Text) -> Vec<u8> {
    let mut out = packet(clientbound::DISCONNECT);
    out.put_str(&reason.to_json());
    out
}

#[must_use]
pub fn success(uuid: &Uuid, username: &str) -> Vec<u8> {
    let mut out = packet(clientbound::SUCCESS);
    out.put_str(&uuid.as_hyphenated().to_string());
    out.put_str(username);
    out
}

#[must_use]
pub fn set_compression(threshold: i32) -> Vec<u8> {
    let mut out = packet(clientbound::SET_COMPRESSION);
    out.put_varint(threshold as u32);
    out
}

#[cfg(test)]
mod tests {
    use janus_codec::Reader;

    use super::*;

    #[test]
    fn success_carries_hyphenated_uuid_then_name() {
        let uuid = crate::offline_uuid("steve");
        let body = success(&uuid, "steve");

        let mut reader = Reader::new(&body);
        assert_eq!(reader.get_varint().unwrap(), clientbound::SUCCESS);
        assert_eq!(reader.get_str().unwrap(), uuid.as_hyphenated().to_string());
        assert_eq!(reader.get_str().unwrap(), "steve");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn set_compression_carries_the_threshold() {
        let bytes = set_compression(256);
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.get_varint().unwrap(), clientbound::SET_COMPRESSION);
        assert_eq!(reader.get_varint().unwrap(), 256);
    }

    #[test]
    fn disconnect_carries_json_text() {
        let body = disconnect(&Text::plain("nope"));
        let mut reader = Reader::new(&body);
        assert_eq!(reader.get_varint().unwrap(), clientbound::DISCONNECT);
        assert_eq!(reader.get_str().unwrap(), r#"{"text":"nope"}"#);
    }
}
