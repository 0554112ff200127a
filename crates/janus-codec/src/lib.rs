//! Stateless wire-primitive codec for the Java-style client protocol.
//!
//! Everything here is a pure transform between in-memory values and their
//! big-endian byte representation. No I/O happens in this crate; the session
//! layer feeds byte slices in and the packet layer builds byte vectors out.

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

/// Longest legal encoding of a 32-bit varint.
pub const MAX_VARINT_LEN: usize = 5;

/// Longest legal encoding of a 64-bit varlong.
pub const MAX_VARLONG_LEN: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of buffer: needed {needed} more bytes")]
    UnexpectedEof { needed: usize },

    #[error("varint continuation exceeds {MAX_VARINT_LEN} bytes")]
    VarIntTooLong,

    #[error("varlong continuation exceeds {MAX_VARLONG_LEN} bytes")]
    VarLongTooLong,

    #[error("string is not valid utf-8")]
    InvalidUtf8,

    #[error("invalid uuid string")]
    InvalidUuid,
}

/// Packs block coordinates into the 64-bit position representation:
/// 26 bits of x, 26 bits of z, 12 bits of y.
#[must_use]
pub const fn encode_position(x: i32, y: i32, z: i32) -> u64 {
    ((x as u64 & 0x3FF_FFFF) << 38) | ((z as u64 & 0x3FF_FFFF) << 12) | (y as u64 & 0xFFF)
}

/// Unpacks a 64-bit position. The 26-bit x/z fields are sign-extended;
/// y is an unsigned 12-bit field.
#[must_use]
pub const fn decode_position(value: u64) -> (i32, i32, i32) {
    let mut x = (value >> 38) as i64 & 0x3FF_FFFF;
    let mut z = (value >> 12) as i64 & 0x3FF_FFFF;
    let y = (value & 0xFFF) as i32;

    if x >= 0x200_0000 {
        x -= 0x400_0000;
    }
    if z >= 0x200_0000 {
        z -= 0x400_0000;
    }

    (x as i32, y, z as i32)
}

/// Formats 16 raw bytes as the canonical hyphenated `8-4-4-4-12` form.
/// No version/variant validation is performed; any bytes round-trip.
#[must_use]
pub fn uuid_to_string(bytes: &[u8; 16]) -> String {
    uuid::Uuid::from_bytes(*bytes).as_hyphenated().to_string()
}

/// Parses a canonical hyphenated uuid string back into its 16 raw bytes.
pub fn uuid_from_string(s: &str) -> Result<[u8; 16], CodecError> {
    uuid::Uuid::parse_str(s)
        .map(uuid::Uuid::into_bytes)
        .map_err(|_| CodecError::InvalidUuid)
}

/// Append-only wire encoding over a byte vector.
pub trait WireWrite {
    fn put_u8(&mut self, v: u8);
    fn put_bool(&mut self, v: bool);
    fn put_i16(&mut self, v: i16);
    fn put_u16(&mut self, v: u16);
    fn put_i32(&mut self, v: i32);
    fn put_i64(&mut self, v: i64);
    fn put_f32(&mut self, v: f32);
    fn put_f64(&mut self, v: f64);

    /// Minimal-length 7-bits-per-byte encoding of an unsigned 32-bit value.
    fn put_varint(&mut self, v: u32);

    /// Minimal-length 7-bits-per-byte encoding of an unsigned 64-bit value.
    fn put_varlong(&mut self, v: u64);

    /// Varint byte length followed by the raw utf-8 bytes.
    fn put_str(&mut self, s: &str);

    fn put_position(&mut self, x: i32, y: i32, z: i32);
    fn put_uuid(&mut self, uuid: &uuid::Uuid);
}

impl WireWrite for Vec<u8> {
    fn put_u8(&mut self, v: u8) {
        self.push(v);
    }

    fn put_bool(&mut self, v: bool) {
        self.push(u8::from(v));
    }

    fn put_i16(&mut self, v: i16) {
        self.extend_from_slice(&v.to_be_bytes());
    }

    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_be_bytes());
    }

    fn put_i32(&mut self, v: i32) {
        self.extend_from_slice(&v.to_be_bytes());
    }

    fn put_i64(&mut self, v: i64) {
        self.extend_from_slice(&v.to_be_bytes());
    }

    fn put_f32(&mut self, v: f32) {
        self.extend_from_slice(&v.to_be_bytes());
    }

    fn put_f64(&mut self, v: f64) {
        self.extend_from_slice(&v.to_be_bytes());
    }

    fn put_varint(&mut self, mut v: u32) {
        loop {
            let byte = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                self.push(byte);
                return;
            }
            self.push(byte | 0x80);
        }
    }

    fn put_varlong(&mut self, mut v: u64) {
        loop {
            let byte = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                self.push(byte);
                return;
            }
            self.push(byte | 0x80);
        }
    }

    fn put_str(&mut self, s: &str) {
        self.put_varint(s.len() as u32);
        self.extend_from_slice(s.as_bytes());
    }

    fn put_position(&mut self, x: i32, y: i32, z: i32) {
        self.extend_from_slice(&encode_position(x, y, z).to_be_bytes());
    }

    fn put_uuid(&mut self, uuid: &uuid::Uuid) {
        self.extend_from_slice(uuid.as_bytes());
    }
}

/// Cursor over a received byte slice. All reads fail with
/// [`CodecError::UnexpectedEof`] on truncated input instead of panicking.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Consumes and returns the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof {
                needed: n - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Consumes and returns everything left in the buffer.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_i16(&mut self) -> Result<i16, CodecError> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn get_i32(&mut self) -> Result<i32, CodecError> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn get_i64(&mut self) -> Result<i64, CodecError> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    pub fn get_f32(&mut self) -> Result<f32, CodecError> {
        Ok(BigEndian::read_f32(self.take(4)?))
    }

    pub fn get_f64(&mut self) -> Result<f64, CodecError> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }

    /// Decodes a varint, stopping at the first byte with a clear
    /// continuation bit.
    pub fn get_varint(&mut self) -> Result<u32, CodecError> {
        let mut value: u32 = 0;
        for shift in 0..MAX_VARINT_LEN {
            let byte = self.get_u8()?;
            value |= u32::from(byte & 0x7F) << (shift * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::VarIntTooLong)
    }

    pub fn get_varlong(&mut self) -> Result<u64, CodecError> {
        let mut value: u64 = 0;
        for shift in 0..MAX_VARLONG_LEN {
            let byte = self.get_u8()?;
            value |= u64::from(byte & 0x7F) << (shift * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::VarLongTooLong)
    }

    pub fn get_str(&mut self) -> Result<&'a str, CodecError> {
        let len = self.get_varint()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn get_position(&mut self) -> Result<(i32, i32, i32), CodecError> {
        let raw = BigEndian::read_u64(self.take(8)?);
        Ok(decode_position(raw))
    }

    pub fn get_uuid(&mut self) -> Result<uuid::Uuid, CodecError> {
        let bytes: [u8; 16] = self.take(16)?.try_into().map_err(|_| CodecError::InvalidUuid)?;
        Ok(uuid::Uuid::from_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn varint_bytes(v: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.put_varint(v);
        out
    }

    #[test]
    fn varint_known_vectors() {
        assert_eq!(varint_bytes(0), [0x00]);
        assert_eq!(varint_bytes(1), [0x01]);
        assert_eq!(varint_bytes(127), [0x7F]);
        assert_eq!(varint_bytes(128), [0x80, 0x01]);
        assert_eq!(varint_bytes(255), [0xFF, 0x01]);
        assert_eq!(varint_bytes(300), [0xAC, 0x02]);
        assert_eq!(varint_bytes(u32::MAX), [0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn varint_is_minimal_length() {
        // The encoding must use exactly as many bytes as the value needs.
        for (value, len) in [
            (0u32, 1),
            (0x7F, 1),
            (0x80, 2),
            (0x3FFF, 2),
            (0x4000, 3),
            (0x1F_FFFF, 3),
            (0x20_0000, 4),
            (0xFFF_FFFF, 4),
            (0x1000_0000, 5),
            (u32::MAX, 5),
        ] {
            assert_eq!(varint_bytes(value).len(), len, "value {value:#x}");
        }
    }

    #[test]
    fn varint_truncated_is_an_error() {
        let mut reader = Reader::new(&[0x80]);
        assert_eq!(
            reader.get_varint(),
            Err(CodecError::UnexpectedEof { needed: 1 })
        );
    }

    #[test]
    fn varint_overlong_is_an_error() {
        let mut reader = Reader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert_eq!(reader.get_varint(), Err(CodecError::VarIntTooLong));
    }

    #[test]
    fn position_sign_extension() {
        let cases = [
            (0, 0, 0),
            (1, 64, 1),
            (-1, 0, -1),
            (-33_554_432, 4095, 33_554_431),
            (33_554_431, 1, -33_554_432),
        ];
        for (x, y, z) in cases {
            assert_eq!(decode_position(encode_position(x, y, z)), (x, y, z));
        }
    }

    #[test]
    fn uuid_string_form() {
        let bytes = [
            0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
            0x77, 0x88,
        ];
        assert_eq!(uuid_to_string(&bytes), "12345678-9abc-def0-1122-334455667788");
        assert_eq!(uuid_from_string(&uuid_to_string(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn fixed_width_round_trip() {
        let mut buf = Vec::new();
        buf.put_i16(-1234);
        buf.put_u16(40_000);
        buf.put_i32(-7);
        buf.put_i64(1 << 40);
        buf.put_f32(0.05);
        buf.put_f64(8.5);
        buf.put_bool(true);

        let mut reader = Reader::new(&buf);
        assert_eq!(reader.get_i16().unwrap(), -1234);
        assert_eq!(reader.get_u16().unwrap(), 40_000);
        assert_eq!(reader.get_i32().unwrap(), -7);
        assert_eq!(reader.get_i64().unwrap(), 1 << 40);
        assert_eq!(reader.get_f32().unwrap(), 0.05);
        assert_eq!(reader.get_f64().unwrap(), 8.5);
        assert!(reader.get_bool().unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    proptest! {
        #[test]
        fn varint_round_trip(v in any::<u32>()) {
            let bytes = varint_bytes(v);
            let mut reader = Reader::new(&bytes[..]);
            prop_assert_eq!(reader.get_varint().unwrap(), v);
            prop_assert_eq!(reader.remaining(), 0);
        }

        #[test]
        fn varlong_round_trip(v in any::<u64>()) {
            let mut buf = Vec::new();
            buf.put_varlong(v);
            let mut reader = Reader::new(&buf);
            prop_assert_eq!(reader.get_varlong().unwrap(), v);
            prop_assert_eq!(reader.remaining(), 0);
        }

        #[test]
        fn position_round_trip(
            x in -0x200_0000i32..0x200_0000i32,
            y in 0i32..4096,
            z in -0x200_0000i32..0x200_0000i32,
        ) {
            prop_assert_eq!(decode_position(encode_position(x, y, z)), (x, y, z));
        }

        #[test]
        fn uuid_round_trip(bytes in any::<[u8; 16]>()) {
            let s = uuid_to_string(&bytes);
            prop_assert_eq!(uuid_from_string(&s).unwrap(), bytes);
        }

        #[test]
        fn string_round_trip(s in "\\PC{0,256}") {
            let mut buf = Vec::new();
            buf.put_str(&s);
            let mut reader = Reader::new(&buf);
            prop_assert_eq!(reader.get_str().unwrap(), s);
        }
    }
}
