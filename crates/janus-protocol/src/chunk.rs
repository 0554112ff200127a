//! Synthetic chunk-column payloads.
//!
//! A connecting client needs renderable ground before the authoritative
//! simulation supplies real terrain, so every onboarding column is the same
//! minimal snapshot: one vertical section holding a single stone layer at
//! world height 64, fully lit, uniform biome. The payload here is the
//! section body of a full chunk-data packet; the packet builder adds the
//! coordinates and bitmask around it.

use janus_codec::WireWrite;

/// Only section 4 (world y 64..=79) is present.
pub const SECTION_BITMASK: u32 = 0x10;

const BITS_PER_BLOCK: u8 = 4;

/// Global palette ids for the two-entry section palette.
const PALETTE_AIR: u32 = 0;
const PALETTE_STONE: u32 = 1 << 4;

/// 16x16x16 blocks at 4 bits each packed into 64-bit words.
const DATA_LONGS: usize = 4096 * BITS_PER_BLOCK as usize / 64;

/// The bottom block layer of the section fills the first 16 data words.
const FLOOR_LONGS: usize = 256 * BITS_PER_BLOCK as usize / 64;

/// Every nibble set to palette index 1 (stone).
const FLOOR_WORD: u64 = 0x1111_1111_1111_1111;

const LIGHT_PLANE_BYTES: usize = 2048;
const BIOME_BYTES: usize = 256;
const BIOME_PLAINS: u8 = 1;

/// Encodes the section payload: palette, block data, block light, sky
/// light, biomes. Identical for every column.
pub(crate) fn column_payload() -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + DATA_LONGS * 8 + 2 * LIGHT_PLANE_BYTES + BIOME_BYTES);

    out.put_u8(BITS_PER_BLOCK);
    out.put_varint(2);
    out.put_varint(PALETTE_AIR);
    out.put_varint(PALETTE_STONE);

    out.put_varint(DATA_LONGS as u32);
    for i in 0..DATA_LONGS {
        let word = if i < FLOOR_LONGS { FLOOR_WORD } else { 0 };
        out.extend_from_slice(&word.to_be_bytes());
    }

    // Full brightness on both light planes.
    out.extend_from_slice(&[0xFF; LIGHT_PLANE_BYTES]);
    out.extend_from_slice(&[0xFF; LIGHT_PLANE_BYTES]);

    out.extend_from_slice(&[BIOME_PLAINS; BIOME_BYTES]);
    out
}

#[cfg(test)]
mod tests {
    use janus_codec::Reader;

    use super::*;

    #[test]
    fn payload_layout() {
        let payload = column_payload();
        let mut reader = Reader::new(&payload);

        assert_eq!(reader.get_u8().unwrap(), 4);
        assert_eq!(reader.get_varint().unwrap(), 2);
        assert_eq!(reader.get_varint().unwrap(), 0);
        assert_eq!(reader.get_varint().unwrap(), 16);
        assert_eq!(reader.get_varint().unwrap() as usize, DATA_LONGS);

        let data = reader.take(DATA_LONGS * 8).unwrap();
        // Stone floor in the first 16 words, air everywhere above.
        assert!(data[..FLOOR_LONGS * 8].iter().all(|&b| b == 0x11));
        assert!(data[FLOOR_LONGS * 8..].iter().all(|&b| b == 0));

        let light = reader.take(2 * LIGHT_PLANE_BYTES).unwrap();
        assert!(light.iter().all(|&b| b == 0xFF));

        let biomes = reader.take(BIOME_BYTES).unwrap();
        assert!(biomes.iter().all(|&b| b == BIOME_PLAINS));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn payload_is_fixed_size() {
        assert_eq!(column_payload().len(), 1 + 1 + 1 + 1 + 2 + 2048 + 2048 + 2048 + 256);
    }
}
