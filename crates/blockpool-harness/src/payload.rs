//! Fixed-layout records stored in pool blocks.
//!
//! Scenarios write these into freshly allocated blocks to prove the memory
//! is usable and not shared between owners.

#![allow(unsafe_code)]

use blockpool_core::Block;

/// Bytes of an encoded [`Point`]: two `i32` plus ten `f32`.
pub const POINT_SIZE: usize = 48;

/// Bytes of an encoded [`Record`]: `i32` id, `f64` value, 32-byte description.
pub const RECORD_SIZE: usize = 44;

const DESCRIPTION_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
    pub data: [f32; 10],
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            data: [0.0; 10],
        }
    }

    pub fn encode(&self) -> [u8; POINT_SIZE] {
        let mut out = [0_u8; POINT_SIZE];
        out[0..4].copy_from_slice(&self.x.to_le_bytes());
        out[4..8].copy_from_slice(&self.y.to_le_bytes());
        for (i, value) in self.data.iter().enumerate() {
            let at = 8 + i * 4;
            out[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < POINT_SIZE {
            return None;
        }
        let word = |at: usize| [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
        let mut data = [0.0_f32; 10];
        for (i, slot) in data.iter_mut().enumerate() {
            *slot = f32::from_le_bytes(word(8 + i * 4));
        }
        Some(Self {
            x: i32::from_le_bytes(word(0)),
            y: i32::from_le_bytes(word(4)),
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i32,
    pub value: f64,
    pub description: String,
}

impl Record {
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0_u8; RECORD_SIZE];
        out[0..4].copy_from_slice(&self.id.to_le_bytes());
        out[4..12].copy_from_slice(&self.value.to_le_bytes());
        // NUL-terminated, truncated like a C char[32].
        let text = self.description.as_bytes();
        let len = text.len().min(DESCRIPTION_LEN - 1);
        out[12..12 + len].copy_from_slice(&text[..len]);
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < RECORD_SIZE {
            return None;
        }
        let mut id = [0_u8; 4];
        id.copy_from_slice(&bytes[0..4]);
        let mut value = [0_u8; 8];
        value.copy_from_slice(&bytes[4..12]);
        let text = &bytes[12..12 + DESCRIPTION_LEN];
        let end = text.iter().position(|&b| b == 0).unwrap_or(DESCRIPTION_LEN);
        Some(Self {
            id: i32::from_le_bytes(id),
            value: f64::from_le_bytes(value),
            description: String::from_utf8_lossy(&text[..end]).into_owned(),
        })
    }
}

/// Copy `payload` to the start of `block`.
///
/// Callers in this crate pass only blocks they allocated, still hold, and
/// whose pool is alive.
///
/// # Panics
///
/// If `payload` is larger than the block.
pub(crate) fn write(block: Block, payload: &[u8]) {
    assert!(payload.len() <= block.size(), "payload larger than block");
    // SAFETY: the block is live and exclusively held by the caller (see above).
    let bytes = unsafe { block.as_mut_slice() };
    bytes[..payload.len()].copy_from_slice(payload);
}

/// Copy the first `len` bytes of `block`. Same caller contract as [`write`].
pub(crate) fn read(block: Block, len: usize) -> Vec<u8> {
    // SAFETY: the block is live and exclusively held by the caller.
    let bytes = unsafe { block.as_slice() };
    bytes[..len.min(bytes.len())].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockpool_core::FixedBlockPool;

    #[test]
    fn point_round_trip() {
        let mut point = Point::new(10, -20);
        point.data[9] = 1.5;
        let decoded = Point::decode(&point.encode()).unwrap();
        assert_eq!(decoded, point);
    }

    #[test]
    fn record_truncates_description() {
        let record = Record {
            id: 7,
            value: 2.5,
            description: "x".repeat(40),
        };
        let decoded = Record::decode(&record.encode()).unwrap();
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.value, 2.5);
        assert_eq!(decoded.description.len(), DESCRIPTION_LEN - 1);
    }

    #[test]
    fn payload_lands_in_block() {
        let mut pool = FixedBlockPool::new(POINT_SIZE, 2).unwrap();
        let block = pool.allocate().unwrap();
        write(block, &Point::new(3, 4).encode());
        let back = Point::decode(&read(block, POINT_SIZE)).unwrap();
        assert_eq!((back.x, back.y), (3, 4));
        pool.deallocate(block);
    }

    #[test]
    #[should_panic(expected = "payload larger than block")]
    fn oversized_payload_panics() {
        let mut pool = FixedBlockPool::new(16, 1).unwrap();
        let block = pool.allocate().unwrap();
        write(block, &[0_u8; 17]);
    }
}
