use serde::Serialize;

/// Hash applied to a routing value before it is mapped onto a shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingHashFunction {
    /// Murmur3 x86_32 (seed 0) over the UTF-16 little-endian code units.
    #[default]
    Murmur3,
    /// Legacy DJB2 over UTF-16 code units, truncated to 32 bits.
    Djb,
}

impl RoutingHashFunction {
    pub fn hash(&self, routing: &str) -> i32 {
        match self {
            RoutingHashFunction::Murmur3 => {
                let bytes: Vec<u8> = routing.encode_utf16().flat_map(u16::to_le_bytes).collect();
                murmur3_x86_32(&bytes, 0) as i32
            }
            RoutingHashFunction::Djb => {
                let mut hash: i64 = 5381;
                for unit in routing.encode_utf16() {
                    hash = (hash << 5).wrapping_add(hash).wrapping_add(unit as i64);
                }
                hash as i32
            }
        }
    }
}

pub fn murmur3_x86_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h1 = seed;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k1 = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h1 ^= k1;
        h1 = h1.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k1 = 0u32;
        for (i, byte) in tail.iter().enumerate() {
            k1 |= (*byte as u32) << (8 * i);
        }
        k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85eb_ca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2_ae35);
    h1 ^= h1 >> 16;
    h1
}
