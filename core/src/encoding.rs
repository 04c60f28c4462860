//! Fixed-width codecs for everything the store keeps as raw bytes: ids,
//! counters, term frequencies, weights, and token-position lists.

/// Big-endian so lexicographic key order matches numeric order.
pub fn u64_to_bytes(v: u64) -> [u8; 8] {
    v.to_be_bytes()
}

pub fn bytes_to_u64(bytes: &[u8]) -> u64 {
    bytes.try_into().map(u64::from_be_bytes).unwrap_or(0)
}

pub fn i64_to_bytes(v: i64) -> [u8; 8] {
    v.to_be_bytes()
}

pub fn bytes_to_i64(bytes: &[u8]) -> i64 {
    bytes.try_into().map(i64::from_be_bytes).unwrap_or(0)
}

pub fn f64_to_bytes(v: f64) -> [u8; 8] {
    v.to_bits().to_be_bytes()
}

pub fn bytes_to_f64(bytes: &[u8]) -> f64 {
    f64::from_bits(bytes_to_u64(bytes))
}

/// Sub-bucket keys: 8-byte parent id followed by 8-byte child id.
pub fn composite_key(parent: u64, child: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&parent.to_be_bytes());
    key[8..].copy_from_slice(&child.to_be_bytes());
    key
}

pub fn split_composite(key: &[u8]) -> Option<(u64, u64)> {
    if key.len() != 16 {
        return None;
    }
    Some((bytes_to_u64(&key[..8]), bytes_to_u64(&key[8..])))
}

/// Position lists are stored as comma-joined decimals.
pub fn positions_to_bytes(positions: &[u32]) -> Vec<u8> {
    positions
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
        .into_bytes()
}

pub fn bytes_to_positions(bytes: &[u8]) -> Vec<u32> {
    let text = String::from_utf8_lossy(bytes);
    text.split(',').filter_map(|p| p.parse().ok()).collect()
}
