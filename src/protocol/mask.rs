//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is an XOR with a 4-byte key, so the same function both masks
//! outgoing client payloads and unmasks incoming ones.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time XOR masking.
///
/// Produces the same output as [`apply_mask`], processing four bytes per
/// step and finishing the tail byte by byte.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let key = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ key;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    // the tail always starts at a multiple of 4, so the key index restarts at 0
    apply_mask(chunks.into_remainder(), mask);
}
