//! The container format's 32-bit header checksum.
//!
//! This is the reflected table-driven CRC construction over the usual
//! polynomial 0xEDB88320, but with a zero initial state and no final
//! inversion — which is why an off-the-shelf CRC-32 (init 0xFFFFFFFF, final
//! XOR) does not reproduce the values stored in real files.  The table is a
//! compile-time constant; identical input windows always yield identical
//! checksums.

const POLYNOMIAL: u32 = 0xEDB8_8320;

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static TABLE: [u32; 256] = build_table();

/// Checksum an arbitrary byte window.
///
/// Callers select the window by slicing; an out-of-bounds window is a caller
/// bug and panics at the slice, it is never a validation finding.
pub fn checksum(data: &[u8]) -> u32 {
    let mut state = 0u32;
    for &byte in data {
        state = TABLE[((state ^ u32::from(byte)) & 0xFF) as usize] ^ (state >> 8);
    }
    state
}
