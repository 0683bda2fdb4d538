//! Synthetic container files for unit tests.

use byteorder::{ByteOrder, LittleEndian};

use crate::checksum::checksum;
use crate::layout::{CLIENT_MAGIC, CRC_WINDOW_LEN, CRC_WINDOW_OFFSET, MAGIC, ROOT_OFFSET};

/// A buffer that passes every fixed pipeline stage: correct magic, client
/// magic, the given version, a root end-of-file field equal to `len`, and a
/// checksum computed over its own coverage window.
pub(crate) fn build(version: u16, len: usize) -> Vec<u8> {
    build_with_eof(version, len, len as u64)
}

/// Same, but with the root end-of-file field forced to `eof`.
pub(crate) fn build_with_eof(version: u16, len: usize, eof: u64) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    LittleEndian::write_u32(&mut buf[0..4], MAGIC);
    LittleEndian::write_u16(&mut buf[8..10], CLIENT_MAGIC);
    LittleEndian::write_u16(&mut buf[10..12], version);
    LittleEndian::write_u16(&mut buf[12..14], 19);
    buf[14] = 1; // created on Windows
    buf[15] = 1;

    let root = ROOT_OFFSET as usize;
    if version == 23 || version == 36 {
        LittleEndian::write_u64(&mut buf[root + 4..root + 12], eof);
    } else {
        LittleEndian::write_u32(&mut buf[root + 4..root + 8], eof as u32);
    }

    // The root record sits inside the coverage window, so the checksum goes
    // in last.
    let crc = checksum(&buf[CRC_WINDOW_OFFSET..CRC_WINDOW_OFFSET + CRC_WINDOW_LEN]);
    LittleEndian::write_u32(&mut buf[4..8], crc);
    buf
}
