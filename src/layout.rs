//! On-disk record layouts for the PST/OST container format.
//!
//! Everything here is a format fact: fixed sizes, fixed offsets, little-endian
//! fields, no padding.  Decoding is straight reinterpretation of a byte window
//! of the declared length — no validation logic lives in this module (that is
//! the validator's job, and it evolves independently of the layouts).
//!
//! ## File prefix
//!
//! ```text
//! Offset  Size  Field
//! 0x0000    4   Magic: 0x4E444221 ("!BDN")
//! 0x0004    4   Partial checksum over bytes [0x0008, 0x0008+471)
//! 0x0008    2   Client magic: 0x534D ("SM")
//! 0x000A    2   Format version: 14/15 (ANSI) or 23/36 (Unicode)
//! 0x000C    2   Client version
//! 0x000E    1   Platform that created the file
//! 0x000F    1   Platform that last accessed the file
//! 0x0010    4   Reserved
//! 0x0014    4   Reserved
//! 0x00A0    —   Root record (36 bytes ANSI, 68 bytes Unicode)
//! ```
//!
//! The header occupies the first 564 bytes of the file.  The format version
//! selects the field width for every record that follows: ANSI files use
//! 32-bit identifiers and offsets, Unicode files use 64-bit.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};
use thiserror::Error;

/// File magic, "!BDN" read as a little-endian u32.
pub const MAGIC: u32 = 0x4E44_4221;
/// Expected client magic, "SM" read as a little-endian u16.
pub const CLIENT_MAGIC: u16 = 0x534D;
/// Total size of the fixed header prefix.
pub const HEADER_SIZE: usize = 564;
/// Start of the partial-checksum coverage window.
pub const CRC_WINDOW_OFFSET: usize = 8;
/// Length of the partial-checksum coverage window.
pub const CRC_WINDOW_LEN: usize = 471;
/// Absolute offset of the root record.
pub const ROOT_OFFSET: u64 = 160;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("truncated {record} record: need {need} bytes, have {have}")]
    Truncated {
        record: &'static str,
        need: usize,
        have: usize,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Format version ───────────────────────────────────────────────────────────

/// The four known on-disk encodings, derived from the header version field.
///
/// The two ANSI versions and the two Unicode versions share field semantics
/// within their family; only the width class matters for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    Ansi14,
    Ansi15,
    Unicode,
    Unicode4k,
}

impl FormatVersion {
    pub fn from_wire(raw: u16) -> Option<Self> {
        match raw {
            14 => Some(FormatVersion::Ansi14),
            15 => Some(FormatVersion::Ansi15),
            23 => Some(FormatVersion::Unicode),
            36 => Some(FormatVersion::Unicode4k),
            _ => None,
        }
    }

    /// Unicode files use 64-bit identifiers and offsets; ANSI files 32-bit.
    pub fn is_wide(self) -> bool {
        matches!(self, FormatVersion::Unicode | FormatVersion::Unicode4k)
    }

    pub fn root_size(self) -> usize {
        if self.is_wide() {
            ROOT_SIZE_WIDE
        } else {
            ROOT_SIZE_NARROW
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FormatVersion::Ansi14 => "ANSI (version 14)",
            FormatVersion::Ansi15 => "ANSI (version 15)",
            FormatVersion::Unicode => "Unicode (version 23)",
            FormatVersion::Unicode4k => "Unicode 4K (version 36)",
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Typed view of the first 24 bytes of the header prefix.
///
/// The remaining bytes up to [`HEADER_SIZE`] carry the root record and index
/// bookkeeping; they stay raw here and are decoded separately.
#[derive(Debug, Clone)]
pub struct HeaderRecord {
    pub magic: u32,
    pub stored_crc: u32,
    pub client_magic: u16,
    pub version: u16,
    pub client_version: u16,
    pub platform_create: u8,
    pub platform_access: u8,
    pub reserved1: u32,
    pub reserved2: u32,
}

impl HeaderRecord {
    /// Decode from a window of at least [`HEADER_SIZE`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, LayoutError> {
        if buf.len() < HEADER_SIZE {
            return Err(LayoutError::Truncated {
                record: "header",
                need: HEADER_SIZE,
                have: buf.len(),
            });
        }
        let mut c = Cursor::new(buf);
        Ok(Self {
            magic: c.read_u32::<LittleEndian>()?,
            stored_crc: c.read_u32::<LittleEndian>()?,
            client_magic: c.read_u16::<LittleEndian>()?,
            version: c.read_u16::<LittleEndian>()?,
            client_version: c.read_u16::<LittleEndian>()?,
            platform_create: c.read_u8()?,
            platform_access: c.read_u8()?,
            reserved1: c.read_u32::<LittleEndian>()?,
            reserved2: c.read_u32::<LittleEndian>()?,
        })
    }
}

// ── Root record ──────────────────────────────────────────────────────────────

/// Root record size in ANSI files (32-bit fields, 8-byte index roots).
pub const ROOT_SIZE_NARROW: usize = 36;
/// Root record size in Unicode files (64-bit fields, 16-byte index roots).
pub const ROOT_SIZE_WIDE: usize = 68;

/// An index root reference: identifier plus absolute file offset.
///
/// ANSI files store both as u32, Unicode as u64; decoded values are widened
/// so callers never branch on the width class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRootEntry {
    pub id: u64,
    pub offset: u64,
}

/// Allocation and index bookkeeping at [`ROOT_OFFSET`].
///
/// Field order on disk: reserved word, end-of-file offset, offset of the last
/// allocation-map page, free bytes in the allocation map, free bytes in the
/// page map, block-index root, node-index root.
#[derive(Debug, Clone)]
pub struct RootRecord {
    pub reserved: u32,
    /// What the file believes its own length is.  Bookkeeping, not authority:
    /// real files drift from it without becoming unreadable.
    pub file_eof: u64,
    pub amap_last: u64,
    pub amap_free: u64,
    pub pmap_free: u64,
    pub block_index_root: IndexRootEntry,
    pub node_index_root: IndexRootEntry,
}

impl RootRecord {
    /// Decode from a window starting at the root record's first byte.
    pub fn decode(buf: &[u8], version: FormatVersion) -> Result<Self, LayoutError> {
        let need = version.root_size();
        if buf.len() < need {
            return Err(LayoutError::Truncated {
                record: "root",
                need,
                have: buf.len(),
            });
        }
        let mut c = Cursor::new(buf);
        let wide = version.is_wide();
        Ok(Self {
            reserved: c.read_u32::<LittleEndian>()?,
            file_eof: read_width(&mut c, wide)?,
            amap_last: read_width(&mut c, wide)?,
            amap_free: read_width(&mut c, wide)?,
            pmap_free: read_width(&mut c, wide)?,
            block_index_root: read_entry(&mut c, wide)?,
            node_index_root: read_entry(&mut c, wide)?,
        })
    }
}

fn read_width<R: Read>(r: &mut R, wide: bool) -> io::Result<u64> {
    if wide {
        r.read_u64::<LittleEndian>()
    } else {
        r.read_u32::<LittleEndian>().map(u64::from)
    }
}

fn read_entry<R: Read>(r: &mut R, wide: bool) -> io::Result<IndexRootEntry> {
    Ok(IndexRootEntry {
        id: read_width(r, wide)?,
        offset: read_width(r, wide)?,
    })
}

// ── Index entries ────────────────────────────────────────────────────────────
//
// Leaf shapes of the two index trees.  The trees themselves are not walked by
// the validator yet (see deep::IndexWalk); the shapes are declared here so a
// future walk decodes against the same layout source as everything else.

/// Block-index entry size in ANSI files.
pub const BLOCK_ENTRY_SIZE_NARROW: usize = 12;
/// Block-index entry size in Unicode files.
pub const BLOCK_ENTRY_SIZE_WIDE: usize = 20;
/// Node-index entry size in ANSI files.
pub const NODE_ENTRY_SIZE_NARROW: usize = 16;
/// Node-index entry size in Unicode files.
pub const NODE_ENTRY_SIZE_WIDE: usize = 32;

/// One block-index leaf: where a raw data block lives and how it is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEntry {
    pub block: IndexRootEntry,
    pub byte_count: u16,
    pub ref_count: u16,
}

impl BlockEntry {
    pub fn decode(buf: &[u8], version: FormatVersion) -> Result<Self, LayoutError> {
        let need = if version.is_wide() {
            BLOCK_ENTRY_SIZE_WIDE
        } else {
            BLOCK_ENTRY_SIZE_NARROW
        };
        if buf.len() < need {
            return Err(LayoutError::Truncated {
                record: "block entry",
                need,
                have: buf.len(),
            });
        }
        let mut c = Cursor::new(buf);
        let wide = version.is_wide();
        Ok(Self {
            block: read_entry(&mut c, wide)?,
            byte_count: c.read_u16::<LittleEndian>()?,
            ref_count: c.read_u16::<LittleEndian>()?,
        })
    }
}

/// One node-index leaf: a logical node and its data/sub-node blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEntry {
    pub node: u64,
    pub data_block: u64,
    pub subnode_block: u64,
    pub parent: u64,
}

impl NodeEntry {
    pub fn decode(buf: &[u8], version: FormatVersion) -> Result<Self, LayoutError> {
        let need = if version.is_wide() {
            NODE_ENTRY_SIZE_WIDE
        } else {
            NODE_ENTRY_SIZE_NARROW
        };
        if buf.len() < need {
            return Err(LayoutError::Truncated {
                record: "node entry",
                need,
                have: buf.len(),
            });
        }
        let mut c = Cursor::new(buf);
        let wide = version.is_wide();
        Ok(Self {
            node: read_width(&mut c, wide)?,
            data_block: read_width(&mut c, wide)?,
            subnode_block: read_width(&mut c, wide)?,
            parent: read_width(&mut c, wide)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};

    #[test]
    fn version_dispatch() {
        assert_eq!(FormatVersion::from_wire(14), Some(FormatVersion::Ansi14));
        assert_eq!(FormatVersion::from_wire(15), Some(FormatVersion::Ansi15));
        assert_eq!(FormatVersion::from_wire(23), Some(FormatVersion::Unicode));
        assert_eq!(FormatVersion::from_wire(36), Some(FormatVersion::Unicode4k));
        assert_eq!(FormatVersion::from_wire(0), None);
        assert_eq!(FormatVersion::from_wire(24), None);

        assert!(!FormatVersion::Ansi14.is_wide());
        assert!(!FormatVersion::Ansi15.is_wide());
        assert!(FormatVersion::Unicode.is_wide());
        assert!(FormatVersion::Unicode4k.is_wide());
    }

    #[test]
    fn header_decode_fields() {
        let mut buf = vec![0u8; HEADER_SIZE];
        {
            let mut w = &mut buf[..];
            w.write_u32::<LittleEndian>(MAGIC).unwrap();
            w.write_u32::<LittleEndian>(0xDEAD_BEEF).unwrap();
            w.write_u16::<LittleEndian>(CLIENT_MAGIC).unwrap();
            w.write_u16::<LittleEndian>(23).unwrap();
            w.write_u16::<LittleEndian>(19).unwrap();
            w.write_u8(1).unwrap();
            w.write_u8(1).unwrap();
        }
        let h = HeaderRecord::decode(&buf).unwrap();
        assert_eq!(h.magic, MAGIC);
        assert_eq!(h.stored_crc, 0xDEAD_BEEF);
        assert_eq!(h.client_magic, CLIENT_MAGIC);
        assert_eq!(h.version, 23);
        assert_eq!(h.client_version, 19);
        assert_eq!(h.platform_create, 1);
        assert_eq!(h.reserved1, 0);
    }

    #[test]
    fn header_decode_truncated() {
        let err = HeaderRecord::decode(&[0u8; HEADER_SIZE - 1]).unwrap_err();
        match err {
            LayoutError::Truncated { record, need, have } => {
                assert_eq!(record, "header");
                assert_eq!(need, HEADER_SIZE);
                assert_eq!(have, HEADER_SIZE - 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn root_narrow_widens_fields() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(0).unwrap(); // reserved
        buf.write_u32::<LittleEndian>(0x1000).unwrap(); // file_eof
        buf.write_u32::<LittleEndian>(0x0E00).unwrap(); // amap_last
        buf.write_u32::<LittleEndian>(64).unwrap(); // amap_free
        buf.write_u32::<LittleEndian>(0).unwrap(); // pmap_free
        buf.write_u32::<LittleEndian>(2).unwrap(); // block index id
        buf.write_u32::<LittleEndian>(0x200).unwrap(); // block index offset
        buf.write_u32::<LittleEndian>(1).unwrap(); // node index id
        buf.write_u32::<LittleEndian>(0x400).unwrap(); // node index offset
        assert_eq!(buf.len(), ROOT_SIZE_NARROW);

        let root = RootRecord::decode(&buf, FormatVersion::Ansi14).unwrap();
        assert_eq!(root.file_eof, 0x1000);
        assert_eq!(root.amap_last, 0x0E00);
        assert_eq!(root.amap_free, 64);
        assert_eq!(
            root.block_index_root,
            IndexRootEntry { id: 2, offset: 0x200 }
        );
        assert_eq!(
            root.node_index_root,
            IndexRootEntry { id: 1, offset: 0x400 }
        );
    }

    #[test]
    fn root_wide_full_width() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u64::<LittleEndian>(0x1_0000_0000).unwrap();
        buf.write_u64::<LittleEndian>(0xFFFF_E000).unwrap();
        buf.write_u64::<LittleEndian>(512).unwrap();
        buf.write_u64::<LittleEndian>(0).unwrap();
        buf.write_u64::<LittleEndian>(4).unwrap();
        buf.write_u64::<LittleEndian>(0x8000).unwrap();
        buf.write_u64::<LittleEndian>(3).unwrap();
        buf.write_u64::<LittleEndian>(0x9000).unwrap();
        assert_eq!(buf.len(), ROOT_SIZE_WIDE);

        let root = RootRecord::decode(&buf, FormatVersion::Unicode).unwrap();
        assert_eq!(root.file_eof, 0x1_0000_0000);
        assert_eq!(root.block_index_root.offset, 0x8000);
        assert_eq!(root.node_index_root.id, 3);
    }

    #[test]
    fn root_truncated_per_width() {
        // 36 bytes is a complete narrow root but a truncated wide one.
        let buf = vec![0u8; ROOT_SIZE_NARROW];
        assert!(RootRecord::decode(&buf, FormatVersion::Ansi15).is_ok());
        assert!(matches!(
            RootRecord::decode(&buf, FormatVersion::Unicode),
            Err(LayoutError::Truncated { record: "root", .. })
        ));
    }

    #[test]
    fn block_entry_decode() {
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(0x24).unwrap();
        buf.write_u64::<LittleEndian>(0x4000).unwrap();
        buf.write_u16::<LittleEndian>(8192).unwrap();
        buf.write_u16::<LittleEndian>(2).unwrap();
        assert_eq!(buf.len(), BLOCK_ENTRY_SIZE_WIDE);

        let e = BlockEntry::decode(&buf, FormatVersion::Unicode4k).unwrap();
        assert_eq!(e.block.id, 0x24);
        assert_eq!(e.block.offset, 0x4000);
        assert_eq!(e.byte_count, 8192);
        assert_eq!(e.ref_count, 2);

        assert!(matches!(
            BlockEntry::decode(&buf[..BLOCK_ENTRY_SIZE_NARROW - 1], FormatVersion::Ansi14),
            Err(LayoutError::Truncated { .. })
        ));
    }

    #[test]
    fn node_entry_decode() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(0x21).unwrap();
        buf.write_u32::<LittleEndian>(0x0180).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(0x122).unwrap();
        assert_eq!(buf.len(), NODE_ENTRY_SIZE_NARROW);

        let e = NodeEntry::decode(&buf, FormatVersion::Ansi14).unwrap();
        assert_eq!(e.node, 0x21);
        assert_eq!(e.data_block, 0x0180);
        assert_eq!(e.subnode_block, 0);
        assert_eq!(e.parent, 0x122);
    }
}
