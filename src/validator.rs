//! The structural validation pipeline.
//!
//! # Stage order
//!
//! | Stage | Check | On failure |
//! |-------|-------|------------|
//! | Size | file length ≥ 564 | error, stop |
//! | Header | read + decode the 564-byte prefix | error, stop |
//! | Magic | magic == `0x4E444221` | error, stop |
//! | Version | version ∈ {14, 15, 23, 36} | error, stop |
//! | Client magic | client magic == `0x534D` | warning, continue |
//! | Checksum | recomputed over bytes [8, 479) == stored value | error, stop |
//! | Root | read + decode the root record at offset 160 | error, stop |
//! | EOF | root end-of-file field == actual file length | warning, continue |
//! | Deep | pluggable checks (index walk, allocation maps) | findings only |
//!
//! Stops are deliberate: a failed magic, version or checksum means every
//! later offset would be decoded against an untrustworthy layout.  Warnings
//! are bookkeeping drift that does not prevent further interpretation and
//! never flips the verdict.  The width class for the root record is fixed
//! once, right after the version stage.
//!
//! The pipeline never lets an error escape to the caller: I/O faults inside a
//! run are caught at the boundary and surfaced as a single error finding.

use log::debug;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::checksum::checksum;
use crate::deep::{self, DeepCheck, DeepContext};
use crate::findings::ValidationReport;
use crate::layout::{
    FormatVersion, HeaderRecord, RootRecord, CLIENT_MAGIC, CRC_WINDOW_LEN, CRC_WINDOW_OFFSET,
    HEADER_SIZE, MAGIC, ROOT_OFFSET,
};

/// Smallest file that can carry a complete header.
pub const MIN_FILE_SIZE: u64 = HEADER_SIZE as u64;

/// One validator, reusable across files.  Each run owns its own read handle
/// and its own report; runs on different files may proceed in parallel.
pub struct Validator {
    deep_checks: Vec<Box<dyn DeepCheck>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            deep_checks: deep::default_checks(),
        }
    }

    /// Replace the default deep checks.  An empty list skips the deep stage.
    pub fn with_checks(deep_checks: Vec<Box<dyn DeepCheck>>) -> Self {
        Self { deep_checks }
    }

    /// Validate the file at `path`.
    ///
    /// The file is opened read-only (shared access, never exclusive) and the
    /// handle is released on every exit path when it drops at the end of the
    /// run.  An unopenable or unstattable file yields a report with a single
    /// error finding, not an `Err`.
    pub fn validate_file<P: AsRef<Path>>(&self, path: P) -> ValidationReport {
        let path = path.as_ref();
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                let mut report = ValidationReport::new();
                report.error(format!("cannot open {}: {e}", path.display()));
                return report;
            }
        };
        let file_len = match file.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                let mut report = ValidationReport::new();
                report.error(format!("cannot stat {}: {e}", path.display()));
                return report;
            }
        };
        debug!("validating {} ({} bytes)", path.display(), file_len);
        self.validate(&mut file, file_len)
    }

    /// Validate an already-open byte source of known length.
    ///
    /// This is the core entry point: the caller supplies the handle and the
    /// length, the run returns a finished report and nothing else.
    pub fn validate<R: Read + Seek>(&self, reader: &mut R, file_len: u64) -> ValidationReport {
        let mut report = ValidationReport::new();
        if let Err(e) = self.run_pipeline(reader, file_len, &mut report) {
            // Unexpected I/O fault mid-run; one finding, never a raw error.
            report.error(format!("validation aborted by internal error: {e}"));
        }
        report
    }

    fn run_pipeline<R: Read + Seek>(
        &self,
        reader: &mut R,
        file_len: u64,
        report: &mut ValidationReport,
    ) -> io::Result<()> {
        // Size.
        if file_len < MIN_FILE_SIZE {
            report.error(format!(
                "file is {file_len} bytes, smaller than the {MIN_FILE_SIZE}-byte header"
            ));
            return Ok(());
        }

        // Header read + decode.
        reader.seek(SeekFrom::Start(0))?;
        let mut hdr = [0u8; HEADER_SIZE];
        if let Err(e) = reader.read_exact(&mut hdr) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                report.error("short read while loading the header");
                return Ok(());
            }
            return Err(e);
        }
        let header = match HeaderRecord::decode(&hdr) {
            Ok(h) => h,
            Err(e) => {
                report.error(format!("header decode failed: {e}"));
                return Ok(());
            }
        };

        // Magic.
        if header.magic != MAGIC {
            report.error("invalid magic signature");
            return Ok(());
        }

        // Version; fixes the width class for everything that follows.
        let version = match FormatVersion::from_wire(header.version) {
            Some(v) => v,
            None => {
                report.error(format!("unsupported format version {}", header.version));
                return Ok(());
            }
        };
        debug!("format: {}", version.name());

        // Client magic drifts in the wild without making the file unreadable.
        if header.client_magic != CLIENT_MAGIC {
            report.warning(format!(
                "unexpected client magic 0x{:04X} (expected 0x{:04X})",
                header.client_magic, CLIENT_MAGIC
            ));
        }

        // Header checksum over its fixed coverage window.
        let computed = checksum(&hdr[CRC_WINDOW_OFFSET..CRC_WINDOW_OFFSET + CRC_WINDOW_LEN]);
        if computed != header.stored_crc {
            report.error(format!(
                "header checksum mismatch: stored 0x{:08X}, computed 0x{:08X}",
                header.stored_crc, computed
            ));
            return Ok(());
        }

        // Root record.
        reader.seek(SeekFrom::Start(ROOT_OFFSET))?;
        let mut root_buf = vec![0u8; version.root_size()];
        if let Err(e) = reader.read_exact(&mut root_buf) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                report.error("short read while loading the root record");
                return Ok(());
            }
            return Err(e);
        }
        let root = match RootRecord::decode(&root_buf, version) {
            Ok(r) => r,
            Err(e) => {
                report.error(format!("root decode failed: {e}"));
                return Ok(());
            }
        };

        // EOF consistency.  Stale bookkeeping, not corruption.
        if root.file_eof != file_len {
            report.warning(format!(
                "end-of-file offset {} does not match actual file length {}",
                root.file_eof, file_len
            ));
        }

        // Deep checks.
        let ctx = DeepContext {
            header: &header,
            root: &root,
            file_len,
        };
        for check in &self.deep_checks {
            let findings = check.run(&ctx);
            debug!("deep check '{}': {} finding(s)", check.name(), findings.len());
            report.extend(findings);
        }

        Ok(())
    }
}
