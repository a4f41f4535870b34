//! Read-only diagnostic scan: reports header/body health without mutating
//! the file, for the CLI's `scan`/`doctor` subcommand.

use crate::header::Header;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::instrument;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum RecoveryQuality {
    /// Header checksum valid, body is a whole number of records.
    Healthy,
    /// Header valid but the tail has `residual_bytes` beyond the last
    /// whole record; body would be refused as `record-size-changed`.
    TailTruncated { residual_bytes: u64 },
    /// Header checksum mismatch — the file cannot be opened at all.
    HeaderCorrupt,
    /// Magic signature or version is unrecognized.
    NotAChronofile,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecoveryReport {
    pub quality: RecoveryQuality,
    pub record_size: Option<u32>,
    pub body_len: Option<u64>,
    pub count: Option<u64>,
}

/// Scans `path` without ever writing to it. Distinguishes a corrupt
/// header (fatal, nothing past it is trustworthy) from a merely truncated
/// tail (recoverable by rounding down, as `FileEngine::open` already does).
#[instrument]
pub fn scan(path: &Path) -> std::io::Result<RecoveryReport> {
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let header = match Header::read(&mut file) {
        Ok(h) => h,
        Err(crate::error::HeaderError::HeaderCorrupt) => {
            return Ok(RecoveryReport {
                quality: RecoveryQuality::HeaderCorrupt,
                record_size: None,
                body_len: None,
                count: None,
            })
        }
        Err(_) => {
            return Ok(RecoveryReport {
                quality: RecoveryQuality::NotAChronofile,
                record_size: None,
                body_len: None,
                count: None,
            })
        }
    };

    use std::io::{Seek, SeekFrom};
    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; 4];
    std::io::Read::read_exact(&mut file, &mut buf)?;
    file.seek(SeekFrom::Start(4))?;
    let mut len_buf = [0u8; 4];
    std::io::Read::read_exact(&mut file, &mut len_buf)?;
    let header_length = u32::from_ne_bytes(len_buf) as u64;

    let body_len = file_len.saturating_sub(header_length);
    let record_size = header.record_size as u64;
    let residual = if record_size > 0 { body_len % record_size } else { 0 };
    let count = if record_size > 0 { body_len / record_size } else { 0 };

    let quality = if residual == 0 {
        RecoveryQuality::Healthy
    } else {
        RecoveryQuality::TailTruncated { residual_bytes: residual }
    };

    Ok(RecoveryReport {
        quality,
        record_size: Some(header.record_size),
        body_len: Some(body_len),
        count: Some(count),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FileEngine;
    use crate::record::fixtures::Tick;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn healthy_file_reports_healthy() {
        let tmp = NamedTempFile::new().unwrap();
        let mut engine = FileEngine::<Tick>::create(tmp.path(), "uniform", vec![0u8; 16]).unwrap();
        engine.write_range(0, &[Tick { i: 1 }, Tick { i: 2 }]).unwrap();
        engine.close().unwrap();

        let report = scan(tmp.path()).unwrap();
        assert_eq!(report.quality, RecoveryQuality::Healthy);
        assert_eq!(report.count, Some(2));
    }

    #[test]
    fn truncated_tail_is_reported_not_refused() {
        let tmp = NamedTempFile::new().unwrap();
        let mut engine = FileEngine::<Tick>::create(tmp.path(), "uniform", vec![0u8; 16]).unwrap();
        engine.write_range(0, &[Tick { i: 1 }, Tick { i: 2 }]).unwrap();
        engine.close().unwrap();

        // chop off half of the last record
        let len = std::fs::metadata(tmp.path()).unwrap().len();
        let f = std::fs::OpenOptions::new().write(true).open(tmp.path()).unwrap();
        f.set_len(len - 4).unwrap();
        drop(f);

        let report = scan(tmp.path()).unwrap();
        assert!(matches!(report.quality, RecoveryQuality::TailTruncated { residual_bytes } if residual_bytes == 4));
    }

    #[test]
    fn corrupt_header_is_reported_as_such() {
        let tmp = NamedTempFile::new().unwrap();
        let engine = FileEngine::<Tick>::create(tmp.path(), "uniform", vec![0u8; 16]).unwrap();
        drop(engine);

        let mut bytes = std::fs::read(tmp.path()).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let mut f = std::fs::OpenOptions::new().write(true).open(tmp.path()).unwrap();
        f.write_all(&bytes).unwrap();

        let report = scan(tmp.path()).unwrap();
        assert_eq!(report.quality, RecoveryQuality::HeaderCorrupt);
    }
}
