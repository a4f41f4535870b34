//! Crate-facing error taxonomy.
//!
//! One `thiserror`-derived enum per failure boundary, mirroring the on-disk
//! layer each error originates from: header framing, the codec layer, and
//! the file engine (which wraps both). Exit-code mapping for the CLI lives
//! in `main.rs`, not here — this module is usable as a library independent
//! of the binary.

use thiserror::Error;

/// Failures from reading or writing the header prefix + subheader.
#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("bad magic signature — not a chronofile container")]
    BadMagic,
    #[error("unsupported file layout version {major}.{minor}")]
    VersionIncompatible { major: u16, minor: u16 },
    #[error("header_crc32 mismatch — header is corrupted")]
    HeaderCorrupt,
    #[error("persisted type signature does not match the record type")]
    SignatureMismatch,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from the bit-stream / field-codec layer.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("value cannot be represented in {bits} bits without precision loss")]
    PrecisionLoss { bits: u32 },
    #[error("bit stream block is full — codec-full, caller must close the block")]
    BlockFull,
    #[error("bit stream exhausted while reading")]
    Underrun,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from the file engine (open/append/read/truncate).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("header error: {0}")]
    Header(#[from] HeaderError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("record size changed — body is not a whole number of records")]
    RecordSizeChanged,
    #[error("io returned {got} bytes, expected {want}")]
    IoShortTransfer { want: usize, got: usize },
    #[error("timestamp is not aligned to the uniform step")]
    IndexMisaligned,
    #[error("append would break index monotonicity")]
    IndexNonMonotonic,
    #[error("truncate target {requested} exceeds current count {current}")]
    TruncateGrow { requested: u64, current: u64 },
    #[error("operation on a closed handle")]
    UseAfterDispose,
    #[error("field is fixed at file creation and cannot change")]
    StateInvalid,
    #[error("ordinal range out of bounds: {first}..{first}+{count} vs count {total}")]
    OutOfBounds { first: u64, count: u64, total: u64 },
    #[error("codec block frame truncated or corrupt")]
    BlockFrameCorrupt,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
