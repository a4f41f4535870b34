//! # chronofile — embedded storage engine for append-only, fixed-schema
//! time-series files
//!
//! Format guarantees:
//! - The header prefix is followed by a serializer-specific subheader and
//!   closed off by a CRC32 trailer; a checksum mismatch is reported before
//!   any other check runs.
//! - A type signature — a depth-first walk of the record's fields — is
//!   persisted alongside the record and re-checked on every open; a
//!   caller-supplied type map can authorize a named remapping.
//! - Two addressing schemes share one file engine: uniform files derive an
//!   ordinal from `(timestamp - T0) / delta`, indexed files binary-search
//!   a monotonic field carried in the record itself.
//! - The codec layer packs fields into self-describing, independently
//!   decodable blocks; a block never grows past its declared byte budget.

pub mod bitstream;
pub mod codec;
pub mod engine;
pub mod error;
pub mod framing;
pub mod header;
pub mod iter;
pub mod pool;
pub mod record;
pub mod recovery;
pub mod signature;

pub use codec::CodecKind;
pub use engine::compressed::CompressedUniformFile;
pub use engine::indexed::IndexedFile;
pub use engine::uniform::UniformFile;
pub use engine::{FileEngine, OpenReport};
pub use error::{CodecError, EngineError, HeaderError};
pub use record::{FieldValue, Record};
pub use recovery::{scan, RecoveryQuality, RecoveryReport};
pub use signature::{FieldDescriptor, FieldKind, RecordDescriptor, TypeMap, TypeSignature};

/// Installs a `tracing-subscriber` reading `RUST_LOG` (or `info` by
/// default). The library itself never installs a subscriber — only the
/// CLI binary does, at startup.
pub fn install_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
