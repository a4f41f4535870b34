//! File header: the fixed prefix plus a serializer-specific subheader,
//! closed off by a CRC32 trailer over everything that came before it.
//!
//! ```text
//! 0       4     magic signature
//! 4       4     headerLength (i32, >= 32)
//! 8       4     recordSize   (i32, > 0)
//! 12      2+2   versionMajor, versionMinor
//! 16      ...   varint-length-prefixed UTF-8 tag
//! ...     ...   varint-length-prefixed UTF-8 fully-qualified type name
//! ...     ...   subheader bytes (serializer-specific)
//! ...     4     header_crc32 (CRC32 of all preceding header bytes)
//! ```
//!
//! `header_crc32` is checked before the magic/signature/body-size checks —
//! a header that fails its own checksum is corrupt, not merely mismatched,
//! and every other diagnosis built on top of a corrupt header would be
//! noise. Grounded on the teacher's `Superblock` CRC32-last-field
//! convention (crc32fast over everything but the trailer itself).

use crate::error::HeaderError;
use crate::framing::{read_string, read_uvarint, write_string, write_uvarint};
use byteorder::{NativeEndian, ReadBytesExt};
use crc32fast::Hasher;
use std::io::{self, Read, Seek, SeekFrom, Write};

pub const MAGIC: &[u8; 4] = b"CHRN";
pub const MIN_HEADER_LENGTH: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const CURRENT: Version = Version { major: 1, minor: 1 };
    pub const V1_0: Version = Version { major: 1, minor: 0 };
}

/// The fixed prefix plus whatever subheader bytes a serializer (uniform
/// T0/delta, raw type signature, ...) attaches after it.
#[derive(Debug, Clone)]
pub struct Header {
    pub record_size: u32,
    pub version: Version,
    pub tag: String,
    pub type_name: String,
    pub subheader: Vec<u8>,
    /// Total header length in bytes, including the CRC trailer. Set by
    /// `write`/`read`; a freshly-constructed `Header` has this at 0 until
    /// one of those runs.
    pub header_length: u32,
}

impl Header {
    /// Write the full header (prefix + subheader + CRC trailer) at the
    /// current position, returning the total header length written.
    pub fn write<W: Write>(&self, mut w: W) -> Result<u32, HeaderError> {
        let mut body = Vec::new();
        body.extend_from_slice(MAGIC);
        body.extend_from_slice(&[0u8; 4]); // headerLength placeholder, patched below
        body.extend_from_slice(&self.record_size.to_ne_bytes());
        body.extend_from_slice(&self.version.major.to_ne_bytes());
        body.extend_from_slice(&self.version.minor.to_ne_bytes());
        write_string(&mut body, &self.tag).map_err(HeaderError::Io)?;
        write_string(&mut body, &self.type_name).map_err(HeaderError::Io)?;
        body.extend_from_slice(&self.subheader);

        let header_length = (body.len() + 4) as u32; // + CRC trailer
        body[4..8].copy_from_slice(&header_length.to_ne_bytes());

        let mut hasher = Hasher::new();
        hasher.update(&body);
        let crc = hasher.finalize();
        body.extend_from_slice(&crc.to_ne_bytes());

        w.write_all(&body).map_err(HeaderError::Io)?;
        Ok(header_length)
    }

    /// Read and fully validate a header at the current position: magic,
    /// CRC32 trailer (checked before anything else derived from the
    /// bytes it covers), then record size and version.
    pub fn read<R: Read + Seek>(mut r: R) -> Result<Self, HeaderError> {
        let start = r.stream_position().map_err(HeaderError::Io)?;

        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(HeaderError::Io)?;
        if &magic != MAGIC {
            return Err(HeaderError::BadMagic);
        }
        let header_length = r.read_u32::<NativeEndian>().map_err(HeaderError::Io)?;
        if header_length < MIN_HEADER_LENGTH {
            return Err(HeaderError::HeaderCorrupt);
        }

        r.seek(SeekFrom::Start(start)).map_err(HeaderError::Io)?;
        let mut raw = vec![0u8; header_length as usize];
        r.read_exact(&mut raw).map_err(HeaderError::Io)?;

        let trailer_at = raw.len() - 4;
        let stored_crc = u32::from_ne_bytes(raw[trailer_at..].try_into().unwrap());
        let mut hasher = Hasher::new();
        hasher.update(&raw[..trailer_at]);
        if hasher.finalize() != stored_crc {
            return Err(HeaderError::HeaderCorrupt);
        }

        let mut cursor = io::Cursor::new(&raw[8..trailer_at]);
        let record_size = cursor.read_u32::<NativeEndian>().map_err(HeaderError::Io)?;
        let major = cursor.read_u16::<NativeEndian>().map_err(HeaderError::Io)?;
        let minor = cursor.read_u16::<NativeEndian>().map_err(HeaderError::Io)?;
        let version = Version { major, minor };
        if version.major != Version::CURRENT.major {
            return Err(HeaderError::VersionIncompatible { major, minor });
        }
        let tag = read_string(&mut cursor).map_err(HeaderError::Io)?;
        let type_name = read_string(&mut cursor).map_err(HeaderError::Io)?;
        let subheader_start = cursor.position() as usize;
        let subheader = raw[8 + subheader_start..trailer_at].to_vec();

        Ok(Header { record_size, version, tag, type_name, subheader, header_length })
    }
}

/// Append-only helpers for the two subheader shapes the engine uses.
/// Kept here rather than in `engine/` since both read and write sides
/// need to agree on field order without depending on each other.
pub mod subheader {
    use super::*;

    /// v1.1 uniform subheader: `int64 delta-ticks`, `int64 T0-ticks`.
    pub fn write_uniform(delta_ticks: i64, t0_ticks: i64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&delta_ticks.to_ne_bytes());
        buf.extend_from_slice(&t0_ticks.to_ne_bytes());
        buf
    }

    /// Reads either the v1.1 `(delta, T0)` shape or, when `version` is
    /// `1.0`, the legacy `(delta, DateTime.ToBinary())` shape and converts
    /// the packed binary timestamp into ticks-since-epoch.
    pub fn read_uniform(version: Version, bytes: &[u8]) -> Result<(i64, i64), HeaderError> {
        if bytes.len() < 16 {
            return Err(HeaderError::HeaderCorrupt);
        }
        let delta_ticks = i64::from_ne_bytes(bytes[0..8].try_into().unwrap());
        let second = i64::from_ne_bytes(bytes[8..16].try_into().unwrap());
        let t0_ticks = if version.minor == 0 {
            datetime_to_binary_to_ticks(second)
        } else {
            second
        };
        Ok((delta_ticks, t0_ticks))
    }

    /// .NET's `DateTime.ToBinary()` packs a `DateTimeKind` into the top two
    /// bits and the tick count (100ns units since 0001-01-01) into the
    /// rest. A v1.0 file's T0 was always written in UTC, so only the tick
    /// field matters here.
    fn datetime_to_binary_to_ticks(binary: i64) -> i64 {
        binary & 0x3FFF_FFFF_FFFF_FFFF
    }

    /// Raw-serializer subheader: `int32 recordSize-echo`, `int32
    /// signatureLen`, then the flattened `(depth, typeTag)` pairs.
    pub fn write_signature(record_size: u32, sig: &crate::signature::TypeSignature) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&record_size.to_ne_bytes());
        write_uvarint(&mut buf, sig.entries.len() as u64)?;
        for e in &sig.entries {
            write_uvarint(&mut buf, e.depth as u64)?;
            write_string(&mut buf, &e.type_tag)?;
        }
        Ok(buf)
    }

    /// Returns the parsed `(recordSize, signature)` plus how many bytes of
    /// `bytes` the signature consumed, so a caller carrying extra
    /// serializer-specific fields after it (uniform T0/delta) knows where
    /// those begin.
    pub fn read_signature(bytes: &[u8]) -> io::Result<(u32, crate::signature::TypeSignature, usize)> {
        let mut cursor = io::Cursor::new(bytes);
        let record_size = cursor.read_u32::<NativeEndian>()?;
        let count = read_uvarint(&mut cursor)? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let depth = read_uvarint(&mut cursor)? as u32;
            let type_tag = read_string(&mut cursor)?;
            entries.push(crate::signature::SignatureEntry { depth, type_tag });
        }
        let consumed = cursor.position() as usize;
        Ok((record_size, crate::signature::TypeSignature { entries }, consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> Header {
        Header {
            record_size: 16,
            version: Version::CURRENT,
            tag: "uniform".into(),
            type_name: "chronofile::test::Tick".into(),
            subheader: subheader::write_uniform(1_000_000, 0),
            header_length: 0,
        }
    }

    #[test]
    fn round_trips_through_bytes() {
        let h = sample_header();
        let mut buf = Vec::new();
        let written_len = h.write(&mut buf).unwrap();
        assert_eq!(written_len as usize, buf.len());

        let back = Header::read(Cursor::new(&buf)).unwrap();
        assert_eq!(back.record_size, h.record_size);
        assert_eq!(back.version, h.version);
        assert_eq!(back.tag, h.tag);
        assert_eq!(back.type_name, h.type_name);
        assert_eq!(back.subheader, h.subheader);
    }

    #[test]
    fn bad_magic_rejected() {
        let h = sample_header();
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        buf[0] = b'X';
        assert!(matches!(Header::read(Cursor::new(&buf)), Err(HeaderError::BadMagic)));
    }

    #[test]
    fn corrupted_byte_trips_crc_before_anything_else() {
        let h = sample_header();
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        // flip a bit inside the subheader region, well past the magic
        let mid = buf.len() - 8;
        buf[mid] ^= 0xFF;
        assert!(matches!(Header::read(Cursor::new(&buf)), Err(HeaderError::HeaderCorrupt)));
    }

    #[test]
    fn future_major_version_is_incompatible() {
        let mut h = sample_header();
        h.version = Version { major: 2, minor: 0 };
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert!(matches!(
            Header::read(Cursor::new(&buf)),
            Err(HeaderError::VersionIncompatible { major: 2, minor: 0 })
        ));
    }

    #[test]
    fn v1_0_datetime_binary_converts_to_ticks() {
        // DateTimeKind::Utc tag bits are 0b01 in the top two bits; ticks
        // for 2019-06-15T12:00:00Z are 637_012_224_000_000_000.
        let ticks: i64 = 637_012_224_000_000_000;
        let binary = ticks | (0b01i64 << 62);
        let bytes = subheader::write_uniform(1_000_000, binary);
        let (_, t0) = subheader::read_uniform(Version::V1_0, &bytes).unwrap();
        assert_eq!(t0, ticks);
    }
}
