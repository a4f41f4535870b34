//! Composable per-field encoders/decoders operating against a bit stream.
//!
//! A [`CodecKind`] tree describes how each field of a record should be
//! packed: raw bits, multiplied-delta, timestamp, or a nested composite.
//! [`encode_block`]/[`decode_block`] apply that description to a sequence
//! of flattened field values (see `record.rs`), producing/consuming the
//! on-disk block format:
//!
//! ```text
//! [varint itemCount][member-interleaved deltas...]
//! ```
//!
//! The first item in a block is written in full (absolute); later items
//! are deltas from the previous item. A block never grows past the byte
//! budget the caller declares — `encode_block` packs as many leading
//! items as fit and reports how many, mirroring the teacher's
//! self-describing, no-partial-decode block discipline.

use crate::bitstream::{BitReader, BitWriter};
use crate::error::CodecError;
use crate::record::FieldValue;

/// How a single leaf value should be packed. Declared per field by a
/// [`RecordDescriptor`](crate::signature::RecordDescriptor)'s codec
/// assignment; composites flatten to a sequence of leaves in field order.
#[derive(Debug, Clone)]
pub enum CodecKind {
    /// Raw fixed-width bits — no delta, no precision loss possible.
    Primitive { bits: u32, signed: bool },
    /// `round(value * multiplier / divisor)` as a running-sum signed
    /// varint delta. `bits` bounds the mapped integer's declared width;
    /// exceeding it fails the whole encode with `PrecisionLoss`.
    MultipliedDelta { multiplier: i64, divisor: i64, bits: u32 },
    /// Ticks since epoch — multiplied-delta with multiplier 1, unbounded
    /// width (i64 ticks always fit).
    Timestamp,
    /// Nested record: member codecs applied in declared order.
    Composite(Vec<CodecKind>),
}

impl CodecKind {
    /// Flatten this (possibly nested) kind into the leaf codecs applied in
    /// declared order — the same depth-first order `TypeSignature` walks.
    fn flatten(&self, out: &mut Vec<LeafCodec>) {
        match self {
            CodecKind::Primitive { bits, signed } => {
                out.push(LeafCodec::Primitive { bits: *bits, signed: *signed })
            }
            CodecKind::MultipliedDelta { multiplier, divisor, bits } => out.push(
                LeafCodec::MultipliedDelta { multiplier: *multiplier, divisor: *divisor, bits: *bits, prev: None },
            ),
            CodecKind::Timestamp => out.push(LeafCodec::Timestamp { prev: None }),
            CodecKind::Composite(children) => {
                for child in children {
                    child.flatten(out);
                }
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        let mut out = Vec::new();
        self.flatten(&mut out);
        out.len()
    }
}

#[derive(Debug, Clone)]
enum LeafCodec {
    Primitive { bits: u32, signed: bool },
    MultipliedDelta { multiplier: i64, divisor: i64, bits: u32, prev: Option<i64> },
    Timestamp { prev: Option<i64> },
}

fn fits_signed(value: i64, bits: u32) -> bool {
    if bits >= 64 {
        return true;
    }
    let lo = -(1i64 << (bits - 1));
    let hi = (1i64 << (bits - 1)) - 1;
    value >= lo && value <= hi
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn encode_leaf(leaf: &mut LeafCodec, w: &mut BitWriter, value: FieldValue) -> Result<(), CodecError> {
    match leaf {
        LeafCodec::Primitive { bits, signed } => {
            let raw = value.as_i64();
            if *signed && !fits_signed(raw, *bits) {
                return Err(CodecError::PrecisionLoss { bits: *bits });
            }
            w.write_bits((raw as u64) & mask(*bits), *bits)
        }
        LeafCodec::MultipliedDelta { multiplier, divisor, bits, prev } => {
            let real = match value {
                FieldValue::F64(v) => v,
                other => other.as_i64() as f64,
            };
            let mapped = (real * (*multiplier as f64) / (*divisor as f64)).round() as i64;
            if !fits_signed(mapped, *bits) {
                return Err(CodecError::PrecisionLoss { bits: *bits });
            }
            // Reconstructing from the rounded mapped value must reproduce
            // `real` exactly — otherwise the multiplier is too coarse for
            // this value and we must fail rather than silently truncate it.
            let reconstructed = mapped as f64 * (*divisor as f64) / (*multiplier as f64);
            if (reconstructed - real).abs() > f64::EPSILON.max(real.abs() * 1e-9) {
                return Err(CodecError::PrecisionLoss { bits: *bits });
            }
            let to_write = match *prev {
                None => mapped,
                Some(p) => mapped - p,
            };
            w.write_signed_varint(to_write)?;
            *prev = Some(mapped);
            Ok(())
        }
        LeafCodec::Timestamp { prev } => {
            let ticks = value.as_i64();
            let to_write = match *prev {
                None => ticks,
                Some(p) => ticks - p,
            };
            w.write_signed_varint(to_write)?;
            *prev = Some(ticks);
            Ok(())
        }
    }
}

fn decode_leaf(leaf: &mut LeafCodec, r: &mut BitReader) -> Result<FieldValue, CodecError> {
    match leaf {
        LeafCodec::Primitive { bits, signed } => {
            let raw = r.read_bits(*bits)?;
            if *signed {
                // sign-extend from `bits` into i64
                let shift = 64 - *bits;
                let signed_val = ((raw << shift) as i64) >> shift;
                Ok(FieldValue::I64(signed_val))
            } else {
                Ok(FieldValue::U64(raw))
            }
        }
        LeafCodec::MultipliedDelta { multiplier, divisor, prev, .. } => {
            let delta_or_abs = r.read_signed_varint()?;
            let mapped = match *prev {
                None => delta_or_abs,
                Some(p) => p + delta_or_abs,
            };
            *prev = Some(mapped);
            Ok(FieldValue::F64(mapped as f64 * (*divisor as f64) / (*multiplier as f64)))
        }
        LeafCodec::Timestamp { prev } => {
            let delta_or_abs = r.read_signed_varint()?;
            let ticks = match *prev {
                None => delta_or_abs,
                Some(p) => p + delta_or_abs,
            };
            *prev = Some(ticks);
            Ok(FieldValue::Timestamp(ticks))
        }
    }
}

/// Reserved headroom (bytes) for the block's leading `itemCount` varint.
/// Five bytes covers item counts up to 2^35, far beyond any sane block
/// size; the real prefix is almost always 1-2 bytes.
const ITEM_COUNT_RESERVE: usize = 5;

#[derive(Debug)]
pub struct EncodedBlock {
    pub bytes: Vec<u8>,
    pub items_encoded: usize,
}

/// Pack as many leading `items` as fit within `max_block_bytes`.
///
/// On a hard failure (precision loss) the whole call fails and emits no
/// partial state, per the codec-exactness property. On simply running out
/// of room, the block is closed with however many items fit — the caller
/// re-invokes with the residual items for the next block.
pub fn encode_block(kind: &CodecKind, items: &[Vec<FieldValue>], max_block_bytes: usize) -> Result<EncodedBlock, CodecError> {
    if max_block_bytes <= ITEM_COUNT_RESERVE {
        return Err(CodecError::BlockFull);
    }

    // Pass 1: count how many items fit, using a throwaway writer budgeted
    // as if the item-count prefix took its maximum possible size.
    let mut probe_leaves = Vec::new();
    kind.flatten(&mut probe_leaves);
    let mut probe = BitWriter::with_capacity(max_block_bytes - ITEM_COUNT_RESERVE);
    let mut items_encoded = 0usize;
    for item in items {
        match encode_item(&mut probe_leaves, &mut probe, item) {
            Ok(()) => items_encoded += 1,
            Err(CodecError::BlockFull) => break,
            Err(e) => return Err(e),
        }
    }

    // Pass 2: replay deterministically into the final writer, now that the
    // item count (and hence its real prefix width) is known.
    let mut leaves = Vec::new();
    kind.flatten(&mut leaves);
    let mut w = BitWriter::with_capacity(max_block_bytes);
    w.write_signed_varint(items_encoded as i64)?;
    for item in &items[..items_encoded] {
        encode_item(&mut leaves, &mut w, item)?;
    }

    Ok(EncodedBlock { bytes: w.finish_block(), items_encoded })
}

fn encode_item(leaves: &mut [LeafCodec], w: &mut BitWriter, item: &[FieldValue]) -> Result<(), CodecError> {
    for (leaf, value) in leaves.iter_mut().zip(item.iter()) {
        encode_leaf(leaf, w, *value)?;
    }
    Ok(())
}

/// Decode every item packed by [`encode_block`].
pub fn decode_block(kind: &CodecKind, bytes: &[u8]) -> Result<Vec<Vec<FieldValue>>, CodecError> {
    let mut leaves = Vec::new();
    kind.flatten(&mut leaves);
    let mut r = BitReader::new(bytes);
    let count = r.read_signed_varint()?;
    if count < 0 {
        return Err(CodecError::Underrun);
    }
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut values = Vec::with_capacity(leaves.len());
        for leaf in leaves.iter_mut() {
            values.push(decode_leaf(leaf, &mut r)?);
        }
        out.push(values);
    }
    Ok(out)
}

/// Pack `items` into consecutive blocks, each at most `max_block_bytes`,
/// returning the encoded blocks in order. Used by callers (the compressed
/// engine body) that need more items than fit in a single block.
pub fn encode_blocks(kind: &CodecKind, items: &[Vec<FieldValue>], max_block_bytes: usize) -> Result<Vec<EncodedBlock>, CodecError> {
    let mut blocks = Vec::new();
    let mut rest = items;
    while !rest.is_empty() {
        let block = encode_block(kind, rest, max_block_bytes)?;
        if block.items_encoded == 0 {
            return Err(CodecError::BlockFull);
        }
        rest = &rest[block.items_encoded..];
        blocks.push(block);
    }
    Ok(blocks)
}
