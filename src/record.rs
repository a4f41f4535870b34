//! The record contract: a fixed-size value type with a stable byte layout.
//!
//! Reflection is out of scope (see `signature.rs`): a caller's record type
//! implements [`Record`] by hand, which gives the engine two things —
//! `mem::size_of::<Self>()` for the raw byte path, and a flattened
//! `Vec<FieldValue>` view for the codec layer. Implementors must be
//! `#[repr(C)]` (or otherwise have a stable, padding-free layout) so that
//! the raw serializer's byte reinterpretation is sound.

use crate::signature::RecordDescriptor;

/// One field's value, widened to a common representation the codec layer
/// can delta-encode. The raw serializer never constructs these — it moves
/// `Record` bytes directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    I64(i64),
    U64(u64),
    F64(f64),
    /// Ticks since epoch (100ns units), always encoded via the timestamp
    /// codec (multiplied-delta with multiplier 1).
    Timestamp(i64),
}

impl FieldValue {
    pub fn as_i64(self) -> i64 {
        match self {
            FieldValue::I64(v) => v,
            FieldValue::U64(v) => v as i64,
            FieldValue::F64(v) => v as i64,
            FieldValue::Timestamp(v) => v,
        }
    }
}

/// A fixed-size record type that can be stored in a chronofile.
///
/// `bytemuck::Pod` is the supertrait that makes the raw serializer's byte
/// reinterpretation safe: it's only implementable for types with a stable,
/// padding-free layout (`#[derive(bytemuck::Pod, bytemuck::Zeroable)]` on a
/// `#[repr(C)]` struct whose fields leave no gaps), so a type that wouldn't
/// be sound to move as raw bytes simply fails to compile as a `Record`.
pub trait Record: Sized + Copy + bytemuck::Pod {
    /// Describes this record's fields; used to build and check the
    /// persisted type signature, and to drive the codec layer.
    fn descriptor() -> RecordDescriptor;

    /// Flatten this record into the order `descriptor()` declares its
    /// fields, for the codec layer. Composite fields flatten their own
    /// children inline (depth-first), matching `TypeSignature`.
    fn to_values(&self) -> Vec<FieldValue>;

    /// Reconstruct a record from the flattened values `to_values` produces.
    fn from_values(values: &[FieldValue]) -> Self;

    /// The value of the field named in `descriptor().index_field`, if any.
    /// Required for indexed files; uniform files ignore it.
    fn index_value(&self) -> Option<i64> {
        None
    }
}
