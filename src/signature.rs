//! Type signature: a structural fingerprint of a record layout.
//!
//! Built by a depth-first walk of a [`RecordDescriptor`]'s fields. Primitives
//! are leaves; composite fields emit their own tag and then recurse one
//! level deeper. The signature is persisted in the file's subheader and
//! re-checked on open — see `header.rs`.

use crate::framing::{read_string, read_uvarint, write_string, write_uvarint};
use std::collections::HashMap;
use std::io::{self, Read, Write};

/// One element of a flattened type signature: how deep the field sits in
/// the record's field tree, and the stable name of its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    pub depth: u32,
    pub type_tag: String,
}

/// Depth-tagged list of field types, persisted to bind a file to a record
/// layout. Two signatures are equal iff their `(depth, tag)` sequences
/// match element-wise.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeSignature {
    pub entries: Vec<SignatureEntry>,
}

impl TypeSignature {
    pub fn from_descriptor(desc: &RecordDescriptor) -> Self {
        let mut entries = Vec::new();
        for field in &desc.fields {
            walk_field(field, 0, &mut entries);
        }
        Self { entries }
    }

    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        write_uvarint(&mut w, self.entries.len() as u64)?;
        for e in &self.entries {
            write_uvarint(&mut w, e.depth as u64)?;
            write_string(&mut w, &e.type_tag)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> io::Result<Self> {
        let count = read_uvarint(&mut r)? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let depth = read_uvarint(&mut r)? as u32;
            let type_tag = read_string(&mut r)?;
            entries.push(SignatureEntry { depth, type_tag });
        }
        Ok(Self { entries })
    }

    /// Compares `self` (persisted, on disk) against `other` (in-process),
    /// consulting `type_map` to authorize named remappings of on-disk tags
    /// to in-process tags before rejecting a mismatch.
    pub fn compatible_with(&self, other: &TypeSignature, type_map: &TypeMap) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        self.entries.iter().zip(other.entries.iter()).all(|(a, b)| {
            a.depth == b.depth
                && (a.type_tag == b.type_tag || type_map.remap(&a.type_tag) == b.type_tag)
        })
    }
}

fn walk_field(field: &FieldDescriptor, depth: u32, out: &mut Vec<SignatureEntry>) {
    out.push(SignatureEntry { depth, type_tag: field.type_tag.clone() });
    if let FieldKind::Composite(children) = &field.kind {
        for child in children {
            walk_field(child, depth + 1, out);
        }
    }
}

/// How a field's on-disk bytes should be interpreted by the codec layer.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Leaf scalar: raw bits, or a multiplied-delta encoded integer/float.
    Primitive,
    /// Ticks-since-epoch, always multiplied-delta with multiplier 1.
    Timestamp,
    /// Nested record — opens a new signature level.
    Composite(Vec<FieldDescriptor>),
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_tag: String,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn primitive(name: &str, type_tag: &str) -> Self {
        Self { name: name.into(), type_tag: type_tag.into(), kind: FieldKind::Primitive }
    }

    pub fn timestamp(name: &str) -> Self {
        Self { name: name.into(), type_tag: "timestamp".into(), kind: FieldKind::Timestamp }
    }
}

/// Reflection is out of scope; callers describe their record type by hand
/// (or with a small builder) instead of the engine discovering it at
/// runtime. One field may be designated the monotonic index for indexed
/// files.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    pub type_name: String,
    pub fields: Vec<FieldDescriptor>,
    pub index_field: Option<String>,
}

impl RecordDescriptor {
    pub fn new(type_name: &str) -> Self {
        Self { type_name: type_name.into(), fields: Vec::new(), index_field: None }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_index_field(mut self, name: &str) -> Self {
        self.index_field = Some(name.into());
        self
    }
}

/// Maps a persisted on-disk type tag to the in-process tag it should be
/// treated as equivalent to. Consulted only when a raw signature comparison
/// would otherwise fail; an absent key means "no remap", i.e. the tag is
/// used unchanged.
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    remap: HashMap<String, String>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, on_disk_tag: &str, in_process_tag: &str) -> &mut Self {
        self.remap.insert(on_disk_tag.to_owned(), in_process_tag.to_owned());
        self
    }

    pub fn remap(&self, on_disk_tag: &str) -> String {
        self.remap.get(on_disk_tag).cloned().unwrap_or_else(|| on_disk_tag.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_descriptor() -> RecordDescriptor {
        RecordDescriptor::new("chronofile::Tick")
            .with_field(FieldDescriptor::timestamp("ts"))
            .with_field(FieldDescriptor::primitive("price", "i64"))
            .with_field(FieldDescriptor {
                name: "stats".into(),
                type_tag: "Stats".into(),
                kind: FieldKind::Composite(vec![
                    FieldDescriptor::primitive("volume", "u32"),
                    FieldDescriptor::primitive("trades", "u32"),
                ]),
            })
    }

    #[test]
    fn depth_first_walk_matches_spec_shape() {
        let sig = TypeSignature::from_descriptor(&sample_descriptor());
        let tags: Vec<(u32, &str)> =
            sig.entries.iter().map(|e| (e.depth, e.type_tag.as_str())).collect();
        assert_eq!(
            tags,
            vec![
                (0, "timestamp"),
                (0, "i64"),
                (0, "Stats"),
                (1, "u32"),
                (1, "u32"),
            ]
        );
    }

    #[test]
    fn round_trips_through_bytes() {
        let sig = TypeSignature::from_descriptor(&sample_descriptor());
        let mut buf = Vec::new();
        sig.write(&mut buf).unwrap();
        let back = TypeSignature::read(&buf[..]).unwrap();
        assert_eq!(sig, back);
    }

    #[test]
    fn mismatched_signature_rejected_without_type_map() {
        let a = TypeSignature::from_descriptor(&sample_descriptor());
        let mut other = sample_descriptor();
        other.fields[1].type_tag = "u64".into();
        let b = TypeSignature::from_descriptor(&other);
        assert!(!a.compatible_with(&b, &TypeMap::new()));
    }

    #[test]
    fn type_map_authorizes_remap() {
        let a = TypeSignature::from_descriptor(&sample_descriptor());
        let mut other = sample_descriptor();
        other.fields[1].type_tag = "u64".into();
        let b = TypeSignature::from_descriptor(&other);
        let mut map = TypeMap::new();
        map.insert("i64", "u64");
        assert!(a.compatible_with(&b, &map));
    }
}
