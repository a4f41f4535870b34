//! Compressed uniform file: shares the uniform `(T0, delta)` addressing
//! scheme with `UniformFile`, but its body is packed through a
//! [`CodecKind`] instead of moved as raw record bytes, so it can't reuse
//! `FileEngine`'s fixed-record-size body invariant
//! (`count = (file_len - header_length) / record_size`) — a codec-packed
//! body holds variable-length blocks, not one `size_of::<T>()` slot per
//! ordinal.
//!
//! Body layout: one frame per block, written sequentially at append time
//! and rebuilt by scanning to EOF on open (no block index is persisted —
//! rebuilding it from the frames themselves is cheap and keeps the format
//! self-describing):
//!
//! ```text
//! [u64 first_ordinal][u32 item_count][u32 byte_len][payload bytes...]
//! ```
//!
//! `CodecKind` is supplied by the caller at both `create` and `open` time
//! rather than persisted generically on disk — serializing an arbitrary
//! `CodecKind` tree is out of scope here, the same way `TypeMap` is already
//! a caller-supplied parameter rather than something the format derives
//! purely from its own bytes.

use crate::codec::{self, CodecKind};
use crate::error::{EngineError, HeaderError};
use crate::header::{subheader, Header, Version};
use crate::record::Record;
use crate::signature::{TypeMap, TypeSignature};
use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::Path;
use tracing::{debug, instrument};

const FRAME_PREFIX_LEN: u64 = 8 + 4 + 4;

#[derive(Debug, Clone, Copy)]
struct BlockMeta {
    first_ordinal: u64,
    item_count: u64,
    payload_offset: u64,
    payload_len: u32,
}

/// A uniform-addressed file whose body is packed through a [`CodecKind`]
/// instead of moved as raw record bytes. Append-only: a compressed block
/// can't be rewritten in place, so unlike `UniformFile` there's no
/// tail-overwrite allowance — `append` only ever accepts the exact next
/// contiguous ordinal.
pub struct CompressedUniformFile<T: Record> {
    file: File,
    header_length: u64,
    t0_ticks: i64,
    delta_ticks: i64,
    codec: CodecKind,
    max_block_bytes: usize,
    count: u64,
    blocks: Vec<BlockMeta>,
    _marker: PhantomData<T>,
}

impl<T: Record> CompressedUniformFile<T> {
    #[instrument(skip(path, codec))]
    pub fn create(
        path: &Path,
        t0_ticks: i64,
        delta_ticks: i64,
        codec: CodecKind,
        max_block_bytes: usize,
    ) -> Result<Self, EngineError> {
        super::uniform::validate_uniform_shape(t0_ticks, delta_ticks)?;

        let mut file = OpenOptions::new().create(true).write(true).read(true).truncate(true).open(path)?;

        let descriptor = T::descriptor();
        let signature = TypeSignature::from_descriptor(&descriptor);
        let sig_bytes = subheader::write_signature(std::mem::size_of::<T>() as u32, &signature)?;
        let mut combined = sig_bytes;
        combined.extend_from_slice(&subheader::write_uniform(delta_ticks, t0_ticks));

        let header = Header {
            record_size: std::mem::size_of::<T>() as u32,
            version: Version::CURRENT,
            tag: "compressed-uniform".to_owned(),
            type_name: descriptor.type_name.clone(),
            subheader: combined,
            header_length: 0,
        };
        let header_length = header.write(&mut file)? as u64;
        file.flush()?;
        debug!(header_length, "created compressed uniform file");

        Ok(Self {
            file,
            header_length,
            t0_ticks,
            delta_ticks,
            codec,
            max_block_bytes,
            count: 0,
            blocks: Vec::new(),
            _marker: PhantomData,
        })
    }

    #[instrument(skip(path, type_map, codec))]
    pub fn open(
        path: &Path,
        type_map: &TypeMap,
        codec: CodecKind,
        max_block_bytes: usize,
    ) -> Result<Self, EngineError> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let header = Header::read(&mut file)?;

        let (persisted_record_size, persisted_sig, consumed) = subheader::read_signature(&header.subheader)?;
        if persisted_record_size as usize != std::mem::size_of::<T>() {
            return Err(EngineError::RecordSizeChanged);
        }
        let expected_sig = TypeSignature::from_descriptor(&T::descriptor());
        if !persisted_sig.compatible_with(&expected_sig, type_map) {
            return Err(EngineError::Header(HeaderError::SignatureMismatch));
        }
        let (delta_ticks, t0_ticks) = subheader::read_uniform(header.version, &header.subheader[consumed..])?;
        super::uniform::validate_uniform_shape(t0_ticks, delta_ticks)?;

        let header_length = header.header_length as u64;
        let file_len = file.metadata()?.len();

        let mut blocks = Vec::new();
        let mut count = 0u64;
        let mut pos = header_length;
        while pos < file_len {
            if file_len - pos < FRAME_PREFIX_LEN {
                return Err(EngineError::BlockFrameCorrupt);
            }
            file.seek(SeekFrom::Start(pos))?;
            let first_ordinal = file.read_u64::<NativeEndian>()?;
            let item_count = file.read_u32::<NativeEndian>()? as u64;
            let byte_len = file.read_u32::<NativeEndian>()?;
            let payload_offset = pos + FRAME_PREFIX_LEN;
            if payload_offset + byte_len as u64 > file_len {
                return Err(EngineError::BlockFrameCorrupt);
            }
            blocks.push(BlockMeta { first_ordinal, item_count, payload_offset, payload_len: byte_len });
            count += item_count;
            pos = payload_offset + byte_len as u64;
        }

        Ok(Self {
            file,
            header_length,
            t0_ticks,
            delta_ticks,
            codec,
            max_block_bytes,
            count,
            blocks,
            _marker: PhantomData,
        })
    }

    pub fn t0_ticks(&self) -> i64 {
        self.t0_ticks
    }

    pub fn delta_ticks(&self) -> i64 {
        self.delta_ticks
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn header_length(&self) -> u64 {
        self.header_length
    }

    /// Packs `items` into one or more new blocks appended at EOF.
    /// Precision loss the codec can't absorb at its declared bit width
    /// propagates straight through as `EngineError::Codec`.
    #[instrument(skip(self, items))]
    pub fn append(&mut self, first_ordinal: u64, items: &[T]) -> Result<(), EngineError> {
        if first_ordinal != self.count {
            return Err(EngineError::IndexNonMonotonic);
        }
        if items.is_empty() {
            return Ok(());
        }
        let values: Vec<Vec<_>> = items.iter().map(|item| item.to_values()).collect();
        let encoded = codec::encode_blocks(&self.codec, &values, self.max_block_bytes)?;

        self.file.seek(SeekFrom::End(0))?;
        let mut ordinal = first_ordinal;
        for block in encoded {
            let payload_offset = self.file.stream_position()? + FRAME_PREFIX_LEN;
            self.file.write_u64::<NativeEndian>(ordinal)?;
            self.file.write_u32::<NativeEndian>(block.items_encoded as u32)?;
            self.file.write_u32::<NativeEndian>(block.bytes.len() as u32)?;
            self.file.write_all(&block.bytes)?;
            self.blocks.push(BlockMeta {
                first_ordinal: ordinal,
                item_count: block.items_encoded as u64,
                payload_offset,
                payload_len: block.bytes.len() as u32,
            });
            ordinal += block.items_encoded as u64;
        }
        self.file.flush()?;
        self.count = ordinal;
        Ok(())
    }

    /// Reads `[first_ordinal, first_ordinal + count)`, decoding every
    /// overlapping block in full and slicing out the requested sub-range —
    /// a block carries no internal random-access index.
    #[instrument(skip(self))]
    pub fn read_by_ordinal(&mut self, first_ordinal: u64, count: u64) -> Result<Vec<T>, EngineError> {
        let end = first_ordinal + count;
        if end > self.count {
            return Err(EngineError::OutOfBounds { first: first_ordinal, count, total: self.count });
        }
        let mut out = Vec::with_capacity(count as usize);
        for meta in &self.blocks {
            let block_end = meta.first_ordinal + meta.item_count;
            if block_end <= first_ordinal || meta.first_ordinal >= end {
                continue;
            }
            let mut payload = vec![0u8; meta.payload_len as usize];
            self.file.seek(SeekFrom::Start(meta.payload_offset))?;
            let got = super::read_fully(&mut self.file, &mut payload)?;
            if got != payload.len() {
                return Err(EngineError::IoShortTransfer { want: payload.len(), got });
            }
            let decoded = codec::decode_block(&self.codec, &payload)?;
            for (i, values) in decoded.into_iter().enumerate() {
                let ordinal = meta.first_ordinal + i as u64;
                if ordinal >= first_ordinal && ordinal < end {
                    out.push(T::from_values(&values));
                }
            }
        }
        Ok(out)
    }

    pub fn close(&mut self) -> Result<(), EngineError> {
        self.file.flush()?;
        Ok(())
    }
}

impl<T: Record> Drop for CompressedUniformFile<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
