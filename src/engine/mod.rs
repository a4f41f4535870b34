//! File engine: the common open/create/read/append/truncate lifecycle
//! shared by the uniform and indexed file kinds.
//!
//! A record type's bytes move between the file and the caller's buffer
//! without ever passing through `Record::to_values` — that conversion
//! exists for the codec layer only. The raw path is a `memcpy`, either via
//! an explicit `read`/`write` against the file's current position (the
//! stream path) or via a shared memory mapping (the mapped path); both are
//! native-endian and interpret nothing.

pub mod compressed;
pub mod indexed;
pub mod uniform;

use crate::error::EngineError;
use crate::header::{subheader, Header, Version};
use crate::record::Record;
use crate::signature::{TypeMap, TypeSignature};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::mem::size_of;
use std::path::Path;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Initialized,
    Disposed,
}

/// Open/create-time recovery disposition: did the body need rounding down
/// to a whole number of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenReport {
    pub rounded_down_bytes: u64,
}

/// Shared header + body lifecycle for a fixed-layout record type `T`.
/// `uniform`/`indexed` each wrap one of these with their own addressing
/// scheme; neither interprets `T`'s bytes itself.
#[derive(Debug)]
pub struct FileEngine<T: Record> {
    file: File,
    header_length: u64,
    record_size: usize,
    count: u64,
    state: EngineState,
    mmap: Option<MmapMut>,
    /// Serializer-specific subheader bytes beyond the type signature —
    /// the uniform wrapper's T0/delta pair, empty for indexed files.
    extra_subheader: Vec<u8>,
    version: Version,
    _marker: PhantomData<T>,
}

impl<T: Record> FileEngine<T> {
    #[instrument(skip(path, tag, subheader_bytes))]
    pub fn create(path: &Path, tag: &str, subheader_bytes: Vec<u8>) -> Result<Self, EngineError> {
        let record_size = size_of::<T>();
        if record_size == 0 {
            return Err(EngineError::StateInvalid);
        }
        let mut file = OpenOptions::new().create(true).write(true).read(true).truncate(true).open(path)?;

        let descriptor = T::descriptor();
        let signature = TypeSignature::from_descriptor(&descriptor);
        let sig_bytes = subheader::write_signature(record_size as u32, &signature)?;
        let mut combined = sig_bytes;
        combined.extend_from_slice(&subheader_bytes);

        let header = Header {
            record_size: record_size as u32,
            version: Version::CURRENT,
            tag: tag.to_owned(),
            type_name: descriptor.type_name.clone(),
            subheader: combined,
            header_length: 0,
        };
        let header_length = header.write(&mut file)? as u64;
        file.flush()?;
        debug!(record_size, header_length, "created file engine");

        Ok(Self {
            file,
            header_length,
            record_size,
            count: 0,
            state: EngineState::Initialized,
            mmap: None,
            extra_subheader: subheader_bytes,
            version: Version::CURRENT,
            _marker: PhantomData,
        })
    }

    pub fn extra_subheader(&self) -> &[u8] {
        &self.extra_subheader
    }

    pub fn version(&self) -> Version {
        self.version
    }

    #[instrument(skip(path, type_map))]
    pub fn open(path: &Path, type_map: &TypeMap) -> Result<(Self, OpenReport), EngineError> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let header = Header::read(&mut file)?;

        let record_size = size_of::<T>();
        if header.record_size as usize != record_size {
            return Err(EngineError::RecordSizeChanged);
        }

        let (persisted_record_size, persisted_sig, consumed) = subheader::read_signature(&header.subheader)?;
        if persisted_record_size as usize != record_size {
            return Err(EngineError::RecordSizeChanged);
        }
        let expected_sig = TypeSignature::from_descriptor(&T::descriptor());
        if !persisted_sig.compatible_with(&expected_sig, type_map) {
            return Err(EngineError::Header(crate::error::HeaderError::SignatureMismatch));
        }
        let extra_subheader = header.subheader[consumed..].to_vec();
        let header_length = header.header_length as u64;

        let file_len = file.metadata()?.len();
        if file_len < header_length {
            return Err(EngineError::RecordSizeChanged);
        }
        let body_len = file_len - header_length;
        let remainder = body_len % record_size as u64;
        let mut report = OpenReport::default();
        if remainder != 0 {
            warn!(remainder, "tail does not fill a whole record, rounding down");
            report.rounded_down_bytes = remainder;
        }
        let count = body_len / record_size as u64;

        Ok((
            Self {
                file,
                header_length,
                record_size,
                count,
                state: EngineState::Initialized,
                mmap: None,
                extra_subheader,
                version: header.version,
                _marker: PhantomData,
            },
            report,
        ))
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn header_length(&self) -> u64 {
        self.header_length
    }

    fn check_alive(&self) -> Result<(), EngineError> {
        if self.state == EngineState::Disposed {
            return Err(EngineError::UseAfterDispose);
        }
        Ok(())
    }

    #[instrument(skip(self, out))]
    pub fn read_range(&mut self, first_ordinal: u64, out: &mut [T]) -> Result<(), EngineError> {
        self.check_alive()?;
        let count = out.len() as u64;
        if first_ordinal + count > self.count {
            return Err(EngineError::OutOfBounds { first: first_ordinal, count, total: self.count });
        }
        let byte_offset = self.header_length + first_ordinal * self.record_size as u64;
        self.file.seek(SeekFrom::Start(byte_offset))?;
        let want = out.len() * self.record_size;
        let buf = bytemuck::cast_slice_mut(out);
        let got = read_fully(&mut self.file, buf)?;
        if got != want {
            return Err(EngineError::IoShortTransfer { want, got });
        }
        Ok(())
    }

    /// Mapped-path read: memcpy out of a shared mapping instead of issuing
    /// a positioned read. The caller still bounds-checks the same way.
    pub fn read_range_mapped(&mut self, first_ordinal: u64, out: &mut [T]) -> Result<(), EngineError> {
        self.check_alive()?;
        let count = out.len() as u64;
        if first_ordinal + count > self.count {
            return Err(EngineError::OutOfBounds { first: first_ordinal, count, total: self.count });
        }
        if self.mmap.is_none() {
            self.mmap = Some(unsafe { MmapOptions::new().map_mut(&self.file)? });
        }
        let mmap = self.mmap.as_ref().unwrap();
        let byte_offset = (self.header_length + first_ordinal * self.record_size as u64) as usize;
        let want = out.len() * self.record_size;
        let src = &mmap[byte_offset..byte_offset + want];
        bytemuck::cast_slice_mut(out).copy_from_slice(src);
        Ok(())
    }

    /// Writes `items` at `first_ordinal`, extending the file if that range
    /// reaches past the current body. Monotonicity/overwrite policy is the
    /// uniform/indexed wrappers' job; this only performs the byte move and
    /// updates `count`.
    #[instrument(skip(self, items))]
    pub fn write_range(&mut self, first_ordinal: u64, items: &[T]) -> Result<(), EngineError> {
        self.check_alive()?;
        self.mmap = None; // drop any stale mapping before mutating through the fd
        let byte_offset = self.header_length + first_ordinal * self.record_size as u64;
        self.file.seek(SeekFrom::Start(byte_offset))?;
        let buf = bytemuck::cast_slice(items);
        self.file.write_all(buf)?;
        let new_end = first_ordinal + items.len() as u64;
        if new_end > self.count {
            self.count = new_end;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn truncate(&mut self, new_count: u64) -> Result<(), EngineError> {
        self.check_alive()?;
        if new_count > self.count {
            return Err(EngineError::TruncateGrow { requested: new_count, current: self.count });
        }
        self.mmap = None;
        let new_len = self.header_length + new_count * self.record_size as u64;
        self.file.set_len(new_len)?;
        self.count = new_count;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn close(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::Disposed {
            return Ok(());
        }
        self.mmap = None;
        self.file.flush()?;
        self.state = EngineState::Disposed;
        Ok(())
    }
}

impl<T: Record> Drop for FileEngine<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

pub(crate) fn read_fully<R: Read>(r: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
