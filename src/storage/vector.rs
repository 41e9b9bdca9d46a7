//! Memory-mapped append vector.
//!
//! An [`AppendVector`] is a disk-backed ordered sequence of fixed-width
//! records with random read/write access and amortized O(1) appends. The
//! file is always truncated to exactly `header_len + len * WIDTH` bytes, so
//! the record count is recovered from the file length on reopen and the
//! record array stays packed. The mapping is reserved in growing chunks;
//! the file is extended with `set_len` before any write lands through the
//! map, so remaps stay rare.
//!
//! All integers on disk are little-endian and fixed-width. Flush policy is
//! the caller's business; [`AppendVector::flush`] syncs the valid prefix.

use crate::error::StorageError;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Minimum mapped capacity in bytes.
const MIN_MAP_LEN: usize = 64 * 1024;

/// A fixed-width record that can live in an [`AppendVector`].
pub trait Record: Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Decode a record from exactly [`Record::WIDTH`] bytes.
    fn decode(buf: &[u8]) -> Self;

    /// Encode this record into exactly [`Record::WIDTH`] bytes.
    fn encode(&self, buf: &mut [u8]);
}

/// Disk-backed random-access ordered sequence of fixed-width records.
pub struct AppendVector<T: Record> {
    file: std::fs::File,
    path: PathBuf,
    map: MmapMut,
    len: usize,
    header_len: usize,
    created: bool,
    _record: PhantomData<T>,
}

fn map_capacity(file_len: usize) -> usize {
    file_len.next_power_of_two().max(MIN_MAP_LEN)
}

impl<T: Record> AppendVector<T> {
    /// Open or create the vector file at `path`.
    ///
    /// `header_len` bytes at the start of the file are reserved for caller
    /// metadata; a freshly created file has them zeroed. A file whose
    /// payload is not a whole number of records is reported as corrupted.
    pub fn open(path: impl AsRef<Path>, header_len: usize) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut file_len = file.metadata()?.len() as usize;
        let created = file_len == 0;
        if created && header_len > 0 {
            file.set_len(header_len as u64)?;
            file_len = header_len;
        }

        if file_len < header_len {
            return Err(StorageError::Corrupted(format!(
                "{}: {} bytes is shorter than the {} byte header",
                path.display(),
                file_len,
                header_len
            )));
        }
        let payload = file_len - header_len;
        if payload % T::WIDTH != 0 {
            return Err(StorageError::Corrupted(format!(
                "{}: payload of {} bytes is not a multiple of the {} byte record",
                path.display(),
                payload,
                T::WIDTH
            )));
        }

        // The mapping may extend past EOF; pages past the end only become
        // touchable after push() grows the file under them.
        let map = unsafe { MmapOptions::new().len(map_capacity(file_len)).map_mut(&file)? };

        Ok(Self {
            file,
            path,
            map,
            len: payload / T::WIDTH,
            header_len,
            created,
            _record: PhantomData,
        })
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the vector holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when [`AppendVector::open`] created the file.
    #[inline]
    pub fn created(&self) -> bool {
        self.created
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    fn byte_offset(&self, i: usize) -> usize {
        self.header_len + i * T::WIDTH
    }

    #[inline]
    fn file_len(&self) -> usize {
        self.byte_offset(self.len)
    }

    /// Read the record at position `i`. Out of bounds is a programming
    /// error and aborts.
    pub fn get(&self, i: usize) -> T {
        assert!(i < self.len, "record index {} out of bounds (len {})", i, self.len);
        let off = self.byte_offset(i);
        T::decode(&self.map[off..off + T::WIDTH])
    }

    /// Overwrite the record at position `i`.
    pub fn set(&mut self, i: usize, record: &T) {
        assert!(i < self.len, "record index {} out of bounds (len {})", i, self.len);
        let off = self.byte_offset(i);
        record.encode(&mut self.map[off..off + T::WIDTH]);
    }

    /// Read the first record. The vector must be non-empty.
    pub fn front(&self) -> T {
        assert!(!self.is_empty(), "front() on empty vector");
        self.get(0)
    }

    /// Read the last record. The vector must be non-empty.
    pub fn back(&self) -> T {
        assert!(!self.is_empty(), "back() on empty vector");
        self.get(self.len - 1)
    }

    /// Append a record.
    pub fn push(&mut self, record: &T) -> Result<(), StorageError> {
        let new_file_len = self.byte_offset(self.len + 1);
        if new_file_len > self.map.len() {
            self.remap(map_capacity(new_file_len))?;
        }
        self.file.set_len(new_file_len as u64)?;
        let off = self.byte_offset(self.len);
        record.encode(&mut self.map[off..off + T::WIDTH]);
        self.len += 1;
        Ok(())
    }

    fn remap(&mut self, capacity: usize) -> Result<(), StorageError> {
        self.map.flush_range(0, self.file_len())?;
        self.map = unsafe { MmapOptions::new().len(capacity).map_mut(&self.file)? };
        Ok(())
    }

    /// Reserved header bytes at the start of the file.
    pub fn header(&self) -> &[u8] {
        &self.map[..self.header_len]
    }

    /// Mutable view of the header bytes.
    pub fn header_mut(&mut self) -> &mut [u8] {
        &mut self.map[..self.header_len]
    }

    /// Sync written records and header to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        let len = self.file_len();
        if len > 0 {
            self.map.flush_range(0, len)?;
        }
        Ok(())
    }
}

impl<T: Record> std::fmt::Debug for AppendVector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendVector")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("header_len", &self.header_len)
            .finish()
    }
}
