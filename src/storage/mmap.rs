//! # Memory-Mapped File Storage
//!
//! This module implements `MmapStorage`, the file-backed byte space under a
//! [`Store`](super::Store). The whole file is mapped into the process and
//! exposed as one contiguous slice, so a record address is simply an index
//! into that slice.
//!
//! ## Safety Considerations
//!
//! The mapping becomes invalid when it is replaced during `grow()`. As with
//! any borrowed slice, Rust's borrow checker does the work:
//!
//! ```text
//! bytes(&self) -> &[u8]              // Immutable borrow of self
//! bytes_mut(&mut self) -> &mut [u8]  // Mutable borrow of self
//! grow(&mut self)                    // Mutable borrow (exclusive)
//! ```
//!
//! No slice obtained from `bytes()` can outlive a call to `grow()`.
//!
//! ## File Format
//!
//! The file length is always a non-zero multiple of `CHUNK_SIZE`:
//!
//! ```text
//! Offset 0:        Chunk 0 (header + free-list heads)
//! Offset 4096:     Chunk 1 (records)
//! Offset 8192:     Chunk 2 (records)
//! ...
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return `eyre::Result` with the file path and the
//! operation being performed as context.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;

use crate::config::CHUNK_SIZE;

#[derive(Debug)]
pub struct MmapStorage {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    len: u64,
}

impl MmapStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open store file '{}'", path.display()))?;

        let metadata = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?;

        let len = metadata.len();

        ensure!(len > 0, "cannot open empty store file '{}'", path.display());

        // SAFETY: MmapMut::map_mut is unsafe because the file could be modified
        // by another process while mapped. This is sound because:
        // 1. The file is opened read+write by the single writer that owns it
        // 2. Index files are never edited by external processes
        // 3. The mapping lives exactly as long as this MmapStorage
        // 4. All access goes through bytes()/bytes_mut(), bounds-checked by Store
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap,
            len,
        })
    }

    pub fn create<P: AsRef<Path>>(path: P, initial_len: u64) -> Result<Self> {
        let path = path.as_ref();

        ensure!(
            initial_len > 0 && initial_len % CHUNK_SIZE as u64 == 0,
            "initial size {} must be a non-zero multiple of the chunk size {}",
            initial_len,
            CHUNK_SIZE
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create store file '{}'", path.display()))?;

        file.set_len(initial_len)
            .wrap_err_with(|| format!("failed to set file size to {} bytes", initial_len))?;

        // SAFETY: same argument as in open(); the file was just created and
        // truncated by us, and its length is a whole number of chunks.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap,
            len: initial_len,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    pub fn grow(&mut self, new_len: u64) -> Result<()> {
        if new_len <= self.len {
            return Ok(());
        }

        self.mmap
            .flush()
            .wrap_err("failed to flush mmap before grow")?;

        self.file.set_len(new_len).wrap_err_with(|| {
            format!(
                "failed to extend '{}' to {} bytes",
                self.path.display(),
                new_len
            )
        })?;

        // SAFETY: the old mapping is about to be dropped. This is sound because:
        // 1. grow() takes &mut self, so no slice into the old mapping exists
        // 2. The old mapping was flushed above
        // 3. The file was extended to new_len before remapping
        self.mmap =
            unsafe { MmapMut::map_mut(&self.file).wrap_err("failed to remap file after grow")? };

        self.len = new_len;

        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.mmap.flush().wrap_err("failed to sync mmap to disk")
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CHUNK: u64 = CHUNK_SIZE as u64;

    #[test]
    fn create_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.nd");

        let storage = MmapStorage::create(&path, 3 * CHUNK).unwrap();

        assert_eq!(storage.len(), 3 * CHUNK);
        assert_eq!(storage.bytes().len(), 3 * CHUNK_SIZE);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 3 * CHUNK);
    }

    #[test]
    fn create_rejects_partial_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.nd");

        assert!(MmapStorage::create(&path, 0).is_err());

        let err = MmapStorage::create(&path, CHUNK + 1).unwrap_err();
        assert!(err.to_string().contains("multiple of the chunk size"));
    }

    #[test]
    fn open_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.nd");

        {
            let mut storage = MmapStorage::create(&path, 2 * CHUNK).unwrap();
            storage.bytes_mut()[CHUNK_SIZE] = 0xAB;
            storage.sync().unwrap();
        }

        let storage = MmapStorage::open(&path).unwrap();

        assert_eq!(storage.len(), 2 * CHUNK);
        assert_eq!(storage.bytes()[CHUNK_SIZE], 0xAB);
    }

    #[test]
    fn open_fails_for_nonexistent_file() {
        let dir = tempdir().unwrap();

        assert!(MmapStorage::open(dir.path().join("missing.nd")).is_err());
    }

    #[test]
    fn open_fails_for_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.nd");
        std::fs::write(&path, b"").unwrap();

        let err = MmapStorage::open(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn grow_preserves_existing_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.nd");

        let mut storage = MmapStorage::create(&path, CHUNK).unwrap();
        storage.bytes_mut()[10] = 0xCA;
        storage.bytes_mut()[11] = 0xFE;

        storage.grow(4 * CHUNK).unwrap();

        assert_eq!(storage.len(), 4 * CHUNK);
        assert_eq!(storage.bytes()[10], 0xCA);
        assert_eq!(storage.bytes()[11], 0xFE);
        assert_eq!(storage.bytes()[3 * CHUNK_SIZE], 0);
    }

    #[test]
    fn grow_to_smaller_size_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.nd");

        let mut storage = MmapStorage::create(&path, 2 * CHUNK).unwrap();
        storage.grow(2 * CHUNK).unwrap();
        storage.grow(CHUNK).unwrap();

        assert_eq!(storage.len(), 2 * CHUNK);
    }
}
