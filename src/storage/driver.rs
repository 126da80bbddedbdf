//! # Storage Driver Abstraction Layer
//!
//! This module provides the `StorageDriver` trait, the seam between the
//! [`Store`](super::Store) allocator and whatever holds its bytes. Field
//! descriptors never see this layer; whether a store lives in a memory-mapped
//! file or on the heap is decided once, at open time, through `StorageKind`.
//!
//! ## Backends
//!
//! | Backend       | Persistent | Sync         |
//! |---------------|------------|--------------|
//! | MmapStorage   | Yes        | msync        |
//! | MemoryStorage | No         | no-op        |
//!
//! ## AnyStorage Enum
//!
//! `AnyStorage` is a closed wrapper that implements `StorageDriver`, letting
//! `Store` hold either backend without generics leaking into every field
//! descriptor signature.
//!
//! ## Thread Safety
//!
//! `StorageDriver` requires `Send + Sync` so an open store can sit behind a
//! reader/writer lock (see [`SharedNd`](crate::nd::SharedNd)). Mutation needs
//! `&mut self`, so the lock's write guard is the only path to it.

use std::path::PathBuf;

use eyre::Result;

use super::memory::MemoryStorage;
use super::mmap::MmapStorage;

/// Contiguous, growable byte space.
pub trait StorageDriver: Send + Sync {
    /// The whole backing space.
    fn bytes(&self) -> &[u8];

    /// The whole backing space, writable.
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Current length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extends the space to `new_len` bytes. New bytes read as zero.
    ///
    /// If `new_len` is not larger than the current length this is a no-op.
    fn grow(&mut self, new_len: u64) -> Result<()>;

    /// Flushes pending writes to durable storage.
    fn sync(&self) -> Result<()>;

    /// Whether the contents outlive the process.
    fn is_persistent(&self) -> bool;
}

/// Configuration for backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// Memory-mapped file at `path`.
    Mmap { path: PathBuf },
    /// Heap buffer, discarded on close.
    Memory,
}

impl StorageKind {
    pub fn mmap<P: Into<PathBuf>>(path: P) -> Self {
        StorageKind::Mmap { path: path.into() }
    }

    pub fn memory() -> Self {
        StorageKind::Memory
    }
}

#[derive(Debug)]
pub enum AnyStorage {
    Mmap(MmapStorage),
    Memory(MemoryStorage),
}

impl StorageDriver for AnyStorage {
    fn bytes(&self) -> &[u8] {
        match self {
            AnyStorage::Mmap(s) => s.bytes(),
            AnyStorage::Memory(s) => s.bytes(),
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            AnyStorage::Mmap(s) => s.bytes_mut(),
            AnyStorage::Memory(s) => s.bytes_mut(),
        }
    }

    fn len(&self) -> u64 {
        match self {
            AnyStorage::Mmap(s) => s.len(),
            AnyStorage::Memory(s) => s.len(),
        }
    }

    fn grow(&mut self, new_len: u64) -> Result<()> {
        match self {
            AnyStorage::Mmap(s) => s.grow(new_len),
            AnyStorage::Memory(s) => s.grow(new_len),
        }
    }

    fn sync(&self) -> Result<()> {
        match self {
            AnyStorage::Mmap(s) => s.sync(),
            AnyStorage::Memory(_) => Ok(()),
        }
    }

    fn is_persistent(&self) -> bool {
        matches!(self, AnyStorage::Mmap(_))
    }
}

impl From<MmapStorage> for AnyStorage {
    fn from(storage: MmapStorage) -> Self {
        AnyStorage::Mmap(storage)
    }
}

impl From<MemoryStorage> for AnyStorage {
    fn from(storage: MemoryStorage) -> Self {
        AnyStorage::Memory(storage)
    }
}
