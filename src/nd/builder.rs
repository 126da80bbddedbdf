//! # Nd Builder
//!
//! `NdBuilder` configures and opens a record store.
//!
//! ## Configuration Options
//!
//! | Option            | Default   | Description                                   |
//! |-------------------|-----------|-----------------------------------------------|
//! | path / in_memory  | in memory | Backing medium                                |
//! | max_size          | 64 GiB    | Growth limit; exceeding it is `OutOfSpace`    |
//! | log_capacity      | 65536     | Modification-log entries kept; 0 disables it  |
//! | sync_on_close     | true      | Flush the mapping when the store is closed    |
//! | create_if_missing | true      | Initialize a new file when none exists        |
//!
//! ## Usage
//!
//! ```ignore
//! let nd = Nd::builder()
//!     .path("./index.nd")
//!     .max_size(1 << 30)
//!     .log_capacity(0)
//!     .open(registry)?;
//! ```

use std::path::Path;
use std::sync::Arc;

use eyre::{bail, Result, WrapErr};

use super::Nd;
use crate::config::{CHUNK_SIZE, DEFAULT_LOG_CAPACITY, DEFAULT_MAX_SIZE};
use crate::schema::Registry;
use crate::storage::{MemoryStorage, MmapStorage, StorageKind, Store, StoreOptions};

/// Resolved configuration of an open store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdOptions {
    pub storage: StorageKind,
    pub max_size: u64,
    pub log_capacity: usize,
    pub sync_on_close: bool,
    pub create_if_missing: bool,
}

impl Default for NdOptions {
    fn default() -> Self {
        Self {
            storage: StorageKind::Memory,
            max_size: DEFAULT_MAX_SIZE,
            log_capacity: DEFAULT_LOG_CAPACITY,
            sync_on_close: true,
            create_if_missing: true,
        }
    }
}

impl NdOptions {
    fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_size: self.max_size,
            log_capacity: self.log_capacity,
        }
    }
}

#[derive(Debug, Default)]
pub struct NdBuilder {
    options: NdOptions,
}

impl NdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backs the store with a memory-mapped file at `path`.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.options.storage = StorageKind::mmap(path.as_ref());
        self
    }

    /// Backs the store with a heap buffer that is discarded on close.
    pub fn in_memory(mut self) -> Self {
        self.options.storage = StorageKind::Memory;
        self
    }

    pub fn storage_kind(mut self, kind: StorageKind) -> Self {
        self.options.storage = kind;
        self
    }

    pub fn max_size(mut self, bytes: u64) -> Self {
        self.options.max_size = bytes;
        self
    }

    pub fn log_capacity(mut self, entries: usize) -> Self {
        self.options.log_capacity = entries;
        self
    }

    pub fn sync_on_close(mut self, enabled: bool) -> Self {
        self.options.sync_on_close = enabled;
        self
    }

    pub fn create_if_missing(mut self, enabled: bool) -> Self {
        self.options.create_if_missing = enabled;
        self
    }

    pub fn options(&self) -> &NdOptions {
        &self.options
    }

    /// Opens the store, creating it when allowed and absent.
    ///
    /// An existing file is validated against `registry`'s fingerprint and
    /// rejected with `CorruptFormat` on any mismatch.
    pub fn open(self, registry: impl Into<Arc<Registry>>) -> Result<Nd> {
        let registry = registry.into();
        let options = self.options;
        let store_options = options.store_options();
        let fingerprint = registry.fingerprint();
        let initial = CHUNK_SIZE as u64;

        let store = match &options.storage {
            StorageKind::Memory => {
                Store::create(MemoryStorage::create(initial)?, fingerprint, &store_options)?
            }
            StorageKind::Mmap { path } => {
                let existing = match std::fs::metadata(path) {
                    Ok(meta) => meta.len() > 0,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                    Err(e) => {
                        return Err(e)
                            .wrap_err_with(|| format!("failed to inspect '{}'", path.display()))
                    }
                };

                if existing {
                    Store::open(MmapStorage::open(path)?, Some(fingerprint), &store_options)
                        .wrap_err_with(|| format!("failed to open store '{}'", path.display()))?
                } else if options.create_if_missing {
                    Store::create(
                        MmapStorage::create(path, initial)?,
                        fingerprint,
                        &store_options,
                    )?
                } else {
                    bail!("store file '{}' does not exist", path.display());
                }
            }
        };

        Ok(Nd::from_parts(store, registry, options))
    }
}
