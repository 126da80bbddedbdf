//! # Storage Module
//!
//! This module provides the persistent byte space that records live in:
//! a memory-mapped file (or an in-memory buffer for tests and scratch use)
//! addressed by 64-bit offsets, plus the allocator and typed accessors built
//! on top of it.
//!
//! ## Layers
//!
//! ```text
//! Store            allocate/free, typed reads and writes, header, log
//!   └── AnyStorage   StorageDriver: bytes(), bytes_mut(), grow(), sync()
//!         ├── MmapStorage     file-backed, memmap2
//!         └── MemoryStorage   Vec<u8>
//! ```
//!
//! ## Safety Model
//!
//! Growing a mapping remaps it, which invalidates every slice into the old
//! region. The borrow checker enforces this for free:
//!
//! ```text
//! Store::read_bytes(&self) -> &[u8]    // borrows the store immutably
//! Store::allocate(&mut self)           // may grow, requires &mut self
//! ```
//!
//! A `&[u8]` returned by `read_bytes` cannot outlive the next allocation.
//!
//! ## Chunks
//!
//! The backing space always has a size that is a multiple of `CHUNK_SIZE`
//! (4096) and grows in whole chunks. Chunk 0 holds the file header and the
//! free-list head table; no record is ever placed there, so address 0 is free
//! to serve as the null pointer.
//!
//! ## Module Organization
//!
//! - `address`: the `Address` newtype
//! - `driver`: the `StorageDriver` trait and `AnyStorage`
//! - `mmap` / `memory`: the two drivers
//! - `headers`: the zerocopy file header
//! - `freelist`: size-class arithmetic for the allocator
//! - `store`: the `Store` itself

mod address;
mod driver;
pub mod freelist;
mod headers;
mod memory;
mod mmap;
mod store;

pub use address::Address;
pub use driver::{AnyStorage, StorageDriver, StorageKind};
pub use headers::{StoreHeader, CURRENT_VERSION, STORE_MAGIC};
pub use memory::MemoryStorage;
pub use mmap::MmapStorage;
pub use store::{IntegrityReport, Store, StoreOptions, StoreStats};
