//! # Store Header
//!
//! The first 128 bytes of every store hold a `StoreHeader`: the format stamp
//! checked at open plus the allocator state that must survive a restart.
//!
//! ## Layout
//!
//! ```text
//! Offset  Size  Field            Description
//! ------  ----  ---------------  ------------------------------------------
//! 0       16    magic            "NdStore v1" padded with NUL
//! 16      4     version          Format version (CURRENT_VERSION)
//! 20      4     chunk_size       Growth quantum the file was written with
//! 24      8     schema_crc       Fingerprint of the record-kind registry
//! 32      8     end_of_space     Bump pointer: first never-allocated byte
//! 40      8     allocated_bytes  Bytes in live blocks
//! 48      8     free_bytes       Bytes in free-listed blocks
//! 56      8     large_free_head  Head of the large-block free list
//! 64      8     session_count    Number of times the store was opened
//! 72      4     open_flag        1 while a session has the store open
//! 76      4     flags            Reserved flag bits
//! 80      48    reserved         Zero
//! ```
//!
//! The per-size-class free-list heads follow the header at
//! `FREE_TABLE_OFFSET`; they are plain 8-byte slots read through the store.
//!
//! ## Endianness
//!
//! All multi-byte fields are little-endian via zerocopy's `U32`/`U64`
//! wrappers, which are also unaligned and so can be read straight out of the
//! mapping.

use eyre::Result;
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{CHUNK_SIZE, FILE_HEADER_SIZE, FIRST_RECORD_ADDRESS};
use crate::error::StoreError;

pub const STORE_MAGIC: &[u8; 16] = b"NdStore v1\x00\x00\x00\x00\x00\x00";

pub const CURRENT_VERSION: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct StoreHeader {
    magic: [u8; 16],
    version: U32,
    chunk_size: U32,
    schema_crc: U64,
    end_of_space: U64,
    allocated_bytes: U64,
    free_bytes: U64,
    large_free_head: U64,
    session_count: U64,
    open_flag: U32,
    flags: U32,
    reserved: [u8; 48],
}

const _: () = assert!(std::mem::size_of::<StoreHeader>() == FILE_HEADER_SIZE);

impl StoreHeader {
    pub fn new(schema_crc: u64) -> Self {
        Self {
            magic: *STORE_MAGIC,
            version: U32::new(CURRENT_VERSION),
            chunk_size: U32::new(CHUNK_SIZE as u32),
            schema_crc: U64::new(schema_crc),
            end_of_space: U64::new(FIRST_RECORD_ADDRESS),
            allocated_bytes: U64::new(0),
            free_bytes: U64::new(0),
            large_free_head: U64::new(0),
            session_count: U64::new(0),
            open_flag: U32::new(0),
            flags: U32::new(0),
            reserved: [0u8; 48],
        }
    }

    /// Parses and validates the header at the start of `bytes`.
    ///
    /// Fails with `CorruptFormat` on a short buffer, foreign magic, another
    /// format version or a different chunk size.
    pub fn read_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(StoreError::CorruptFormat(format!(
                "file too small for header: {} < {}",
                bytes.len(),
                FILE_HEADER_SIZE
            ))
            .into());
        }

        let header = Self::read_from_bytes(&bytes[..FILE_HEADER_SIZE]).map_err(|e| {
            StoreError::CorruptFormat(format!("failed to parse StoreHeader: {:?}", e))
        })?;

        if &header.magic != STORE_MAGIC {
            return Err(StoreError::CorruptFormat("invalid magic bytes".into()).into());
        }

        if header.version() != CURRENT_VERSION {
            return Err(StoreError::CorruptFormat(format!(
                "unsupported version: {} (expected {})",
                header.version(),
                CURRENT_VERSION
            ))
            .into());
        }

        if header.chunk_size() != CHUNK_SIZE as u32 {
            return Err(StoreError::CorruptFormat(format!(
                "chunk size {} does not match {}",
                header.chunk_size(),
                CHUNK_SIZE
            ))
            .into());
        }

        Ok(header)
    }

    /// Writes the header over the first `FILE_HEADER_SIZE` bytes of `bytes`.
    pub fn write_to(&self, bytes: &mut [u8]) {
        bytes[..FILE_HEADER_SIZE].copy_from_slice(self.as_bytes());
    }

    pub fn is_open(&self) -> bool {
        self.open_flag() != 0
    }

    crate::zerocopy_accessors! {
        version: u32,
        chunk_size: u32,
        schema_crc: u64,
        end_of_space: u64,
        allocated_bytes: u64,
        free_bytes: u64,
        large_free_head: u64,
        session_count: u64,
        open_flag: u32,
        flags: u32,
    }
}
