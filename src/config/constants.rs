//! # ndstore Configuration Constants
//!
//! This module centralizes the layout constants of the record heap. Constants
//! that depend on each other are co-located and their relationships are
//! enforced with compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! CHUNK_SIZE (4096 bytes)
//!       │
//!       ├─> FILE_HEADER_SIZE (128 bytes, start of chunk 0)
//!       │
//!       ├─> FREE_TABLE_OFFSET (derived: FILE_HEADER_SIZE)
//!       │     One 8-byte list head per size class follows the header.
//!       │     FREE_TABLE_OFFSET + FREE_TABLE_SIZE must fit in chunk 0.
//!       │
//!       └─> FIRST_RECORD_ADDRESS (derived: CHUNK_SIZE)
//!             Chunk 0 is reserved, so address 0 can never name a record
//!             and doubles as the null pointer.
//!
//! BLOCK_SIZE_DELTA (8 bytes)
//!       │
//!       ├─> MIN_BLOCK_SIZE (8, must hold a free-list link)
//!       │
//!       └─> MAX_POOLED_BLOCK_SIZE (2048)
//!             SIZE_CLASS_COUNT = MAX_POOLED_BLOCK_SIZE / BLOCK_SIZE_DELTA
//!             Larger blocks go to the single large-block list, whose nodes
//!             need LARGE_BLOCK_LINK_SIZE bytes (next + size).
//! ```
//!
//! ## Modifying Constants
//!
//! `CHUNK_SIZE` and `BLOCK_SIZE_DELTA` are part of the on-disk format. The
//! chunk size is stamped into every file header and checked at open, so a
//! change here makes existing files refuse to open rather than misread.

// ============================================================================
// CHUNK AND HEADER LAYOUT
// ============================================================================

/// Growth quantum of the backing space. The backing length is always a
/// multiple of this value.
pub const CHUNK_SIZE: usize = 4096;

/// Size of the fixed file header at offset 0.
pub const FILE_HEADER_SIZE: usize = 128;

/// Width of a stored record address.
pub const PTR_SIZE: usize = 8;

// ============================================================================
// ALLOCATOR SIZE CLASSES
// ============================================================================

/// Allocation sizes are rounded up to a multiple of this value.
pub const BLOCK_SIZE_DELTA: usize = 8;

/// Smallest block handed out; a freed block stores its `next` link in place.
pub const MIN_BLOCK_SIZE: usize = PTR_SIZE;

/// Largest block served from a per-size-class free list.
pub const MAX_POOLED_BLOCK_SIZE: usize = 2048;

/// Number of per-size free lists (8, 16, ..., 2048 bytes).
pub const SIZE_CLASS_COUNT: usize = MAX_POOLED_BLOCK_SIZE / BLOCK_SIZE_DELTA;

/// Bytes written into a freed large block: `next` link followed by its size.
pub const LARGE_BLOCK_LINK_SIZE: usize = 2 * PTR_SIZE;

/// The free-list head table starts right after the header.
pub const FREE_TABLE_OFFSET: usize = FILE_HEADER_SIZE;

/// Bytes occupied by the free-list head table.
pub const FREE_TABLE_SIZE: usize = SIZE_CLASS_COUNT * PTR_SIZE;

/// Address of the first byte available to records.
pub const FIRST_RECORD_ADDRESS: u64 = CHUNK_SIZE as u64;

const _: () = assert!(
    FREE_TABLE_OFFSET + FREE_TABLE_SIZE <= CHUNK_SIZE,
    "header and free-list head table must fit in the reserved chunk"
);

const _: () = assert!(
    MIN_BLOCK_SIZE >= PTR_SIZE && MIN_BLOCK_SIZE % BLOCK_SIZE_DELTA == 0,
    "a minimum block must hold a free-list link and be a whole size class"
);

const _: () = assert!(
    MAX_POOLED_BLOCK_SIZE % BLOCK_SIZE_DELTA == 0,
    "MAX_POOLED_BLOCK_SIZE must be a multiple of BLOCK_SIZE_DELTA"
);

const _: () = assert!(
    MAX_POOLED_BLOCK_SIZE >= LARGE_BLOCK_LINK_SIZE,
    "large blocks must be able to hold their link"
);

const _: () = assert!(
    FIRST_RECORD_ADDRESS as usize % BLOCK_SIZE_DELTA == 0,
    "record addresses must start on a size-class boundary"
);

// ============================================================================
// RUNTIME DEFAULTS
// ============================================================================

/// Default upper bound of the backing space (64 GiB).
pub const DEFAULT_MAX_SIZE: u64 = 64 * 1024 * 1024 * 1024;

/// Default number of entries retained by the modification log.
pub const DEFAULT_LOG_CAPACITY: usize = 65_536;

const _: () = assert!(
    DEFAULT_MAX_SIZE % CHUNK_SIZE as u64 == 0,
    "DEFAULT_MAX_SIZE must be a whole number of chunks"
);
