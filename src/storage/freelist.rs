//! # Free-List Size Classes
//!
//! Deleted records are not returned to the operating system; their blocks are
//! threaded onto free lists and handed out again by later allocations of the
//! same size. No separate free-list section exists in the file: the links
//! live inside the freed blocks themselves.
//!
//! ## Size Classes
//!
//! Requested sizes are rounded up to a multiple of `BLOCK_SIZE_DELTA` (8), with
//! a floor of `MIN_BLOCK_SIZE`. Blocks up to `MAX_POOLED_BLOCK_SIZE` map to one
//! of `SIZE_CLASS_COUNT` lists:
//!
//! ```text
//! block size   8  16  24  ...  2048
//! class        0   1   2  ...   255
//! head slot    FREE_TABLE_OFFSET + class * 8
//! ```
//!
//! ## Block Links
//!
//! ```text
//! pooled block:   [next: u64][... stale record bytes ...]
//! large block:    [next: u64][size: u64][... stale record bytes ...]
//! ```
//!
//! A `next` of 0 terminates a list. Large blocks share one list whose head is
//! kept in the store header; an allocation only reuses a large block whose
//! size matches exactly.

use eyre::{ensure, Result};

use crate::config::{
    BLOCK_SIZE_DELTA, FREE_TABLE_OFFSET, MAX_POOLED_BLOCK_SIZE, MIN_BLOCK_SIZE, PTR_SIZE,
    SIZE_CLASS_COUNT,
};

/// Which free list a block of a given size belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// Index into the per-size head table.
    Pooled(usize),
    /// The single large-block list.
    Large,
}

impl SizeClass {
    /// Classifies an already rounded block size.
    pub fn of_block(block_size: u64) -> Self {
        if block_size <= MAX_POOLED_BLOCK_SIZE as u64 {
            SizeClass::Pooled((block_size as usize / BLOCK_SIZE_DELTA) - 1)
        } else {
            SizeClass::Large
        }
    }

    /// Address of the head slot for a pooled class.
    pub fn head_slot(class: usize) -> u64 {
        debug_assert!(class < SIZE_CLASS_COUNT);
        (FREE_TABLE_OFFSET + class * PTR_SIZE) as u64
    }

    /// Block size served by a pooled class.
    pub fn pooled_block_size(class: usize) -> u64 {
        ((class + 1) * BLOCK_SIZE_DELTA) as u64
    }
}

/// Rounds a requested allocation size to the block size actually reserved.
pub fn block_size(requested: u64) -> Result<u64> {
    ensure!(requested > 0, "allocation size must be non-zero");

    let delta = BLOCK_SIZE_DELTA as u64;
    let rounded = requested
        .checked_add(delta - 1)
        .map(|v| v / delta * delta)
        .ok_or_else(|| eyre::eyre!("allocation size {} overflows", requested))?;

    Ok(rounded.max(MIN_BLOCK_SIZE as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_rounds_up_to_delta() {
        assert_eq!(block_size(1).unwrap(), 8);
        assert_eq!(block_size(8).unwrap(), 8);
        assert_eq!(block_size(9).unwrap(), 16);
        assert_eq!(block_size(12).unwrap(), 16);
        assert_eq!(block_size(2049).unwrap(), 2056);
    }

    #[test]
    fn block_size_rejects_zero() {
        assert!(block_size(0).is_err());
    }

    #[test]
    fn classes_cover_pooled_range() {
        assert_eq!(SizeClass::of_block(8), SizeClass::Pooled(0));
        assert_eq!(SizeClass::of_block(16), SizeClass::Pooled(1));
        assert_eq!(
            SizeClass::of_block(MAX_POOLED_BLOCK_SIZE as u64),
            SizeClass::Pooled(SIZE_CLASS_COUNT - 1)
        );
        assert_eq!(
            SizeClass::of_block(MAX_POOLED_BLOCK_SIZE as u64 + 8),
            SizeClass::Large
        );
    }

    #[test]
    fn pooled_block_size_inverts_class() {
        for class in [0, 1, 17, SIZE_CLASS_COUNT - 1] {
            let size = SizeClass::pooled_block_size(class);
            assert_eq!(SizeClass::of_block(size), SizeClass::Pooled(class));
        }
    }

    #[test]
    fn head_slots_follow_header() {
        assert_eq!(SizeClass::head_slot(0), FREE_TABLE_OFFSET as u64);
        assert_eq!(SizeClass::head_slot(1), FREE_TABLE_OFFSET as u64 + 8);
    }
}
