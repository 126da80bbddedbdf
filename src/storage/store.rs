//! # Persistent Store
//!
//! `Store` turns a [`StorageDriver`] byte space into a record heap: it owns
//! the header, hands out and reclaims blocks, and is the only component that
//! touches raw bytes. Every typed read and write goes through a single bounds
//! check, so no caller can reach past the backing space.
//!
//! ## Address Space
//!
//! ```text
//! 0                 128                    4096
//! +-----------------+----------------------+-------------------------------+
//! | StoreHeader     | free-list head table | records ... | end_of_space -> |
//! +-----------------+----------------------+-------------------------------+
//!  chunk 0 (reserved)                        chunk 1..N
//! ```
//!
//! ## Allocation
//!
//! 1. Round the request to a block size (see [`freelist`](super::freelist)).
//! 2. Pop a block of exactly that size from its free list, if any.
//! 3. Otherwise bump `end_of_space`, growing the backing space by whole chunks
//!    when the block does not fit. Growth beyond `max_size` fails with
//!    `OutOfSpace` before anything is modified.
//!
//! `free` threads the block onto its list without clearing it: reused blocks
//! contain whatever the previous record left behind.
//!
//! ## Crash Ordering
//!
//! - Growth extends the backing space before the header records the new
//!   `end_of_space`; a crash in between only leaves unused trailing chunks.
//! - `free` writes the block's `next` link before publishing the block as the
//!   list head; a crash in between leaks the block instead of linking garbage.
//! - The header's open flag is set for the whole session and cleared by a
//!   clean close, so the next open can tell an interrupted session apart.
//!
//! ## Modification Log
//!
//! The store owns the [`ModificationLog`]. Every write records a `Write`
//! entry, `allocate`/`free` record `Alloc`/`Free`, and
//! [`Store::bracket`] opens a tagged bracket released by a guard.

use std::ops::Range;

use eyre::{ensure, Result};
use tracing::{debug, info, warn};

use super::driver::{AnyStorage, StorageDriver};
use super::freelist::{block_size, SizeClass};
use super::headers::StoreHeader;
use super::Address;
use crate::config::{
    BLOCK_SIZE_DELTA, CHUNK_SIZE, DEFAULT_LOG_CAPACITY, DEFAULT_MAX_SIZE, FIRST_RECORD_ADDRESS,
    FREE_TABLE_OFFSET, FREE_TABLE_SIZE, LARGE_BLOCK_LINK_SIZE, MAX_POOLED_BLOCK_SIZE,
    MIN_BLOCK_SIZE, PTR_SIZE, SIZE_CLASS_COUNT,
};
use crate::error::StoreError;
use crate::modlog::{LogBracket, ModificationLog, Tag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Upper bound of the backing space in bytes.
    pub max_size: u64,
    /// Entries retained by the modification log; 0 disables it.
    pub log_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub size: u64,
    pub chunk_count: u64,
    pub end_of_space: u64,
    pub allocated_bytes: u64,
    pub free_bytes: u64,
    pub session_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub free_blocks: u64,
    pub free_bytes: u64,
    pub problems: Vec<String>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

#[derive(Debug)]
pub struct Store {
    storage: AnyStorage,
    header: StoreHeader,
    max_size: u64,
    log: ModificationLog,
    unclean_shutdown: bool,
}

macro_rules! primitive_accessors {
    ($($read:ident, $write:ident, $ty:ty);* $(;)?) => {
        $(
            #[inline]
            pub fn $read(&self, address: Address) -> Result<$ty> {
                Ok(<$ty>::from_le_bytes(self.read_array(address)?))
            }

            #[inline]
            pub fn $write(&mut self, address: Address, value: $ty) -> Result<()> {
                self.write_bytes(address, &value.to_le_bytes())
            }
        )*
    };
}

impl Store {
    /// Initializes a fresh store over `storage`, which must be zero-filled
    /// and at least one chunk long.
    pub fn create(
        storage: impl Into<AnyStorage>,
        schema_crc: u64,
        options: &StoreOptions,
    ) -> Result<Self> {
        let mut storage = storage.into();

        ensure!(
            storage.len() >= CHUNK_SIZE as u64,
            "backing space of {} bytes cannot hold the reserved chunk",
            storage.len()
        );
        ensure!(
            options.max_size >= storage.len(),
            "max size {} is below the initial size {}",
            options.max_size,
            storage.len()
        );

        let mut header = StoreHeader::new(schema_crc);
        header.set_session_count(1);
        header.set_open_flag(1);

        let bytes = storage.bytes_mut();
        bytes[FREE_TABLE_OFFSET..FREE_TABLE_OFFSET + FREE_TABLE_SIZE].fill(0);
        header.write_to(bytes);
        storage.sync()?;

        info!(
            size = storage.len(),
            persistent = storage.is_persistent(),
            schema_crc,
            "created record store"
        );

        Ok(Self {
            storage,
            header,
            max_size: options.max_size,
            log: ModificationLog::new(options.log_capacity),
            unclean_shutdown: false,
        })
    }

    /// Opens an existing store, validating its header.
    ///
    /// With `expected_schema`, a stored fingerprint that differs is rejected
    /// as `CorruptFormat`: the records were laid out by another registry.
    pub fn open(
        storage: impl Into<AnyStorage>,
        expected_schema: Option<u64>,
        options: &StoreOptions,
    ) -> Result<Self> {
        let mut storage = storage.into();
        let mut header = StoreHeader::read_from(storage.bytes())?;
        let size = storage.len();

        if size % CHUNK_SIZE as u64 != 0 {
            return Err(StoreError::CorruptFormat(format!(
                "size {} is not a multiple of the chunk size {}",
                size, CHUNK_SIZE
            ))
            .into());
        }

        let end = header.end_of_space();
        if end < FIRST_RECORD_ADDRESS || end > size || end % BLOCK_SIZE_DELTA as u64 != 0 {
            return Err(StoreError::CorruptFormat(format!(
                "end of space {} is invalid for a backing size of {}",
                end, size
            ))
            .into());
        }

        if let Some(expected) = expected_schema {
            if header.schema_crc() != expected {
                return Err(StoreError::CorruptFormat(format!(
                    "schema fingerprint {:#018x} does not match registry {:#018x}",
                    header.schema_crc(),
                    expected
                ))
                .into());
            }
        }

        let unclean_shutdown = header.is_open();
        if unclean_shutdown {
            warn!(
                session = header.session_count(),
                "previous session did not close the store cleanly"
            );
        }

        header.set_session_count(header.session_count().saturating_add(1));
        header.set_open_flag(1);
        header.write_to(storage.bytes_mut());
        storage.sync()?;

        info!(
            size,
            end_of_space = end,
            session = header.session_count(),
            "opened record store"
        );

        Ok(Self {
            storage,
            header,
            max_size: options.max_size.max(size),
            log: ModificationLog::new(options.log_capacity),
            unclean_shutdown,
        })
    }

    /// Clears the open flag, optionally syncing the backing space.
    pub(crate) fn mark_closed(&mut self, sync: bool) -> Result<()> {
        self.header.set_open_flag(0);
        self.persist_header();
        if sync {
            self.storage.sync()?;
        }

        info!(
            end_of_space = self.header.end_of_space(),
            allocated_bytes = self.header.allocated_bytes(),
            "closed record store"
        );
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.mark_closed(true)
    }

    pub fn sync(&self) -> Result<()> {
        self.storage.sync()
    }

    fn persist_header(&mut self) {
        self.header.write_to(self.storage.bytes_mut());
    }

    // ------------------------------------------------------------------
    // Bounds-checked primitives
    // ------------------------------------------------------------------

    fn check_range(&self, address: Address, len: u64) -> Result<Range<usize>> {
        let size = self.storage.len();
        let start = address.get();
        match start.checked_add(len) {
            Some(end) if start < size && end <= size => Ok(start as usize..end as usize),
            _ => Err(StoreError::OutOfBounds {
                address: start,
                len,
                size,
            }
            .into()),
        }
    }

    fn read_array<const N: usize>(&self, address: Address) -> Result<[u8; N]> {
        let range = self.check_range(address, N as u64)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.storage.bytes()[range]);
        Ok(out)
    }

    primitive_accessors! {
        read_u8, write_u8, u8;
        read_i8, write_i8, i8;
        read_u16, write_u16, u16;
        read_i16, write_i16, i16;
        read_u32, write_u32, u32;
        read_i32, write_i32, i32;
        read_u64, write_u64, u64;
        read_i64, write_i64, i64;
    }

    #[inline]
    pub fn read_address(&self, address: Address) -> Result<Address> {
        self.read_u64(address).map(Address::new)
    }

    #[inline]
    pub fn write_address(&mut self, address: Address, value: Address) -> Result<()> {
        self.write_u64(address, value.get())
    }

    /// Zero-copy view of `len` bytes at `address`.
    pub fn read_bytes(&self, address: Address, len: u64) -> Result<&[u8]> {
        let range = self.check_range(address, len)?;
        Ok(&self.storage.bytes()[range])
    }

    pub fn write_bytes(&mut self, address: Address, bytes: &[u8]) -> Result<()> {
        let len = bytes.len() as u64;
        let range = self.check_range(address, len)?;
        self.storage.bytes_mut()[range].copy_from_slice(bytes);
        self.log.record_write(address, len);
        Ok(())
    }

    /// Reads `len` bytes at `address` as UTF-8.
    pub fn read_str(&self, address: Address, len: u64) -> Result<&str> {
        let bytes = self.read_bytes(address, len)?;
        std::str::from_utf8(bytes).map_err(|e| {
            StoreError::CorruptFormat(format!("invalid UTF-8 in string at {}: {}", address, e))
                .into()
        })
    }

    pub fn write_str(&mut self, address: Address, text: &str) -> Result<()> {
        self.write_bytes(address, text.as_bytes())
    }

    pub fn zero(&mut self, address: Address, len: u64) -> Result<()> {
        let range = self.check_range(address, len)?;
        self.storage.bytes_mut()[range].fill(0);
        self.log.record_write(address, len);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Reserves a block of at least `size` bytes. Contents are unspecified.
    pub fn allocate(&mut self, size: u64) -> Result<Address> {
        let block = block_size(size)?;

        let reused = match SizeClass::of_block(block) {
            SizeClass::Pooled(class) => self.pop_pooled(class)?,
            SizeClass::Large => self.take_large(block)?,
        };

        let address = match reused {
            Some(address) => {
                self.header
                    .set_free_bytes(self.header.free_bytes().saturating_sub(block));
                address
            }
            None => self.extend(block)?,
        };

        self.header
            .set_allocated_bytes(self.header.allocated_bytes().saturating_add(block));
        self.persist_header();
        self.log.record_alloc(address, block);

        debug!(address = %address, size = block, reused = reused.is_some(), "allocated block");

        Ok(address)
    }

    /// Returns a block to its free list. `size` must be the size it was
    /// allocated with, and the block must be live: freeing it twice links it
    /// into its list twice, which is only caught when it is still the list
    /// head. The block is not cleared.
    pub fn free(&mut self, address: Address, size: u64) -> Result<()> {
        let block = block_size(size)?;
        let end = self.header.end_of_space();
        let start = address.get();

        if start < FIRST_RECORD_ADDRESS || start.checked_add(block).map_or(true, |e| e > end) {
            return Err(StoreError::OutOfBounds {
                address: start,
                len: block,
                size: end,
            }
            .into());
        }
        ensure!(
            start % BLOCK_SIZE_DELTA as u64 == 0,
            "cannot free {}: not aligned to {} bytes",
            address,
            BLOCK_SIZE_DELTA
        );

        match SizeClass::of_block(block) {
            SizeClass::Pooled(class) => {
                let slot = Address::new(SizeClass::head_slot(class));
                let head = self.read_address(slot)?;
                ensure!(head != address, "block {} is already free", address);
                self.write_address(address, head)?;
                self.write_address(slot, address)?;
            }
            SizeClass::Large => {
                let head = Address::new(self.header.large_free_head());
                ensure!(head != address, "block {} is already free", address);
                self.write_address(address, head)?;
                self.write_u64(address.offset(PTR_SIZE as u32), block)?;
                self.header.set_large_free_head(start);
            }
        }

        self.header
            .set_allocated_bytes(self.header.allocated_bytes().saturating_sub(block));
        self.header
            .set_free_bytes(self.header.free_bytes().saturating_add(block));
        self.persist_header();
        self.log.record_free(address, block);

        debug!(address = %address, size = block, "freed block");

        Ok(())
    }

    fn pop_pooled(&mut self, class: usize) -> Result<Option<Address>> {
        let slot = Address::new(SizeClass::head_slot(class));
        let head = self.read_address(slot)?;
        if head.is_null() {
            return Ok(None);
        }

        let block = SizeClass::pooled_block_size(class);
        self.check_free_link(head, block)?;
        let next = self.read_address(head)?;
        if !next.is_null() {
            self.check_free_link(next, block)?;
            if next == head {
                return Err(StoreError::CorruptFormat(format!(
                    "size class {}: block {} links to itself",
                    block, head
                ))
                .into());
            }
        }

        self.write_address(slot, next)?;
        Ok(Some(head))
    }

    /// Rejects a free-list link that cannot be a block of `len` bytes in
    /// record space.
    fn check_free_link(&self, link: Address, len: u64) -> Result<()> {
        let start = link.get();
        let fits = start
            .checked_add(len)
            .is_some_and(|end| end <= self.header.end_of_space());
        if start < FIRST_RECORD_ADDRESS || start % BLOCK_SIZE_DELTA as u64 != 0 || !fits {
            return Err(StoreError::CorruptFormat(format!(
                "free list links to invalid block {} ({} bytes)",
                link, len
            ))
            .into());
        }
        Ok(())
    }

    fn take_large(&mut self, block: u64) -> Result<Option<Address>> {
        let mut prev: Option<Address> = None;
        let mut current = Address::new(self.header.large_free_head());
        let mut remaining = self.max_list_steps();

        while !current.is_null() {
            self.check_free_link(current, LARGE_BLOCK_LINK_SIZE as u64)?;
            let next = self.read_address(current)?;
            let size = self.read_u64(current.offset(PTR_SIZE as u32))?;

            if size == block {
                self.check_free_link(current, block)?;
                if !next.is_null() {
                    self.check_free_link(next, LARGE_BLOCK_LINK_SIZE as u64)?;
                }
                match prev {
                    Some(prev) => self.write_address(prev, next)?,
                    None => self.header.set_large_free_head(next.get()),
                }
                return Ok(Some(current));
            }

            remaining = remaining.checked_sub(1).ok_or_else(|| {
                StoreError::CorruptFormat("cycle in large-block free list".into())
            })?;
            prev = Some(current);
            current = next;
        }

        Ok(None)
    }

    fn extend(&mut self, block: u64) -> Result<Address> {
        let address = self.header.end_of_space();
        let size = self.storage.len();
        let new_end = address.checked_add(block).ok_or(StoreError::OutOfSpace {
            requested: u64::MAX,
            limit: self.max_size,
        })?;

        if new_end > size {
            let chunk = CHUNK_SIZE as u64;
            let new_size = new_end.div_ceil(chunk) * chunk;
            if new_size > self.max_size {
                return Err(StoreError::OutOfSpace {
                    requested: new_size,
                    limit: self.max_size,
                }
                .into());
            }

            self.storage.grow(new_size).map_err(|e| {
                e.wrap_err(StoreError::OutOfSpace {
                    requested: new_size,
                    limit: self.max_size,
                })
            })?;

            info!(old_size = size, new_size, "grew backing space");
        }

        self.header.set_end_of_space(new_end);
        Ok(Address::new(address))
    }

    fn max_list_steps(&self) -> u64 {
        (self.header.end_of_space() - FIRST_RECORD_ADDRESS) / MIN_BLOCK_SIZE as u64 + 1
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Walks every free list and cross-checks the header counters.
    ///
    /// Never fails: unreadable or inconsistent links are reported as problems
    /// and end the walk of that list.
    pub fn verify(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();

        for class in 0..SIZE_CLASS_COUNT {
            let head = match self.read_address(Address::new(SizeClass::head_slot(class))) {
                Ok(head) => head,
                Err(e) => {
                    report.problems.push(format!("size class {}: {}", class, e));
                    continue;
                }
            };
            let block = SizeClass::pooled_block_size(class);
            self.walk_free_list(head, Some(block), &mut report);
        }

        self.walk_free_list(
            Address::new(self.header.large_free_head()),
            None,
            &mut report,
        );

        if report.free_bytes != self.header.free_bytes() {
            report.problems.push(format!(
                "free lists hold {} bytes but header records {}",
                report.free_bytes,
                self.header.free_bytes()
            ));
        }

        let used = self.header.end_of_space() - FIRST_RECORD_ADDRESS;
        if self
            .header
            .allocated_bytes()
            .saturating_add(self.header.free_bytes())
            > used
        {
            report.problems.push(format!(
                "allocated {} + free {} bytes exceed the {} bytes in use",
                self.header.allocated_bytes(),
                self.header.free_bytes(),
                used
            ));
        }

        for problem in &report.problems {
            warn!(problem = %problem, "store integrity problem");
        }

        report
    }

    fn walk_free_list(&self, head: Address, pooled: Option<u64>, report: &mut IntegrityReport) {
        let end = self.header.end_of_space();
        let label = match pooled {
            Some(block) => format!("size class {}", block),
            None => "large blocks".to_string(),
        };
        let mut current = head;
        let mut remaining = self.max_list_steps();

        while !current.is_null() {
            let start = current.get();
            if start < FIRST_RECORD_ADDRESS || start % BLOCK_SIZE_DELTA as u64 != 0 {
                report
                    .problems
                    .push(format!("{}: invalid block address {}", label, current));
                return;
            }

            let block = match pooled {
                Some(block) => block,
                None => match self.read_u64(current.offset(PTR_SIZE as u32)) {
                    Ok(size)
                        if size > MAX_POOLED_BLOCK_SIZE as u64
                            && size % BLOCK_SIZE_DELTA as u64 == 0 =>
                    {
                        size
                    }
                    Ok(size) => {
                        report.problems.push(format!(
                            "{}: block {} has invalid size {}",
                            label, current, size
                        ));
                        return;
                    }
                    Err(e) => {
                        report.problems.push(format!("{}: {}", label, e));
                        return;
                    }
                },
            };

            if start.checked_add(block).map_or(true, |e| e > end) {
                report.problems.push(format!(
                    "{}: block {} extends past end of space {}",
                    label, current, end
                ));
                return;
            }

            report.free_blocks += 1;
            report.free_bytes += block;

            remaining -= 1;
            if remaining == 0 {
                report.problems.push(format!("{}: cycle detected", label));
                return;
            }

            current = match self.read_address(current) {
                Ok(next) => next,
                Err(e) => {
                    report.problems.push(format!("{}: {}", label, e));
                    return;
                }
            };
        }
    }

    pub fn stats(&self) -> StoreStats {
        let size = self.storage.len();
        StoreStats {
            size,
            chunk_count: size / CHUNK_SIZE as u64,
            end_of_space: self.header.end_of_space(),
            allocated_bytes: self.header.allocated_bytes(),
            free_bytes: self.header.free_bytes(),
            session_count: self.header.session_count(),
        }
    }

    // ------------------------------------------------------------------
    // Modification log
    // ------------------------------------------------------------------

    /// Opens a log bracket tagged `tag`; it closes when the guard drops.
    pub fn bracket(&mut self, tag: &Tag) -> LogBracket<'_> {
        LogBracket::open(self, tag)
    }

    pub fn log(&self) -> &ModificationLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut ModificationLog {
        &mut self.log
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn size(&self) -> u64 {
        self.storage.len()
    }

    pub fn end_of_space(&self) -> u64 {
        self.header.end_of_space()
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn header(&self) -> &StoreHeader {
        &self.header
    }

    pub fn schema_crc(&self) -> u64 {
        self.header.schema_crc()
    }

    pub fn is_persistent(&self) -> bool {
        self.storage.is_persistent()
    }

    /// Whether the previous session ended without a clean close.
    pub fn was_unclean_shutdown(&self) -> bool {
        self.unclean_shutdown
    }
}
