//! # Modification Log
//!
//! The modification log instruments writes for corruption forensics. It
//! never changes stored bytes and never fails: a caller that needs to know
//! "what wrote to this address last" asks the log instead of reconstructing
//! history from raw bytes.
//!
//! ## Brackets
//!
//! Every field write is bracketed by `start(tag)` / `end(tag)`, where the tag
//! names the field ("Writing field 1 (next), a FieldPointer in struct Pair").
//! Brackets nest: a relation update that rewrites several slots shows up as
//! an outer bracket containing the inner slot writes.
//!
//! ```text
//! seq depth op
//! 0   0     start  Writing field 0 (parent), a FieldManyToOne in struct Child
//! 1   1     write  0x1010+8
//! 2   1     alloc  0x1040 (24 bytes)
//! 3   1     write  0x1040+8
//! 4   0     end    Writing field 0 (parent), a FieldManyToOne in struct Child
//! ```
//!
//! Inside brackets the store records `Write`, `Alloc` and `Free` operations
//! with the affected range.
//!
//! ## Failure Independence
//!
//! Bracket release is tied to a guard (see
//! [`Store::bracket`](crate::storage::Store::bracket)), so an `end` is
//! recorded on every exit path of a write, including one that fails with
//! `OutOfBounds`. A mismatched `end` is counted and reported through
//! `tracing`, but never turned into an error: the data write that the bracket
//! surrounds has already happened or failed on its own terms.
//!
//! ## Retention
//!
//! The log is a ring buffer of `capacity` entries; the oldest entries are
//! dropped first. A capacity of 0 disables logging entirely.

mod bracket;
mod report;
mod tag;

use std::collections::VecDeque;
use std::fmt;

use tracing::warn;

use crate::storage::Address;

pub use bracket::LogBracket;
pub use report::ModificationReport;
pub use tag::Tag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Start(Tag),
    End(Tag),
    Write { address: Address, len: u64 },
    Alloc { address: Address, size: u64 },
    Free { address: Address, size: u64 },
}

impl Operation {
    /// Byte range `[start, end)` touched by a data operation.
    pub fn range(&self) -> Option<(u64, u64)> {
        match self {
            Operation::Write { address, len } => {
                Some((address.get(), address.get().saturating_add(*len)))
            }
            Operation::Alloc { address, size } | Operation::Free { address, size } => {
                Some((address.get(), address.get().saturating_add(*size)))
            }
            Operation::Start(_) | Operation::End(_) => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Start(tag) => write!(f, "start {}", tag),
            Operation::End(tag) => write!(f, "end {}", tag),
            Operation::Write { address, len } => write!(f, "write {}+{}", address, len),
            Operation::Alloc { address, size } => write!(f, "alloc {} ({} bytes)", address, size),
            Operation::Free { address, size } => write!(f, "free {} ({} bytes)", address, size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    /// Number of brackets open when the entry was recorded (after popping,
    /// for `End`).
    pub depth: usize,
    pub op: Operation,
}

/// Lifetime bracket counters, unaffected by ring-buffer eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketBalance {
    pub starts: u64,
    pub ends: u64,
    pub open: usize,
}

impl BracketBalance {
    pub fn is_balanced(&self) -> bool {
        self.starts == self.ends && self.open == 0
    }
}

#[derive(Debug)]
pub struct ModificationLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
    open: Vec<Tag>,
    next_seq: u64,
    starts: u64,
    ends: u64,
    mismatches: u64,
    dropped: u64,
}

impl ModificationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(4096)),
            open: Vec::new(),
            next_seq: 0,
            starts: 0,
            ends: 0,
            mismatches: 0,
            dropped: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn start(&mut self, tag: &Tag) {
        if !self.is_enabled() {
            return;
        }

        self.starts += 1;
        self.push(Operation::Start(tag.clone()));
        self.open.push(tag.clone());
    }

    pub fn end(&mut self, tag: &Tag) {
        if !self.is_enabled() {
            return;
        }

        self.ends += 1;
        match self.open.iter().rposition(|open| open == tag) {
            Some(idx) if idx + 1 == self.open.len() => {
                self.open.pop();
            }
            Some(idx) => {
                self.mismatches += 1;
                warn!(
                    tag = %tag,
                    innermost = %self.open[self.open.len() - 1],
                    unclosed = self.open.len() - idx - 1,
                    "modification log bracket closed out of order"
                );
                self.open.truncate(idx);
            }
            None => {
                self.mismatches += 1;
                warn!(tag = %tag, "modification log end without matching start");
            }
        }
        self.push(Operation::End(tag.clone()));
    }

    pub(crate) fn record_write(&mut self, address: Address, len: u64) {
        if self.is_enabled() {
            self.push(Operation::Write { address, len });
        }
    }

    pub(crate) fn record_alloc(&mut self, address: Address, size: u64) {
        if self.is_enabled() {
            self.push(Operation::Alloc { address, size });
        }
    }

    pub(crate) fn record_free(&mut self, address: Address, size: u64) {
        if self.is_enabled() {
            self.push(Operation::Free { address, size });
        }
    }

    fn push(&mut self, op: Operation) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }

        self.entries.push_back(LogEntry {
            seq: self.next_seq,
            depth: self.open.len(),
            op,
        });
        self.next_seq += 1;
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn open_tags(&self) -> &[Tag] {
        &self.open
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of every retained entry, oldest first.
    pub fn dump(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn balance(&self) -> BracketBalance {
        BracketBalance {
            starts: self.starts,
            ends: self.ends,
            open: self.open.len(),
        }
    }

    pub fn mismatches(&self) -> u64 {
        self.mismatches
    }

    /// Entries evicted by the ring buffer so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Drops retained entries. Open brackets and counters are kept.
    pub fn clear(&mut self) {
        self.dropped += self.entries.len() as u64;
        self.entries.clear();
    }
}

impl Default for ModificationLog {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(log: &ModificationLog) -> Vec<Operation> {
        log.entries().map(|e| e.op.clone()).collect()
    }

    #[test]
    fn brackets_nest_and_record_depth() {
        let mut log = ModificationLog::new(16);
        let outer = Tag::new("outer");
        let inner = Tag::new("inner");

        log.start(&outer);
        log.start(&inner);
        log.record_write(Address::new(4096), 4);
        log.end(&inner);
        log.end(&outer);

        let depths: Vec<usize> = log.entries().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1, 0]);
        assert!(log.balance().is_balanced());
        assert_eq!(log.mismatches(), 0);
    }

    #[test]
    fn sequence_numbers_increase() {
        let mut log = ModificationLog::new(16);
        let tag = Tag::new("t");

        log.start(&tag);
        log.record_alloc(Address::new(4096), 8);
        log.end(&tag);

        let seqs: Vec<u64> = log.entries().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn end_without_start_is_counted_not_fatal() {
        let mut log = ModificationLog::new(16);

        log.end(&Tag::new("stray"));

        assert_eq!(log.mismatches(), 1);
        assert_eq!(log.depth(), 0);
        assert_eq!(ops(&log), vec![Operation::End(Tag::new("stray"))]);
    }

    #[test]
    fn out_of_order_end_closes_inner_brackets() {
        let mut log = ModificationLog::new(16);
        let outer = Tag::new("outer");
        let inner = Tag::new("inner");

        log.start(&outer);
        log.start(&inner);
        log.end(&outer);

        assert_eq!(log.mismatches(), 1);
        assert_eq!(log.depth(), 0);
    }

    #[test]
    fn ring_buffer_drops_oldest() {
        let mut log = ModificationLog::new(3);

        for i in 0..5u64 {
            log.record_write(Address::new(4096 + i * 8), 8);
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.dropped(), 2);
        assert_eq!(log.entries().next().map(|e| e.seq), Some(2));
    }

    #[test]
    fn balance_survives_eviction() {
        let mut log = ModificationLog::new(2);
        let tag = Tag::new("t");

        for _ in 0..10 {
            log.start(&tag);
            log.record_write(Address::new(4096), 1);
            log.end(&tag);
        }

        let balance = log.balance();
        assert_eq!(balance.starts, 10);
        assert_eq!(balance.ends, 10);
        assert!(balance.is_balanced());
    }

    #[test]
    fn disabled_log_records_nothing() {
        let mut log = ModificationLog::disabled();
        let tag = Tag::new("t");

        log.start(&tag);
        log.record_write(Address::new(4096), 4);
        log.end(&tag);

        assert!(!log.is_enabled());
        assert!(log.is_empty());
        assert_eq!(log.balance().starts, 0);
    }

    #[test]
    fn clear_keeps_open_brackets() {
        let mut log = ModificationLog::new(8);
        let tag = Tag::new("t");

        log.start(&tag);
        log.clear();

        assert!(log.is_empty());
        assert_eq!(log.open_tags(), &[tag.clone()]);
        log.end(&tag);
        assert!(log.balance().is_balanced());
    }

    #[test]
    fn operation_display() {
        assert_eq!(
            Operation::Write {
                address: Address::new(0x1000),
                len: 4
            }
            .to_string(),
            "write 0x1000+4"
        );
        assert_eq!(
            Operation::Free {
                address: Address::new(0x1008),
                size: 16
            }
            .to_string(),
            "free 0x1008 (16 bytes)"
        );
    }
}
