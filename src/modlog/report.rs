//! Forensic replay of the modification log.

use std::fmt;

use super::{ModificationLog, Operation, Tag};
use crate::storage::Address;

/// One operation that touched a queried range, with the brackets that were
/// open around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModificationReport {
    pub seq: u64,
    pub op: Operation,
    /// Enclosing tags, outermost first.
    pub tags: Vec<Tag>,
    /// Set when some enclosing `start` was already evicted from the ring
    /// buffer, so `tags` is missing outer brackets.
    pub truncated: bool,
}

impl ModificationReport {
    /// Innermost tag, i.e. the field write that performed the operation.
    pub fn innermost(&self) -> Option<&Tag> {
        self.tags.last()
    }
}

impl fmt::Display for ModificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.seq, self.op)?;
        if self.tags.is_empty() {
            return Ok(());
        }
        f.write_str(" in [")?;
        if self.truncated {
            f.write_str("... > ")?;
        }
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{}", tag)?;
        }
        f.write_str("]")
    }
}

impl ModificationLog {
    /// Replays the retained entries and reports every write, allocation or
    /// free overlapping `[address, address + len)`, oldest first.
    pub fn history_for(&self, address: Address, len: u64) -> Vec<ModificationReport> {
        let lo = address.get();
        let hi = lo.saturating_add(len.max(1));
        let mut stack: Vec<Tag> = Vec::new();
        let mut reports = Vec::new();

        for entry in self.entries() {
            match &entry.op {
                Operation::Start(tag) => stack.push(tag.clone()),
                Operation::End(tag) => {
                    if let Some(idx) = stack.iter().rposition(|open| open == tag) {
                        stack.truncate(idx);
                    }
                }
                op => {
                    let Some((start, end)) = op.range() else {
                        continue;
                    };
                    if start < hi && lo < end {
                        reports.push(ModificationReport {
                            seq: entry.seq,
                            op: op.clone(),
                            tags: stack.clone(),
                            truncated: stack.len() < entry.depth,
                        });
                    }
                }
            }
        }

        reports
    }

    /// The most recent operation that touched the range.
    pub fn last_writer(&self, address: Address, len: u64) -> Option<ModificationReport> {
        self.history_for(address, len).pop()
    }
}
