//! Record addresses.
//!
//! An [`Address`] is a byte offset into the backing space. Record addresses
//! are stable until the record is deleted; [`Address::NULL`] (0) lies inside
//! the reserved header chunk and is the "no reference" value of pointer
//! fields.

use std::fmt;

#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address {
    pub const NULL: Address = Address(0);

    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address of the byte `offset` bytes into the record at `self`.
    ///
    /// Saturates instead of wrapping so an absurd address fails the store's
    /// bounds check rather than aliasing a low address.
    #[inline]
    pub const fn offset(self, offset: u32) -> Address {
        Address(self.0.saturating_add(offset as u64))
    }

    /// `None` for the null address.
    #[inline]
    pub fn non_null(self) -> Option<Address> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u64> for Address {
    fn from(raw: u64) -> Self {
        Address(raw)
    }
}

impl From<Address> for u64 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
