//! # Internal Macros
//!
//! ## zerocopy_accessors!
//!
//! Generates getter and setter methods for zerocopy struct fields that use
//! little-endian wrapper types (U32, U64).
//!
//! ### Usage
//!
//! ```ignore
//! use zerocopy::little_endian::{U32, U64};
//!
//! #[repr(C)]
//! struct Header {
//!     end_of_space: U64,
//!     open_flag: U32,
//! }
//!
//! impl Header {
//!     zerocopy_accessors! {
//!         end_of_space: u64,
//!         open_flag: u32,
//!     }
//! }
//!
//! // Generates:
//! // pub fn end_of_space(&self) -> u64 { self.end_of_space.get() }
//! // pub fn set_end_of_space(&mut self, val: u64) { self.end_of_space = U64::new(val); }
//! // pub fn open_flag(&self) -> u32 { self.open_flag.get() }
//! // pub fn set_open_flag(&mut self, val: u32) { self.open_flag = U32::new(val); }
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::little_endian::U32::new(val);
            }
        }
    };
    (@impl $field:ident, u64) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u64 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u64) {
                self.$field = ::zerocopy::little_endian::U64::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}
