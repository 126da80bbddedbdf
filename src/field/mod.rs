//! # Field Descriptors
//!
//! A field descriptor binds one logical attribute of a record kind to a fixed
//! byte range inside every record of that kind. Descriptors are created by
//! [`StructDef`](crate::schema::StructDef) while a layout is declared and are
//! immutable afterwards: their offset never changes.
//!
//! ## Slot Layouts
//!
//! ```text
//! FieldInt<T>      [value: T]                         1/2/4/8 bytes
//! FieldString      [blob: u64][len: u32]              12 bytes
//! FieldPointer     [target: u64]                       8 bytes
//! FieldOneToMany   [head: u64][count: u32]            12 bytes
//! FieldManyToOne   [target: u64]                       8 bytes
//! ```
//!
//! All values are little-endian. String contents live in a separately
//! allocated blob; an empty string stores a null blob and length 0.
//!
//! One-to-many lists are chains of 24-byte relation nodes:
//!
//! ```text
//! [child: u64][next: u64][backref: u32][reserved: u32]
//! ```
//!
//! `backref` is the offset of the child's many-to-one slot, so the list owner
//! can clear the children's back-pointers when it is deleted.
//!
//! ## Access
//!
//! `get(&nd, record)` computes `record + offset` and delegates to the store.
//! `put(&mut nd, record, value)` does the same inside a modification-log
//! bracket tagged with the field's description. Store errors come back
//! unchanged; descriptors add no validation of their own.

mod any;
mod int;
mod pointer;
mod relation;
mod string;

use std::borrow::Cow;
use std::sync::Arc;

use crate::config::PTR_SIZE;
use crate::modlog::Tag;
use crate::storage::Address;

pub use any::{AnyField, FieldValue};
pub use int::{FieldInt, IntValue};
pub use pointer::FieldPointer;
pub use relation::{FieldManyToOne, FieldOneToMany, RELATION_NODE_SIZE};
pub use string::FieldString;

pub const STRING_SLOT_SIZE: u32 = PTR_SIZE as u32 + 4;
pub const RELATION_SLOT_SIZE: u32 = PTR_SIZE as u32 + 4;

/// Semantic type of a field, which fixes its slot size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Int { width: u8, signed: bool },
    String,
    Pointer,
    OneToMany,
    /// `inverse_offset` locates the matching one-to-many slot in the target.
    ManyToOne { inverse_offset: u32 },
}

impl FieldKind {
    pub fn int<T: IntValue>() -> Self {
        FieldKind::Int {
            width: T::WIDTH,
            signed: T::SIGNED,
        }
    }

    /// Bytes the field occupies in its record.
    pub const fn size(&self) -> u32 {
        match self {
            FieldKind::Int { width, .. } => *width as u32,
            FieldKind::String => STRING_SLOT_SIZE,
            FieldKind::Pointer | FieldKind::ManyToOne { .. } => PTR_SIZE as u32,
            FieldKind::OneToMany => RELATION_SLOT_SIZE,
        }
    }

    pub fn type_name(&self) -> Cow<'static, str> {
        match self {
            FieldKind::Int { width, signed } => Cow::Owned(format!(
                "FieldInt<{}{}>",
                if *signed { 'i' } else { 'u' },
                *width as u32 * 8
            )),
            FieldKind::String => Cow::Borrowed("FieldString"),
            FieldKind::Pointer => Cow::Borrowed("FieldPointer"),
            FieldKind::OneToMany => Cow::Borrowed("FieldOneToMany"),
            FieldKind::ManyToOne { .. } => Cow::Borrowed("FieldManyToOne"),
        }
    }

    /// Stable encoding for the schema fingerprint.
    pub(crate) fn fingerprint_bytes(&self) -> [u8; 6] {
        let (code, a, b): (u8, u8, u32) = match self {
            FieldKind::Int { width, signed } => (1, *width | ((*signed as u8) << 7), 0),
            FieldKind::String => (2, 0, 0),
            FieldKind::Pointer => (3, 0, 0),
            FieldKind::OneToMany => (4, 0, 0),
            FieldKind::ManyToOne { inverse_offset } => (5, 0, *inverse_offset),
        };
        let b = b.to_le_bytes();
        [code, a, b[0], b[1], b[2], b[3]]
    }
}

/// Identity shared by every descriptor: where the field lives and how its
/// writes are tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    struct_name: Arc<str>,
    name: Arc<str>,
    index: usize,
    offset: u32,
    put_tag: Tag,
}

impl RawField {
    pub(crate) fn new(
        struct_name: &Arc<str>,
        index: usize,
        name: &str,
        offset: u32,
        kind: &FieldKind,
    ) -> Self {
        let put_tag = Tag::new(format!(
            "Writing field {} ({}), a {} in struct {}",
            index,
            name,
            kind.type_name(),
            struct_name
        ));
        Self {
            struct_name: Arc::clone(struct_name),
            name: Arc::from(name),
            index,
            offset,
            put_tag,
        }
    }

    #[inline]
    pub(crate) fn slot(&self, record: Address) -> Address {
        record.offset(self.offset)
    }
}

/// Common surface of all descriptors.
pub trait Field {
    fn raw(&self) -> &RawField;

    fn kind(&self) -> FieldKind;

    fn record_size(&self) -> u32 {
        self.kind().size()
    }

    fn offset(&self) -> u32 {
        self.raw().offset
    }

    fn name(&self) -> &str {
        &self.raw().name
    }

    /// Declaration index within the owning struct.
    fn index(&self) -> usize {
        self.raw().index
    }

    fn struct_name(&self) -> &str {
        &self.raw().struct_name
    }

    fn put_tag(&self) -> &Tag {
        &self.raw().put_tag
    }
}
