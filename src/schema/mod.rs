//! # Record Layouts
//!
//! This module maps named record kinds onto fixed byte layouts. A layout is
//! declared once with a [`StructDef`], validated and frozen into a
//! [`StructLayout`], and registered in a [`Registry`] that the store is
//! opened with.
//!
//! ## Declaring a Kind
//!
//! ```ignore
//! let mut pair = StructDef::new("Pair");
//! let a = pair.add_int::<i32>("a");      // offset 0, 4 bytes
//! let next = pair.add_pointer("next");   // offset 4, 8 bytes
//! let layout = pair.done()?;             // size 12
//!
//! let mut registry = Registry::builder();
//! let pair_kind = registry.register(layout)?;
//! let registry = registry.build();
//! ```
//!
//! The typed descriptors (`a`, `next`) carry their offsets from the moment
//! they are returned, but they only describe real records once `done`
//! succeeds. A descriptor from a definition that `done` rejected still
//! computes offsets and must be dropped with it. The same descriptors can be
//! recovered from the frozen layout, e.g.
//! `layout.field("a").and_then(AnyField::as_int::<i32>)`.
//!
//! ## Layout Rules
//!
//! - Offsets are assigned in declaration order starting at 0, unless a field
//!   is pinned with [`StructDef::at`] or [`FieldSpec::at`].
//! - No two fields may overlap and the field sizes must add up to the record
//!   size (no gaps).
//! - A struct with no fields, duplicate field names, or a kind name already
//!   registered is rejected.
//!
//! All violations fail with `SchemaViolation` before any store is opened.
//! Adding a field to a finalized layout is impossible: `done` consumes the
//! definition.
//!
//! ## Fingerprint
//!
//! The registry hashes every kind name, size, field name, offset and field
//! kind into a CRC-64. Stores remember the fingerprint they were created
//! with and refuse to open under a different one.

mod def;
mod registry;

pub use def::{FieldSpec, StructDef};
pub use registry::{KindId, Registry, RegistryBuilder, StructLayout};
