//! # ndstore - Persistent Typed Record Heap
//!
//! ndstore keeps a large, mutually referencing graph of fixed-layout records
//! in a single memory-mapped file. Records are addressed by stable 64-bit
//! offsets and accessed field by field through typed descriptors, without
//! loading the graph into memory.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ndstore::{Nd, Registry, StructDef};
//!
//! let mut pair = StructDef::new("Pair");
//! let a = pair.add_int::<i32>("a");
//! let next = pair.add_pointer("next");
//!
//! let mut registry = Registry::builder();
//! let pair_kind = registry.register(pair.done()?)?;
//!
//! let mut nd = Nd::open("./index.nd", registry.build())?;
//! let p1 = nd.allocate_record(pair_kind)?;
//! let p2 = nd.allocate_record(pair_kind)?;
//! a.put(&mut nd, p1, 42)?;
//! a.put(&mut nd, p2, 7)?;
//! next.put(&mut nd, p1, p2)?;
//!
//! let target = nd.follow_pointer(&next, p1)?.expect("linked");
//! assert_eq!(a.get(&nd, target)?, 7);
//! nd.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Nd facade (open/close, records, dump)  │
//! ├─────────────────────────────────────────┤
//! │  Registry / StructLayout (offsets)      │
//! ├─────────────────────────────────────────┤
//! │  Field descriptors (int, string,        │
//! │  pointer, one-to-many, many-to-one)     │
//! ├─────────────────────────────────────────┤
//! │  Modification log (tagged brackets)     │
//! ├─────────────────────────────────────────┤
//! │  Store (allocator, typed accessors)     │
//! ├─────────────────────────────────────────┤
//! │  Memory-mapped file / heap buffer       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: backing space, header, free lists, `Store`
//! - [`modlog`]: modification log and forensic history
//! - [`field`]: typed field descriptors
//! - [`schema`]: record layouts and the kind registry
//! - [`nd`]: the `Nd` facade, its builder and the shared handle
//! - [`config`]: format constants
//! - [`error`]: the `StoreError` taxonomy
//!
//! ## Concurrency
//!
//! One writer or many readers, enforced by `&mut Nd` / `&Nd`. `SharedNd`
//! wraps a store in a `parking_lot::RwLock` for use across threads.

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod field;
pub mod modlog;
pub mod nd;
pub mod schema;
pub mod storage;

pub use error::StoreError;
pub use field::{
    AnyField, Field, FieldInt, FieldKind, FieldManyToOne, FieldOneToMany, FieldPointer,
    FieldString, FieldValue,
};
pub use modlog::{ModificationLog, ModificationReport, Tag};
pub use nd::{Nd, NdBuilder, NdOptions, SharedNd};
pub use schema::{FieldSpec, KindId, Registry, RegistryBuilder, StructDef, StructLayout};
pub use storage::{Address, IntegrityReport, Store, StoreStats};
