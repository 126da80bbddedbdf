//! # Node Graph Facade
//!
//! [`Nd`] is the one handle every record operation goes through. It owns the
//! open [`Store`] (and with it the modification log) plus the [`Registry`]
//! of record kinds, and is passed by reference to every field accessor:
//!
//! ```ignore
//! let mut nd = Nd::open("./index.nd", registry)?;
//! let p1 = nd.allocate_record(pair)?;
//! a.put(&mut nd, p1, 42)?;
//! assert_eq!(a.get(&nd, p1)?, 42);
//! nd.close()?;
//! ```
//!
//! ## Lifecycle
//!
//! Opening maps (or creates) the backing file and validates its header;
//! `close` clears the header's open flag and flushes. `close` consumes the
//! handle, so no record operation can follow it. Dropping an `Nd` without
//! calling `close` performs the same shutdown on a best-effort basis.
//!
//! ## Concurrency
//!
//! Mutating operations take `&mut Nd` and reads take `&Nd`, so the borrow
//! checker already enforces one writer or many readers. To share a store
//! between threads, convert it with [`Nd::into_shared`].

mod builder;
mod shared;

use std::sync::Arc;

use eyre::{eyre, Result};
use tracing::{debug, warn};

use crate::field::{AnyField, FieldPointer, FieldValue};
use crate::modlog::{ModificationLog, ModificationReport};
use crate::schema::{KindId, Registry, StructLayout};
use crate::storage::{Address, IntegrityReport, Store, StoreStats};

pub use builder::{NdBuilder, NdOptions};
pub use shared::SharedNd;

#[derive(Debug)]
pub struct Nd {
    store: Store,
    registry: Arc<Registry>,
    options: NdOptions,
    closed: bool,
}

impl Nd {
    pub fn builder() -> NdBuilder {
        NdBuilder::new()
    }

    /// Opens or creates the store file at `path` with default options.
    pub fn open<P: AsRef<std::path::Path>>(
        path: P,
        registry: impl Into<Arc<Registry>>,
    ) -> Result<Self> {
        Self::builder().path(path).open(registry)
    }

    /// A scratch store that lives only as long as the handle.
    pub fn in_memory(registry: impl Into<Arc<Registry>>) -> Result<Self> {
        Self::builder().in_memory().open(registry)
    }

    pub(crate) fn from_parts(store: Store, registry: Arc<Registry>, options: NdOptions) -> Self {
        Self {
            store,
            registry,
            options,
            closed: false,
        }
    }

    /// Clears the open flag and flushes. Errors are reported, and the handle is
    /// released either way.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.store.mark_closed(self.options.sync_on_close)
    }

    /// Flushes the backing space without closing.
    pub fn flush(&self) -> Result<()> {
        self.store.sync()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn options(&self) -> &NdOptions {
        &self.options
    }

    pub fn layout(&self, kind: KindId) -> Result<&StructLayout> {
        self.registry.layout(kind)
    }

    /// Allocates a zeroed record of `kind`: integers read as 0, strings as
    /// empty, pointers and relations as null.
    pub fn allocate_record(&mut self, kind: KindId) -> Result<Address> {
        let registry = Arc::clone(&self.registry);
        let layout = registry.layout(kind)?;
        let size = layout.size() as u64;

        let mut store = self.store.bracket(layout.allocate_tag());
        let address = store.allocate(size)?;
        store.zero(address, size)?;

        debug!(kind = layout.name(), address = %address, size, "allocated record");
        Ok(address)
    }

    /// Releases what the record's fields own, then frees the record.
    ///
    /// String blobs are freed, the record leaves every relation it takes part
    /// in, and children of its one-to-many fields lose their back-pointer.
    /// Plain pointer fields elsewhere that reference this record are left
    /// dangling.
    pub fn delete_record(&mut self, kind: KindId, address: Address) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let layout = registry.layout(kind)?;

        let mut store = self.store.bracket(layout.delete_tag());
        for field in layout.fields() {
            field.destroy(&mut store, address)?;
        }
        store.free(address, layout.size() as u64)?;

        debug!(kind = layout.name(), address = %address, "deleted record");
        Ok(())
    }

    /// The record `field` of `address` points at, or `None` for null.
    pub fn follow_pointer(&self, field: &FieldPointer, address: Address) -> Result<Option<Address>> {
        field.follow(self, address)
    }

    fn field_of(&self, kind: KindId, name: &str) -> Result<AnyField> {
        let layout = self.registry.layout(kind)?;
        layout
            .field(name)
            .cloned()
            .ok_or_else(|| eyre!("struct {} has no field named '{}'", layout.name(), name))
    }

    pub fn read_field(&self, kind: KindId, address: Address, name: &str) -> Result<FieldValue> {
        self.field_of(kind, name)?.get(self, address)
    }

    pub fn write_field(
        &mut self,
        kind: KindId,
        address: Address,
        name: &str,
        value: &FieldValue,
    ) -> Result<()> {
        self.field_of(kind, name)?.put(self, address, value)
    }

    pub fn modification_log(&self) -> &ModificationLog {
        self.store.log()
    }

    /// Every retained operation that touched `[address, address + len)`.
    pub fn history_for(&self, address: Address, len: u64) -> Vec<ModificationReport> {
        self.store.log().history_for(address, len)
    }

    pub fn check_integrity(&self) -> IntegrityReport {
        self.store.verify()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Whether the previous session ended without `close`.
    pub fn was_unclean_shutdown(&self) -> bool {
        self.store.was_unclean_shutdown()
    }

    pub fn into_shared(self) -> SharedNd {
        SharedNd::new(self)
    }
}

impl Drop for Nd {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "failed to close record store on drop");
        }
    }
}
