use eyre::{eyre, Result};

use super::{Field, FieldKind, RawField};
use crate::config::PTR_SIZE;
use crate::nd::Nd;
use crate::storage::{Address, Store};

const LEN_OFFSET: u32 = PTR_SIZE as u32;

/// A variable-length UTF-8 field stored out of line.
///
/// The slot holds the blob address and byte length. Each `put` writes a new
/// blob, clears the length, publishes the address, sets the new length and
/// only then frees the old blob. A crash part way through reads back as an
/// empty string and leaks a blob; the slot never pairs a blob with another
/// blob's length or points at freed space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldString {
    raw: RawField,
}

impl FieldString {
    pub(crate) fn new(raw: RawField) -> Self {
        Self { raw }
    }

    /// Borrows the string straight out of the backing space.
    pub fn get<'a>(&self, nd: &'a Nd, record: Address) -> Result<&'a str> {
        read(nd.store(), self.raw.slot(record))
    }

    pub fn put(&self, nd: &mut Nd, record: Address, value: &str) -> Result<()> {
        let mut store = nd.store_mut().bracket(&self.raw.put_tag);
        write(&mut store, self.raw.slot(record), value)
    }

    pub fn len(&self, nd: &Nd, record: Address) -> Result<u32> {
        nd.store().read_u32(self.raw.slot(record).offset(LEN_OFFSET))
    }

    pub fn is_empty(&self, nd: &Nd, record: Address) -> Result<bool> {
        self.len(nd, record).map(|len| len == 0)
    }
}

impl Field for FieldString {
    fn raw(&self) -> &RawField {
        &self.raw
    }

    fn kind(&self) -> FieldKind {
        FieldKind::String
    }
}

pub(super) fn read(store: &Store, slot: Address) -> Result<&str> {
    let blob = store.read_address(slot)?;
    let len = store.read_u32(slot.offset(LEN_OFFSET))?;
    if len == 0 {
        return Ok("");
    }
    store.read_str(blob, len as u64)
}

pub(super) fn write(store: &mut Store, slot: Address, value: &str) -> Result<()> {
    let old_blob = store.read_address(slot)?;
    let old_len = store.read_u32(slot.offset(LEN_OFFSET))?;

    let len = u32::try_from(value.len())
        .map_err(|_| eyre!("string of {} bytes does not fit a u32 length", value.len()))?;

    let blob = if len == 0 {
        Address::NULL
    } else {
        let blob = store.allocate(len as u64)?;
        store.write_str(blob, value)?;
        blob
    };

    if old_len != 0 {
        store.write_u32(slot.offset(LEN_OFFSET), 0)?;
    }
    store.write_address(slot, blob)?;
    store.write_u32(slot.offset(LEN_OFFSET), len)?;

    release(store, old_blob, old_len)
}

/// Frees the blob referenced by `slot`, leaving the slot untouched.
pub(super) fn destroy(store: &mut Store, slot: Address) -> Result<()> {
    let blob = store.read_address(slot)?;
    let len = store.read_u32(slot.offset(LEN_OFFSET))?;
    release(store, blob, len)
}

fn release(store: &mut Store, blob: Address, len: u32) -> Result<()> {
    if len == 0 || blob.is_null() {
        return Ok(());
    }
    store.free(blob, len as u64)
}
