use eyre::Result;

use super::{Field, FieldKind, RawField};
use crate::nd::Nd;
use crate::storage::Address;

/// A field holding the address of another record.
///
/// No referential integrity is enforced: deleting the target leaves this
/// field pointing at a block that may be reused by an unrelated record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPointer {
    raw: RawField,
}

impl FieldPointer {
    pub(crate) fn new(raw: RawField) -> Self {
        Self { raw }
    }

    pub fn get(&self, nd: &Nd, record: Address) -> Result<Address> {
        nd.store().read_address(self.raw.slot(record))
    }

    pub fn put(&self, nd: &mut Nd, record: Address, target: Address) -> Result<()> {
        let mut store = nd.store_mut().bracket(&self.raw.put_tag);
        store.write_address(self.raw.slot(record), target)
    }

    /// The referenced record, or `None` for a null pointer.
    pub fn follow(&self, nd: &Nd, record: Address) -> Result<Option<Address>> {
        self.get(nd, record).map(Address::non_null)
    }
}

impl Field for FieldPointer {
    fn raw(&self) -> &RawField {
        &self.raw
    }

    fn kind(&self) -> FieldKind {
        FieldKind::Pointer
    }
}
