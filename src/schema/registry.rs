use std::collections::HashMap;
use std::sync::Arc;

use crc::{Crc, CRC_64_ECMA_182};
use eyre::{eyre, Result};

use crate::error::StoreError;
use crate::field::{AnyField, Field};
use crate::modlog::Tag;

static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Handle of a registered record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KindId(u32);

impl KindId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The frozen layout of one record kind.
#[derive(Debug, Clone)]
pub struct StructLayout {
    name: Arc<str>,
    size: u32,
    fields: Vec<AnyField>,
    allocate_tag: Tag,
    delete_tag: Tag,
}

impl StructLayout {
    pub(crate) fn new(name: Arc<str>, size: u32, fields: Vec<AnyField>) -> Self {
        let allocate_tag = Tag::new(format!("Allocating struct {}", name));
        let delete_tag = Tag::new(format!("Deleting struct {}", name));
        Self {
            name,
            size,
            fields,
            allocate_tag,
            delete_tag,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total record size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[AnyField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&AnyField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub(crate) fn allocate_tag(&self) -> &Tag {
        &self.allocate_tag
    }

    pub(crate) fn delete_tag(&self) -> &Tag {
        &self.delete_tag
    }

    fn fingerprint_into(&self, digest: &mut crc::Digest<'_, u64>) {
        digest.update(self.name.as_bytes());
        digest.update(&[0]);
        digest.update(&self.size.to_le_bytes());
        for field in &self.fields {
            digest.update(field.name().as_bytes());
            digest.update(&[0]);
            digest.update(&field.offset().to_le_bytes());
            digest.update(&field.kind().fingerprint_bytes());
        }
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    layouts: Vec<StructLayout>,
    by_name: HashMap<Arc<str>, KindId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, layout: StructLayout) -> Result<KindId> {
        if self.by_name.contains_key(&layout.name) {
            return Err(
                StoreError::schema(layout.name(), "record kind registered twice").into(),
            );
        }

        let id = KindId(self.layouts.len() as u32);
        self.by_name.insert(Arc::clone(&layout.name), id);
        self.layouts.push(layout);
        Ok(id)
    }

    pub fn build(self) -> Registry {
        let mut digest = CRC64.digest();
        for layout in &self.layouts {
            layout.fingerprint_into(&mut digest);
        }

        Registry {
            layouts: self.layouts,
            by_name: self.by_name,
            fingerprint: digest.finalize(),
        }
    }
}

/// Every record kind a store holds, with a fingerprint of their layouts.
///
/// The fingerprint is stamped into the store header at creation and checked
/// on every open, so a store is never read through a layout it was not
/// written with.
#[derive(Debug)]
pub struct Registry {
    layouts: Vec<StructLayout>,
    by_name: HashMap<Arc<str>, KindId>,
    fingerprint: u64,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn layout(&self, kind: KindId) -> Result<&StructLayout> {
        self.layouts
            .get(kind.index())
            .ok_or_else(|| eyre!("record kind {:?} is not part of this registry", kind))
    }

    pub fn kind(&self, name: &str) -> Option<KindId> {
        self.by_name.get(name).copied()
    }

    pub fn kinds(&self) -> impl Iterator<Item = (KindId, &StructLayout)> {
        self.layouts
            .iter()
            .enumerate()
            .map(|(i, layout)| (KindId(i as u32), layout))
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}
