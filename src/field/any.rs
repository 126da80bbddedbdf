use std::fmt;

use eyre::{bail, eyre, Result};

use super::relation::{self, FieldManyToOne, FieldOneToMany};
use super::string::{self, FieldString};
use super::{Field, FieldInt, FieldKind, FieldPointer, IntValue, RawField};
use crate::nd::Nd;
use crate::storage::{Address, Store};

/// A field value of any kind, for access by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Signed(i64),
    Unsigned(u64),
    String(String),
    Pointer(Address),
    /// Children of a one-to-many field, in link order. Read-only.
    Relation(Vec<Address>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Signed(v) => write!(f, "{}", v),
            FieldValue::Unsigned(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{:?}", s),
            FieldValue::Pointer(a) if a.is_null() => f.write_str("null"),
            FieldValue::Pointer(a) => write!(f, "{}", a),
            FieldValue::Relation(children) => {
                f.write_str("[")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A field descriptor whose kind is known only at runtime.
///
/// Layouts store their fields as `AnyField`; typed descriptors can be
/// recovered with the `as_*` conversions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyField {
    raw: RawField,
    kind: FieldKind,
}

impl AnyField {
    pub(crate) fn new(raw: RawField, kind: FieldKind) -> Self {
        Self { raw, kind }
    }

    pub fn get(&self, nd: &Nd, record: Address) -> Result<FieldValue> {
        self.read(nd.store(), record)
    }

    pub fn put(&self, nd: &mut Nd, record: Address, value: &FieldValue) -> Result<()> {
        self.write(nd.store_mut(), record, value)
    }

    pub(crate) fn read(&self, store: &Store, record: Address) -> Result<FieldValue> {
        let slot = self.raw.slot(record);
        match self.kind {
            FieldKind::Int { width, signed } => read_int(store, slot, width, signed),
            FieldKind::String => Ok(FieldValue::String(string::read(store, slot)?.to_owned())),
            FieldKind::Pointer | FieldKind::ManyToOne { .. } => {
                store.read_address(slot).map(FieldValue::Pointer)
            }
            FieldKind::OneToMany => relation::targets(store, slot).map(FieldValue::Relation),
        }
    }

    pub(crate) fn write(&self, store: &mut Store, record: Address, value: &FieldValue) -> Result<()> {
        let slot = self.raw.slot(record);
        match (self.kind, value) {
            (FieldKind::Int { width, signed }, FieldValue::Signed(_) | FieldValue::Unsigned(_)) => {
                let mut store = store.bracket(&self.raw.put_tag);
                write_int(&mut store, slot, width, signed, value)
            }
            (FieldKind::String, FieldValue::String(text)) => {
                let mut store = store.bracket(&self.raw.put_tag);
                string::write(&mut store, slot, text)
            }
            (FieldKind::Pointer, FieldValue::Pointer(target)) => {
                let mut store = store.bracket(&self.raw.put_tag);
                store.write_address(slot, *target)
            }
            (FieldKind::ManyToOne { inverse_offset }, FieldValue::Pointer(target)) => {
                let mut store = store.bracket(&self.raw.put_tag);
                relation::assign(&mut store, record, self.raw.offset, inverse_offset, *target)
            }
            (FieldKind::OneToMany, _) => bail!(
                "field '{}' of struct {} is the one-to-many side of a relation; assign the many-to-one side instead",
                self.raw.name,
                self.raw.struct_name
            ),
            (kind, value) => bail!(
                "cannot store {:?} in field '{}', a {}",
                value,
                self.raw.name,
                kind.type_name()
            ),
        }
    }

    /// Releases whatever the field owns outside the record.
    pub(crate) fn destroy(&self, store: &mut Store, record: Address) -> Result<()> {
        let slot = self.raw.slot(record);
        match self.kind {
            FieldKind::String => string::destroy(store, slot),
            FieldKind::OneToMany => relation::destroy_list(store, slot),
            FieldKind::ManyToOne { inverse_offset } => {
                relation::destroy_link(store, record, self.raw.offset, inverse_offset)
            }
            FieldKind::Int { .. } | FieldKind::Pointer => Ok(()),
        }
    }

    pub fn as_int<T: IntValue>(&self) -> Option<FieldInt<T>> {
        (self.kind == FieldKind::int::<T>()).then(|| FieldInt::new(self.raw.clone()))
    }

    pub fn as_string(&self) -> Option<FieldString> {
        (self.kind == FieldKind::String).then(|| FieldString::new(self.raw.clone()))
    }

    pub fn as_pointer(&self) -> Option<FieldPointer> {
        (self.kind == FieldKind::Pointer).then(|| FieldPointer::new(self.raw.clone()))
    }

    pub fn as_one_to_many(&self) -> Option<FieldOneToMany> {
        (self.kind == FieldKind::OneToMany).then(|| FieldOneToMany::new(self.raw.clone()))
    }

    pub fn as_many_to_one(&self) -> Option<FieldManyToOne> {
        match self.kind {
            FieldKind::ManyToOne { inverse_offset } => {
                Some(FieldManyToOne::new(self.raw.clone(), inverse_offset))
            }
            _ => None,
        }
    }
}

impl Field for AnyField {
    fn raw(&self) -> &RawField {
        &self.raw
    }

    fn kind(&self) -> FieldKind {
        self.kind
    }
}

fn read_int(store: &Store, slot: Address, width: u8, signed: bool) -> Result<FieldValue> {
    Ok(match (width, signed) {
        (1, true) => FieldValue::Signed(store.read_i8(slot)? as i64),
        (1, false) => FieldValue::Unsigned(store.read_u8(slot)? as u64),
        (2, true) => FieldValue::Signed(store.read_i16(slot)? as i64),
        (2, false) => FieldValue::Unsigned(store.read_u16(slot)? as u64),
        (4, true) => FieldValue::Signed(store.read_i32(slot)? as i64),
        (4, false) => FieldValue::Unsigned(store.read_u32(slot)? as u64),
        (8, true) => FieldValue::Signed(store.read_i64(slot)?),
        (8, false) => FieldValue::Unsigned(store.read_u64(slot)?),
        _ => bail!("unsupported integer width {}", width),
    })
}

fn write_int(
    store: &mut Store,
    slot: Address,
    width: u8,
    signed: bool,
    value: &FieldValue,
) -> Result<()> {
    macro_rules! narrow {
        ($ty:ty) => {
            match *value {
                FieldValue::Signed(v) => <$ty>::try_from(v).ok(),
                FieldValue::Unsigned(v) => <$ty>::try_from(v).ok(),
                _ => None,
            }
            .ok_or_else(|| eyre!("{} does not fit {}", value, stringify!($ty)))?
        };
    }

    match (width, signed) {
        (1, true) => store.write_i8(slot, narrow!(i8)),
        (1, false) => store.write_u8(slot, narrow!(u8)),
        (2, true) => store.write_i16(slot, narrow!(i16)),
        (2, false) => store.write_u16(slot, narrow!(u16)),
        (4, true) => store.write_i32(slot, narrow!(i32)),
        (4, false) => store.write_u32(slot, narrow!(u32)),
        (8, true) => store.write_i64(slot, narrow!(i64)),
        (8, false) => store.write_u64(slot, narrow!(u64)),
        _ => bail!("unsupported integer width {}", width),
    }
}
