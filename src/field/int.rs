use std::fmt;
use std::marker::PhantomData;

use eyre::Result;

use super::{Field, FieldKind, RawField};
use crate::nd::Nd;
use crate::storage::{Address, Store};

/// Integer types a [`FieldInt`] can hold.
pub trait IntValue: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    const WIDTH: u8;
    const SIGNED: bool;

    fn read(store: &Store, address: Address) -> Result<Self>;

    fn write(self, store: &mut Store, address: Address) -> Result<()>;
}

macro_rules! int_values {
    ($($ty:ty => $read:ident, $write:ident, $signed:expr);* $(;)?) => {
        $(
            impl IntValue for $ty {
                const WIDTH: u8 = std::mem::size_of::<$ty>() as u8;
                const SIGNED: bool = $signed;

                #[inline]
                fn read(store: &Store, address: Address) -> Result<Self> {
                    store.$read(address)
                }

                #[inline]
                fn write(self, store: &mut Store, address: Address) -> Result<()> {
                    store.$write(address, self)
                }
            }
        )*
    };
}

int_values! {
    i8 => read_i8, write_i8, true;
    u8 => read_u8, write_u8, false;
    i16 => read_i16, write_i16, true;
    u16 => read_u16, write_u16, false;
    i32 => read_i32, write_i32, true;
    u32 => read_u32, write_u32, false;
    i64 => read_i64, write_i64, true;
    u64 => read_u64, write_u64, false;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInt<T: IntValue> {
    raw: RawField,
    _value: PhantomData<T>,
}

impl<T: IntValue> FieldInt<T> {
    pub(crate) fn new(raw: RawField) -> Self {
        Self {
            raw,
            _value: PhantomData,
        }
    }

    pub fn get(&self, nd: &Nd, record: Address) -> Result<T> {
        T::read(nd.store(), self.raw.slot(record))
    }

    pub fn put(&self, nd: &mut Nd, record: Address, value: T) -> Result<()> {
        let mut store = nd.store_mut().bracket(&self.raw.put_tag);
        value.write(&mut store, self.raw.slot(record))
    }
}

impl<T: IntValue> Field for FieldInt<T> {
    fn raw(&self) -> &RawField {
        &self.raw
    }

    fn kind(&self) -> FieldKind {
        FieldKind::int::<T>()
    }
}
