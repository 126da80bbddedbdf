use std::collections::HashSet;
use std::sync::Arc;

use eyre::Result;

use super::StructLayout;
use crate::error::StoreError;
use crate::field::{
    AnyField, Field, FieldInt, FieldKind, FieldManyToOne, FieldOneToMany, FieldPointer,
    FieldString, IntValue, RawField,
};

/// Declaration of one field: a name, a kind and optionally a pinned offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    offset: Option<u32>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            offset: None,
        }
    }

    /// Places the field at `offset` instead of after the previous field.
    pub fn at(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// An open record-kind declaration.
///
/// Fields are laid out in declaration order starting at offset 0. Each
/// `add_*` returns the typed descriptor immediately; the layout is checked
/// and frozen by [`StructDef::done`], which consumes the definition so no
/// field can be added afterwards. Descriptors are only valid for records of
/// a kind whose `done` succeeded.
#[derive(Debug)]
pub struct StructDef {
    name: Arc<str>,
    fields: Vec<AnyField>,
    next_offset: u64,
    pinned: Option<u32>,
}

impl StructDef {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            fields: Vec::new(),
            next_offset: 0,
            pinned: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pins the offset of the next added field.
    pub fn at(&mut self, offset: u32) -> &mut Self {
        self.pinned = Some(offset);
        self
    }

    pub fn field(&mut self, spec: FieldSpec) -> AnyField {
        let offset = spec
            .offset
            .or_else(|| self.pinned.take())
            .map(u64::from)
            .unwrap_or(self.next_offset);
        self.pinned = None;

        let end = offset + spec.kind.size() as u64;
        self.next_offset = self.next_offset.max(end);

        // Offsets past u32::MAX are rejected by `done`; saturate until then.
        let offset = u32::try_from(offset).unwrap_or(u32::MAX);
        let raw = RawField::new(&self.name, self.fields.len(), &spec.name, offset, &spec.kind);
        let field = AnyField::new(raw, spec.kind);
        self.fields.push(field.clone());
        field
    }

    pub fn add_int<T: IntValue>(&mut self, name: &str) -> FieldInt<T> {
        let field = self.field(FieldSpec::new(name, FieldKind::int::<T>()));
        FieldInt::new(field.raw().clone())
    }

    pub fn add_string(&mut self, name: &str) -> FieldString {
        let field = self.field(FieldSpec::new(name, FieldKind::String));
        FieldString::new(field.raw().clone())
    }

    pub fn add_pointer(&mut self, name: &str) -> FieldPointer {
        let field = self.field(FieldSpec::new(name, FieldKind::Pointer));
        FieldPointer::new(field.raw().clone())
    }

    pub fn add_one_to_many(&mut self, name: &str) -> FieldOneToMany {
        let field = self.field(FieldSpec::new(name, FieldKind::OneToMany));
        FieldOneToMany::new(field.raw().clone())
    }

    /// Adds the child side of a relation whose owner side is `inverse`.
    pub fn add_many_to_one(&mut self, name: &str, inverse: &FieldOneToMany) -> FieldManyToOne {
        let inverse_offset = inverse.offset();
        let field = self.field(FieldSpec::new(
            name,
            FieldKind::ManyToOne { inverse_offset },
        ));
        FieldManyToOne::new(field.raw().clone(), inverse_offset)
    }

    /// Validates the declaration and freezes it into a layout.
    ///
    /// Fails with `SchemaViolation` when the struct has no fields, two fields
    /// share a name, two ranges overlap, or the fields leave a gap.
    pub fn done(self) -> Result<StructLayout> {
        let violation = |reason: String| -> eyre::Report {
            StoreError::schema(self.name.as_ref(), reason).into()
        };

        if self.fields.is_empty() {
            return Err(violation("struct declares no fields".into()));
        }

        {
            let mut names = HashSet::new();
            for field in &self.fields {
                if !names.insert(field.name()) {
                    return Err(violation(format!("duplicate field name '{}'", field.name())));
                }
            }
        }

        if self.next_offset > u32::MAX as u64 {
            return Err(violation(format!(
                "record size {} exceeds the addressable range",
                self.next_offset
            )));
        }

        {
            let mut by_offset: Vec<&AnyField> = self.fields.iter().collect();
            by_offset.sort_by_key(|f| f.offset());
            for pair in by_offset.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let a_end = a.offset() as u64 + a.record_size() as u64;
                if a_end > b.offset() as u64 {
                    return Err(violation(format!(
                        "field '{}' [{}, {}) overlaps field '{}' [{}, {})",
                        a.name(),
                        a.offset(),
                        a_end,
                        b.name(),
                        b.offset(),
                        b.offset() as u64 + b.record_size() as u64
                    )));
                }
            }
        }

        let covered: u64 = self.fields.iter().map(|f| f.record_size() as u64).sum();
        if covered != self.next_offset {
            return Err(violation(format!(
                "fields cover {} of {} bytes, leaving a gap",
                covered, self.next_offset
            )));
        }

        Ok(StructLayout::new(
            self.name.clone(),
            self.next_offset as u32,
            self.fields,
        ))
    }
}
