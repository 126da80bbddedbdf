//! # Error Taxonomy
//!
//! Every fallible operation in ndstore returns `eyre::Result`. The failures a
//! caller is expected to tell apart are raised as a [`StoreError`] inside the
//! report and can be recovered with [`StoreError::of`]:
//!
//! | Variant | Raised by | Meaning |
//! |---------|-----------|---------|
//! | `OutOfBounds` | every typed read/write, `free` | address range beyond the backing size |
//! | `OutOfSpace` | `allocate` | backing space cannot grow to fit the request |
//! | `SchemaViolation` | `StructDef::done`, `RegistryBuilder` | overlapping/gapped fields, duplicate kinds |
//! | `CorruptFormat` | open, string reads | header stamp or stored bytes do not match the format |
//!
//! Store errors are never wrapped by field descriptors, so the variant a caller
//! inspects after `put`/`get` is exactly the one the store raised.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("address range {address:#x}+{len} out of bounds (size={size})")]
    OutOfBounds { address: u64, len: u64, size: u64 },

    #[error("cannot grow backing space to {requested} bytes (limit={limit})")]
    OutOfSpace { requested: u64, limit: u64 },

    #[error("schema violation in struct '{kind}': {reason}")]
    SchemaViolation { kind: String, reason: String },

    #[error("corrupt store format: {0}")]
    CorruptFormat(String),
}

impl StoreError {
    /// Returns the typed error carried by `report`, if any.
    pub fn of(report: &eyre::Report) -> Option<&StoreError> {
        report.downcast_ref::<StoreError>()
    }

    pub fn schema(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::SchemaViolation {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, StoreError::OutOfBounds { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_error_survives_eyre_report() {
        let report: eyre::Report = StoreError::OutOfSpace {
            requested: 8192,
            limit: 4096,
        }
        .into();

        assert_eq!(
            StoreError::of(&report),
            Some(&StoreError::OutOfSpace {
                requested: 8192,
                limit: 4096
            })
        );
    }

    #[test]
    fn typed_error_survives_added_context() {
        use eyre::WrapErr;

        let result: eyre::Result<()> =
            Err(StoreError::CorruptFormat("bad magic".into())).wrap_err("opening index.nd");
        let report = result.unwrap_err();

        assert!(matches!(
            StoreError::of(&report),
            Some(StoreError::CorruptFormat(_))
        ));
    }

    #[test]
    fn display_includes_range() {
        let err = StoreError::OutOfBounds {
            address: 0x1000,
            len: 4,
            size: 4096,
        };

        assert_eq!(
            err.to_string(),
            "address range 0x1000+4 out of bounds (size=4096)"
        );
    }
}
