use std::fmt;
use std::sync::Arc;

/// Human-readable label bracketing a logical write.
///
/// Tags are built once, when a field descriptor is created, and cloned into
/// log entries afterwards; cloning only bumps a reference count.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tag(Arc<str>);

impl Tag {
    pub fn new(name: impl AsRef<str>) -> Self {
        Tag(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?})", &*self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
