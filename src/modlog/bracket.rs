use std::ops::{Deref, DerefMut};

use super::Tag;
use crate::storage::Store;

/// An open log bracket over a store.
///
/// Derefs to the [`Store`], so writes performed through the guard land
/// inside the bracket. Dropping the guard records the matching `end`, on the
/// error path as well as on success.
pub struct LogBracket<'a> {
    store: &'a mut Store,
    tag: Tag,
}

impl<'a> LogBracket<'a> {
    pub(crate) fn open(store: &'a mut Store, tag: &Tag) -> Self {
        store.log_mut().start(tag);
        Self {
            store,
            tag: tag.clone(),
        }
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }
}

impl Deref for LogBracket<'_> {
    type Target = Store;

    fn deref(&self) -> &Store {
        self.store
    }
}

impl DerefMut for LogBracket<'_> {
    fn deref_mut(&mut self) -> &mut Store {
        self.store
    }
}

impl Drop for LogBracket<'_> {
    fn drop(&mut self) {
        self.store.log_mut().end(&self.tag);
    }
}
