use std::sync::Arc;

use eyre::{bail, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Nd;

/// A cloneable, thread-safe handle to one open store.
///
/// Readers share the store; a writer holds it exclusively for as long as its
/// guard lives, e.g. for a whole indexing pass.
#[derive(Debug, Clone)]
pub struct SharedNd {
    inner: Arc<RwLock<Nd>>,
}

impl SharedNd {
    pub fn new(nd: Nd) -> Self {
        Self {
            inner: Arc::new(RwLock::new(nd)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Nd> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Nd> {
        self.inner.write()
    }

    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Closes the store. Fails, leaving the store open, while other handles
    /// exist.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(lock) => lock.into_inner().close(),
            Err(inner) => bail!(
                "cannot close a shared store while {} other handles are alive",
                Arc::strong_count(&inner) - 1
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Registry, StructDef};

    #[test]
    fn readers_and_writer_share_one_store() {
        let mut def = StructDef::new("Counter");
        let value = def.add_int::<u64>("value");
        let mut builder = Registry::builder();
        let kind = builder.register(def.done().unwrap()).unwrap();

        let shared = Nd::in_memory(builder.build()).unwrap().into_shared();
        let record = shared.write().allocate_record(kind).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                let value = value.clone();
                std::thread::spawn(move || {
                    let mut nd = shared.write();
                    let current = value.get(&nd, record).unwrap();
                    value.put(&mut nd, record, current + 1).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(value.get(&shared.read(), record).unwrap(), 4);
        assert_eq!(shared.handle_count(), 1);
        shared.close().unwrap();
    }

    #[test]
    fn close_fails_while_shared() {
        let shared = Nd::in_memory(Registry::builder().build())
            .unwrap()
            .into_shared();
        let other = shared.clone();

        assert!(shared.close().is_err());
        assert!(other.close().is_ok());
    }
}
