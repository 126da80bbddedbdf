//! Heap-backed byte space.
//!
//! `MemoryStorage` backs a store with a plain `Vec<u8>`. Nothing survives the
//! process; it exists for ephemeral indexes and so every test can open its own
//! isolated store without touching the filesystem.

use eyre::{ensure, Result};

use crate::config::CHUNK_SIZE;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Vec<u8>,
}

impl MemoryStorage {
    pub fn create(initial_len: u64) -> Result<Self> {
        ensure!(
            initial_len > 0 && initial_len % CHUNK_SIZE as u64 == 0,
            "initial size {} must be a non-zero multiple of the chunk size {}",
            initial_len,
            CHUNK_SIZE
        );

        Ok(Self {
            data: vec![0u8; usize::try_from(initial_len)?],
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn grow(&mut self, new_len: u64) -> Result<()> {
        let new_len = usize::try_from(new_len)?;
        if new_len > self.data.len() {
            self.data.resize(new_len, 0);
        }
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_zero_filled() {
        let storage = MemoryStorage::create(CHUNK_SIZE as u64).unwrap();

        assert_eq!(storage.len(), CHUNK_SIZE as u64);
        assert!(storage.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn grow_keeps_contents() {
        let mut storage = MemoryStorage::create(CHUNK_SIZE as u64).unwrap();
        storage.bytes_mut()[7] = 9;

        storage.grow(3 * CHUNK_SIZE as u64).unwrap();
        storage.grow(CHUNK_SIZE as u64).unwrap();

        assert_eq!(storage.len(), 3 * CHUNK_SIZE as u64);
        assert_eq!(storage.bytes()[7], 9);
    }
}
