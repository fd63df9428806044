//! Free registry: an unordered doubly-linked list of free blocks.
//!
//! Links live inside the block headers as arena offsets. Insert pushes at
//! the head, remove unlinks in O(1) using the block's own links. The
//! registry does no searching; placement walks it through [`FreeRegistry::iter`].

use super::block::{BlockHeader, UNLINKED};
use super::storage::ArenaStorage;
use crate::error::IntegrityError;

/// Head of the free list plus a running entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRegistry {
    head: usize,
    len: usize,
}

impl Default for FreeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FreeRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: UNLINKED,
            len: 0,
        }
    }

    /// Forget every entry without touching the arena.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub fn head(&self) -> Option<usize> {
        (self.head != UNLINKED).then_some(self.head)
    }

    /// Number of registered blocks.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Push the block at `offset` onto the head of the list.
    ///
    /// The caller guarantees the block is not already registered.
    pub fn insert(
        &mut self,
        storage: &mut ArenaStorage,
        offset: usize,
    ) -> Result<(), IntegrityError> {
        let mut header = storage.read_header(offset)?;
        if self.head != UNLINKED {
            let mut old_head = storage.read_header(self.head)?;
            old_head.prev_free = offset;
            storage.write_header(self.head, &old_head)?;
        }
        header.prev_free = UNLINKED;
        header.next_free = self.head;
        storage.write_header(offset, &header)?;
        self.head = offset;
        self.len += 1;
        Ok(())
    }

    /// Unlink the block at `offset` and clear its links.
    pub fn remove(
        &mut self,
        storage: &mut ArenaStorage,
        offset: usize,
    ) -> Result<(), IntegrityError> {
        let mut header = storage.read_header(offset)?;

        if header.prev_free == UNLINKED {
            if self.head != offset {
                return Err(IntegrityError::RegistryMissing { offset });
            }
            self.head = header.next_free;
        } else {
            let mut prev = storage.read_header(header.prev_free)?;
            prev.next_free = header.next_free;
            storage.write_header(header.prev_free, &prev)?;
        }

        if header.next_free != UNLINKED {
            let mut next = storage.read_header(header.next_free)?;
            next.prev_free = header.prev_free;
            storage.write_header(header.next_free, &next)?;
        }

        header.next_free = UNLINKED;
        header.prev_free = UNLINKED;
        storage.write_header(offset, &header)?;
        self.len = self.len.saturating_sub(1);
        Ok(())
    }

    /// Walk the list from the head.
    ///
    /// Stops with [`IntegrityError::RegistryCycle`] after visiting more
    /// entries than the length counter allows.
    #[must_use]
    pub fn iter<'a>(&self, storage: &'a ArenaStorage) -> FreeIter<'a> {
        FreeIter {
            storage,
            cursor: self.head,
            remaining: self.len,
            failed: false,
        }
    }
}

/// Iterator over `(offset, header)` pairs of registered blocks.
pub struct FreeIter<'a> {
    storage: &'a ArenaStorage,
    cursor: usize,
    remaining: usize,
    failed: bool,
}

impl Iterator for FreeIter<'_> {
    type Item = Result<(usize, BlockHeader), IntegrityError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor == UNLINKED {
            return None;
        }
        if self.remaining == 0 {
            self.failed = true;
            return Some(Err(IntegrityError::RegistryCycle {
                offset: self.cursor,
            }));
        }
        let offset = self.cursor;
        match self.storage.read_header(offset) {
            Ok(header) => {
                self.remaining -= 1;
                self.cursor = header.next_free;
                Some(Ok((offset, header)))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with_free_blocks(offsets: &[usize]) -> ArenaStorage {
        let mut storage = ArenaStorage::new(1024);
        for &offset in offsets {
            storage
                .write_header(offset, &BlockHeader::free(32))
                .unwrap();
        }
        storage
    }

    fn registered(registry: &FreeRegistry, storage: &ArenaStorage) -> Vec<usize> {
        registry
            .iter(storage)
            .map(|entry| entry.unwrap().0)
            .collect()
    }

    #[test]
    fn insert_pushes_at_head() {
        let mut storage = storage_with_free_blocks(&[0, 64, 128]);
        let mut registry = FreeRegistry::new();
        for offset in [0, 64, 128] {
            registry.insert(&mut storage, offset).unwrap();
        }
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.head(), Some(128));
        assert_eq!(registered(&registry, &storage), vec![128, 64, 0]);

        let middle = storage.read_header(64).unwrap();
        assert_eq!(middle.prev_free, 128);
        assert_eq!(middle.next_free, 0);
    }

    #[test]
    fn remove_relinks_neighbors_and_clears_links() {
        let mut storage = storage_with_free_blocks(&[0, 64, 128]);
        let mut registry = FreeRegistry::new();
        for offset in [0, 64, 128] {
            registry.insert(&mut storage, offset).unwrap();
        }

        registry.remove(&mut storage, 64).unwrap();
        assert_eq!(registered(&registry, &storage), vec![128, 0]);
        assert!(!storage.read_header(64).unwrap().is_linked());
        assert_eq!(storage.read_header(0).unwrap().prev_free, 128);

        registry.remove(&mut storage, 128).unwrap();
        assert_eq!(registry.head(), Some(0));
        assert_eq!(storage.read_header(0).unwrap().prev_free, UNLINKED);

        registry.remove(&mut storage, 0).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.head(), None);
    }

    #[test]
    fn remove_of_unregistered_block_is_reported() {
        let mut storage = storage_with_free_blocks(&[0, 64]);
        let mut registry = FreeRegistry::new();
        registry.insert(&mut storage, 0).unwrap();

        assert_eq!(
            registry.remove(&mut storage, 64),
            Err(IntegrityError::RegistryMissing { offset: 64 })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn iter_detects_cycles() {
        let mut storage = storage_with_free_blocks(&[0, 64]);
        let mut registry = FreeRegistry::new();
        registry.insert(&mut storage, 0).unwrap();
        registry.insert(&mut storage, 64).unwrap();

        // Close the loop: 0 -> 64.
        let mut tail = storage.read_header(0).unwrap();
        tail.next_free = 64;
        storage.write_header(0, &tail).unwrap();

        let walked: Vec<_> = registry.iter(&storage).collect();
        assert_eq!(walked.len(), 3);
        assert!(matches!(
            walked[2],
            Err(IntegrityError::RegistryCycle { .. })
        ));
    }
}
