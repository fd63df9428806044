//! Backing byte region of an arena.
//!
//! This is the only code that touches arena bytes. Header and payload
//! access is bounds-checked slicing; callers above this layer deal in
//! offsets only.

use super::block::{BlockHeader, HEADER_SIZE};
use crate::error::IntegrityError;

/// Fixed-size, never-relocated byte region.
pub struct ArenaStorage {
    bytes: Box<[u8]>,
}

impl ArenaStorage {
    /// Zero-filled region of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Whether a whole header fits at `offset`.
    #[must_use]
    pub fn header_fits(&self, offset: usize) -> bool {
        offset
            .checked_add(HEADER_SIZE)
            .is_some_and(|end| end <= self.capacity())
    }

    pub fn read_header(&self, offset: usize) -> Result<BlockHeader, IntegrityError> {
        let raw: &[u8; HEADER_SIZE] = self
            .header_slot(offset)
            .and_then(|slot| slot.try_into().ok())
            .ok_or(IntegrityError::HeaderOutOfBounds { offset })?;
        BlockHeader::decode(raw).map_err(|tag| IntegrityError::BadStateTag { offset, tag })
    }

    pub fn write_header(
        &mut self,
        offset: usize,
        header: &BlockHeader,
    ) -> Result<(), IntegrityError> {
        if !self.header_fits(offset) {
            return Err(IntegrityError::HeaderOutOfBounds { offset });
        }
        self.bytes[offset..offset + HEADER_SIZE].copy_from_slice(&header.encode());
        Ok(())
    }

    /// `len` bytes starting at `offset`, if entirely inside the region.
    #[must_use]
    pub fn bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.bytes.get(offset..end)
    }

    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        let end = offset.checked_add(len)?;
        self.bytes.get_mut(offset..end)
    }

    /// Copy `len` bytes from `src` to `dst`; the ranges may overlap.
    ///
    /// Returns `false` without copying if either range leaves the region.
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) -> bool {
        let in_bounds = |start: usize| {
            start
                .checked_add(len)
                .is_some_and(|end| end <= self.capacity())
        };
        if !in_bounds(src) || !in_bounds(dst) {
            return false;
        }
        self.bytes.copy_within(src..src + len, dst);
        true
    }

    fn header_slot(&self, offset: usize) -> Option<&[u8]> {
        self.bytes(offset, HEADER_SIZE)
    }
}
