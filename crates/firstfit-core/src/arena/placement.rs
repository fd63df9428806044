//! Placement engine: first-fit search, splitting, coalescing.
//!
//! `find_fit` walks the free registry, not the arena. `coalesce_all` walks
//! the arena, not the registry, and is the only place blocks merge. It runs
//! on every release, so each release costs O(arena size); that keeps the
//! invariant "no two physically adjacent blocks are both free" trivially
//! true after every public call.

use super::block::{BlockHeader, BlockState, HEADER_SIZE};
use super::free_list::FreeRegistry;
use super::storage::ArenaStorage;
use crate::error::IntegrityError;

/// First registered free block whose payload holds `size` bytes.
pub fn find_fit(
    storage: &ArenaStorage,
    registry: &FreeRegistry,
    size: usize,
) -> Result<Option<usize>, IntegrityError> {
    for entry in registry.iter(storage) {
        let (offset, header) = entry?;
        if header.is_free() && header.size >= size {
            return Ok(Some(offset));
        }
    }
    Ok(None)
}

/// Shrink the block at `offset` to `requested` bytes and register the tail
/// as a new free block.
///
/// Only splits when the tail can hold a header plus more than
/// `min_block_size` bytes; otherwise the block keeps its slack. Returns the
/// offset of the new free block, if any.
pub fn split(
    storage: &mut ArenaStorage,
    registry: &mut FreeRegistry,
    offset: usize,
    requested: usize,
    min_block_size: usize,
) -> Result<Option<usize>, IntegrityError> {
    let mut header = storage.read_header(offset)?;
    let threshold = requested
        .saturating_add(HEADER_SIZE)
        .saturating_add(min_block_size);
    if header.size <= threshold {
        return Ok(None);
    }

    let remainder_offset = offset + HEADER_SIZE + requested;
    let remainder = BlockHeader::free(header.size - requested - HEADER_SIZE);
    storage.write_header(remainder_offset, &remainder)?;

    header.size = requested;
    storage.write_header(offset, &header)?;

    registry.insert(storage, remainder_offset)?;
    Ok(Some(remainder_offset))
}

/// Merge every run of physically adjacent free blocks into its first block.
///
/// Absorbed blocks leave the registry. Returns the number of merges, which
/// is also the number of headers handed back to free space.
pub fn coalesce_all(
    storage: &mut ArenaStorage,
    registry: &mut FreeRegistry,
) -> Result<usize, IntegrityError> {
    let capacity = storage.capacity();
    let mut merges = 0;
    let mut offset = 0;

    while offset < capacity {
        let mut current = storage.read_header(offset)?;
        let next = current
            .end(offset)
            .filter(|end| *end <= capacity)
            .ok_or(IntegrityError::PayloadOutOfBounds {
                offset,
                size: current.size,
            })?;

        if current.is_free() && next < capacity {
            let neighbor = storage.read_header(next)?;
            if neighbor.state == BlockState::Free {
                registry.remove(storage, next)?;
                // Re-read: removing the neighbor may have rewritten our links.
                current = storage.read_header(offset)?;
                current.size += HEADER_SIZE + neighbor.size;
                storage.write_header(offset, &current)?;
                merges += 1;
                continue;
            }
        }

        offset = next;
    }

    Ok(merges)
}
