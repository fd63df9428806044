//! Read-only views of an arena: partition walk, integrity check, dump and
//! statistics.

use std::collections::HashSet;
use std::fmt;

use super::block::{BlockHeader, HEADER_SIZE, UNLINKED};
use super::free_list::FreeRegistry;
use super::storage::ArenaStorage;
use crate::config::ArenaConfig;
use crate::error::IntegrityError;

/// Header-to-header walk from offset 0 to the arena end.
///
/// Yields an error and stops when a header is unreadable or a block runs
/// past the end.
pub(crate) struct BlockWalk<'a> {
    storage: &'a ArenaStorage,
    cursor: usize,
    failed: bool,
}

impl<'a> BlockWalk<'a> {
    pub(crate) fn new(storage: &'a ArenaStorage) -> Self {
        Self {
            storage,
            cursor: 0,
            failed: false,
        }
    }
}

impl Iterator for BlockWalk<'_> {
    type Item = Result<(usize, BlockHeader), IntegrityError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.storage.capacity() {
            return None;
        }
        let offset = self.cursor;
        let header = match self.storage.read_header(offset) {
            Ok(header) => header,
            Err(err) => {
                self.failed = true;
                return Some(Err(err));
            }
        };
        match header.end(offset) {
            Some(end) if end <= self.storage.capacity() => {
                self.cursor = end;
                Some(Ok((offset, header)))
            }
            _ => {
                self.failed = true;
                Some(Err(IntegrityError::PayloadOutOfBounds {
                    offset,
                    size: header.size,
                }))
            }
        }
    }
}

/// Header of the block that starts exactly at `offset`, if any.
pub(crate) fn locate(
    storage: &ArenaStorage,
    offset: usize,
) -> Result<Option<BlockHeader>, IntegrityError> {
    for entry in BlockWalk::new(storage) {
        let (at, header) = entry?;
        if at == offset {
            return Ok(Some(header));
        }
        if at > offset {
            break;
        }
    }
    Ok(None)
}

/// Totals recomputed from a partition walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub total_blocks: usize,
    pub allocated_blocks: usize,
    pub free_blocks: usize,
    pub allocated_bytes: usize,
    pub free_bytes: usize,
    pub header_bytes: usize,
}

/// Recompute totals by walking every block.
pub(crate) fn walk_stats(storage: &ArenaStorage) -> Result<WalkStats, IntegrityError> {
    let mut stats = WalkStats::default();
    for entry in BlockWalk::new(storage) {
        let (_, header) = entry?;
        stats.total_blocks += 1;
        stats.header_bytes += HEADER_SIZE;
        if header.is_free() {
            stats.free_blocks += 1;
            stats.free_bytes += header.size;
        } else {
            stats.allocated_blocks += 1;
            stats.allocated_bytes += header.size;
        }
    }
    Ok(stats)
}

/// Cached counters checked against the walk.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Counters {
    pub bytes_allocated: usize,
    pub bytes_free: usize,
}

/// Full consistency check: partition, sizes, registry, counters.
pub(crate) fn check_integrity(
    storage: &ArenaStorage,
    registry: &FreeRegistry,
    config: &ArenaConfig,
    counters: Counters,
) -> Result<WalkStats, IntegrityError> {
    let mut stats = WalkStats::default();
    let mut free_offsets = HashSet::new();

    for entry in BlockWalk::new(storage) {
        let (offset, header) = entry?;
        if header.size % config.alignment != 0 {
            return Err(IntegrityError::MisalignedSize {
                offset,
                size: header.size,
            });
        }
        if header.size < config.min_block_size {
            return Err(IntegrityError::UndersizedBlock {
                offset,
                size: header.size,
            });
        }
        stats.total_blocks += 1;
        stats.header_bytes += HEADER_SIZE;
        if header.is_free() {
            stats.free_blocks += 1;
            stats.free_bytes += header.size;
            free_offsets.insert(offset);
        } else {
            if header.is_linked() {
                return Err(IntegrityError::StaleLinkage { offset });
            }
            stats.allocated_blocks += 1;
            stats.allocated_bytes += header.size;
        }
    }

    check_registry(storage, registry, &free_offsets)?;

    if counters.bytes_allocated != stats.allocated_bytes {
        return Err(IntegrityError::CounterDrift {
            counter: "bytes_allocated",
            cached: counters.bytes_allocated,
            walked: stats.allocated_bytes,
        });
    }
    if counters.bytes_free != stats.free_bytes {
        return Err(IntegrityError::CounterDrift {
            counter: "bytes_free",
            cached: counters.bytes_free,
            walked: stats.free_bytes,
        });
    }
    Ok(stats)
}

fn check_registry(
    storage: &ArenaStorage,
    registry: &FreeRegistry,
    free_offsets: &HashSet<usize>,
) -> Result<(), IntegrityError> {
    let mut visited = HashSet::with_capacity(free_offsets.len());
    let mut previous = UNLINKED;
    let mut cursor = registry.head().unwrap_or(UNLINKED);

    while cursor != UNLINKED {
        if !free_offsets.contains(&cursor) {
            return Err(IntegrityError::RegistryNotFree { offset: cursor });
        }
        if !visited.insert(cursor) {
            return Err(IntegrityError::RegistryCycle { offset: cursor });
        }
        let header = storage.read_header(cursor)?;
        if header.prev_free != previous {
            return Err(IntegrityError::RegistryAsymmetric { offset: cursor });
        }
        previous = cursor;
        cursor = header.next_free;
    }

    if let Some(&missing) = free_offsets.iter().find(|o| !visited.contains(*o)) {
        return Err(IntegrityError::RegistryMissing { offset: missing });
    }
    if registry.len() != visited.len() {
        return Err(IntegrityError::RegistryLengthDrift {
            cached: registry.len(),
            walked: visited.len(),
        });
    }
    Ok(())
}

/// One block as seen by a dump.
///
/// A block spans `offset..address + size`; its header occupies
/// `offset..address`. The `Address=` column of the [`HeapDump`] listing is
/// `address`, the value callers hold, not the header offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Position in address order.
    pub index: usize,
    /// Offset of the header.
    pub offset: usize,
    /// Payload address handed to callers; always `offset + HEADER_SIZE`.
    pub address: usize,
    /// Payload bytes.
    pub size: usize,
    pub is_free: bool,
}

/// Every block in address order, plus the first corruption found, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapDump {
    pub capacity: usize,
    pub blocks: Vec<BlockInfo>,
    pub corruption: Option<IntegrityError>,
}

pub(crate) fn dump(storage: &ArenaStorage) -> HeapDump {
    let mut blocks = Vec::new();
    let mut corruption = None;
    for (index, entry) in BlockWalk::new(storage).enumerate() {
        match entry {
            Ok((offset, header)) => blocks.push(BlockInfo {
                index,
                offset,
                address: offset + HEADER_SIZE,
                size: header.size,
                is_free: header.is_free(),
            }),
            Err(err) => corruption = Some(err),
        }
    }
    HeapDump {
        capacity: storage.capacity(),
        blocks,
        corruption,
    }
}

impl fmt::Display for HeapDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Heap Dump ===")?;
        for block in &self.blocks {
            writeln!(
                f,
                "Block {}: Size={}, Free={}, Address={:#x}",
                block.index,
                block.size,
                if block.is_free { "Yes" } else { "No" },
                block.address
            )?;
        }
        if let Some(err) = &self.corruption {
            writeln!(f, "Corruption: {err}")?;
        }
        write!(f, "=================")
    }
}

/// Cached statistics, as reported by the running counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub capacity: usize,
    pub header_size: usize,
    pub bytes_allocated: usize,
    pub bytes_free: usize,
    /// Free registry length; the external fragmentation measure.
    pub free_blocks: usize,
}

impl fmt::Display for ArenaStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Heap Status ===")?;
        writeln!(f, "Total heap size: {} bytes", self.capacity)?;
        writeln!(f, "Total allocated: {} bytes", self.bytes_allocated)?;
        writeln!(f, "Total free: {} bytes", self.bytes_free)?;
        writeln!(f, "Fragmentation: {} free blocks", self.free_blocks)?;
        write!(f, "===================")
    }
}
