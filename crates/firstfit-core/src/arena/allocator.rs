//! Core arena state.
//!
//! [`Arena`] is the context object every operation goes through: it owns
//! the byte region, the free registry, the running totals and the
//! lifecycle log. Nothing here is global; see [`crate::global`] for the
//! locked process-wide instance.
//!
//! Addresses are payload offsets. The first payload sits at
//! [`HEADER_SIZE`], so `0` never names a block and serves as the null
//! address.

use super::block::{self, BlockHeader, BlockState, HEADER_SIZE};
use super::free_list::FreeRegistry;
use super::inspect::{self, ArenaStats, Counters, HeapDump, WalkStats};
use super::lifecycle::{ArenaLogLevel, ArenaLogRecord, LifecycleLog, LogEvent, Snapshot};
use super::placement;
use super::storage::ArenaStorage;
use crate::config::ArenaConfig;
use crate::error::{ArenaError, IntegrityError};

/// A fixed-size arena with first-fit placement.
///
/// Not synchronized: every mutating operation takes `&mut self`.
pub struct Arena {
    config: ArenaConfig,
    storage: ArenaStorage,
    registry: FreeRegistry,
    /// Whether the region has been carved into blocks.
    initialized: bool,
    /// Sum of allocated payload sizes.
    bytes_allocated: usize,
    /// Sum of free payload sizes.
    bytes_free: usize,
    lifecycle: LifecycleLog,
}

impl Default for Arena {
    fn default() -> Self {
        Self::from_validated(ArenaConfig::default())
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("config", &self.config)
            .field("initialized", &self.initialized)
            .field("bytes_allocated", &self.bytes_allocated)
            .field("bytes_free", &self.bytes_free)
            .field("free_blocks", &self.registry.len())
            .finish()
    }
}

impl Arena {
    /// Reserve an uninitialized arena with the given geometry.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    /// Reserve and immediately carve an arena.
    pub fn initialized(config: ArenaConfig) -> Result<Self, ArenaError> {
        let mut arena = Self::new(config)?;
        arena.initialize();
        Ok(arena)
    }

    fn from_validated(config: ArenaConfig) -> Self {
        Self {
            storage: ArenaStorage::new(config.capacity),
            registry: FreeRegistry::new(),
            initialized: false,
            bytes_allocated: 0,
            bytes_free: 0,
            lifecycle: LifecycleLog::new(config.log_limit),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Carve the whole region into one free block and reset the totals.
    ///
    /// No-op when already initialized.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        let size = self.config.initial_free_bytes();
        self.registry.reset();
        let carved = self
            .storage
            .write_header(0, &BlockHeader::free(size))
            .and_then(|()| self.registry.insert(&mut self.storage, 0));
        if let Err(err) = carved {
            // Geometry was validated, so this only fires on a broken invariant.
            self.record_corruption("initialize", err);
            return;
        }
        self.bytes_allocated = 0;
        self.bytes_free = size;
        self.initialized = true;
        self.record(LogEvent {
            level: ArenaLogLevel::Info,
            symbol: "initialize",
            event: "initialize",
            ptr: None,
            size: Some(self.config.capacity),
            outcome: "success",
            details: format!("initial_free={size}"),
        });
    }

    /// Mark the arena uninitialized and report the payload bytes still
    /// allocated. The bytes themselves are left untouched.
    ///
    /// Returns 0 and does nothing when not initialized.
    pub fn teardown(&mut self) -> usize {
        if !self.initialized {
            return 0;
        }
        let outstanding = self.bytes_allocated;
        self.record(LogEvent {
            level: ArenaLogLevel::Info,
            symbol: "teardown",
            event: "teardown_leak_report",
            ptr: None,
            size: Some(outstanding),
            outcome: if outstanding == 0 { "clean" } else { "leaked" },
            details: format!("bytes_still_allocated={outstanding}"),
        });
        self.initialized = false;
        outstanding
    }

    // -----------------------------------------------------------------------
    // allocate
    // -----------------------------------------------------------------------

    /// Allocate `requested` bytes.
    ///
    /// Returns the payload address, or `None` for a zero-size request or
    /// when no block fits even after coalescing.
    pub fn allocate(&mut self, requested: usize) -> Option<usize> {
        self.try_allocate(requested).ok()
    }

    /// [`Arena::allocate`] with the failure reason.
    pub fn try_allocate(&mut self, requested: usize) -> Result<usize, ArenaError> {
        if !self.initialized {
            self.initialize();
        }
        let result = self.allocate_block(requested);
        self.note_corruption("allocate", &result);
        result
    }

    fn allocate_block(&mut self, requested: usize) -> Result<usize, ArenaError> {
        if requested == 0 {
            self.record(LogEvent {
                level: ArenaLogLevel::Trace,
                symbol: "allocate",
                event: "zero_size",
                ptr: None,
                size: Some(0),
                outcome: "denied",
                details: String::new(),
            });
            return Err(ArenaError::ZeroSize);
        }

        let Some(size) = block::align(requested, self.config.alignment)
            .map(|aligned| aligned.max(self.config.min_block_size))
        else {
            return Err(self.out_of_memory(requested, "align_overflow"));
        };

        let offset = match placement::find_fit(&self.storage, &self.registry, size)? {
            Some(offset) => offset,
            None => {
                let merges = self.coalesce()?;
                self.record(LogEvent {
                    level: ArenaLogLevel::Info,
                    symbol: "allocate",
                    event: "coalesce_retry",
                    ptr: None,
                    size: Some(size),
                    outcome: "retry",
                    details: format!("merges={merges}"),
                });
                match placement::find_fit(&self.storage, &self.registry, size)? {
                    Some(offset) => offset,
                    None => return Err(self.out_of_memory(requested, "no_fit_after_coalesce")),
                }
            }
        };

        self.registry.remove(&mut self.storage, offset)?;
        let found_size = self.storage.read_header(offset)?.size;
        let remainder = placement::split(
            &mut self.storage,
            &mut self.registry,
            offset,
            size,
            self.config.min_block_size,
        )?;

        let mut header = self.storage.read_header(offset)?;
        header.state = BlockState::Allocated;
        self.storage.write_header(offset, &header)?;

        // Free space loses the chosen payload, plus the remainder's header
        // when a split carved one.
        let remainder_size = match remainder {
            Some(at) => self.storage.read_header(at)?.size,
            None => 0,
        };
        self.bytes_allocated += header.size;
        self.debit_free("allocate", found_size - remainder_size);

        let ptr = offset + HEADER_SIZE;
        if let Some(at) = remainder {
            self.record(LogEvent {
                level: ArenaLogLevel::Trace,
                symbol: "allocate",
                event: "split",
                ptr: Some(ptr),
                size: Some(header.size),
                outcome: "split",
                details: format!("remainder_offset={at} remainder_size={remainder_size}"),
            });
        }
        self.record(LogEvent {
            level: ArenaLogLevel::Trace,
            symbol: "allocate",
            event: "allocate",
            ptr: Some(ptr),
            size: Some(header.size),
            outcome: "success",
            details: format!("requested={requested} found_size={found_size}"),
        });
        Ok(ptr)
    }

    fn out_of_memory(&mut self, requested: usize, reason: &str) -> ArenaError {
        self.record(LogEvent {
            level: ArenaLogLevel::Warn,
            symbol: "allocate",
            event: "out_of_memory",
            ptr: None,
            size: Some(requested),
            outcome: "oom",
            details: format!("reason={reason}"),
        });
        ArenaError::OutOfMemory { requested }
    }

    // -----------------------------------------------------------------------
    // release
    // -----------------------------------------------------------------------

    /// Return the block at `ptr` to the arena and coalesce.
    ///
    /// `0` is a no-op. Invalid addresses and double releases are logged and
    /// ignored; neither changes any state.
    pub fn release(&mut self, ptr: usize) {
        let _ = self.try_release(ptr);
    }

    /// [`Arena::release`] with the failure reason.
    pub fn try_release(&mut self, ptr: usize) -> Result<(), ArenaError> {
        let result = self.release_block(ptr);
        self.note_corruption("release", &result);
        result
    }

    fn release_block(&mut self, ptr: usize) -> Result<(), ArenaError> {
        if ptr == 0 {
            self.record(LogEvent {
                level: ArenaLogLevel::Trace,
                symbol: "release",
                event: "release_null",
                ptr: Some(0),
                size: None,
                outcome: "noop",
                details: "null_pointer".to_string(),
            });
            return Ok(());
        }

        let (offset, mut header) = self.owning_block("release", ptr)?;
        if header.is_free() {
            self.record(LogEvent {
                level: ArenaLogLevel::Warn,
                symbol: "release",
                event: "double_release_detected",
                ptr: Some(ptr),
                size: Some(header.size),
                outcome: "ignored",
                details: "block_already_free".to_string(),
            });
            return Err(ArenaError::DoubleRelease { ptr });
        }

        header.state = BlockState::Free;
        self.storage.write_header(offset, &header)?;
        self.debit_allocated("release", header.size);
        self.bytes_free += header.size;
        self.registry.insert(&mut self.storage, offset)?;
        let merges = self.coalesce()?;

        self.record(LogEvent {
            level: ArenaLogLevel::Trace,
            symbol: "release",
            event: "release",
            ptr: Some(ptr),
            size: Some(header.size),
            outcome: "success",
            details: format!("merges={merges}"),
        });
        Ok(())
    }

    /// Header offset and header of the block whose payload starts at `ptr`.
    fn owning_block(
        &mut self,
        symbol: &'static str,
        ptr: usize,
    ) -> Result<(usize, BlockHeader), ArenaError> {
        let found = match ptr.checked_sub(HEADER_SIZE) {
            Some(offset) if self.initialized && self.storage.header_fits(offset) => {
                inspect::locate(&self.storage, offset)?.map(|header| (offset, header))
            }
            _ => None,
        };
        found.ok_or_else(|| {
            self.record(LogEvent {
                level: ArenaLogLevel::Warn,
                symbol,
                event: "invalid_pointer",
                ptr: Some(ptr),
                size: None,
                outcome: "ignored",
                details: if self.initialized {
                    "not_a_block_boundary".to_string()
                } else {
                    "arena_not_initialized".to_string()
                },
            });
            ArenaError::InvalidPointer { ptr }
        })
    }

    // -----------------------------------------------------------------------
    // resize / zero_allocate
    // -----------------------------------------------------------------------

    /// Resize the allocation at `ptr` to `new_size` bytes.
    ///
    /// - `ptr == 0` allocates.
    /// - `new_size == 0` releases and returns `None`.
    /// - A size that fits the current block keeps the address; the tail is
    ///   not reclaimed.
    /// - Otherwise the payload moves to a new block. If that allocation
    ///   fails the old block stays intact and `None` is returned.
    pub fn resize(&mut self, ptr: usize, new_size: usize) -> Option<usize> {
        self.try_resize(ptr, new_size).ok().flatten()
    }

    /// [`Arena::resize`] with the failure reason. `Ok(None)` means the
    /// block was released by a zero-size resize.
    pub fn try_resize(&mut self, ptr: usize, new_size: usize) -> Result<Option<usize>, ArenaError> {
        let result = self.resize_block(ptr, new_size);
        self.note_corruption("resize", &result);
        result
    }

    fn resize_block(&mut self, ptr: usize, new_size: usize) -> Result<Option<usize>, ArenaError> {
        if ptr == 0 {
            if !self.initialized {
                self.initialize();
            }
            let out = self.allocate_block(new_size);
            self.record(LogEvent {
                level: ArenaLogLevel::Trace,
                symbol: "resize",
                event: "resize_null_as_allocate",
                ptr: out.as_ref().ok().copied(),
                size: Some(new_size),
                outcome: if out.is_ok() { "success" } else { "failed" },
                details: "ptr_was_null".to_string(),
            });
            return out.map(Some);
        }
        if new_size == 0 {
            self.release_block(ptr)?;
            self.record(LogEvent {
                level: ArenaLogLevel::Trace,
                symbol: "resize",
                event: "resize_zero_as_release",
                ptr: Some(ptr),
                size: Some(0),
                outcome: "freed",
                details: "new_size_was_zero".to_string(),
            });
            return Ok(None);
        }

        let (_, header) = self.owning_block("resize", ptr)?;
        if header.is_free() {
            self.record(LogEvent {
                level: ArenaLogLevel::Warn,
                symbol: "resize",
                event: "resize_of_free_block",
                ptr: Some(ptr),
                size: Some(new_size),
                outcome: "ignored",
                details: "block_not_allocated".to_string(),
            });
            return Err(ArenaError::InvalidPointer { ptr });
        }

        let old_size = header.size;
        if new_size <= old_size {
            self.record(LogEvent {
                level: ArenaLogLevel::Trace,
                symbol: "resize",
                event: "resize_in_place",
                ptr: Some(ptr),
                size: Some(new_size),
                outcome: "success",
                details: format!("block_size={old_size}"),
            });
            return Ok(Some(ptr));
        }

        let new_ptr = match self.allocate_block(new_size) {
            Ok(new_ptr) => new_ptr,
            Err(err) => {
                self.record(LogEvent {
                    level: ArenaLogLevel::Warn,
                    symbol: "resize",
                    event: "resize_allocate_new_failed",
                    ptr: Some(ptr),
                    size: Some(new_size),
                    outcome: "oom",
                    details: format!("old_size={old_size}"),
                });
                return Err(err);
            }
        };

        // new_size > old_size here, so the whole old payload moves.
        if !self.storage.copy_within(ptr, new_ptr, old_size) {
            return Err(IntegrityError::PayloadOutOfBounds {
                offset: ptr - HEADER_SIZE,
                size: old_size,
            }
            .into());
        }
        self.release_block(ptr)?;

        self.record(LogEvent {
            level: ArenaLogLevel::Trace,
            symbol: "resize",
            event: "resize_move",
            ptr: Some(new_ptr),
            size: Some(new_size),
            outcome: "success",
            details: format!("old_ptr={ptr} old_size={old_size}"),
        });
        Ok(Some(new_ptr))
    }

    /// Allocate `count * elem_size` zeroed bytes.
    ///
    /// Returns `None` on multiplication overflow without touching the arena.
    pub fn zero_allocate(&mut self, count: usize, elem_size: usize) -> Option<usize> {
        self.try_zero_allocate(count, elem_size).ok()
    }

    /// [`Arena::zero_allocate`] with the failure reason.
    pub fn try_zero_allocate(&mut self, count: usize, elem_size: usize) -> Result<usize, ArenaError> {
        let Some(total) = count.checked_mul(elem_size) else {
            self.record(LogEvent {
                level: ArenaLogLevel::Warn,
                symbol: "zero_allocate",
                event: "zero_allocate_overflow",
                ptr: None,
                size: None,
                outcome: "denied",
                details: format!("count={count} elem_size={elem_size}"),
            });
            return Err(ArenaError::SizeOverflow { count, elem_size });
        };

        let ptr = self.try_allocate(total)?;
        let usable = self.usable_size(ptr).unwrap_or(total);
        if let Some(payload) = self.storage.bytes_mut(ptr, usable) {
            payload.fill(0);
        }
        self.record(LogEvent {
            level: ArenaLogLevel::Trace,
            symbol: "zero_allocate",
            event: "zero_allocate",
            ptr: Some(ptr),
            size: Some(total),
            outcome: "success",
            details: format!("count={count} elem_size={elem_size}"),
        });
        Ok(ptr)
    }

    // -----------------------------------------------------------------------
    // payload access
    // -----------------------------------------------------------------------

    /// Payload bytes of the allocated block at `ptr`.
    ///
    /// `None` unless `ptr` is the address of a currently allocated block.
    /// Locating the block walks the arena.
    #[must_use]
    pub fn payload(&self, ptr: usize) -> Option<&[u8]> {
        let size = self.usable_size(ptr)?;
        self.storage.bytes(ptr, size)
    }

    /// Mutable payload bytes of the allocated block at `ptr`.
    pub fn payload_mut(&mut self, ptr: usize) -> Option<&mut [u8]> {
        let size = self.usable_size(ptr)?;
        self.storage.bytes_mut(ptr, size)
    }

    /// Payload size of the allocated block at `ptr`, split slack included.
    #[must_use]
    pub fn usable_size(&self, ptr: usize) -> Option<usize> {
        if !self.initialized {
            return None;
        }
        let offset = ptr.checked_sub(HEADER_SIZE)?;
        let header = inspect::locate(&self.storage, offset).ok()??;
        (!header.is_free()).then_some(header.size)
    }

    // -----------------------------------------------------------------------
    // statistics and validation
    // -----------------------------------------------------------------------

    /// Sum of allocated payload sizes.
    #[must_use]
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Sum of free payload sizes.
    #[must_use]
    pub fn bytes_free(&self) -> usize {
        self.bytes_free
    }

    /// Number of blocks in the free registry.
    #[must_use]
    pub fn fragmentation_count(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            capacity: self.config.capacity,
            header_size: HEADER_SIZE,
            bytes_allocated: self.bytes_allocated,
            bytes_free: self.bytes_free,
            free_blocks: self.registry.len(),
        }
    }

    /// Totals recomputed by walking every block.
    pub fn walk_stats(&self) -> Result<WalkStats, IntegrityError> {
        if !self.initialized {
            return Err(IntegrityError::Uninitialized);
        }
        inspect::walk_stats(&self.storage)
    }

    /// Check the partition, block sizes, free registry and running totals.
    pub fn check_integrity(&self) -> Result<WalkStats, IntegrityError> {
        if !self.initialized {
            return Err(IntegrityError::Uninitialized);
        }
        inspect::check_integrity(
            &self.storage,
            &self.registry,
            &self.config,
            Counters {
                bytes_allocated: self.bytes_allocated,
                bytes_free: self.bytes_free,
            },
        )
    }

    /// Whether [`Arena::check_integrity`] passes.
    #[must_use]
    pub fn validate(&self) -> bool {
        self.check_integrity().is_ok()
    }

    /// Every block in address order.
    #[must_use]
    pub fn dump(&self) -> HeapDump {
        if !self.initialized {
            return HeapDump {
                capacity: self.config.capacity,
                blocks: Vec::new(),
                corruption: Some(IntegrityError::Uninitialized),
            };
        }
        inspect::dump(&self.storage)
    }

    /// Retained lifecycle records, oldest first.
    pub fn lifecycle_logs(&self) -> impl ExactSizeIterator<Item = &ArenaLogRecord> {
        self.lifecycle.records()
    }

    /// Take all retained lifecycle records.
    pub fn drain_lifecycle_logs(&mut self) -> Vec<ArenaLogRecord> {
        self.lifecycle.drain()
    }

    // -----------------------------------------------------------------------
    // internals
    // -----------------------------------------------------------------------

    fn coalesce(&mut self) -> Result<usize, IntegrityError> {
        let merges = placement::coalesce_all(&mut self.storage, &mut self.registry)?;
        if merges > 0 {
            self.bytes_free += merges * HEADER_SIZE;
            self.record(LogEvent {
                level: ArenaLogLevel::Trace,
                symbol: "coalesce",
                event: "merge",
                ptr: None,
                size: Some(merges * HEADER_SIZE),
                outcome: "merged",
                details: format!("merges={merges}"),
            });
        }
        Ok(merges)
    }

    fn debit_free(&mut self, symbol: &'static str, amount: usize) {
        match self.bytes_free.checked_sub(amount) {
            Some(next) => self.bytes_free = next,
            None => {
                let cached = self.bytes_free;
                self.bytes_free = 0;
                self.record_underflow(symbol, "bytes_free", cached, amount);
            }
        }
    }

    fn debit_allocated(&mut self, symbol: &'static str, amount: usize) {
        match self.bytes_allocated.checked_sub(amount) {
            Some(next) => self.bytes_allocated = next,
            None => {
                let cached = self.bytes_allocated;
                self.bytes_allocated = 0;
                self.record_underflow(symbol, "bytes_allocated", cached, amount);
            }
        }
    }

    fn record_underflow(
        &mut self,
        symbol: &'static str,
        counter: &str,
        cached: usize,
        amount: usize,
    ) {
        self.record(LogEvent {
            level: ArenaLogLevel::Error,
            symbol,
            event: "counter_underflow",
            ptr: None,
            size: Some(amount),
            outcome: "recovered",
            details: format!("counter={counter} cached={cached}"),
        });
    }

    fn note_corruption<T>(&mut self, symbol: &'static str, result: &Result<T, ArenaError>) {
        if let Err(ArenaError::Corrupted(err)) = result {
            self.record_corruption(symbol, *err);
        }
    }

    fn record_corruption(&mut self, symbol: &'static str, err: IntegrityError) {
        self.record(LogEvent {
            level: ArenaLogLevel::Error,
            symbol,
            event: "corruption_detected",
            ptr: None,
            size: None,
            outcome: "aborted",
            details: err.to_string(),
        });
    }

    fn record(&mut self, event: LogEvent) {
        let snapshot = Snapshot {
            bytes_allocated: self.bytes_allocated,
            bytes_free: self.bytes_free,
            free_blocks: self.registry.len(),
        };
        self.lifecycle.push(event, snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ARENA_CAPACITY, MIN_BLOCK_SIZE};

    fn arena() -> Arena {
        Arena::initialized(ArenaConfig::default()).unwrap()
    }

    fn small_arena(capacity: usize) -> Arena {
        Arena::initialized(ArenaConfig::default().with_capacity(capacity)).unwrap()
    }

    fn assert_consistent(arena: &Arena) {
        let walked = arena.check_integrity().expect("arena must stay consistent");
        assert_eq!(arena.bytes_allocated(), walked.allocated_bytes);
        assert_eq!(arena.bytes_free(), walked.free_bytes);
        assert_eq!(
            walked.allocated_bytes + walked.free_bytes + walked.header_bytes,
            arena.config().capacity
        );
    }

    #[test]
    fn test_new_arena_is_uninitialized() {
        let arena = Arena::new(ArenaConfig::default()).unwrap();
        assert!(!arena.is_initialized());
        assert!(!arena.validate());
        assert_eq!(arena.check_integrity(), Err(IntegrityError::Uninitialized));
    }

    #[test]
    fn test_initialize_carves_one_free_block() {
        let mut arena = arena();
        assert!(arena.is_initialized());
        assert_eq!(arena.bytes_allocated(), 0);
        assert_eq!(arena.bytes_free(), ARENA_CAPACITY - HEADER_SIZE);
        assert_eq!(arena.fragmentation_count(), 1);
        assert!(arena.validate());

        // Idempotent.
        let _ = arena.allocate(64);
        arena.initialize();
        assert_eq!(arena.bytes_allocated(), 64);
    }

    #[test]
    fn test_allocate_lazily_initializes() {
        let mut arena = Arena::new(ArenaConfig::default()).unwrap();
        let ptr = arena.allocate(10).unwrap();
        assert_eq!(ptr, HEADER_SIZE);
        assert!(arena.is_initialized());
        assert_eq!(arena.bytes_allocated(), MIN_BLOCK_SIZE);
        assert_consistent(&arena);
    }

    #[test]
    fn test_allocate_rounds_and_clamps() {
        let mut arena = arena();
        let a = arena.allocate(1).unwrap();
        assert_eq!(arena.usable_size(a), Some(MIN_BLOCK_SIZE));
        let b = arena.allocate(17).unwrap();
        assert_eq!(arena.usable_size(b), Some(24));
        assert_eq!(b, a + MIN_BLOCK_SIZE + HEADER_SIZE);
        assert_consistent(&arena);
    }

    #[test]
    fn test_allocate_zero_and_oversize() {
        let mut arena = arena();
        assert_eq!(arena.try_allocate(0), Err(ArenaError::ZeroSize));
        assert_eq!(
            arena.try_allocate(ARENA_CAPACITY + 1),
            Err(ArenaError::OutOfMemory {
                requested: ARENA_CAPACITY + 1
            })
        );
        assert!(arena.allocate(usize::MAX).is_none());
        assert_eq!(arena.bytes_allocated(), 0);
        assert_eq!(arena.bytes_free(), ARENA_CAPACITY - HEADER_SIZE);
        assert_consistent(&arena);
    }

    #[test]
    fn test_whole_arena_allocation_then_oom() {
        let mut arena = small_arena(256);
        let all = arena.allocate(256 - HEADER_SIZE).unwrap();
        assert_eq!(arena.bytes_free(), 0);
        assert_eq!(arena.fragmentation_count(), 0);
        assert!(arena.allocate(16).is_none());
        arena.release(all);
        assert_eq!(arena.bytes_free(), 256 - HEADER_SIZE);
        assert_consistent(&arena);
    }

    #[test]
    fn test_release_null_is_noop() {
        let mut arena = arena();
        assert_eq!(arena.try_release(0), Ok(()));
        assert_consistent(&arena);
    }

    #[test]
    fn test_release_invalid_pointers() {
        let mut arena = arena();
        let ptr = arena.allocate(64).unwrap();

        for bogus in [8, ptr + 8, ARENA_CAPACITY, ARENA_CAPACITY + 4096, usize::MAX] {
            assert_eq!(
                arena.try_release(bogus),
                Err(ArenaError::InvalidPointer { ptr: bogus })
            );
        }
        assert_eq!(arena.bytes_allocated(), 64);
        assert_consistent(&arena);
    }

    #[test]
    fn test_release_on_uninitialized_arena() {
        let mut arena = Arena::new(ArenaConfig::default()).unwrap();
        assert_eq!(
            arena.try_release(HEADER_SIZE),
            Err(ArenaError::InvalidPointer { ptr: HEADER_SIZE })
        );
    }

    #[test]
    fn test_double_release_is_detected() {
        let mut arena = arena();
        let keep = arena.allocate(32).unwrap();
        let ptr = arena.allocate(64).unwrap();
        arena.release(ptr);
        let before = arena.stats();
        assert_eq!(
            arena.try_release(ptr),
            Err(ArenaError::DoubleRelease { ptr })
        );
        assert_eq!(arena.stats(), before);
        assert!(arena.validate());
        arena.release(keep);
        assert_consistent(&arena);
    }

    #[test]
    fn test_resize_paths() {
        let mut arena = arena();

        let fresh = arena.resize(0, 40).unwrap();
        assert_eq!(arena.usable_size(fresh), Some(40));

        assert_eq!(arena.resize(fresh, 8), Some(fresh));
        assert_eq!(arena.usable_size(fresh), Some(40));

        arena.payload_mut(fresh).unwrap()[..5].copy_from_slice(b"hello");
        let _blocker = arena.allocate(16).unwrap();
        let grown = arena.resize(fresh, 400).unwrap();
        assert_ne!(grown, fresh);
        assert_eq!(&arena.payload(grown).unwrap()[..5], b"hello");
        assert!(arena.payload(fresh).is_none());

        assert_eq!(arena.try_resize(grown, 0), Ok(None));
        assert!(arena.usable_size(grown).is_none());
        assert_consistent(&arena);
    }

    #[test]
    fn test_resize_failure_keeps_old_block() {
        let mut arena = small_arena(512);
        let ptr = arena.allocate(64).unwrap();
        arena.payload_mut(ptr).unwrap().fill(0x5A);
        assert!(arena.resize(ptr, 4096).is_none());
        assert_eq!(arena.usable_size(ptr), Some(64));
        assert!(arena.payload(ptr).unwrap().iter().all(|b| *b == 0x5A));
        assert_consistent(&arena);
    }

    #[test]
    fn test_resize_of_released_block_is_rejected() {
        let mut arena = arena();
        let ptr = arena.allocate(64).unwrap();
        let _other = arena.allocate(64).unwrap();
        arena.release(ptr);
        assert_eq!(
            arena.try_resize(ptr, 128),
            Err(ArenaError::InvalidPointer { ptr })
        );
        assert_consistent(&arena);
    }

    #[test]
    fn test_zero_allocate_zeroes_reused_memory() {
        let mut arena = arena();
        let dirty = arena.allocate(128).unwrap();
        arena.payload_mut(dirty).unwrap().fill(0xFF);
        arena.release(dirty);

        let ptr = arena.zero_allocate(16, 8).unwrap();
        assert_eq!(ptr, dirty);
        assert!(arena.payload(ptr).unwrap().iter().all(|b| *b == 0));
        assert_consistent(&arena);
    }

    #[test]
    fn test_zero_allocate_overflow() {
        let mut arena = arena();
        let before = arena.stats();
        assert_eq!(
            arena.try_zero_allocate(usize::MAX, 2),
            Err(ArenaError::SizeOverflow {
                count: usize::MAX,
                elem_size: 2
            })
        );
        assert_eq!(arena.stats(), before);
        assert!(arena.zero_allocate(0, 8).is_none());
    }

    #[test]
    fn test_teardown_reports_outstanding_bytes() {
        let mut arena = arena();
        let _ = arena.allocate(100).unwrap();
        assert_eq!(arena.teardown(), 104);
        assert!(!arena.is_initialized());
        let report = arena
            .lifecycle_logs()
            .find(|r| r.event == "teardown_leak_report")
            .unwrap();
        assert_eq!(report.level, ArenaLogLevel::Info);
        assert_eq!(report.size, Some(104));
        assert_eq!(report.outcome, "leaked");

        let reports_before = arena
            .lifecycle_logs()
            .filter(|r| r.event == "teardown_leak_report")
            .count();
        assert_eq!(arena.teardown(), 0);
        let reports_after = arena
            .lifecycle_logs()
            .filter(|r| r.event == "teardown_leak_report")
            .count();
        assert_eq!(reports_before, reports_after);

        arena.initialize();
        assert_eq!(arena.bytes_allocated(), 0);
        assert_eq!(arena.fragmentation_count(), 1);
        assert_consistent(&arena);
    }

    #[test]
    fn test_coalesce_retry_recovers_fragmented_space() {
        let mut arena = small_arena(512);
        // Fill the arena with four blocks, then free two neighbors behind
        // the coalescer's back so only the retry path can merge them.
        let ptrs: Vec<usize> = (0..4).map(|_| arena.allocate(96).unwrap()).collect();
        assert!(arena.allocate(16).is_none());

        for &ptr in &ptrs[1..3] {
            let offset = ptr - HEADER_SIZE;
            let mut header = arena.storage.read_header(offset).unwrap();
            header.state = BlockState::Free;
            arena.storage.write_header(offset, &header).unwrap();
            arena.registry.insert(&mut arena.storage, offset).unwrap();
            arena.bytes_allocated -= header.size;
            arena.bytes_free += header.size;
        }
        assert_eq!(arena.fragmentation_count(), 2);

        let big = arena.allocate(96 * 2 + HEADER_SIZE).unwrap();
        assert_eq!(big, ptrs[1]);
        let logs = arena.drain_lifecycle_logs();
        assert!(logs.iter().any(|r| r.event == "coalesce_retry"));
        assert_consistent(&arena);
    }

    #[test]
    fn test_lifecycle_logs_include_trace_and_decision_ids() {
        let mut arena = arena();
        let ptr = arena.allocate(64).unwrap();
        arena.release(ptr);

        let logs = arena.drain_lifecycle_logs();
        assert!(!logs.is_empty());
        assert!(logs.iter().all(|entry| entry.decision_id > 0));
        assert!(
            logs.iter()
                .all(|entry| entry.trace_id.starts_with("core::arena::"))
        );
        assert!(logs.iter().any(|entry| {
            entry.level == ArenaLogLevel::Trace && entry.symbol == "allocate"
        }));
        assert!(logs.iter().any(|entry| entry.event == "merge"));
        assert_eq!(arena.lifecycle_logs().len(), 0);
    }

    #[test]
    fn test_lifecycle_logs_warn_on_misuse() {
        let mut arena = small_arena(256);
        let ptr = arena.allocate(16).unwrap();
        let _guard = arena.allocate(16).unwrap();
        arena.release(ptr);
        arena.release(ptr);
        arena.release(ptr + 8);
        let _ = arena.allocate(4096);
        let _ = arena.zero_allocate(usize::MAX, usize::MAX);

        let logs = arena.drain_lifecycle_logs();
        for event in [
            "double_release_detected",
            "invalid_pointer",
            "out_of_memory",
            "zero_allocate_overflow",
        ] {
            assert!(
                logs.iter()
                    .any(|entry| entry.level == ArenaLogLevel::Warn && entry.event == event),
                "expected WARN {event} entry"
            );
        }
    }

    #[test]
    fn test_counter_underflow_is_logged_and_recovered() {
        let mut arena = arena();
        let ptr = arena.allocate(128).unwrap();

        // Inject impossible accounting state.
        arena.bytes_allocated = 0;
        arena.release(ptr);

        let logs = arena.drain_lifecycle_logs();
        assert!(logs.iter().any(|entry| {
            entry.level == ArenaLogLevel::Error && entry.event == "counter_underflow"
        }));
        assert_eq!(arena.bytes_allocated(), 0);
    }

    #[test]
    fn test_corruption_aborts_operation() {
        let mut arena = arena();
        let ptr = arena.allocate(64).unwrap();
        // Smash the header of the trailing free block.
        let tail = ptr + 64;
        arena.storage.bytes_mut(tail, HEADER_SIZE).unwrap().fill(0);

        assert!(matches!(
            arena.try_release(ptr),
            Err(ArenaError::Corrupted(_))
        ));
        assert!(!arena.validate());
        assert!(arena.dump().corruption.is_some());
        let logs = arena.drain_lifecycle_logs();
        assert!(logs.iter().any(|entry| {
            entry.level == ArenaLogLevel::Error && entry.event == "corruption_detected"
        }));
    }

    #[test]
    fn test_accounting_invariant_under_deterministic_trace() {
        fn lcg(state: &mut u64) -> u64 {
            *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            *state
        }

        let mut arena = small_arena(64 * 1024);
        let mut live: Vec<usize> = Vec::new();
        let mut rng = 0xA5A5_5A5A_DEAD_BEEFu64;

        for _ in 0..1500 {
            let r = lcg(&mut rng);
            match r % 3 {
                0 => {
                    let size = ((r >> 8) as usize % 2048).max(1);
                    if let Some(ptr) = arena.allocate(size) {
                        live.push(ptr);
                    }
                }
                1 if !live.is_empty() => {
                    let idx = (r as usize) % live.len();
                    let ptr = live.swap_remove(idx);
                    arena.release(ptr);
                }
                2 if !live.is_empty() => {
                    let idx = (r as usize) % live.len();
                    let ptr = live[idx];
                    let new_size = ((r >> 16) as usize) % 2048;
                    let next = arena.resize(ptr, new_size);
                    if new_size == 0 {
                        live.swap_remove(idx);
                        assert!(next.is_none());
                    } else if let Some(new_ptr) = next {
                        live[idx] = new_ptr;
                    }
                }
                _ => {}
            }

            let observed: usize = live
                .iter()
                .map(|&ptr| {
                    arena
                        .usable_size(ptr)
                        .expect("all tracked pointers must stay live")
                })
                .sum();
            assert_eq!(arena.bytes_allocated(), observed);
            assert_consistent(&arena);
        }
    }
}
