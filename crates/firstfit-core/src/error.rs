//! Error taxonomy for arena operations.
//!
//! None of these are fatal: the plain API (`allocate`, `release`, ...) logs
//! the condition and hands the caller a "no value" result, while the
//! `try_*` variants surface the error itself.

use thiserror::Error;

/// Recoverable failure of a public arena operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The arena geometry cannot be honored.
    #[error("invalid arena configuration: {reason}")]
    InvalidConfig { reason: String },
    /// A zero-byte request.
    #[error("zero-size request")]
    ZeroSize,
    /// No free block fits, even after coalescing.
    #[error("out of memory: cannot allocate {requested} bytes")]
    OutOfMemory { requested: usize },
    /// The address does not name a block inside the arena.
    #[error("invalid pointer {ptr:#x}")]
    InvalidPointer { ptr: usize },
    /// The block behind the address is already free.
    #[error("double release of {ptr:#x}")]
    DoubleRelease { ptr: usize },
    /// `count * elem_size` does not fit in `usize`.
    #[error("size overflow: {count} * {elem_size}")]
    SizeOverflow { count: usize, elem_size: usize },
    /// Bookkeeping inside the arena is inconsistent.
    #[error("arena corrupted: {0}")]
    Corrupted(#[from] IntegrityError),
}

/// First inconsistency found by an integrity walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("arena is not initialized")]
    Uninitialized,
    #[error("header at {offset:#x} crosses the arena end")]
    HeaderOutOfBounds { offset: usize },
    #[error("block at {offset:#x} with size {size} runs past the arena end")]
    PayloadOutOfBounds { offset: usize, size: usize },
    #[error("block at {offset:#x} has unaligned size {size}")]
    MisalignedSize { offset: usize, size: usize },
    #[error("block at {offset:#x} has size {size} below the minimum")]
    UndersizedBlock { offset: usize, size: usize },
    #[error("block at {offset:#x} has unknown state tag {tag:#010x}")]
    BadStateTag { offset: usize, tag: u32 },
    #[error("free registry revisits {offset:#x}")]
    RegistryCycle { offset: usize },
    #[error("free registry links {offset:#x}, which is not a free block")]
    RegistryNotFree { offset: usize },
    #[error("free registry back-link of {offset:#x} is broken")]
    RegistryAsymmetric { offset: usize },
    #[error("free block at {offset:#x} is missing from the registry")]
    RegistryMissing { offset: usize },
    #[error("registry length counter {cached} disagrees with {walked} linked blocks")]
    RegistryLengthDrift { cached: usize, walked: usize },
    #[error("allocated block at {offset:#x} still carries free-list links")]
    StaleLinkage { offset: usize },
    #[error("{counter} counter is {cached} but the arena walk yields {walked}")]
    CounterDrift {
        counter: &'static str,
        cached: usize,
        walked: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_address() {
        let err = ArenaError::InvalidPointer { ptr: 0x40 };
        assert_eq!(err.to_string(), "invalid pointer 0x40");

        let err = ArenaError::from(IntegrityError::BadStateTag {
            offset: 0x20,
            tag: 7,
        });
        assert_eq!(
            err.to_string(),
            "arena corrupted: block at 0x20 has unknown state tag 0x00000007"
        );
    }
}
