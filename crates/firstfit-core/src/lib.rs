//! # firstfit-core
//!
//! A fixed-size arena allocator: one contiguous byte region, in-band block
//! headers, a doubly-linked free registry, first-fit placement, splitting
//! on allocate and eager coalescing on release.
//!
//! Addresses handed out are payload offsets into the arena, never raw
//! pointers, so the crate is entirely safe code. Two ways in:
//! - [`Arena`]: an explicit context object; create as many as you like.
//! - [`global`]: one lazily created, lock-protected process-wide arena with
//!   the classic `malloc`/`free`/`realloc`/`calloc` surface.

#![deny(unsafe_code)]

pub mod arena;
pub mod config;
pub mod error;
pub mod global;

pub use arena::{
    Arena, ArenaLogLevel, ArenaLogRecord, ArenaStats, BlockInfo, HEADER_SIZE, HeapDump, WalkStats,
};
pub use config::{ALIGNMENT, ARENA_CAPACITY, ArenaConfig, MIN_BLOCK_SIZE};
pub use error::{ArenaError, IntegrityError};
