//! Fixed-size arena with in-band headers.
//!
//! Layering, bottom up:
//! - [`block`]: header layout and encoding
//! - [`storage`]: the bounds-checked byte region
//! - [`free_list`]: the doubly-linked free registry
//! - [`placement`]: first-fit search, split, coalesce
//! - [`inspect`]: partition walk, integrity check, dump
//! - [`allocator`]: the public [`Arena`] state

pub mod allocator;
pub mod block;
pub mod free_list;
pub mod inspect;
pub mod lifecycle;
pub mod placement;
pub mod storage;

pub use allocator::Arena;
pub use block::{BlockHeader, BlockState, HEADER_SIZE};
pub use inspect::{ArenaStats, BlockInfo, HeapDump, WalkStats};
pub use lifecycle::{ArenaLogLevel, ArenaLogRecord};
