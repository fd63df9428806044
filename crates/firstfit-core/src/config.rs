//! Arena configuration.
//!
//! Compile-time defaults live in the constants below. A runtime
//! [`ArenaConfig`] can override them and is validated by [`crate::Arena::new`].
//! The process-wide arena in [`crate::global`] reads overrides from the
//! environment:
//! - `FIRSTFIT_ARENA_CAPACITY`: arena size in bytes (`1048576`, `0x100000`,
//!   `1024k`, `1m`).
//! - `FIRSTFIT_LOG_LIMIT`: maximum retained lifecycle records (`0` disables).
//!
//! Unparsable or invalid values fall back to the defaults.

use crate::arena::block::HEADER_SIZE;
use crate::error::ArenaError;

/// Default arena capacity in bytes (1 MiB).
pub const ARENA_CAPACITY: usize = 1024 * 1024;

/// Smallest payload any block may carry.
pub const MIN_BLOCK_SIZE: usize = 16;

/// Payload sizes are rounded up to a multiple of this.
pub const ALIGNMENT: usize = 8;

/// Default number of lifecycle records retained before the oldest is dropped.
pub const DEFAULT_LOG_LIMIT: usize = 4096;

const CAPACITY_ENV: &str = "FIRSTFIT_ARENA_CAPACITY";
const LOG_LIMIT_ENV: &str = "FIRSTFIT_LOG_LIMIT";

/// Geometry and bookkeeping limits of one arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Total arena size in bytes, headers included.
    pub capacity: usize,
    /// Minimum payload size of every block.
    pub min_block_size: usize,
    /// Payload size granularity; a power of two dividing the header size.
    pub alignment: usize,
    /// Lifecycle records kept in memory.
    pub log_limit: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            capacity: ARENA_CAPACITY,
            min_block_size: MIN_BLOCK_SIZE,
            alignment: ALIGNMENT,
            log_limit: DEFAULT_LOG_LIMIT,
        }
    }
}

impl ArenaConfig {
    /// Set the arena capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the minimum block size.
    #[must_use]
    pub const fn with_min_block_size(mut self, min_block_size: usize) -> Self {
        self.min_block_size = min_block_size;
        self
    }

    /// Set the payload alignment.
    #[must_use]
    pub const fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set the lifecycle log limit.
    #[must_use]
    pub const fn with_log_limit(mut self, log_limit: usize) -> Self {
        self.log_limit = log_limit;
        self
    }

    /// Payload size of the single free block a fresh arena starts with.
    #[must_use]
    pub const fn initial_free_bytes(&self) -> usize {
        self.capacity.saturating_sub(HEADER_SIZE)
    }

    /// Check that the geometry keeps every block header aligned and every
    /// payload size a multiple of `alignment`.
    pub fn validate(&self) -> Result<(), ArenaError> {
        let reject = |reason: String| Err(ArenaError::InvalidConfig { reason });

        if !self.alignment.is_power_of_two() {
            return reject(format!("alignment {} is not a power of two", self.alignment));
        }
        if self.alignment < ALIGNMENT || HEADER_SIZE % self.alignment != 0 {
            return reject(format!(
                "alignment {} must be >= {ALIGNMENT} and divide the {HEADER_SIZE}-byte header",
                self.alignment
            ));
        }
        if self.min_block_size == 0 || self.min_block_size % self.alignment != 0 {
            return reject(format!(
                "min_block_size {} must be a non-zero multiple of {}",
                self.min_block_size, self.alignment
            ));
        }
        if self.capacity % self.alignment != 0 {
            return reject(format!(
                "capacity {} is not a multiple of {}",
                self.capacity, self.alignment
            ));
        }
        match HEADER_SIZE.checked_add(self.min_block_size) {
            Some(floor) if self.capacity >= floor => Ok(()),
            _ => reject(format!(
                "capacity {} cannot hold one header plus a {}-byte block",
                self.capacity, self.min_block_size
            )),
        }
    }

    /// Defaults overridden by `FIRSTFIT_*` environment variables.
    ///
    /// Falls back to [`ArenaConfig::default`] when the overrides describe an
    /// invalid geometry.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(capacity) = std::env::var(CAPACITY_ENV)
            .ok()
            .and_then(|raw| parse_size_loose(&raw))
        {
            config.capacity = capacity;
        }
        if let Some(limit) = std::env::var(LOG_LIMIT_ENV)
            .ok()
            .and_then(|raw| parse_size_loose(&raw))
        {
            config.log_limit = limit;
        }
        if config.validate().is_ok() {
            config
        } else {
            Self::default()
        }
    }
}

/// Parse a byte count written as decimal, `0x` hex, or with a `k`/`m` suffix
/// (case-insensitive, underscores ignored).
#[must_use]
pub fn parse_size_loose(raw: &str) -> Option<usize> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_ascii_lowercase();

    if let Some(hex) = cleaned.strip_prefix("0x") {
        return usize::from_str_radix(hex, 16).ok();
    }

    let (digits, scale) = match cleaned.strip_suffix('k') {
        Some(d) => (d, 1024),
        None => match cleaned.strip_suffix('m') {
            Some(d) => (d, 1024 * 1024),
            None => (cleaned.as_str(), 1),
        },
    };
    digits.parse::<usize>().ok()?.checked_mul(scale)
}
