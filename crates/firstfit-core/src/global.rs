//! Process-wide arena.
//!
//! One [`Arena`] behind a single `parking_lot::Mutex`, created on first use
//! from [`ArenaConfig::from_env`]. Every function holds the lock for its
//! whole duration, so calls from different threads are serialized and never
//! observe a half-updated arena.

use std::cell::Cell;

use parking_lot::Mutex;

use crate::arena::{Arena, ArenaStats, HeapDump};
use crate::config::ArenaConfig;
use crate::error::IntegrityError;

static ARENA: Mutex<Option<Arena>> = parking_lot::const_mutex(None);

thread_local! {
    static HOLDING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as holding the arena lock until dropped,
/// including during unwinding.
struct Holding;

impl Holding {
    fn enter() -> Self {
        if HOLDING.with(|held| held.replace(true)) {
            panic!("firstfit::global called from inside with_arena on the same thread");
        }
        Holding
    }
}

impl Drop for Holding {
    fn drop(&mut self) {
        HOLDING.with(|held| held.set(false));
    }
}

/// Run `f` with the process-wide arena locked, creating it if needed.
///
/// # Panics
///
/// The lock is not reentrant. Calling any function of this module from
/// inside `f` panics instead of deadlocking; use the `&mut Arena` that `f`
/// receives.
pub fn with_arena<R>(f: impl FnOnce(&mut Arena) -> R) -> R {
    let _holding = Holding::enter();
    let mut guard = ARENA.lock();
    let arena = guard.get_or_insert_with(|| {
        // from_env only returns validated geometry.
        Arena::new(ArenaConfig::from_env()).unwrap_or_default()
    });
    f(arena)
}

/// Carve the process-wide arena. No-op when already initialized.
pub fn init() {
    with_arena(Arena::initialize);
}

/// Tear down the process-wide arena; returns the bytes still allocated.
pub fn teardown() -> usize {
    with_arena(Arena::teardown)
}

pub fn malloc(size: usize) -> Option<usize> {
    with_arena(|arena| arena.allocate(size))
}

pub fn free(ptr: usize) {
    with_arena(|arena| arena.release(ptr));
}

pub fn realloc(ptr: usize, new_size: usize) -> Option<usize> {
    with_arena(|arena| arena.resize(ptr, new_size))
}

pub fn calloc(count: usize, elem_size: usize) -> Option<usize> {
    with_arena(|arena| arena.zero_allocate(count, elem_size))
}

/// Copy of the payload at `ptr`, or `None` if `ptr` is not allocated.
pub fn read_payload(ptr: usize) -> Option<Vec<u8>> {
    with_arena(|arena| arena.payload(ptr).map(<[u8]>::to_vec))
}

/// Copy `bytes` into the payload at `ptr` starting at `offset`. Returns
/// `false` without writing when `ptr` is not allocated or the range does
/// not fit its usable size.
pub fn write_payload(ptr: usize, offset: usize, bytes: &[u8]) -> bool {
    with_arena(|arena| {
        let Some(payload) = arena.payload_mut(ptr) else {
            return false;
        };
        let Some(end) = offset.checked_add(bytes.len()) else {
            return false;
        };
        match payload.get_mut(offset..end) {
            Some(dst) => {
                dst.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    })
}

pub fn bytes_allocated() -> usize {
    with_arena(|arena| arena.bytes_allocated())
}

pub fn bytes_free() -> usize {
    with_arena(|arena| arena.bytes_free())
}

pub fn fragmentation_count() -> usize {
    with_arena(|arena| arena.fragmentation_count())
}

pub fn stats() -> ArenaStats {
    with_arena(|arena| arena.stats())
}

pub fn validate() -> bool {
    with_arena(|arena| arena.validate())
}

pub fn check_integrity() -> Result<(), IntegrityError> {
    with_arena(|arena| arena.check_integrity().map(|_| ()))
}

pub fn dump() -> HeapDump {
    with_arena(|arena| arena.dump())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::thread;

    // The arena is process-wide; serialize tests that reset it.
    static TEST_LOCK: StdMutex<()> = StdMutex::new(());

    fn lock_and_reset() -> std::sync::MutexGuard<'static, ()> {
        let guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        teardown();
        init();
        guard
    }

    #[test]
    fn malloc_free_round_trip() {
        let _g = lock_and_reset();
        let ptr = malloc(128).unwrap();
        assert_eq!(bytes_allocated(), 128);
        assert!(write_payload(ptr, 120, &[7; 8]));
        assert!(!write_payload(ptr, 121, &[7; 8]));
        assert_eq!(&read_payload(ptr).unwrap()[120..], &[7u8; 8]);
        free(ptr);
        assert_eq!(read_payload(ptr), None);
        assert_eq!(bytes_allocated(), 0);
        assert_eq!(fragmentation_count(), 1);
        assert!(validate());
    }

    #[test]
    fn realloc_and_calloc_use_the_shared_arena() {
        let _g = lock_and_reset();
        let zeroed = calloc(4, 8).unwrap();
        assert!(read_payload(zeroed).unwrap().iter().all(|b| *b == 0));
        let grown = realloc(zeroed, 256).unwrap();
        assert_eq!(realloc(grown, 0), None);
        assert_eq!(bytes_allocated(), 0);
        assert_eq!(check_integrity(), Ok(()));
        assert_eq!(teardown(), 0);
    }

    #[test]
    fn concurrent_callers_keep_the_arena_consistent() {
        let _g = lock_and_reset();
        let workers: Vec<_> = (0..4)
            .map(|t| {
                thread::spawn(move || {
                    for i in 0..200 {
                        let size = 16 + ((t * 31 + i * 7) % 200);
                        if let Some(ptr) = malloc(size) {
                            free(ptr);
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(bytes_allocated(), 0);
        assert_eq!(fragmentation_count(), 1);
        assert!(validate());
        assert!(dump().corruption.is_none());
        let stats = stats();
        assert_eq!(stats.bytes_free + stats.header_size, stats.capacity);
    }

    #[test]
    fn nested_global_call_panics_instead_of_hanging() {
        let _g = lock_and_reset();
        let (tx, rx) = std::sync::mpsc::channel();
        let worker = thread::spawn(move || {
            let nested = std::panic::catch_unwind(|| with_arena(|_| malloc(16)));
            // The lock and the reentry mark are both released after the panic.
            let after = malloc(16);
            let _ = tx.send((nested.is_err(), after));
        });
        let (panicked, after) = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("nested call deadlocked");
        worker.join().unwrap();
        assert!(panicked);
        let ptr = after.unwrap();
        free(ptr);
        assert_eq!(bytes_allocated(), 0);
        assert!(validate());
    }
}
