#![no_main]
use firstfit_core::{Arena, ArenaConfig, HEADER_SIZE};
use libfuzzer_sys::fuzz_target;

// Each 4-byte chunk is one operation: op, two size bytes, one selector.
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let config = ArenaConfig::default().with_capacity(16 * 1024).with_log_limit(0);
    let Ok(mut arena) = Arena::new(config) else {
        return;
    };
    let mut live: Vec<usize> = Vec::new();

    for chunk in data.chunks_exact(4) {
        let op = chunk[0] % 6;
        let size = u16::from_le_bytes([chunk[1], chunk[2]]) as usize;
        let pick = chunk[3] as usize;

        match op {
            0 => {
                if let Some(ptr) = arena.allocate(size) {
                    assert!(ptr >= HEADER_SIZE);
                    live.push(ptr);
                }
            }
            1 if !live.is_empty() => {
                let ptr = live.swap_remove(pick % live.len());
                assert!(arena.try_release(ptr).is_ok());
            }
            2 if !live.is_empty() => {
                let idx = pick % live.len();
                match arena.try_resize(live[idx], size) {
                    Ok(Some(ptr)) => live[idx] = ptr,
                    Ok(None) => {
                        live.swap_remove(idx);
                    }
                    Err(_) => {}
                }
            }
            3 => {
                let count = (size & 0xFF) + 1;
                if let Some(ptr) = arena.zero_allocate(count, pick) {
                    let payload = arena.payload(ptr).unwrap_or_default();
                    assert!(payload.iter().all(|b| *b == 0));
                    live.push(ptr);
                }
            }
            4 => {
                // Arbitrary addresses must be refused or be a live block.
                let before = arena.stats();
                if arena.try_release(size).is_ok() {
                    live.retain(|&p| p != size);
                } else {
                    assert_eq!(arena.stats(), before);
                }
            }
            _ => {
                if let Some(payload) = live
                    .get(pick % live.len().max(1))
                    .and_then(|&ptr| arena.payload_mut(ptr))
                {
                    payload.fill(chunk[3]);
                }
            }
        }

        assert!(arena.validate() || !arena.is_initialized());
    }

    for ptr in live {
        arena.release(ptr);
    }
    if arena.is_initialized() {
        assert_eq!(arena.bytes_allocated(), 0);
        assert_eq!(arena.fragmentation_count(), 1);
    }
});
