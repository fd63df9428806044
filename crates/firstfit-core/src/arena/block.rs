//! Block header layout.
//!
//! Every block, free or allocated, starts with a fixed 32-byte header stored
//! in the arena itself, immediately followed by `size` payload bytes:
//!
//! ```text
//!   0        8        12       16             24             32
//!   ┌────────┬────────┬────────┬──────────────┬──────────────┬───────────┐
//!   │ size   │ state  │ (pad)  │ next_free    │ prev_free    │ payload.. │
//!   │ u64 LE │ u32 LE │        │ u64 LE       │ u64 LE       │           │
//!   └────────┴────────┴────────┴──────────────┴──────────────┴───────────┘
//! ```
//!
//! Free-list links are arena offsets of other headers, not native pointers.
//! `u64::MAX` marks an unlinked slot.

/// Bytes occupied by one block header.
pub const HEADER_SIZE: usize = 32;

/// Link value of a block that is not threaded into the free registry.
pub const UNLINKED: usize = usize::MAX;

const TAG_ALLOCATED: u32 = 0xA110_C8ED;
const TAG_FREE: u32 = 0xF4EE_B10C;
const UNLINKED_RAW: u64 = u64::MAX;

/// Allocation state of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Allocated,
}

/// Decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Payload bytes following the header.
    pub size: usize,
    pub state: BlockState,
    /// Offset of the next free header, or [`UNLINKED`].
    pub next_free: usize,
    /// Offset of the previous free header, or [`UNLINKED`].
    pub prev_free: usize,
}

impl BlockHeader {
    /// An unlinked free header.
    #[must_use]
    pub const fn free(size: usize) -> Self {
        Self {
            size,
            state: BlockState::Free,
            next_free: UNLINKED,
            prev_free: UNLINKED,
        }
    }

    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self.state, BlockState::Free)
    }

    /// Whether either free-list link is set.
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        self.next_free != UNLINKED || self.prev_free != UNLINKED
    }

    /// Offset one past this block's payload when the header sits at `offset`.
    #[must_use]
    pub fn end(&self, offset: usize) -> Option<usize> {
        offset.checked_add(HEADER_SIZE)?.checked_add(self.size)
    }

    pub(crate) fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0..8].copy_from_slice(&(self.size as u64).to_le_bytes());
        let tag = match self.state {
            BlockState::Free => TAG_FREE,
            BlockState::Allocated => TAG_ALLOCATED,
        };
        raw[8..12].copy_from_slice(&tag.to_le_bytes());
        raw[16..24].copy_from_slice(&encode_link(self.next_free).to_le_bytes());
        raw[24..32].copy_from_slice(&encode_link(self.prev_free).to_le_bytes());
        raw
    }

    /// Decode a header, returning the raw state tag when it is unknown.
    pub(crate) fn decode(raw: &[u8; HEADER_SIZE]) -> Result<Self, u32> {
        let tag = u32::from_le_bytes(word4(raw, 8));
        let state = match tag {
            TAG_FREE => BlockState::Free,
            TAG_ALLOCATED => BlockState::Allocated,
            other => return Err(other),
        };
        Ok(Self {
            size: usize::try_from(u64::from_le_bytes(word8(raw, 0))).unwrap_or(usize::MAX),
            state,
            next_free: decode_link(u64::from_le_bytes(word8(raw, 16))),
            prev_free: decode_link(u64::from_le_bytes(word8(raw, 24))),
        })
    }
}

fn word8(raw: &[u8; HEADER_SIZE], at: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&raw[at..at + 8]);
    out
}

fn word4(raw: &[u8; HEADER_SIZE], at: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&raw[at..at + 4]);
    out
}

fn encode_link(link: usize) -> u64 {
    if link == UNLINKED {
        UNLINKED_RAW
    } else {
        link as u64
    }
}

fn decode_link(raw: u64) -> usize {
    if raw == UNLINKED_RAW {
        UNLINKED
    } else {
        usize::try_from(raw).unwrap_or(UNLINKED)
    }
}

/// Round `size` up to a multiple of `alignment` (a power of two).
///
/// Returns `None` when the rounding addition overflows.
#[must_use]
pub fn align(size: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    size.checked_add(mask).map(|v| v & !mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up_to_unit() {
        for i in 0..10usize {
            for size in (8 * i + 1)..=(8 * (i + 1)) {
                assert_eq!(align(size, 8), Some(8 * (i + 1)));
            }
        }
        assert_eq!(align(0, 8), Some(0));
        assert_eq!(align(17, 16), Some(32));
    }

    #[test]
    fn align_reports_overflow() {
        assert_eq!(align(usize::MAX, 8), None);
        assert_eq!(align(usize::MAX - 6, 8), None);
        assert_eq!(align(usize::MAX - 7, 8), Some(usize::MAX - 7));
    }

    #[test]
    fn header_codec_preserves_fields() {
        let header = BlockHeader {
            size: 4096,
            state: BlockState::Allocated,
            next_free: UNLINKED,
            prev_free: 0x40,
        };
        let decoded = BlockHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);

        let free = BlockHeader::free(24);
        let decoded = BlockHeader::decode(&free.encode()).unwrap();
        assert!(decoded.is_free());
        assert!(!decoded.is_linked());
    }

    #[test]
    fn zeroed_bytes_are_not_a_header() {
        assert_eq!(BlockHeader::decode(&[0u8; HEADER_SIZE]), Err(0));
    }

    #[test]
    fn end_checks_overflow() {
        assert_eq!(BlockHeader::free(16).end(64), Some(112));
        assert_eq!(BlockHeader::free(usize::MAX).end(64), None);
    }
}
