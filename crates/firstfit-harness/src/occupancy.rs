//! Text rendering of arena occupancy.
//!
//! Reads nothing but [`HeapDump`]; the arena itself knows nothing about
//! how it is drawn or what callers call their blocks.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use firstfit_core::{ArenaStats, HEADER_SIZE, HeapDump};
use serde::Serialize;

const ALLOCATED: char = '#';
const FREE: char = '.';
const BOUNDARY: char = '|';

/// Render the arena as a `width`-column bar.
///
/// Each block starts with a `|`; its payload is drawn with `#` when
/// allocated and `.` when free. Column positions scale linearly with
/// arena offsets, so blocks narrower than one column collapse onto their
/// boundary marker.
#[must_use]
pub fn render_bar(dump: &HeapDump, width: usize) -> String {
    if width == 0 || dump.capacity == 0 {
        return String::new();
    }
    let column = |offset: usize| -> usize {
        let scaled = (offset as u128 * width as u128) / dump.capacity as u128;
        (scaled as usize).min(width)
    };

    let mut cells = vec![' '; width];
    for block in &dump.blocks {
        let start = column(block.offset);
        let end = column(block.address + block.size);
        let fill = if block.is_free { FREE } else { ALLOCATED };
        for cell in &mut cells[start..end] {
            *cell = fill;
        }
    }
    // Boundaries last so they survive neighbors that round onto them.
    for block in &dump.blocks {
        let start = column(block.offset);
        if start < width {
            cells[start] = BOUNDARY;
        }
    }
    cells.into_iter().collect()
}

/// One-line counters summary.
#[must_use]
pub fn status_line(stats: &ArenaStats) -> String {
    format!(
        "Heap: {}KB | Allocated: {}B | Free: {}B | Fragmentation: {} blocks",
        stats.capacity / 1024,
        stats.bytes_allocated,
        stats.bytes_free,
        stats.free_blocks
    )
}

/// Caller-side names for live addresses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LabelTable {
    labels: BTreeMap<usize, String>,
    next_id: usize,
}

impl LabelTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name `ptr` as `<kind>_<n>` and return the label.
    pub fn track(&mut self, ptr: usize, kind: &str) -> String {
        let label = format!("{kind}_{}", self.next_id);
        self.next_id += 1;
        self.labels.insert(ptr, label.clone());
        label
    }

    pub fn forget(&mut self, ptr: usize) -> Option<String> {
        self.labels.remove(&ptr)
    }

    #[must_use]
    pub fn get(&self, ptr: usize) -> Option<&str> {
        self.labels.get(&ptr).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Listing of labeled blocks in address order, with their sizes from
    /// `dump`. Labels whose address is no longer allocated are flagged.
    #[must_use]
    pub fn render(&self, dump: &HeapDump) -> String {
        let mut out = String::new();
        for (ptr, label) in &self.labels {
            match dump
                .blocks
                .iter()
                .find(|block| block.address == *ptr && !block.is_free)
            {
                Some(block) => {
                    let _ = writeln!(out, "{label}: {} bytes at {ptr:#x}", block.size);
                }
                None => {
                    let _ = writeln!(out, "{label}: stale at {ptr:#x}");
                }
            }
        }
        out
    }
}

/// Full occupancy view: status line, bar, legend and labels.
#[must_use]
pub fn render(stats: &ArenaStats, dump: &HeapDump, labels: &LabelTable, width: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", status_line(stats));
    let _ = writeln!(out, "[{}]", render_bar(dump, width));
    let _ = writeln!(
        out,
        "legend: '{ALLOCATED}' allocated  '{FREE}' free  '{BOUNDARY}' block start ({HEADER_SIZE}B header)"
    );
    if let Some(err) = &dump.corruption {
        let _ = writeln!(out, "corruption: {err}");
    }
    out.push_str(&labels.render(dump));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use firstfit_core::{Arena, ArenaConfig};

    fn arena(capacity: usize) -> Arena {
        Arena::initialized(ArenaConfig::default().with_capacity(capacity)).unwrap()
    }

    #[test]
    fn fresh_arena_is_one_free_run() {
        let arena = arena(1024);
        let bar = render_bar(&arena.dump(), 32);
        assert_eq!(bar.len(), 32);
        assert_eq!(bar, format!("|{}", ".".repeat(31)));
    }

    #[test]
    fn allocated_prefix_is_drawn_first() {
        let mut arena = arena(1024);
        // Header + payload = half the arena.
        let _ = arena.allocate(512 - HEADER_SIZE).unwrap();
        let bar = render_bar(&arena.dump(), 16);
        assert_eq!(bar, "|#######|.......");
    }

    #[test]
    fn zero_width_renders_nothing() {
        let arena = arena(1024);
        assert!(render_bar(&arena.dump(), 0).is_empty());
    }

    #[test]
    fn labels_follow_the_dump() {
        let mut arena = arena(4096);
        let mut labels = LabelTable::new();
        let a = arena.allocate(100).unwrap();
        let b = arena.allocate(200).unwrap();
        assert_eq!(labels.track(a, "stress"), "stress_0");
        assert_eq!(labels.track(b, "array"), "array_1");
        arena.release(b);

        let listing = labels.render(&arena.dump());
        assert!(listing.contains("stress_0: 104 bytes at 0x20"));
        assert!(listing.contains("array_1: stale"));
        assert_eq!(labels.forget(b).as_deref(), Some("array_1"));
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn full_view_contains_status_and_legend() {
        let mut arena = arena(2048);
        let _ = arena.allocate(64).unwrap();
        let view = render(&arena.stats(), &arena.dump(), &LabelTable::new(), 40);
        assert!(view.starts_with("Heap: 2KB | Allocated: 64B"));
        assert!(view.contains("legend:"));
        assert!(view.lines().nth(1).unwrap().starts_with("[|"));
    }
}
