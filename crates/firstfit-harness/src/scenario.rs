//! Scripted and generated arena workloads.
//!
//! - [`run_demo`]: the guided tour (basic allocations, a growing array,
//!   string growth, zeroed allocation, fragmentation and merge, a timing
//!   loop, final leak check), and [`emit_demo_log`] to record it.
//! - [`run_stress`]: a seeded allocate/release/resize/zero-allocate trace
//!   that checks integrity and payload contents as it goes.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use firstfit_core::{Arena, ArenaStats};
use serde::Serialize;

use crate::error::HarnessError;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

/// Serializable view of [`ArenaStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub capacity: usize,
    pub bytes_allocated: usize,
    pub bytes_free: usize,
    pub free_blocks: usize,
}

impl From<ArenaStats> for StatusSnapshot {
    fn from(stats: ArenaStats) -> Self {
        Self {
            capacity: stats.capacity,
            bytes_allocated: stats.bytes_allocated,
            bytes_free: stats.bytes_free,
            free_blocks: stats.free_blocks,
        }
    }
}

// ---------------------------------------------------------------------------
// Demo
// ---------------------------------------------------------------------------

/// One titled section of the demo and the arena status after it.
#[derive(Debug, Clone, Serialize)]
pub struct DemoSection {
    pub title: String,
    pub lines: Vec<String>,
    pub status: StatusSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub sections: Vec<DemoSection>,
    pub cycle_count: usize,
    pub cycle_micros: u64,
    /// Bytes still allocated before teardown.
    pub leaked_bytes: usize,
}

impl DemoReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.leaked_bytes == 0
    }
}

impl fmt::Display for DemoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dynamic Memory Allocator Demo")?;
        writeln!(f, "=============================")?;
        for (i, section) in self.sections.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "{}. {}", i + 1, section.title)?;
            writeln!(f, "{}", "-".repeat(section.title.len() + 3))?;
            for line in &section.lines {
                writeln!(f, "{line}")?;
            }
            writeln!(
                f,
                "[allocated={}B free={}B fragmentation={} blocks]",
                section.status.bytes_allocated, section.status.bytes_free, section.status.free_blocks
            )?;
        }
        writeln!(f)?;
        if self.is_clean() {
            write!(f, "All memory successfully freed")
        } else {
            write!(
                f,
                "Memory leak detected: {} bytes still allocated",
                self.leaked_bytes
            )
        }
    }
}

struct DemoScript<'a> {
    arena: &'a mut Arena,
    sections: Vec<DemoSection>,
    lines: Vec<String>,
    step: usize,
}

impl<'a> DemoScript<'a> {
    fn new(arena: &'a mut Arena) -> Self {
        Self {
            arena,
            sections: Vec::new(),
            lines: Vec::new(),
            step: 0,
        }
    }

    fn fail(&self, message: impl Into<String>) -> HarnessError {
        HarnessError::Scenario {
            scenario: "demo",
            step: self.step,
            message: message.into(),
        }
    }

    fn say(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn close_section(&mut self, title: &str) {
        self.sections.push(DemoSection {
            title: title.to_string(),
            lines: std::mem::take(&mut self.lines),
            status: self.arena.stats().into(),
        });
    }

    fn allocate(&mut self, size: usize) -> Result<usize, HarnessError> {
        self.step += 1;
        Ok(self.arena.try_allocate(size)?)
    }

    fn zero_allocate(&mut self, count: usize, elem_size: usize) -> Result<usize, HarnessError> {
        self.step += 1;
        Ok(self.arena.try_zero_allocate(count, elem_size)?)
    }

    fn resize(&mut self, ptr: usize, size: usize) -> Result<usize, HarnessError> {
        self.step += 1;
        self.arena
            .try_resize(ptr, size)?
            .ok_or_else(|| self.fail(format!("resize of {ptr:#x} to {size} released the block")))
    }

    fn release(&mut self, ptr: usize) -> Result<(), HarnessError> {
        self.step += 1;
        Ok(self.arena.try_release(ptr)?)
    }

    fn write(&mut self, ptr: usize, at: usize, bytes: &[u8]) -> Result<(), HarnessError> {
        if let Some(slot) = self
            .arena
            .payload_mut(ptr)
            .and_then(|payload| payload.get_mut(at..at + bytes.len()))
        {
            slot.copy_from_slice(bytes);
            return Ok(());
        }
        Err(self.fail(format!("write of {} bytes at {ptr:#x}+{at}", bytes.len())))
    }

    fn read(&self, ptr: usize, at: usize, len: usize) -> Result<&[u8], HarnessError> {
        self.arena
            .payload(ptr)
            .and_then(|payload| payload.get(at..at + len))
            .ok_or_else(|| self.fail(format!("read of {len} bytes at {ptr:#x}+{at}")))
    }

    fn read_i32s(&self, ptr: usize, count: usize) -> Result<Vec<i32>, HarnessError> {
        let bytes = self.read(ptr, 0, count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    /// Bytes up to the first NUL, as text.
    fn read_str(&self, ptr: usize) -> Result<String, HarnessError> {
        let payload = self
            .arena
            .payload(ptr)
            .ok_or_else(|| self.fail(format!("{ptr:#x} is not allocated")))?;
        let end = payload.iter().position(|b| *b == 0).unwrap_or(payload.len());
        Ok(String::from_utf8_lossy(&payload[..end]).into_owned())
    }

    fn write_str(&mut self, ptr: usize, at: usize, text: &str) -> Result<(), HarnessError> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.write(ptr, at, &bytes)
    }
}

/// Run the guided demo against `arena` and tear it down afterwards.
pub fn run_demo(arena: &mut Arena) -> Result<DemoReport, HarnessError> {
    arena.initialize();
    let mut script = DemoScript::new(arena);

    // 1. Basic allocations of a few element types.
    let numbers = script.allocate(10 * 4)?;
    let message = script.allocate(100)?;
    let values = script.allocate(5 * 8)?;
    for i in 0..10i32 {
        script.write(numbers, i as usize * 4, &(i * i).to_le_bytes())?;
    }
    script.write_str(message, 0, "Hello from custom allocator!")?;
    for i in 0..5 {
        script.write(values, i * 8, &(i as f64 * std::f64::consts::PI).to_le_bytes())?;
    }
    let squares = script.read_i32s(numbers, 10)?;
    if squares.iter().enumerate().any(|(i, v)| *v != (i * i) as i32) {
        return Err(script.fail("numbers were not preserved"));
    }
    let rendered: Vec<String> = squares.iter().map(i32::to_string).collect();
    script.say(format!("Numbers: {}", rendered.join(" ")));
    let text = script.read_str(message)?;
    script.say(format!("Message: {text}"));
    let floats: Vec<String> = script
        .read(values, 0, 5 * 8)?
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            format!("{:.2}", f64::from_le_bytes(raw))
        })
        .collect();
    script.say(format!("Values: {}", floats.join(" ")));
    script.close_section("Basic Memory Allocation");

    // 2. A dynamic array that doubles when full.
    let mut capacity = 5usize;
    let mut len = 0usize;
    let mut array = script.allocate(capacity * 4)?;
    for value in 1..=12i32 {
        if len >= capacity {
            capacity *= 2;
            script.say(format!("Growing array to capacity {capacity}"));
            array = script.resize(array, capacity * 4)?;
        }
        script.write(array, len * 4, &value.to_le_bytes())?;
        len += 1;
    }
    let contents = script.read_i32s(array, len)?;
    if contents != (1..=12).collect::<Vec<i32>>() {
        return Err(script.fail("array contents lost while growing"));
    }
    let rendered: Vec<String> = contents.iter().map(i32::to_string).collect();
    script.say(format!("Dynamic array contents: {}", rendered.join(" ")));
    script.close_section("Dynamic Array Example");

    // 3. String growth and a zeroed buffer.
    let mut first = script.allocate(20)?;
    script.write_str(first, 0, "Initial string")?;
    let shown = script.read_str(first)?;
    script.say(format!("String 1: {shown}"));
    first = script.resize(first, 50)?;
    let grown = script.read_str(first)?;
    script.write_str(first, grown.len(), " - expanded!")?;
    let shown = script.read_str(first)?;
    script.say(format!("Expanded string 1: {shown}"));
    let second = script.zero_allocate(30, 1)?;
    if script.read(second, 0, 30)?.iter().any(|b| *b != 0) {
        return Err(script.fail("zero_allocate returned dirty memory"));
    }
    script.write_str(second, 0, "Zero-initialized")?;
    let shown = script.read_str(second)?;
    script.say(format!("String 2: {shown}"));
    script.close_section("String Management");

    // 4. Fragment the arena, then let coalescing undo it.
    let mut blocks = [0usize; 6];
    for (i, slot) in blocks.iter_mut().enumerate() {
        *slot = script.allocate(50)?;
        script.say(format!("Block {i} allocated at {:#x}", *slot));
    }
    let before = script.arena.fragmentation_count();
    for i in (1..6).step_by(2) {
        script.release(blocks[i])?;
        script.say(format!("Block {i} freed"));
    }
    let fragmented = script.arena.fragmentation_count();
    script.say(format!("Fragmentation: {before} -> {fragmented} free blocks"));
    for i in (0..6).step_by(2) {
        script.release(blocks[i])?;
        script.say(format!("Block {i} freed"));
    }
    let merged = script.arena.fragmentation_count();
    script.say(format!("After merging: {merged} free blocks"));
    if merged >= fragmented {
        return Err(script.fail("releasing neighbors did not merge"));
    }
    script.close_section("Memory Pattern Demonstration");

    // 5. Timing loop.
    let cycle_count = 1000;
    let started = Instant::now();
    for _ in 0..cycle_count {
        let ptr = script.allocate(64)?;
        script.release(ptr)?;
    }
    let cycle_micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    script.say(format!(
        "{cycle_count} allocate/release cycles took {cycle_micros} us"
    ));
    script.close_section("Performance Test");

    // 6. Cleanup.
    for ptr in [numbers, message, values, array, first, second] {
        script.release(ptr)?;
    }
    script.arena.check_integrity()?;
    script.close_section("Final Status");

    let sections = script.sections;
    let leaked_bytes = arena.teardown();
    Ok(DemoReport {
        sections,
        cycle_count,
        cycle_micros,
        leaked_bytes,
    })
}

/// Write a finished demo to `emitter`: a start marker, one entry per
/// section, the timing loop as `demo_cycles`, and a summary that points at
/// `artifact_refs`.
pub fn emit_demo_log(
    report: &DemoReport,
    emitter: &mut LogEmitter,
    artifact_refs: Vec<String>,
) -> Result<(), HarnessError> {
    emitter.emit(LogLevel::Info, "demo_start")?;
    for (i, section) in report.sections.iter().enumerate() {
        let status = section.status;
        emitter.emit_entry(
            LogEntry::new("", LogLevel::Info, "demo_section")
                .with_step(i as u64 + 1)
                .with_outcome(Outcome::Pass)
                .with_snapshot(status.bytes_allocated, status.bytes_free, status.free_blocks)
                .with_details(serde_json::json!({
                    "title": section.title,
                    "lines": section.lines,
                })),
        )?;
    }
    emitter.emit_entry(
        LogEntry::new("", LogLevel::Info, "demo_cycles")
            .with_symbol("allocate")
            .with_duration_ms(report.cycle_micros / 1000)
            .with_details(serde_json::json!({
                "cycles": report.cycle_count,
                "micros": report.cycle_micros,
            })),
    )?;
    let outcome = if report.is_clean() {
        Outcome::Pass
    } else {
        Outcome::Fail
    };
    emitter.emit_entry(
        LogEntry::new("", LogLevel::Info, "demo_summary")
            .with_outcome(outcome)
            .with_artifacts(artifact_refs)
            .with_details(serde_json::json!({ "leaked_bytes": report.leaked_bytes })),
    )?;
    emitter.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Stress
// ---------------------------------------------------------------------------

/// Seeded linear congruential generator; reproducible across platforms.
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Lcg {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 11
    }

    /// Uniform-ish value in `0..bound`; `bound` must be non-zero.
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StressConfig {
    pub seed: u64,
    pub steps: usize,
    /// Largest single request.
    pub max_request: usize,
    /// Run the full integrity walk every this many steps (0 = only at the end).
    pub check_every: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            seed: 0xDEAD_BEEF,
            steps: 10_000,
            max_request: 4096,
            check_every: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpCounts {
    pub allocate: usize,
    pub release: usize,
    pub resize: usize,
    pub zero_allocate: usize,
    /// Deliberate double releases and interior-pointer releases.
    pub misuse: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantFailure {
    pub step: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressReport {
    pub config: StressConfig,
    pub ops: OpCounts,
    pub out_of_memory: usize,
    pub peak_bytes_allocated: usize,
    pub peak_fragmentation: usize,
    pub invariant_failures: Vec<InvariantFailure>,
    /// Status after every live block was released.
    pub final_status: StatusSnapshot,
}

impl StressReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.invariant_failures.is_empty()
            && self.final_status.bytes_allocated == 0
            && self.final_status.free_blocks == 1
    }
}

impl fmt::Display for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "stress seed={:#x} steps={}",
            self.config.seed, self.config.steps
        )?;
        writeln!(
            f,
            "ops: allocate={} release={} resize={} zero_allocate={} misuse={}",
            self.ops.allocate,
            self.ops.release,
            self.ops.resize,
            self.ops.zero_allocate,
            self.ops.misuse
        )?;
        writeln!(
            f,
            "out_of_memory={} peak_allocated={}B peak_fragmentation={}",
            self.out_of_memory, self.peak_bytes_allocated, self.peak_fragmentation
        )?;
        for failure in &self.invariant_failures {
            writeln!(f, "FAIL step {}: {}", failure.step, failure.message)?;
        }
        write!(f, "result: {}", if self.passed() { "pass" } else { "fail" })
    }
}

/// A live block and the byte it was filled with.
#[derive(Debug, Clone, Copy)]
struct Live {
    ptr: usize,
    fill: u8,
}

struct StressRun<'a> {
    arena: &'a mut Arena,
    emitter: Option<&'a mut LogEmitter>,
    report: StressReport,
    live: Vec<Live>,
    rng: Lcg,
}

impl StressRun<'_> {
    fn record_failure(&mut self, step: usize, message: String) {
        self.report
            .invariant_failures
            .push(InvariantFailure { step, message });
    }

    fn emit(
        &mut self,
        step: usize,
        symbol: &str,
        ptr: Option<usize>,
        size: Option<usize>,
        outcome: Outcome,
    ) -> Result<(), HarnessError> {
        let Some(emitter) = self.emitter.as_deref_mut() else {
            return Ok(());
        };
        let stats = self.arena.stats();
        let level = if outcome == Outcome::Pass {
            LogLevel::Trace
        } else {
            LogLevel::Warn
        };
        let entry = LogEntry::new("", level, "stress_step")
            .with_symbol(symbol)
            .with_step(step as u64)
            .with_block(ptr, size)
            .with_outcome(outcome)
            .with_snapshot(stats.bytes_allocated, stats.bytes_free, stats.free_blocks);
        emitter.emit_entry(entry)?;
        let records = self.arena.drain_lifecycle_logs();
        emitter.emit_arena_records(&records)?;
        Ok(())
    }

    fn payload_intact(&self, live: Live, len: usize) -> bool {
        self.arena
            .payload(live.ptr)
            .and_then(|payload| payload.get(..len))
            .is_some_and(|bytes| bytes.iter().all(|b| *b == live.fill))
    }

    fn fill(&mut self, ptr: usize, fill: u8) {
        if let Some(payload) = self.arena.payload_mut(ptr) {
            payload.fill(fill);
        }
    }

    fn step(&mut self, step: usize) -> Result<(), HarnessError> {
        let max = self.report.config.max_request.max(1);
        let choice = self.rng.below(100);
        let fill = (step % 251) as u8 + 1;

        if self.live.is_empty() || choice < 40 {
            let size = self.rng.below(max) + 1;
            self.report.ops.allocate += 1;
            match self.arena.allocate(size) {
                Some(ptr) => {
                    self.fill(ptr, fill);
                    self.live.push(Live { ptr, fill });
                    self.emit(step, "allocate", Some(ptr), Some(size), Outcome::Pass)?;
                }
                None => {
                    self.report.out_of_memory += 1;
                    self.emit(step, "allocate", None, Some(size), Outcome::Skip)?;
                }
            }
        } else if choice < 70 {
            let idx = self.rng.below(self.live.len());
            let victim = self.live.swap_remove(idx);
            let len = self.arena.usable_size(victim.ptr).unwrap_or(0);
            if !self.payload_intact(victim, len) {
                self.record_failure(step, format!("payload of {:#x} was clobbered", victim.ptr));
            }
            self.report.ops.release += 1;
            if let Err(err) = self.arena.try_release(victim.ptr) {
                self.record_failure(step, format!("release of {:#x}: {err}", victim.ptr));
            }
            self.emit(step, "release", Some(victim.ptr), None, Outcome::Pass)?;
        } else if choice < 88 {
            let idx = self.rng.below(self.live.len());
            let current = self.live[idx];
            let old_len = self.arena.usable_size(current.ptr).unwrap_or(0);
            let new_size = self.rng.below(max) + 1;
            self.report.ops.resize += 1;
            match self.arena.resize(current.ptr, new_size) {
                Some(ptr) => {
                    let moved = Live { ptr, ..current };
                    if !self.payload_intact(moved, old_len.min(new_size)) {
                        self.record_failure(step, format!("resize lost bytes of {:#x}", current.ptr));
                    }
                    self.fill(ptr, current.fill);
                    self.live[idx] = moved;
                    self.emit(step, "resize", Some(ptr), Some(new_size), Outcome::Pass)?;
                }
                None => {
                    self.report.out_of_memory += 1;
                    if !self.payload_intact(current, old_len) {
                        self.record_failure(
                            step,
                            format!("failed resize damaged {:#x}", current.ptr),
                        );
                    }
                    self.emit(step, "resize", Some(current.ptr), Some(new_size), Outcome::Skip)?;
                }
            }
        } else if choice < 97 {
            let count = self.rng.below(64) + 1;
            let elem = self.rng.below(max / count + 1).max(1);
            self.report.ops.zero_allocate += 1;
            match self.arena.zero_allocate(count, elem) {
                Some(ptr) => {
                    let zeroed = self
                        .arena
                        .payload(ptr)
                        .is_some_and(|bytes| bytes.iter().all(|b| *b == 0));
                    if !zeroed {
                        self.record_failure(step, format!("zero_allocate {ptr:#x} is dirty"));
                    }
                    self.fill(ptr, fill);
                    self.live.push(Live { ptr, fill });
                    self.emit(step, "zero_allocate", Some(ptr), Some(count * elem), Outcome::Pass)?;
                }
                None => {
                    self.report.out_of_memory += 1;
                    self.emit(step, "zero_allocate", None, Some(count * elem), Outcome::Skip)?;
                }
            }
        } else {
            // Misuse must be refused without changing anything.
            let target = self.live[self.rng.below(self.live.len())];
            let before = (self.arena.stats(), self.arena.dump());
            self.report.ops.misuse += 1;
            let bogus = target.ptr + 8;
            if self.arena.try_release(bogus).is_ok() {
                self.record_failure(step, format!("interior pointer {bogus:#x} was accepted"));
            }
            if (self.arena.stats(), self.arena.dump()) != before {
                self.record_failure(step, "refused release changed the arena".to_string());
            }
            self.emit(step, "release", Some(bogus), None, Outcome::Fail)?;
        }

        let stats = self.arena.stats();
        self.report.peak_bytes_allocated = self.report.peak_bytes_allocated.max(stats.bytes_allocated);
        self.report.peak_fragmentation = self.report.peak_fragmentation.max(stats.free_blocks);

        let every = self.report.config.check_every;
        if every != 0 && step % every == 0 {
            self.check(step);
        }
        Ok(())
    }

    fn check(&mut self, step: usize) {
        match self.arena.check_integrity() {
            Ok(walked) => {
                let allocated: HashMap<usize, usize> = self
                    .arena
                    .dump()
                    .blocks
                    .iter()
                    .filter(|block| !block.is_free)
                    .map(|block| (block.address, block.size))
                    .collect();
                let tracked: usize = self
                    .live
                    .iter()
                    .filter_map(|live| allocated.get(&live.ptr))
                    .sum();
                if tracked != walked.allocated_bytes {
                    self.record_failure(
                        step,
                        format!(
                            "live blocks hold {tracked}B but the walk counts {}B",
                            walked.allocated_bytes
                        ),
                    );
                }
            }
            Err(err) => self.record_failure(step, err.to_string()),
        }
    }
}

/// Run a seeded workload against `arena`, optionally streaming JSONL.
///
/// Every live block is released at the end, so a passing run leaves the
/// arena with a single free block.
pub fn run_stress(
    arena: &mut Arena,
    config: StressConfig,
    emitter: Option<&mut LogEmitter>,
) -> Result<StressReport, HarnessError> {
    if config.max_request == 0 {
        return Err(HarnessError::InvalidArgument(
            "max_request must be non-zero".to_string(),
        ));
    }
    arena.initialize();
    let status = arena.stats().into();
    let mut run = StressRun {
        arena,
        emitter,
        report: StressReport {
            config,
            ops: OpCounts::default(),
            out_of_memory: 0,
            peak_bytes_allocated: 0,
            peak_fragmentation: 0,
            invariant_failures: Vec::new(),
            final_status: status,
        },
        live: Vec::new(),
        rng: Lcg::new(config.seed),
    };

    for step in 1..=config.steps {
        run.step(step)?;
    }
    run.check(config.steps);

    let cleanup_step = config.steps + 1;
    for live in std::mem::take(&mut run.live) {
        if let Err(err) = run.arena.try_release(live.ptr) {
            run.record_failure(cleanup_step, format!("cleanup release of {:#x}: {err}", live.ptr));
        }
    }
    run.check(cleanup_step);
    run.report.final_status = run.arena.stats().into();

    if let Some(emitter) = run.emitter.as_deref_mut() {
        let summary = LogEntry::new("", LogLevel::Info, "stress_summary")
            .with_outcome(if run.report.passed() {
                Outcome::Pass
            } else {
                Outcome::Fail
            })
            .with_snapshot(
                run.report.final_status.bytes_allocated,
                run.report.final_status.bytes_free,
                run.report.final_status.free_blocks,
            )
            .with_details(serde_json::to_value(&run.report)?);
        emitter.emit_entry(summary)?;
        emitter.flush()?;
    }
    Ok(run.report)
}
