//! Tooling around the firstfit arena.
//!
//! This crate provides:
//! - Demo: the scripted guided tour of the allocator
//! - Stress: seeded workloads with integrity checks after every step
//! - Occupancy: text rendering of the heap dump plus caller-side labels
//! - Structured logs: JSONL records, artifact index, schema validation

#![forbid(unsafe_code)]

pub mod error;
pub mod occupancy;
pub mod scenario;
pub mod structured_log;

pub use error::HarnessError;
pub use scenario::{DemoReport, StressConfig, StressReport, emit_demo_log, run_demo, run_stress};
pub use structured_log::{ArtifactIndex, LogEmitter, LogEntry, LogLevel};
