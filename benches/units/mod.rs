//! Benchmarks for complete units.
//!
//! Each unit renders whole blocks through its parameter plumbing, so these
//! include per-sample clamping, signal reads and output scaling.

mod effects;
mod oscillators;
mod voices;

pub use effects::bench_effects;
pub use oscillators::bench_oscillators;
pub use voices::bench_voices;
