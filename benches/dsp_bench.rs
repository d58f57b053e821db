//! Benchmarks for DSP primitives and complete units.
//!
//! Run with: cargo bench
//!
//! These benchmarks measure the performance of core DSP operations to ensure
//! they complete well within real-time audio deadlines.
//!
//! Reference timing at 48kHz sample rate:
//!   - 64 samples  = 1.33ms deadline
//!   - 128 samples = 2.67ms deadline
//!   - 256 samples = 5.33ms deadline
//!   - 512 samples = 10.67ms deadline
//!
//! Benchmark groups:
//!   - dsp/*    Low-level primitives (delay line, comb, edge lowpass, reverb core)
//!   - units/*  Parameterized units rendering whole blocks

use criterion::{criterion_group, criterion_main};

mod dsp;
mod units;

/// Common buffer sizes used in audio applications.
pub const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

pub const SAMPLE_RATE: modcore_dsp::Sample = 48_000.0;

criterion_group!(
    benches,
    // Low-level DSP primitives
    dsp::bench_delay,
    dsp::bench_comb,
    dsp::bench_fir,
    dsp::bench_reverb,
    // Parameterized units
    units::bench_oscillators,
    units::bench_effects,
    units::bench_voices,
);
criterion_main!(benches);
