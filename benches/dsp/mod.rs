//! Benchmarks for low-level DSP primitives.

mod comb;
mod delay;
mod fir;
mod reverb;

pub use comb::bench_comb;
pub use delay::bench_delay;
pub use fir::bench_fir;
pub use reverb::bench_reverb;
