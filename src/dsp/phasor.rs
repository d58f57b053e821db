//! Phase accumulator.

/*
Phase Accumulator
=================

Every oscillator in this crate is driven by the same tiny state machine: a
phase value in [0, 1) that advances by `freq / sample_rate` each sample and
wraps back into range when it crosses 1.0.

    phase
    1.0 ┤      ╱│      ╱│      ╱│
        │    ╱  │    ╱  │    ╱  │
        │  ╱    │  ╱    │  ╱    │
    0.0 ┼╱──────┴╱──────┴╱──────┴──→ samples
               wrap    wrap    wrap

The carry out of the wrap is the oscillator's sync pulse. OscSync uses it to
reset its slave read heads; the other units ignore it.

Frequencies at or below zero would stall or reverse the ramp, so the
increment is floored at MIN_FREQUENCY. A modulation signal that transiently
swings negative therefore slows the oscillator to a crawl instead of
producing NaN.

The value reported for a sample is the phase *before* the increment, so a
fresh accumulator starts its first sample exactly at its initial phase.
*/

use crate::{Sample, MIN_FREQUENCY};

#[derive(Debug, Clone, Copy, Default)]
pub struct Phasor {
    phase: Sample,
}

impl Phasor {
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }

    pub fn with_phase(phase: Sample) -> Self {
        Self {
            phase: wrap01(phase),
        }
    }

    /// Current phase in [0, 1).
    #[inline]
    pub fn phase(&self) -> Sample {
        self.phase
    }

    /// Phase increment for `freq` at `sample_rate`, with the frequency floor
    /// applied.
    #[inline]
    pub fn increment(freq: Sample, sample_rate: Sample) -> Sample {
        let freq = if freq.is_nan() { MIN_FREQUENCY } else { freq.max(MIN_FREQUENCY) };
        freq / sample_rate
    }

    /// Advance by one sample. Returns `true` when the phase wrapped.
    #[inline]
    pub fn advance(&mut self, freq: Sample, sample_rate: Sample) -> bool {
        self.advance_by(Self::increment(freq, sample_rate))
    }

    /// Advance by a precomputed increment. Returns `true` when the phase wrapped.
    #[inline]
    pub fn advance_by(&mut self, increment: Sample) -> bool {
        self.phase += increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
            true
        } else {
            false
        }
    }

    /// Render the phase ramp for one sample, then advance.
    #[inline]
    pub fn next_sample(&mut self, freq: Sample, sample_rate: Sample) -> Sample {
        let out = self.phase;
        self.advance(freq, sample_rate);
        out
    }

    pub fn reset(&mut self, phase: Sample) {
        self.phase = wrap01(phase);
    }
}

/// Wrap any finite value into [0, 1).
#[inline]
pub fn wrap01(x: Sample) -> Sample {
    let w = x - x.floor();
    // x - floor(x) can round up to exactly 1.0 for tiny negative inputs.
    if w >= 1.0 {
        0.0
    } else {
        w
    }
}
