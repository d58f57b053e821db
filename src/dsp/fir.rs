//! Linear-phase lowpass for softening oscillator edges.
//!
//! A windowed sinc with its cutoff at 0 Hz degenerates into a normalized
//! Blackman window: a symmetric moving average whose length sets how much of
//! the top end is shaved off. Symmetry keeps the phase response linear, so
//! every harmonic is delayed by the same `order / 2` samples and the waveform
//! shape is preserved.
//!
//! The history ring always records the last `MAX_TAPS` inputs, so changing
//! the order mid-stream convolves over samples that are already there
//! instead of starting from silence.

use crate::{consts::TAU, Sample};

/// Highest damping factor accepted by the oscillators (`order = 2 * damp`).
pub const MAX_DAMP: usize = 32;
const MAX_TAPS: usize = 2 * MAX_DAMP + 1;
const RING: usize = 128; // power of two >= MAX_TAPS
const RING_MASK: usize = RING - 1;

pub struct LinearPhaseLowpass {
    taps: [Sample; MAX_TAPS],
    num_taps: usize,
    history: [Sample; RING],
    pos: usize,
}

impl LinearPhaseLowpass {
    pub fn new(damp: usize) -> Self {
        let mut filter = Self {
            taps: [0.0; MAX_TAPS],
            num_taps: 1,
            history: [0.0; RING],
            pos: 0,
        };
        filter.set_damp(damp);
        filter
    }

    pub fn damp(&self) -> usize {
        (self.num_taps - 1) / 2
    }

    /// Recompute the window for `damp` (clamped to `MAX_DAMP`). Zero bypasses.
    pub fn set_damp(&mut self, damp: usize) {
        let order = 2 * damp.min(MAX_DAMP);
        self.num_taps = order + 1;
        if order == 0 {
            self.taps[0] = 1.0;
            return;
        }

        let denom = order as Sample;
        let mut sum = 0.0;
        for (n, tap) in self.taps[..self.num_taps].iter_mut().enumerate() {
            let x = n as Sample / denom;
            let w = 0.42 - 0.5 * (TAU * x).cos() + 0.08 * (2.0 * TAU * x).cos();
            *tap = w;
            sum += w;
        }
        for tap in &mut self.taps[..self.num_taps] {
            *tap /= sum;
        }
    }

    #[inline]
    pub fn process(&mut self, input: Sample) -> Sample {
        self.history[self.pos] = input;
        let out = if self.num_taps == 1 {
            input
        } else {
            let mut acc = 0.0;
            for (k, &tap) in self.taps[..self.num_taps].iter().enumerate() {
                acc += tap * self.history[(self.pos + RING - k) & RING_MASK];
            }
            acc
        };
        self.pos = (self.pos + 1) & RING_MASK;
        out
    }

    pub fn reset(&mut self) {
        self.history = [0.0; RING];
        self.pos = 0;
    }
}
