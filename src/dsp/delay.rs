//! Circular buffer with fractional read taps.

/*
Fractional Delay
================

The buffer is read *before* the current input is written, so a delay of one
sample returns the previous input and a delay of zero is never valid:

    write_pos ─┐
               ▼
    ... x[n-3] x[n-2] x[n-1] [   ] ...
                        ▲
                     delay 1

A delay of `n + frac` samples falls between two stored samples. How the gap is
bridged is the interpolation quality:

  None     nearest sample; cheapest, zippers under modulation
  Linear   straight line between the two neighbours
  Cosine   half-cosine blend; smoother corners, same two taps
  Cubic    4-point Lagrange; flattest response, needs one extra sample of
           history on each side, so its minimum delay is 2

The buffer length is rounded up to a power of two so wrapping is a mask.
*/

use crate::{consts::PI, Sample};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    None,
    Linear,
    Cosine,
    Cubic,
}

impl Interpolation {
    /// Map a 1..=4 quality level to an interpolation order. Out-of-range
    /// levels are clamped.
    pub fn from_quality(quality: u32) -> Self {
        match quality.clamp(1, 4) {
            1 => Self::None,
            2 => Self::Linear,
            3 => Self::Cosine,
            _ => Self::Cubic,
        }
    }

    /// Smallest delay, in samples, this interpolation can read.
    pub fn min_delay(self) -> Sample {
        match self {
            Self::Cubic => 2.0,
            _ => 1.0,
        }
    }
}

pub struct DelayLine {
    buffer: Vec<Sample>,
    mask: usize,
    write_pos: usize,
}

impl DelayLine {
    /// Allocate room for delays up to `max_delay` samples.
    pub fn new(max_delay: usize) -> Self {
        // two taps of headroom past the longest delay for cubic reads
        let len = (max_delay + 3).next_power_of_two();
        Self {
            buffer: vec![0.0; len],
            mask: len - 1,
            write_pos: 0,
        }
    }

    /// Longest delay that can be read without wrapping onto new input.
    pub fn max_delay(&self) -> Sample {
        (self.buffer.len() - 3) as Sample
    }

    #[inline]
    fn tap(&self, back: usize) -> Sample {
        self.buffer[(self.write_pos.wrapping_sub(back)) & self.mask]
    }

    /// Read the sample `delay` samples in the past.
    #[inline]
    pub fn read(&self, delay: Sample, interp: Interpolation) -> Sample {
        let delay = if delay.is_nan() { interp.min_delay() } else { delay };
        let delay = delay.clamp(interp.min_delay(), self.max_delay());

        if interp == Interpolation::None {
            return self.tap(delay.round() as usize);
        }

        let whole = delay.floor();
        let frac = delay - whole;
        let n = whole as usize;
        let x0 = self.tap(n);
        let x1 = self.tap(n + 1);

        match interp {
            Interpolation::Linear => x0 + (x1 - x0) * frac,
            Interpolation::Cosine => {
                let t = (1.0 - (PI * frac).cos()) * 0.5;
                x0 + (x1 - x0) * t
            }
            _ => {
                let xm1 = self.tap(n - 1);
                let x2 = self.tap(n + 2);
                let f = frac;
                let cm1 = -f * (f - 1.0) * (f - 2.0) / 6.0;
                let c0 = (f + 1.0) * (f - 1.0) * (f - 2.0) * 0.5;
                let c1 = -(f + 1.0) * f * (f - 2.0) * 0.5;
                let c2 = (f + 1.0) * f * (f - 1.0) / 6.0;
                cm1 * xm1 + c0 * x0 + c1 * x1 + c2 * x2
            }
        }
    }

    #[inline]
    pub fn write(&mut self, sample: Sample) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) & self.mask;
    }

    /// Read at `delay`, then write `sample`.
    #[inline]
    pub fn next_sample(&mut self, sample: Sample, delay: Sample, interp: Interpolation) -> Sample {
        let out = self.read(delay, interp);
        self.write(sample);
        out
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_through(delay: Sample, interp: Interpolation, len: usize) -> Vec<Sample> {
        let mut line = DelayLine::new(64);
        (0..len)
            .map(|n| line.next_sample(if n == 0 { 1.0 } else { 0.0 }, delay, interp))
            .collect()
    }

    #[test]
    fn integer_delay_is_exact_for_every_order() {
        for interp in [
            Interpolation::None,
            Interpolation::Linear,
            Interpolation::Cosine,
            Interpolation::Cubic,
        ] {
            let out = impulse_through(5.0, interp, 10);
            for (n, &y) in out.iter().enumerate() {
                let expected = if n == 5 { 1.0 } else { 0.0 };
                assert!((y - expected).abs() < 1e-6, "{interp:?} n={n} y={y}");
            }
        }
    }

    #[test]
    fn linear_splits_half_sample() {
        let out = impulse_through(3.5, Interpolation::Linear, 8);
        assert!((out[3] - 0.5).abs() < 1e-6);
        assert!((out[4] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn cubic_preserves_dc() {
        let mut line = DelayLine::new(32);
        let mut y = 0.0;
        for _ in 0..64 {
            y = line.next_sample(1.0, 7.3, Interpolation::Cubic);
        }
        assert!((y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn delay_is_clamped_to_capacity() {
        let line = DelayLine::new(16);
        assert!(line.max_delay() >= 16.0);
        // Reads far past the end stay finite.
        assert!(line.read(1.0e6, Interpolation::Cubic).is_finite());
        assert!(line.read(0.0, Interpolation::Cubic).is_finite());
        assert!(line.read(Sample::NAN, Interpolation::Linear).is_finite());
    }

    #[test]
    fn quality_levels_clamp() {
        assert_eq!(Interpolation::from_quality(0), Interpolation::None);
        assert_eq!(Interpolation::from_quality(2), Interpolation::Linear);
        assert_eq!(Interpolation::from_quality(9), Interpolation::Cubic);
    }

    #[test]
    fn reset_clears_history() {
        let mut line = DelayLine::new(8);
        for _ in 0..8 {
            line.write(1.0);
        }
        line.reset();
        assert_eq!(line.read(3.0, Interpolation::Linear), 0.0);
    }
}
