//! Control-rate modulators.

/*
Low Frequency Modulators
========================

Control parameters can be driven by other signals. The modulators here run
well below audio rate (0.01 to 20 Hz) and output a bipolar -1..+1 value that
callers rescale to whatever range they need.

Periodic shapes
---------------

The same phase accumulator as the oscillators, mapped through a simple shape:

    sine      ∿∿∿      smooth sweeps, vibrato
    triangle  /\/\     constant rate of change
    saw       /|/|     rising ramp, snaps back
    square    ▔▁▔▁     gating, hard switching

Random lines
------------

A random line picks a new random target every period and glides to it in a
straight line:

    +1 ┤      ╱╲
       │ ╲   ╱  ╲    ╱
       │  ╲ ╱    ╲__╱
    -1 ┼───┴────┴────┴──→ time
          1/freq

The reverb gives each delay line its own random line, each at a slightly
different speed, so the delay lengths drift independently. That drift breaks
up the metallic ringing a static delay network produces.
*/

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    consts::TAU,
    dsp::phasor::Phasor,
    Sample,
};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoShape {
    Sine,
    Triangle,
    Saw,
    Square,
}

/// Bipolar value of `shape` at `phase` (0..1).
#[inline]
pub fn lfo_value(shape: LfoShape, phase: Sample) -> Sample {
    match shape {
        LfoShape::Sine => (TAU * phase).sin(),
        LfoShape::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        LfoShape::Saw => 2.0 * phase - 1.0,
        LfoShape::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
    }
}

/// Random interpolated line between -1 and +1.
pub struct RandomLine {
    phasor: Phasor,
    from: Sample,
    to: Sample,
    rng: StdRng,
}

impl RandomLine {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let from = rng.gen_range(-1.0..=1.0);
        let to = rng.gen_range(-1.0..=1.0);
        Self {
            phasor: Phasor::new(),
            from,
            to,
            rng,
        }
    }

    /// Advance one sample at `freq` Hz and return the line's value.
    #[inline]
    pub fn next_sample(&mut self, freq: Sample, sample_rate: Sample) -> Sample {
        let t = self.phasor.phase();
        let out = self.from + (self.to - self.from) * t;
        if self.phasor.advance(freq, sample_rate) {
            self.from = self.to;
            self.to = self.rng.gen_range(-1.0..=1.0);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_are_bipolar() {
        for shape in [LfoShape::Sine, LfoShape::Triangle, LfoShape::Saw, LfoShape::Square] {
            for i in 0..100 {
                let v = lfo_value(shape, i as Sample / 100.0);
                assert!((-1.0..=1.0).contains(&v), "{shape:?} out of range: {v}");
            }
        }
        assert_eq!(lfo_value(LfoShape::Triangle, 0.5), 1.0);
        assert_eq!(lfo_value(LfoShape::Saw, 0.0), -1.0);
    }

    #[test]
    fn random_line_is_continuous_and_bounded() {
        let mut line = RandomLine::new(3);
        let mut last = line.next_sample(10.0, 1_000.0);
        for _ in 0..10_000 {
            let v = line.next_sample(10.0, 1_000.0);
            assert!((-1.0..=1.0).contains(&v));
            // at most 2 units per 100-sample period
            assert!((v - last).abs() <= 2.0 / 100.0 + 1e-4);
            last = v;
        }
    }

    #[test]
    fn random_line_is_seeded() {
        let mut a = RandomLine::new(11);
        let mut b = RandomLine::new(11);
        for _ in 0..1000 {
            assert_eq!(a.next_sample(2.0, 1_000.0), b.next_sample(2.0, 1_000.0));
        }
    }
}
