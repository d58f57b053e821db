//! Reverb - Rotating-Matrix Feedback Delay Network
//!
//! A feedback delay network (FDN) runs several delay lines in parallel and
//! feeds every line's output back into every line's input through an
//! orthogonal mixing matrix. Each pass through the matrix spreads energy over
//! all lines, so the echo density grows quickly into a smooth tail.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────────────────────────────────────┐
//!                 │                                               │
//! Input ─[LoP]─┬─(+)→ [Delay 0] ─┬─→ [LoP 0] ─┐                   │
//!              ├─(+)→ [Delay 1] ─┼─→ [LoP 1] ─┼─→ [Rotation] ─×g──┘
//!              ├─(+)→    ...     ┼─→   ...    ┤     Matrix
//!              └─(+)→ [Delay k] ─┼─→ [LoP k] ─┘
//!                                │
//!                   even lines ──┴── odd lines
//!                      Left           Right
//! ```
//!
//! ## Loss
//!
//! The matrix is orthogonal and so preserves energy; all loss comes from the
//! feedback gain `g` (liveness, kept below 1) and the damping filters. Each
//! damping filter blends its input with a lowpassed copy:
//!
//! ```text
//! y = x + highdamp · (lowpass(x) − x)
//! ```
//!
//! Below the crossover both terms agree and only `g` decays the tail. Above
//! it, `highdamp` removes up to the whole band on every round trip, so highs
//! die out first. The input passes through the same shape once before it
//! enters the network.
//!
//! ## Delay lengths
//!
//! Line lengths are drawn from a range in seconds with a spacing mode (see
//! `dsp::spacing`) and snapped to prime sample counts. Each line's length
//! drifts slowly under its own random modulator:
//!
//! ```text
//! length · (1 + moddepth · randomline(modspeed · U(0.5, 2)))
//! ```
//!
//! and the fractional read position is interpolated at the chosen quality.
//!
//! # Parameters
//!
//! - **Layout** (rebuilds the core): line count, delay range and mode,
//!   matrix coefficient range and mode, damping filter order, quality
//! - **Per sample**: feedback gain, crossover, high damping, modulation depth
//!   and speed
//! - **Per block**: matrix depth

use rand::{rngs::StdRng, Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{
        delay::{DelayLine, Interpolation},
        filter::{DampingFilter, OnePole},
        lfo::RandomLine,
        matrix::{butterfly_pairs, RotationMatrix},
        spacing::{coefficient_grid, delay_candidates, Spacing},
    },
    Sample,
};

/// Highest feedback gain the network accepts.
pub const MAX_FEEDBACK: Sample = 0.998;
/// Highest relative delay modulation.
pub const MAX_MOD_DEPTH: Sample = 0.95;
const DEFAULT_CROSSOVER: Sample = 3500.0;
/// Shortest delay line, in samples.
pub const MIN_LINE_SAMPLES: usize = 2;

/// Settings that decide how the network is built. Changing any of them means
/// a new core.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct VerbLayout {
    pub numechoes: usize,
    pub echoes_range: (Sample, Sample),
    pub echoes_mode: Spacing,
    pub matrix_range: (Sample, Sample),
    pub matrix_mode: Spacing,
    pub filtorder: u32,
    pub quality: u32,
}

impl Default for VerbLayout {
    fn default() -> Self {
        Self {
            numechoes: 8,
            echoes_range: (0.03, 0.08),
            echoes_mode: Spacing::LinMin,
            matrix_range: (0.05, 0.15),
            matrix_mode: Spacing::LinMin,
            filtorder: 2,
            quality: 4,
        }
    }
}

/// Values the network reads every sample.
#[derive(Debug, Clone, Copy)]
pub struct VerbControls {
    pub feedback: Sample,
    pub crossover: Sample,
    pub highdamp: Sample,
    pub moddepth: Sample,
    pub modspeed: Sample,
}

impl Default for VerbControls {
    fn default() -> Self {
        Self {
            feedback: 0.7,
            crossover: DEFAULT_CROSSOVER,
            highdamp: 0.75,
            moddepth: 0.03,
            modspeed: 1.0,
        }
    }
}

struct VerbLine {
    delay: DelayLine,
    length: Sample,
    input_gain: Sample,
    damping: DampingFilter,
    modulator: RandomLine,
    speed_scale: Sample,
}

pub struct VerbCore {
    lines: Vec<VerbLine>,
    matrix: RotationMatrix,
    interp: Interpolation,
    prefilter: OnePole,
    taps: Vec<Sample>,
    mixed: Vec<Sample>,
    left_gain: Sample,
    right_gain: Sample,
    sample_rate: Sample,
}

impl VerbCore {
    /// Draw delay lengths and matrix angles for `layout` and allocate every
    /// buffer. The same layout and seed always build the same network.
    pub fn new(layout: &VerbLayout, depth: Sample, sample_rate: Sample, seed: u64) -> Self {
        let k = layout.numechoes.max(1);
        let interp = Interpolation::from_quality(layout.quality);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut candidates = delay_candidates(layout.echoes_range, sample_rate, k, MIN_LINE_SAMPLES);
        if candidates.is_empty() {
            // only reachable with an unvalidated layout
            candidates.push(MIN_LINE_SAMPLES);
        }
        let lengths = layout.echoes_mode.select(&candidates, k, &mut rng);

        let grid = coefficient_grid(layout.matrix_range);
        let coefficients = layout
            .matrix_mode
            .select(&grid, butterfly_pairs(k).len(), &mut rng);
        let matrix = RotationMatrix::new(k, &coefficients, depth);

        let norm = 1.0 / (k as Sample).sqrt();
        let lines = lengths
            .iter()
            .map(|&length| {
                let length = length as Sample;
                let capacity = (length * (1.0 + MAX_MOD_DEPTH)).ceil() as usize + 4;
                let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
                VerbLine {
                    delay: DelayLine::new(capacity),
                    length,
                    input_gain: sign * norm,
                    damping: DampingFilter::with_order(layout.filtorder, DEFAULT_CROSSOVER, sample_rate),
                    modulator: RandomLine::new(rng.gen()),
                    speed_scale: rng.gen_range(0.5..=2.0),
                }
            })
            .collect::<Vec<_>>();

        let even = lines.len().div_ceil(2);
        let odd = lines.len() / 2;
        Self {
            taps: vec![0.0; lines.len()],
            mixed: vec![0.0; lines.len()],
            left_gain: 1.0 / (even as Sample).sqrt(),
            right_gain: if odd == 0 { 1.0 } else { 1.0 / (odd as Sample).sqrt() },
            lines,
            matrix,
            interp,
            prefilter: OnePole::new(DEFAULT_CROSSOVER, sample_rate),
            sample_rate,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Unmodulated line lengths in samples.
    pub fn delays(&self) -> impl Iterator<Item = Sample> + '_ {
        self.lines.iter().map(|line| line.length)
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interp
    }

    pub fn damping_order(&self) -> u32 {
        self.lines.first().map_or(2, |line| line.damping.order())
    }

    pub fn set_depth(&mut self, depth: Sample) {
        self.matrix.set_depth(depth);
    }

    /// Run one sample through the network. Returns the wet `(left, right)`.
    #[inline]
    pub fn process(&mut self, input: Sample, c: &VerbControls) -> (Sample, Sample) {
        let sr = self.sample_rate;
        let feedback = c.feedback.clamp(0.0, MAX_FEEDBACK);
        let highdamp = c.highdamp.clamp(0.0, 1.0);
        let moddepth = c.moddepth.clamp(0.0, MAX_MOD_DEPTH);

        self.prefilter.set_cutoff(c.crossover, sr);
        let x = input + highdamp * (self.prefilter.next_sample(input) - input);

        let mut left = 0.0;
        let mut right = 0.0;
        for (j, line) in self.lines.iter_mut().enumerate() {
            let drift = line.modulator.next_sample(c.modspeed * line.speed_scale, sr);
            let tap = line.delay.read(line.length * (1.0 + moddepth * drift), self.interp);
            if j % 2 == 0 {
                left += tap;
            } else {
                right += tap;
            }
            line.damping.set_cutoff(c.crossover, sr);
            self.taps[j] = line.damping.damp(tap, highdamp);
        }

        self.matrix.apply(&self.taps, &mut self.mixed);
        for (line, &m) in self.lines.iter_mut().zip(&self.mixed) {
            line.delay.write(x * line.input_gain + feedback * m);
        }

        if self.lines.len() == 1 {
            right = left;
        }
        (left * self.left_gain, right * self.right_gain)
    }

    /// Silence the tail and clear every filter.
    pub fn reset(&mut self) {
        self.prefilter.reset();
        for line in &mut self.lines {
            line.delay.reset();
            line.damping.reset();
        }
    }
}
