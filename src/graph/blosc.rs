use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{
        phasor::Phasor,
        table::{band_limited, BandLimitedSet, Family},
    },
    error::Result,
    graph::{
        node::{configure_named, validate_all, Block, GraphNode, Modulatable, NoStage, ParamId, RenderCtx, Retired},
        param::{max_width, scale_output, ParamSpec, ParamValue},
    },
    Sample, MAX_FREQUENCY, MIN_FREQUENCY,
};

/*
Band-Limited Multi-Waveform Oscillator
======================================

Naive saw and square waves have infinitely many harmonics. Everything above
Nyquist folds back down as inharmonic aliasing, which is very audible on
high notes. A band-limited oscillator only ever plays harmonics that fit.

The shared table set (dsp::table) holds each family rendered additively
at a ladder of partial counts. The oscillator works out how many harmonics
it may use and blends the two rungs at or below that count:

    harmonics = sr / 2.1 / freq · (0.1 + 0.9 · bright)

`bright` = 1 fills the band up to just under Nyquist; 0 keeps a tenth of
that. The fundamental is limited to 20..4000 Hz for this oscillator.

Shape blend
-----------

`shape` walks across the three families:

    shape   0.0        0.25        0.5        0.75        1.0
            saw ─────── blend ──── square ─── blend ───── triangle

Between two families the output is a linear crossfade on the fractional
position, so it moves monotonically from one waveform to the next. The
endpoints (and 0.5) are the pure tables.

Example usage:
  let blo = BLOsc::new().with(BLOscParam::Freq, 200.0)?
      .modulate(BLOscParam::Shape, LfoNode::sine(0.2).range(0.0, 1.0))?;
*/

/// Fundamental range the harmonic count is computed for.
pub const MIN_BLOSC_FREQ: Sample = 20.0;
pub const MAX_BLOSC_FREQ: Sample = 4000.0;

static BLOSC_PARAMS: [ParamSpec; 5] = [
    ParamSpec::control("freq", MIN_FREQUENCY, MAX_FREQUENCY, 100.0, "frequency in Hz, played within 20..4000")
        .log()
        .reject(),
    ParamSpec::control("bright", 0.0, 1.0, 1.0, "share of the band below Nyquist"),
    ParamSpec::control("shape", 0.0, 1.0, 0.0, "saw (0), square (0.5), triangle (1)"),
    ParamSpec::mul(),
    ParamSpec::add(),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BLOscParam {
    Freq,
    Bright,
    Shape,
    Mul,
    Add,
}

impl ParamId for BLOscParam {
    const ALL: &'static [Self] = &[
        BLOscParam::Freq,
        BLOscParam::Bright,
        BLOscParam::Shape,
        BLOscParam::Mul,
        BLOscParam::Add,
    ];

    fn spec(self) -> &'static ParamSpec {
        &BLOSC_PARAMS[self as usize]
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BLOscSettings {
    pub freq: Sample,
    pub bright: Sample,
    pub shape: Sample,
    pub mul: Sample,
    pub add: Sample,
}

impl Default for BLOscSettings {
    fn default() -> Self {
        Self {
            freq: 100.0,
            bright: 1.0,
            shape: 0.0,
            mul: 1.0,
            add: 0.0,
        }
    }
}

/// Harmonics available to `freq` at `sample_rate` for a given brightness.
#[inline]
pub fn harmonic_count(freq: Sample, bright: Sample, sample_rate: Sample) -> Sample {
    let freq = freq.clamp(MIN_BLOSC_FREQ, MAX_BLOSC_FREQ);
    let bright = bright.clamp(0.0, 1.0);
    (sample_rate / 2.1 / freq * (0.1 + 0.9 * bright)).max(1.0)
}

/// Blend across saw, square and triangle at `shape` (0..1).
#[inline]
pub fn blend(tables: &BandLimitedSet, shape: Sample, harmonics: Sample, phase: Sample) -> Sample {
    let pos = shape.clamp(0.0, 1.0) * 2.0;
    let lower = (pos.floor() as usize).min(1);
    let frac = pos - lower as Sample;
    let a = tables.read(Family::ALL[lower], harmonics, phase);
    if frac <= 0.0 {
        return a;
    }
    let b = tables.read(Family::ALL[lower + 1], harmonics, phase);
    if frac >= 1.0 {
        return b;
    }
    a + (b - a) * frac
}

pub struct BLOsc {
    freq: ParamValue,
    bright: ParamValue,
    shape: ParamValue,
    mul: ParamValue,
    add: ParamValue,
    voices: Vec<Phasor>,
    tables: &'static BandLimitedSet,
}

impl BLOsc {
    pub fn new() -> Self {
        Self::build(&BLOscSettings::default())
    }

    /// Build from `settings`, rejecting values outside their domains.
    pub fn from_settings(settings: &BLOscSettings) -> Result<Self> {
        let osc = Self::build(settings);
        validate_all(&osc)?;
        Ok(osc)
    }

    fn build(settings: &BLOscSettings) -> Self {
        let mut osc = Self {
            freq: settings.freq.into(),
            bright: settings.bright.into(),
            shape: settings.shape.into(),
            mul: settings.mul.into(),
            add: settings.add.into(),
            voices: Vec::new(),
            // builds the shared tables on first use, off the audio thread
            tables: band_limited(),
        };
        osc.reconfigure();
        debug!(unit = Self::UNIT, channels = osc.voices.len(), "created");
        osc
    }

    fn param_mut(&mut self, param: BLOscParam) -> &mut ParamValue {
        match param {
            BLOscParam::Freq => &mut self.freq,
            BLOscParam::Bright => &mut self.bright,
            BLOscParam::Shape => &mut self.shape,
            BLOscParam::Mul => &mut self.mul,
            BLOscParam::Add => &mut self.add,
        }
    }

    pub fn set_freq(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(BLOscParam::Freq, value)
    }

    pub fn set_bright(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(BLOscParam::Bright, value)
    }

    pub fn set_shape(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(BLOscParam::Shape, value)
    }

    pub fn set_mul(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(BLOscParam::Mul, value)
    }

    pub fn set_add(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(BLOscParam::Add, value)
    }

    fn width(&self) -> usize {
        max_width([&self.freq, &self.bright, &self.shape, &self.mul, &self.add])
    }
}

impl Default for BLOsc {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphNode for BLOsc {
    fn channels(&self) -> usize {
        self.voices.len().max(self.width())
    }

    fn reconfigure(&mut self) {
        let width = self.width();
        if width > self.voices.len() {
            debug!(unit = Self::UNIT, channels = width, "expanding channels");
            self.voices.resize_with(width, Phasor::new);
        }
    }

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
        self.reconfigure();
        out.set_channels(self.voices.len());
        let frames = out.frames();
        self.freq.prepare(frames, ctx);
        self.bright.prepare(frames, ctx);
        self.shape.prepare(frames, ctx);
        self.mul.prepare(frames, ctx);
        self.add.prepare(frames, ctx);

        let sr = ctx.sample_rate;
        let freq = BLOscParam::Freq.spec();
        let bright = BLOscParam::Bright.spec();
        let shape = BLOscParam::Shape.spec();

        for (c, phasor) in self.voices.iter_mut().enumerate() {
            for (i, sample) in out.channel_mut(c).iter_mut().enumerate() {
                let f = freq.clamp(self.freq.at(c, i)).clamp(MIN_BLOSC_FREQ, MAX_BLOSC_FREQ);
                let h = harmonic_count(f, bright.clamp(self.bright.at(c, i)), sr);
                let phase = phasor.next_sample(f, sr);
                *sample = blend(self.tables, shape.clamp(self.shape.at(c, i)), h, phase);
            }
        }

        scale_output(out, &self.mul, &self.add);
    }

    fn reset(&mut self) {
        for phasor in &mut self.voices {
            phasor.reset(0.0);
        }
        for param in BLOscParam::ALL {
            self.param_mut(*param).reset();
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        &BLOSC_PARAMS
    }

    fn configure(&mut self, name: &str, value: ParamValue) -> Result<()> {
        configure_named(self, name, value)
    }
}

impl Modulatable for BLOsc {
    type Param = BLOscParam;
    type Stager = NoStage;

    const UNIT: &'static str = "BLOsc";

    fn param(&self, param: BLOscParam) -> &ParamValue {
        match param {
            BLOscParam::Freq => &self.freq,
            BLOscParam::Bright => &self.bright,
            BLOscParam::Shape => &self.shape,
            BLOscParam::Mul => &self.mul,
            BLOscParam::Add => &self.add,
        }
    }

    fn stager(&self) -> NoStage {
        NoStage
    }

    fn install(&mut self, param: BLOscParam, value: ParamValue, _staged: Option<()>) -> Retired<()> {
        Retired::value(std::mem::replace(self.param_mut(param), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: Sample = 48_000.0;

    fn render(osc: &mut BLOsc, frames: usize) -> Vec<Sample> {
        let mut block = Block::new(1, frames);
        osc.render_block(&mut block, &RenderCtx::new(SR));
        block.channel(0).to_vec()
    }

    #[test]
    fn harmonic_count_follows_brightness() {
        let full = harmonic_count(100.0, 1.0, SR);
        assert!((full - SR / 2.1 / 100.0).abs() < 1e-2);
        let dim = harmonic_count(100.0, 0.0, SR);
        assert!((dim - full * 0.1).abs() < 1e-2);
        // the highest harmonic stays under Nyquist
        assert!(harmonic_count(4_000.0, 1.0, SR) * 4_000.0 < SR / 2.0);
        assert_eq!(harmonic_count(10.0, 1.0, SR), harmonic_count(20.0, 1.0, SR));
    }

    #[test]
    fn endpoints_are_pure_tables() {
        let tables = band_limited();
        for (shape, family) in [(0.0, Family::Saw), (0.5, Family::Square), (1.0, Family::Triangle)] {
            let mut osc = BLOsc::new();
            osc.set_shape(shape).unwrap();
            let out = render(&mut osc, 960);
            let h = harmonic_count(100.0, 1.0, SR);
            let mut phasor = Phasor::new();
            for &y in &out {
                let expected = tables.read(family, h, phasor.next_sample(100.0, SR));
                assert_eq!(y, expected);
            }
        }
    }

    #[test]
    fn blend_is_monotonic_between_families() {
        let tables = band_limited();
        let (phase, h) = (0.3, 32.0);
        let saw = tables.read(Family::Saw, h, phase);
        let square = tables.read(Family::Square, h, phase);
        let rising = square > saw;
        let mut last = saw;
        for k in 1..=50 {
            let y = blend(tables, k as Sample / 100.0, h, phase);
            if rising {
                assert!(y >= last - 1e-6);
            } else {
                assert!(y <= last + 1e-6);
            }
            last = y;
        }
        assert!((last - square).abs() < 1e-6);
    }

    #[test]
    fn stays_bounded_across_sweep() {
        let mut osc = BLOsc::new();
        osc.set_shape([0.0, 0.25, 0.75, 1.0]).unwrap();
        osc.set_bright(0.3).unwrap();
        let mut block = Block::new(1, 1024);
        osc.render_block(&mut block, &RenderCtx::new(SR));
        assert_eq!(block.channels(), 4);
        for c in 0..4 {
            assert!(block.channel(c).iter().all(|s| s.abs() <= 1.0 + 1e-3));
        }
    }
}
