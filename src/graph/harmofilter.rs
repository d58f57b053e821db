use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    config::AudioConfig,
    dsp::{comb::HarmonicComb, xfade::ms_to_samples},
    error::Result,
    graph::{
        node::{configure_named, validate_all, Block, GraphNode, Modulatable, NoStage, ParamId, RenderCtx, Retired},
        param::{max_width, scale_output, InputFader, ParamSpec, ParamValue},
    },
    Sample, MAX_FREQUENCY, MIN_FREQUENCY,
};

/*
Harmonic Filter
===============

Removes every Nth harmonic of a tracked fundamental. With freq = 100 and
harm = 2 the notches fall on 200, 400, 600 ... Hz, leaving 100, 300,
500 ... untouched: a saw turns into something square-like. harm = 3
removes 300, 600, 900 ... and so on.

    input ──┬──────────────────(+)── × 0.5 ──► out
            │                   ▲
            └── delay D ── × -1 ┘

    D = sample_rate / (freq · harm)

The comb and its click-free delay changes live in dsp::comb. This unit
adds per-channel expansion, signal-rate freq/harm and a replaceable input
that crossfades over 50 ms when swapped.

Example usage:
  let saw = Vco::new().with(VcoParam::Freq, 110.0)?;
  let hollow = HarmoFilter::new(&config, saw).with(HarmoFilterParam::Freq, 110.0)?;
*/

/// Crossfade applied when the input is replaced.
pub const INPUT_FADE_MS: Sample = 50.0;
/// Longest comb delay, in seconds.
const MAX_DELAY_SECS: Sample = 1.0;

static HARMO_FILTER_PARAMS: [ParamSpec; 5] = [
    ParamSpec::input("input", "audio to filter"),
    ParamSpec::control("freq", MIN_FREQUENCY, MAX_FREQUENCY, 100.0, "tracked fundamental in Hz")
        .log()
        .reject(),
    ParamSpec::control("harm", 2.0, 64.0, 2.0, "every harm-th harmonic is removed").reject(),
    ParamSpec::mul(),
    ParamSpec::add(),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmoFilterParam {
    Input,
    Freq,
    Harm,
    Mul,
    Add,
}

impl ParamId for HarmoFilterParam {
    const ALL: &'static [Self] = &[
        HarmoFilterParam::Input,
        HarmoFilterParam::Freq,
        HarmoFilterParam::Harm,
        HarmoFilterParam::Mul,
        HarmoFilterParam::Add,
    ];

    fn spec(self) -> &'static ParamSpec {
        &HARMO_FILTER_PARAMS[self as usize]
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmoFilterSettings {
    pub freq: Sample,
    pub harm: Sample,
    pub mul: Sample,
    pub add: Sample,
}

impl Default for HarmoFilterSettings {
    fn default() -> Self {
        Self {
            freq: 100.0,
            harm: 2.0,
            mul: 1.0,
            add: 0.0,
        }
    }
}

pub struct HarmoFilter {
    input: InputFader,
    freq: ParamValue,
    harm: ParamValue,
    mul: ParamValue,
    add: ParamValue,
    combs: Vec<HarmonicComb>,
    max_delay: usize,
}

impl HarmoFilter {
    pub fn new(config: &AudioConfig, input: impl GraphNode + 'static) -> Self {
        Self::build(config, ParamValue::input(input), &HarmoFilterSettings::default())
    }

    /// Build from `settings`, rejecting values outside their domains.
    pub fn from_settings(
        config: &AudioConfig,
        input: ParamValue,
        settings: &HarmoFilterSettings,
    ) -> Result<Self> {
        let filter = Self::build(config, input, settings);
        validate_all(&filter)?;
        Ok(filter)
    }

    fn build(config: &AudioConfig, input: ParamValue, settings: &HarmoFilterSettings) -> Self {
        let mut filter = Self {
            input: InputFader::new(input, ms_to_samples(INPUT_FADE_MS, config.sample_rate)),
            freq: settings.freq.into(),
            harm: settings.harm.into(),
            mul: settings.mul.into(),
            add: settings.add.into(),
            combs: Vec::new(),
            max_delay: (config.sample_rate * MAX_DELAY_SECS).ceil() as usize,
        };
        filter.reconfigure();
        debug!(unit = Self::UNIT, channels = filter.combs.len(), "created");
        filter
    }

    pub fn set_input(&mut self, input: impl GraphNode + 'static) -> Result<()> {
        self.set(HarmoFilterParam::Input, ParamValue::input(input))
    }

    pub fn set_freq(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(HarmoFilterParam::Freq, value)
    }

    pub fn set_harm(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(HarmoFilterParam::Harm, value)
    }

    pub fn set_mul(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(HarmoFilterParam::Mul, value)
    }

    pub fn set_add(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(HarmoFilterParam::Add, value)
    }

    fn width(&self) -> usize {
        max_width([&self.freq, &self.harm, &self.mul, &self.add])
            .max(self.input.channels())
    }
}

impl GraphNode for HarmoFilter {
    fn channels(&self) -> usize {
        self.combs.len().max(self.width())
    }

    fn reconfigure(&mut self) {
        let width = self.width();
        if width > self.combs.len() {
            debug!(unit = Self::UNIT, channels = width, "expanding channels");
            let max_delay = self.max_delay;
            self.combs.resize_with(width, || HarmonicComb::new(max_delay));
        }
    }

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
        self.reconfigure();
        out.set_channels(self.combs.len());
        let frames = out.frames();
        self.input.prepare(frames, ctx);
        self.freq.prepare(frames, ctx);
        self.harm.prepare(frames, ctx);
        self.mul.prepare(frames, ctx);
        self.add.prepare(frames, ctx);

        let sr = ctx.sample_rate;
        let freq = HarmoFilterParam::Freq.spec();
        let harm = HarmoFilterParam::Harm.spec();

        for (c, comb) in self.combs.iter_mut().enumerate() {
            for (i, sample) in out.channel_mut(c).iter_mut().enumerate() {
                let delay = HarmonicComb::delay_for(
                    freq.clamp(self.freq.at(c, i)),
                    harm.clamp(self.harm.at(c, i)),
                    sr,
                );
                *sample = comb.next_sample(self.input.at(c, i), delay);
            }
        }
        self.input.advance(frames);

        scale_output(out, &self.mul, &self.add);
    }

    fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.reset();
        }
        self.input.reset();
        self.freq.reset();
        self.harm.reset();
        self.mul.reset();
        self.add.reset();
    }

    fn params(&self) -> &'static [ParamSpec] {
        &HARMO_FILTER_PARAMS
    }

    fn configure(&mut self, name: &str, value: ParamValue) -> Result<()> {
        configure_named(self, name, value)
    }
}

impl Modulatable for HarmoFilter {
    type Param = HarmoFilterParam;
    type Stager = NoStage;

    const UNIT: &'static str = "HarmoFilter";

    /// Current value of `param`. The input is returned as the value now
    /// being faded to.
    fn param(&self, param: HarmoFilterParam) -> &ParamValue {
        match param {
            HarmoFilterParam::Input => self.input.current(),
            HarmoFilterParam::Freq => &self.freq,
            HarmoFilterParam::Harm => &self.harm,
            HarmoFilterParam::Mul => &self.mul,
            HarmoFilterParam::Add => &self.add,
        }
    }

    fn stager(&self) -> NoStage {
        NoStage
    }

    fn install(&mut self, param: HarmoFilterParam, value: ParamValue, _staged: Option<()>) -> Retired<()> {
        let slot = match param {
            HarmoFilterParam::Input => {
                return Retired {
                    value: self.input.replace(value),
                    staged: None,
                }
            }
            HarmoFilterParam::Freq => &mut self.freq,
            HarmoFilterParam::Harm => &mut self.harm,
            HarmoFilterParam::Mul => &mut self.mul,
            HarmoFilterParam::Add => &mut self.add,
        };
        Retired::value(std::mem::replace(slot, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consts::TAU,
        error::ParamError,
        graph::{
            extensions::NodeExt,
            signal::Sig,
            vco::{Vco, VcoParam},
        },
    };

    /// Sine source at a fixed frequency.
    struct Tone {
        freq: Sample,
        n: usize,
    }

    impl GraphNode for Tone {
        fn channels(&self) -> usize {
            1
        }

        fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
            out.set_channels(1);
            for s in out.channel_mut(0) {
                *s = (TAU * self.freq * self.n as Sample / ctx.sample_rate).sin();
                self.n += 1;
            }
        }

        fn reset(&mut self) {
            self.n = 0;
        }
    }

    fn steady_peak(filter: &mut HarmoFilter) -> Sample {
        let ctx = RenderCtx::new(48_000.0);
        let mut block = Block::new(1, 480);
        let mut peak: Sample = 0.0;
        for n in 0..20 {
            filter.render_block(&mut block, &ctx);
            if n >= 10 {
                peak = block.channel(0).iter().fold(peak, |acc, s| acc.max(s.abs()));
            }
        }
        peak
    }

    #[test]
    fn notches_even_harmonics() {
        let config = AudioConfig::new(48_000.0);
        let mut odd = HarmoFilter::new(&config, Tone { freq: 600.0, n: 0 });
        odd.set_freq(200.0).unwrap();
        let mut even = HarmoFilter::new(&config, Tone { freq: 800.0, n: 0 });
        even.set_freq(200.0).unwrap();
        assert!(steady_peak(&mut odd) > 0.98);
        assert!(steady_peak(&mut even) < 0.01);
    }

    #[test]
    fn harm_below_two_is_rejected() {
        let config = AudioConfig::default();
        let mut filter = HarmoFilter::new(&config, Sig::new(0.0));
        let err = filter.set_harm(1.0).unwrap_err();
        assert!(matches!(err, ParamError::InvalidParameter { .. }));
        assert!(filter.set_harm(ParamValue::signal(Sig::new(1.0))).is_ok());
        assert!(filter.set_freq(0.0).is_err());
    }

    #[test]
    fn input_swap_is_crossfaded() {
        let config = AudioConfig::new(48_000.0);
        let mut filter = HarmoFilter::new(&config, Sig::new(0.0));
        let ctx = config.ctx();
        let mut block = Block::new(1, 256);
        filter.render_block(&mut block, &ctx);

        filter.set_input(Sig::new(1.0)).unwrap();
        filter.render_block(&mut block, &ctx);
        // a hard switch would jump straight to 0.5
        assert!(block.channel(0)[0] < 0.01);
    }

    #[test]
    fn input_channels_expand_unit() {
        let config = AudioConfig::default();
        let source = Vco::new().with(VcoParam::Freq, [100.0, 150.0]).unwrap();
        let mut filter = HarmoFilter::new(&config, source);
        assert_eq!(filter.channels(), 2);
        let mut block = Block::new(1, 64);
        filter.render_block(&mut block, &config.ctx());
        assert_eq!(block.channels(), 2);
    }
}
