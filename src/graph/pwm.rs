use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{
        fir::{LinearPhaseLowpass, MAX_DAMP},
        phasor::{wrap01, Phasor},
        shape::pulse,
    },
    error::Result,
    graph::{
        node::{configure_named, validate_all, Block, GraphNode, Modulatable, NoStage, ParamId, RenderCtx, Retired},
        param::{max_width, scale_output, ParamSpec, ParamValue},
    },
    Sample, MAX_FREQUENCY, MIN_FREQUENCY,
};

/*
Pulse Width Modulation
======================

A pulse wave switches between +1 and -1 once per cycle. The duty cycle is
the fraction of the cycle spent high:

    duty 0.5             duty 0.2             duty 0.8
    ▔▔▔▔▁▁▁▁▔▔▔▔▁▁▁▁     ▔▁▁▁▁▔▁▁▁▁▔▁▁▁▁     ▔▔▔▔▁▔▔▔▔▁▔▔▔▔▁

At 0.5 it is a square (odd harmonics only). Moving away from the middle
adds even harmonics and thins the tone; sweeping duty with an LFO gives
the classic animated "PWM" sound.

The comparison is against the running phase, so changing duty re-maps the
current position instantly and never restarts the cycle.

Edge damping
------------

Raw pulses have instant edges and alias heavily at high pitches. `damp`
runs the output through a symmetric windowed-sinc lowpass of order
2·damp (see dsp::fir). It softens the edges without shifting them in time
relative to each other. damp = 0 bypasses the filter.

Example usage:
  let pwm = Pwm::new().with(PwmParam::Freq, 220.0)?;
  let swept = Pwm::new().modulate(PwmParam::Duty, LfoNode::sine(0.5).range(0.1, 0.9))?;
*/

static PWM_PARAMS: [ParamSpec; 6] = [
    ParamSpec::control("freq", MIN_FREQUENCY, MAX_FREQUENCY, 100.0, "frequency in Hz")
        .log()
        .reject(),
    ParamSpec::control("phase", 0.0, 1.0, 0.0, "phase offset in cycles"),
    ParamSpec::control("duty", 0.0, 1.0, 0.5, "fraction of the cycle spent high"),
    ParamSpec::integer("damp", 0.0, MAX_DAMP as Sample, 0.0, "edge lowpass, order 2*damp"),
    ParamSpec::mul(),
    ParamSpec::add(),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmParam {
    Freq,
    Phase,
    Duty,
    Damp,
    Mul,
    Add,
}

impl ParamId for PwmParam {
    const ALL: &'static [Self] = &[
        PwmParam::Freq,
        PwmParam::Phase,
        PwmParam::Duty,
        PwmParam::Damp,
        PwmParam::Mul,
        PwmParam::Add,
    ];

    fn spec(self) -> &'static ParamSpec {
        &PWM_PARAMS[self as usize]
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PwmSettings {
    pub freq: Sample,
    pub phase: Sample,
    pub duty: Sample,
    pub damp: usize,
    pub mul: Sample,
    pub add: Sample,
}

impl Default for PwmSettings {
    fn default() -> Self {
        Self {
            freq: 100.0,
            phase: 0.0,
            duty: 0.5,
            damp: 0,
            mul: 1.0,
            add: 0.0,
        }
    }
}

/// Phase accumulator plus edge filter, one per channel.
pub(crate) struct OscVoice {
    pub(crate) phasor: Phasor,
    pub(crate) lowpass: LinearPhaseLowpass,
}

impl OscVoice {
    pub(crate) fn new() -> Self {
        Self {
            phasor: Phasor::new(),
            lowpass: LinearPhaseLowpass::new(0),
        }
    }

    /// Rebuild the edge filter only when the order actually changes.
    #[inline]
    pub(crate) fn set_damp(&mut self, damp: usize) {
        let damp = damp.min(MAX_DAMP);
        if self.lowpass.damp() != damp {
            self.lowpass.set_damp(damp);
        }
    }

    pub(crate) fn reset(&mut self) {
        self.phasor.reset(0.0);
        self.lowpass.reset();
    }
}

pub struct Pwm {
    freq: ParamValue,
    phase: ParamValue,
    duty: ParamValue,
    damp: ParamValue,
    mul: ParamValue,
    add: ParamValue,
    voices: Vec<OscVoice>,
}

impl Pwm {
    pub fn new() -> Self {
        Self::build(&PwmSettings::default())
    }

    /// Build from `settings`, rejecting values outside their domains.
    pub fn from_settings(settings: &PwmSettings) -> Result<Self> {
        let pwm = Self::build(settings);
        validate_all(&pwm)?;
        Ok(pwm)
    }

    fn build(settings: &PwmSettings) -> Self {
        let mut pwm = Self {
            freq: settings.freq.into(),
            phase: settings.phase.into(),
            duty: settings.duty.into(),
            damp: (settings.damp as Sample).into(),
            mul: settings.mul.into(),
            add: settings.add.into(),
            voices: Vec::new(),
        };
        pwm.reconfigure();
        debug!(unit = Self::UNIT, channels = pwm.voices.len(), "created");
        pwm
    }

    fn param_mut(&mut self, param: PwmParam) -> &mut ParamValue {
        match param {
            PwmParam::Freq => &mut self.freq,
            PwmParam::Phase => &mut self.phase,
            PwmParam::Duty => &mut self.duty,
            PwmParam::Damp => &mut self.damp,
            PwmParam::Mul => &mut self.mul,
            PwmParam::Add => &mut self.add,
        }
    }

    pub fn set_freq(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(PwmParam::Freq, value)
    }

    pub fn set_phase(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(PwmParam::Phase, value)
    }

    pub fn set_duty(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(PwmParam::Duty, value)
    }

    pub fn set_damp(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(PwmParam::Damp, value)
    }

    pub fn set_mul(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(PwmParam::Mul, value)
    }

    pub fn set_add(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(PwmParam::Add, value)
    }

    fn width(&self) -> usize {
        max_width([&self.freq, &self.phase, &self.duty, &self.damp, &self.mul, &self.add])
    }
}

impl Default for Pwm {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphNode for Pwm {
    fn channels(&self) -> usize {
        self.voices.len().max(self.width())
    }

    fn reconfigure(&mut self) {
        let width = self.width();
        if width > self.voices.len() {
            debug!(unit = Self::UNIT, channels = width, "expanding channels");
            self.voices.resize_with(width, OscVoice::new);
        }
    }

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
        self.reconfigure();
        out.set_channels(self.voices.len());
        let frames = out.frames();
        self.freq.prepare(frames, ctx);
        self.phase.prepare(frames, ctx);
        self.duty.prepare(frames, ctx);
        self.mul.prepare(frames, ctx);
        self.add.prepare(frames, ctx);

        let sr = ctx.sample_rate;
        let freq = PwmParam::Freq.spec();
        let phase = PwmParam::Phase.spec();
        let duty = PwmParam::Duty.spec();
        let damp = PwmParam::Damp.spec();

        for (c, voice) in self.voices.iter_mut().enumerate() {
            voice.set_damp(damp.whole_at(&self.damp, c));
            for (i, sample) in out.channel_mut(c).iter_mut().enumerate() {
                let p = wrap01(voice.phasor.phase() + phase.clamp(self.phase.at(c, i)));
                let raw = pulse(p, duty.clamp(self.duty.at(c, i)));
                voice.phasor.advance(freq.clamp(self.freq.at(c, i)), sr);
                *sample = voice.lowpass.process(raw);
            }
        }

        scale_output(out, &self.mul, &self.add);
    }

    fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        for param in PwmParam::ALL {
            self.param_mut(*param).reset();
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        &PWM_PARAMS
    }

    fn configure(&mut self, name: &str, value: ParamValue) -> Result<()> {
        configure_named(self, name, value)
    }
}

impl Modulatable for Pwm {
    type Param = PwmParam;
    type Stager = NoStage;

    const UNIT: &'static str = "PWM";

    fn param(&self, param: PwmParam) -> &ParamValue {
        match param {
            PwmParam::Freq => &self.freq,
            PwmParam::Phase => &self.phase,
            PwmParam::Duty => &self.duty,
            PwmParam::Damp => &self.damp,
            PwmParam::Mul => &self.mul,
            PwmParam::Add => &self.add,
        }
    }

    fn stager(&self) -> NoStage {
        NoStage
    }

    fn install(&mut self, param: PwmParam, value: ParamValue, _staged: Option<()>) -> Retired<()> {
        Retired::value(std::mem::replace(self.param_mut(param), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ParamError, graph::signal::Sig};

    fn render(pwm: &mut Pwm, frames: usize, sr: Sample) -> Block {
        let mut block = Block::new(1, frames);
        pwm.render_block(&mut block, &RenderCtx::new(sr));
        block
    }

    #[test]
    fn duty_sets_high_fraction() {
        let mut pwm = Pwm::new();
        pwm.set_freq(100.0).unwrap();
        pwm.set_duty(0.25).unwrap();
        // 128 samples per cycle, so every phase step is exact
        let block = render(&mut pwm, 1280, 12_800.0);
        let high = block.channel(0).iter().filter(|&&s| s > 0.0).count();
        assert_eq!(high, 320);
    }

    #[test]
    fn phase_offset_shifts_waveform() {
        let mut a = Pwm::new();
        let mut b = Pwm::new();
        b.set_phase(0.5).unwrap();
        let a = render(&mut a, 256, 12_800.0);
        let b = render(&mut b, 256, 12_800.0);
        for i in 0..256 {
            assert_eq!(a.channel(0)[i], -b.channel(0)[i]);
        }
    }

    #[test]
    fn list_values_expand_channels() {
        let mut pwm = Pwm::new();
        pwm.set_freq([100.0, 200.0, 300.0]).unwrap();
        assert_eq!(pwm.channels(), 3);
        let mut block = Block::new(1, 64);
        pwm.render_block(&mut block, &RenderCtx::new(48_000.0));
        assert_eq!(block.channels(), 3);

        // never shrinks
        pwm.set_freq(100.0).unwrap();
        pwm.render_block(&mut block, &RenderCtx::new(48_000.0));
        assert_eq!(block.channels(), 3);
    }

    #[test]
    fn rejects_non_positive_frequency() {
        let mut pwm = Pwm::new();
        let err = pwm.set_freq(-10.0).unwrap_err();
        assert!(matches!(err, ParamError::InvalidParameter { .. }));
        assert_eq!(err.param(), "freq");
        assert!(pwm.param(PwmParam::Freq).is_constant(100.0));
    }

    #[test]
    fn negative_signal_frequency_is_clamped() {
        let mut pwm = Pwm::new();
        pwm.set_freq(ParamValue::signal(Sig::new(-500.0))).unwrap();
        let block = render(&mut pwm, 256, 48_000.0);
        assert!(block.channel(0).iter().all(|s| s.is_finite()));
    }

    #[test]
    fn mul_and_add_scale_output() {
        let mut pwm = Pwm::new();
        pwm.set_mul(0.5).unwrap();
        pwm.set_add(1.0).unwrap();
        let block = render(&mut pwm, 480, 48_000.0);
        assert!(block.channel(0).iter().all(|&s| s == 1.5 || s == 0.5));
    }

    #[test]
    fn damp_softens_edges() {
        let mut pwm = Pwm::new();
        pwm.set_damp(8.0).unwrap();
        let block = render(&mut pwm, 2048, 48_000.0);
        let steps = block.channel(0).windows(2).map(|w| (w[1] - w[0]).abs());
        let largest = steps.fold(0.0, Sample::max);
        assert!(largest < 1.0, "largest step {largest}");
    }

    #[test]
    fn configure_by_name() {
        let mut pwm = Pwm::new();
        pwm.configure("duty", 0.3.into()).unwrap();
        assert!(pwm.param(PwmParam::Duty).is_constant(0.3));
        assert!(pwm.configure("width", 0.3.into()).is_err());
        assert_eq!(pwm.param_spec("damp").map(|s| s.max), Some(32.0));
    }
}
