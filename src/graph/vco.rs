use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{fir::MAX_DAMP, phasor::wrap01, shape::morph},
    error::Result,
    graph::{
        node::{configure_named, validate_all, Block, GraphNode, Modulatable, NoStage, ParamId, RenderCtx, Retired},
        param::{max_width, scale_output, ParamSpec, ParamValue},
        pwm::OscVoice,
    },
    Sample, MAX_FREQUENCY, MIN_FREQUENCY,
};

/*
Voltage-Controlled Oscillator
=============================

A single phase ramp bent through one breakpoint gives a continuous morph
between three classic shapes:

    shape 0.0            shape 0.5            shape 1.0
    |\  |\  |\           /\  /\  /\           /|  /|  /|
    | \ | \ | \         /  \/  \/  \         / | / | / |
    |  \|  \|  \       /                    /  |/  |/  |
    falling saw          triangle             rising ramp

The breakpoint sits at `shape`: the output rises from -1 to +1 over the
first `shape` of the cycle and falls back over the rest. It is kept a hair
inside (0, 1) so neither segment has zero length.

Shape changes re-map the current phase, so sweeping it is click-free. The
same `damp` edge filter as the pulse oscillator is available for the
sharp corner of the saw ends.

Example usage:
  let tri = Vco::new().with(VcoParam::Shape, 0.5)?;
  let morph = Vco::new().modulate(VcoParam::Shape, LfoNode::triangle(0.1).range(0.0, 1.0))?;
*/

static VCO_PARAMS: [ParamSpec; 6] = [
    ParamSpec::control("freq", MIN_FREQUENCY, MAX_FREQUENCY, 100.0, "frequency in Hz")
        .log()
        .reject(),
    ParamSpec::control("phase", 0.0, 1.0, 0.0, "phase offset in cycles"),
    ParamSpec::control("shape", 0.0, 1.0, 0.0, "falling saw (0), triangle (0.5), rising ramp (1)"),
    ParamSpec::integer("damp", 0.0, MAX_DAMP as Sample, 0.0, "edge lowpass, order 2*damp"),
    ParamSpec::mul(),
    ParamSpec::add(),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcoParam {
    Freq,
    Phase,
    Shape,
    Damp,
    Mul,
    Add,
}

impl ParamId for VcoParam {
    const ALL: &'static [Self] = &[
        VcoParam::Freq,
        VcoParam::Phase,
        VcoParam::Shape,
        VcoParam::Damp,
        VcoParam::Mul,
        VcoParam::Add,
    ];

    fn spec(self) -> &'static ParamSpec {
        &VCO_PARAMS[self as usize]
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VcoSettings {
    pub freq: Sample,
    pub phase: Sample,
    pub shape: Sample,
    pub damp: usize,
    pub mul: Sample,
    pub add: Sample,
}

impl Default for VcoSettings {
    fn default() -> Self {
        Self {
            freq: 100.0,
            phase: 0.0,
            shape: 0.0,
            damp: 0,
            mul: 1.0,
            add: 0.0,
        }
    }
}

pub struct Vco {
    freq: ParamValue,
    phase: ParamValue,
    shape: ParamValue,
    damp: ParamValue,
    mul: ParamValue,
    add: ParamValue,
    voices: Vec<OscVoice>,
}

impl Vco {
    pub fn new() -> Self {
        Self::build(&VcoSettings::default())
    }

    /// Build from `settings`, rejecting values outside their domains.
    pub fn from_settings(settings: &VcoSettings) -> Result<Self> {
        let vco = Self::build(settings);
        validate_all(&vco)?;
        Ok(vco)
    }

    fn build(settings: &VcoSettings) -> Self {
        let mut vco = Self {
            freq: settings.freq.into(),
            phase: settings.phase.into(),
            shape: settings.shape.into(),
            damp: (settings.damp as Sample).into(),
            mul: settings.mul.into(),
            add: settings.add.into(),
            voices: Vec::new(),
        };
        vco.reconfigure();
        debug!(unit = Self::UNIT, channels = vco.voices.len(), "created");
        vco
    }

    fn param_mut(&mut self, param: VcoParam) -> &mut ParamValue {
        match param {
            VcoParam::Freq => &mut self.freq,
            VcoParam::Phase => &mut self.phase,
            VcoParam::Shape => &mut self.shape,
            VcoParam::Damp => &mut self.damp,
            VcoParam::Mul => &mut self.mul,
            VcoParam::Add => &mut self.add,
        }
    }

    pub fn set_freq(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(VcoParam::Freq, value)
    }

    pub fn set_phase(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(VcoParam::Phase, value)
    }

    pub fn set_shape(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(VcoParam::Shape, value)
    }

    pub fn set_damp(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(VcoParam::Damp, value)
    }

    pub fn set_mul(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(VcoParam::Mul, value)
    }

    pub fn set_add(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(VcoParam::Add, value)
    }

    fn width(&self) -> usize {
        max_width([&self.freq, &self.phase, &self.shape, &self.damp, &self.mul, &self.add])
    }
}

impl Default for Vco {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphNode for Vco {
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
        self.shape.prepare(frames, ctx);
        self.mul.prepare(frames, ctx);
        self.add.prepare(frames, ctx);

        let sr = ctx.sample_rate;
        let freq = VcoParam::Freq.spec();
        let phase = VcoParam::Phase.spec();
        let shape = VcoParam::Shape.spec();
        let damp = VcoParam::Damp.spec();

        for (c, voice) in self.voices.iter_mut().enumerate() {
            voice.set_damp(damp.whole_at(&self.damp, c));
            for (i, sample) in out.channel_mut(c).iter_mut().enumerate() {
                let p = wrap01(voice.phasor.phase() + phase.clamp(self.phase.at(c, i)));
                let raw = morph(p, shape.clamp(self.shape.at(c, i)));
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
        for param in VcoParam::ALL {
            self.param_mut(*param).reset();
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        &VCO_PARAMS
    }

    fn configure(&mut self, name: &str, value: ParamValue) -> Result<()> {
        configure_named(self, name, value)
    }
}

impl Modulatable for Vco {
    type Param = VcoParam;
    type Stager = NoStage;

    const UNIT: &'static str = "VCO";

    fn param(&self, param: VcoParam) -> &ParamValue {
        match param {
            VcoParam::Freq => &self.freq,
            VcoParam::Phase => &self.phase,
            VcoParam::Shape => &self.shape,
            VcoParam::Damp => &self.damp,
            VcoParam::Mul => &self.mul,
            VcoParam::Add => &self.add,
        }
    }

    fn stager(&self) -> NoStage {
        NoStage
    }

    fn install(&mut self, param: VcoParam, value: ParamValue, _staged: Option<()>) -> Retired<()> {
        Retired::value(std::mem::replace(self.param_mut(param), value))
    }
}
