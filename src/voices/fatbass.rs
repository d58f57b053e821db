//! Fat bass voice.
//!
//! A unipolar pulse ring-modulated by a square wave one or two octaves
//! below it, then run through a resonant 4-pole lowpass.
//!
//! # How It Works
//!
//! 1. The carrier is a 0/1 pulse whose duty is squeezed into 0.05..0.95
//!    so it never disappears
//! 2. A sub-oscillator at a quarter of the frequency gives a square two
//!    octaves down; the same phase doubled gives one octave down
//! 3. `octave` blends the two squares linearly (0 = two down, 1 = one down)
//! 4. Carrier × modulator goes through the ladder lowpass
//!
//! # Variations
//!
//! - Sweep `octave` slowly for a growling, shifting sub
//! - Low `cutoff` with `res` near 1 gives a rubbery acid tone
//! - Modulate `duty` with an LFO for a chorused, moving bass

use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    config::AudioConfig,
    dsp::{
        filter::Ladder,
        phasor::{wrap01, Phasor},
        shape::{lerp, square, unipolar_pulse},
    },
    error::Result,
    graph::{
        node::{configure_named, validate_all, Block, GraphNode, Modulatable, NoStage, ParamId, RenderCtx, Retired},
        param::{max_width, scale_output, ParamSpec, ParamValue},
    },
    Sample, MAX_FREQUENCY, MIN_FREQUENCY,
};

const MIN_DUTY: Sample = 0.05;
const MAX_DUTY: Sample = 0.95;

static FAT_BASS_PARAMS: [ParamSpec; 7] = [
    ParamSpec::control("freq", MIN_FREQUENCY, MAX_FREQUENCY, 100.0, "carrier frequency in Hz")
        .log()
        .reject(),
    ParamSpec::control("octave", 0.0, 1.0, 0.0, "modulator: two (0) to one (1) octave down"),
    ParamSpec::control("duty", 0.0, 1.0, 0.5, "carrier duty, mapped to 0.05..0.95"),
    ParamSpec::control("cutoff", 20.0, MAX_FREQUENCY, 5000.0, "lowpass cutoff in Hz").log(),
    ParamSpec::control("res", 0.0, Ladder::MAX_RESONANCE, 0.0, "lowpass resonance"),
    ParamSpec::mul(),
    ParamSpec::add(),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatBassParam {
    Freq,
    Octave,
    Duty,
    Cutoff,
    Res,
    Mul,
    Add,
}

impl ParamId for FatBassParam {
    const ALL: &'static [Self] = &[
        FatBassParam::Freq,
        FatBassParam::Octave,
        FatBassParam::Duty,
        FatBassParam::Cutoff,
        FatBassParam::Res,
        FatBassParam::Mul,
        FatBassParam::Add,
    ];

    fn spec(self) -> &'static ParamSpec {
        &FAT_BASS_PARAMS[self as usize]
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FatBassSettings {
    pub freq: Sample,
    pub octave: Sample,
    pub duty: Sample,
    pub cutoff: Sample,
    pub res: Sample,
    pub mul: Sample,
    pub add: Sample,
}

impl Default for FatBassSettings {
    fn default() -> Self {
        Self {
            freq: 100.0,
            octave: 0.0,
            duty: 0.5,
            cutoff: 5000.0,
            res: 0.0,
            mul: 1.0,
            add: 0.0,
        }
    }
}

struct BassVoice {
    carrier: Phasor,
    sub: Phasor,
    ladder: Ladder,
}

impl BassVoice {
    fn new(sample_rate: Sample) -> Self {
        Self {
            carrier: Phasor::new(),
            sub: Phasor::new(),
            ladder: Ladder::new(5000.0, sample_rate),
        }
    }

    fn reset(&mut self) {
        self.carrier.reset(0.0);
        self.sub.reset(0.0);
        self.ladder.reset();
    }
}

pub struct FatBass {
    freq: ParamValue,
    octave: ParamValue,
    duty: ParamValue,
    cutoff: ParamValue,
    res: ParamValue,
    mul: ParamValue,
    add: ParamValue,
    voices: Vec<BassVoice>,
    sample_rate: Sample,
}

impl FatBass {
    pub fn new(config: &AudioConfig) -> Self {
        Self::build(config, &FatBassSettings::default())
    }

    /// Build from `settings`, rejecting values outside their domains.
    pub fn from_settings(config: &AudioConfig, settings: &FatBassSettings) -> Result<Self> {
        let bass = Self::build(config, settings);
        validate_all(&bass)?;
        Ok(bass)
    }

    fn build(config: &AudioConfig, settings: &FatBassSettings) -> Self {
        let mut bass = Self {
            freq: settings.freq.into(),
            octave: settings.octave.into(),
            duty: settings.duty.into(),
            cutoff: settings.cutoff.into(),
            res: settings.res.into(),
            mul: settings.mul.into(),
            add: settings.add.into(),
            voices: Vec::new(),
            sample_rate: config.sample_rate,
        };
        bass.reconfigure();
        debug!(unit = Self::UNIT, channels = bass.voices.len(), "created");
        bass
    }

    fn param_mut(&mut self, param: FatBassParam) -> &mut ParamValue {
        match param {
            FatBassParam::Freq => &mut self.freq,
            FatBassParam::Octave => &mut self.octave,
            FatBassParam::Duty => &mut self.duty,
            FatBassParam::Cutoff => &mut self.cutoff,
            FatBassParam::Res => &mut self.res,
            FatBassParam::Mul => &mut self.mul,
            FatBassParam::Add => &mut self.add,
        }
    }

    pub fn set_freq(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(FatBassParam::Freq, value)
    }

    pub fn set_octave(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(FatBassParam::Octave, value)
    }

    pub fn set_duty(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(FatBassParam::Duty, value)
    }

    pub fn set_cutoff(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(FatBassParam::Cutoff, value)
    }

    pub fn set_res(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(FatBassParam::Res, value)
    }

    pub fn set_mul(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(FatBassParam::Mul, value)
    }

    pub fn set_add(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(FatBassParam::Add, value)
    }

    fn width(&self) -> usize {
        max_width([
            &self.freq,
            &self.octave,
            &self.duty,
            &self.cutoff,
            &self.res,
            &self.mul,
            &self.add,
        ])
    }
}

impl GraphNode for FatBass {
    fn channels(&self) -> usize {
        self.voices.len().max(self.width())
    }

    fn reconfigure(&mut self) {
        let width = self.width();
        if width > self.voices.len() {
            debug!(unit = Self::UNIT, channels = width, "expanding channels");
            let sr = self.sample_rate;
            self.voices.resize_with(width, || BassVoice::new(sr));
        }
    }

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
        self.reconfigure();
        out.set_channels(self.voices.len());
        let frames = out.frames();
        for param in FatBassParam::ALL {
            self.param_mut(*param).prepare(frames, ctx);
        }

        let sr = ctx.sample_rate;
        let freq = FatBassParam::Freq.spec();
        let octave = FatBassParam::Octave.spec();
        let duty = FatBassParam::Duty.spec();
        let cutoff = FatBassParam::Cutoff.spec();
        let res = FatBassParam::Res.spec();

        for (c, voice) in self.voices.iter_mut().enumerate() {
            for (i, sample) in out.channel_mut(c).iter_mut().enumerate() {
                let f = freq.clamp(self.freq.at(c, i));
                let d = lerp(MIN_DUTY, MAX_DUTY, duty.clamp(self.duty.at(c, i)));
                let carrier = unipolar_pulse(voice.carrier.phase(), d);

                let two_down = square(voice.sub.phase());
                let one_down = square(wrap01(voice.sub.phase() * 2.0));
                let modulator = lerp(two_down, one_down, octave.clamp(self.octave.at(c, i)));

                voice.carrier.advance(f, sr);
                voice.sub.advance(f * 0.25, sr);

                voice.ladder.set_cutoff(cutoff.clamp(self.cutoff.at(c, i)), sr);
                voice.ladder.set_resonance(res.clamp(self.res.at(c, i)));
                *sample = voice.ladder.next_sample(carrier * modulator);
            }
        }

        scale_output(out, &self.mul, &self.add);
    }

    fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        for param in FatBassParam::ALL {
            self.param_mut(*param).reset();
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        &FAT_BASS_PARAMS
    }

    fn configure(&mut self, name: &str, value: ParamValue) -> Result<()> {
        configure_named(self, name, value)
    }
}

impl Modulatable for FatBass {
    type Param = FatBassParam;
    type Stager = NoStage;

    const UNIT: &'static str = "FatBass";

    fn param(&self, param: FatBassParam) -> &ParamValue {
        match param {
            FatBassParam::Freq => &self.freq,
            FatBassParam::Octave => &self.octave,
            FatBassParam::Duty => &self.duty,
            FatBassParam::Cutoff => &self.cutoff,
            FatBassParam::Res => &self.res,
            FatBassParam::Mul => &self.mul,
            FatBassParam::Add => &self.add,
        }
    }

    fn stager(&self) -> NoStage {
        NoStage
    }

    fn install(&mut self, param: FatBassParam, value: ParamValue, _staged: Option<()>) -> Retired<()> {
        Retired::value(std::mem::replace(self.param_mut(param), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParamError;

    fn render(bass: &mut FatBass, frames: usize) -> Vec<Sample> {
        let ctx = RenderCtx::new(48_000.0);
        let mut block = Block::new(1, 0);
        let mut out = Vec::with_capacity(frames);
        while out.len() < frames {
            block.set_frames((frames - out.len()).min(512));
            bass.render_block(&mut block, &ctx);
            out.extend_from_slice(block.channel(0));
        }
        out
    }

    fn rms(samples: &[Sample]) -> Sample {
        (samples.iter().map(|s| s * s).sum::<Sample>() / samples.len() as Sample).sqrt()
    }

    #[test]
    fn produces_bounded_audio() {
        let mut bass = FatBass::new(&AudioConfig::default());
        let out = render(&mut bass, 48_000);
        assert!(rms(&out[4_800..]) > 0.1);
        assert!(out.iter().all(|s| s.is_finite() && s.abs() < 2.0));
    }

    #[test]
    fn lower_cutoff_darkens() {
        let config = AudioConfig::default();
        let mut open = FatBass::new(&config);
        let mut closed = FatBass::new(&config);
        closed.set_cutoff(200.0).unwrap();
        let bright = rms(&render(&mut open, 24_000)[4_800..]);
        let dark = rms(&render(&mut closed, 24_000)[4_800..]);
        assert!(dark < bright);
    }

    #[test]
    fn octave_blend_changes_modulator() {
        let config = AudioConfig::default();
        let mut two_down = FatBass::new(&config);
        let mut one_down = FatBass::new(&config);
        one_down.set_octave(1.0).unwrap();
        assert_ne!(render(&mut two_down, 4_800), render(&mut one_down, 4_800));
    }

    #[test]
    fn rejects_non_positive_freq() {
        let mut bass = FatBass::new(&AudioConfig::default());
        let err = bass.set_freq(0.0).unwrap_err();
        assert!(matches!(err, ParamError::InvalidParameter { .. }));
        assert!(FatBass::from_settings(
            &AudioConfig::default(),
            &FatBassSettings {
                freq: -10.0,
                ..Default::default()
            }
        )
        .is_err());
    }

    #[test]
    fn resonance_clamps() {
        let mut bass = FatBass::new(&AudioConfig::default());
        bass.set_res(50.0).unwrap();
        let out = render(&mut bass, 9_600);
        assert!(out.iter().all(|s| s.is_finite()));
    }
}
