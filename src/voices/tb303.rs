//! Acid bass voice.
//!
//! A loose take on the classic bassline box: a pulse wave excites a
//! resonant 4-pole lowpass, with an amplitude envelope and a decaying
//! cutoff sweep. It is an approximation, not a circuit model.
//!
//! # How It Works
//!
//! 1. `octave` transposes `freq` by powers of two (default three down);
//!    fractional values detune
//! 2. The pulse runs ±0.5 with duty kept inside 0.02..0.98
//! 3. Each `trigger()` restarts the amplitude envelope and kicks the
//!    cutoff up by `envmod` octaves, decaying back over `decay` seconds
//! 4. The ladder output is DC-blocked
//!
//! The gate starts open, so an untouched voice drones like a plain
//! oscillator until `release()` is called.

use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    config::AudioConfig,
    dsp::{
        envelope::{DecayEnvelope, Envelope},
        filter::{DcBlock, Ladder},
        phasor::Phasor,
        shape::unipolar_pulse,
    },
    error::Result,
    graph::{
        node::{configure_named, validate_all, Block, GraphNode, Modulatable, NoStage, ParamId, RenderCtx, Retired},
        param::{max_width, scale_output, ParamSpec, ParamValue},
    },
    Sample, MAX_FREQUENCY, MIN_FREQUENCY,
};

const MIN_DUTY: Sample = 0.02;
const MAX_DUTY: Sample = 0.98;
const ATTACK: Sample = 0.003;
const DECAY: Sample = 0.1;
const SUSTAIN: Sample = 1.0;
const RELEASE: Sample = 0.02;

static TB303_PARAMS: [ParamSpec; 9] = [
    ParamSpec::control("freq", MIN_FREQUENCY, MAX_FREQUENCY, 100.0, "frequency in Hz before transposition")
        .log()
        .reject(),
    ParamSpec::control("duty", 0.0, 1.0, 0.5, "pulse duty, kept inside 0.02..0.98"),
    ParamSpec::control("cutoff", 20.0, MAX_FREQUENCY, 1000.0, "lowpass cutoff in Hz").log(),
    ParamSpec::control("res", 0.0, Ladder::MAX_RESONANCE, 1.0, "lowpass resonance"),
    ParamSpec::control("octave", -8.0, 8.0, -3.0, "transposition in octaves"),
    ParamSpec::control("envmod", 0.0, 8.0, 0.0, "cutoff sweep depth in octaves"),
    ParamSpec::control("decay", 0.001, 10.0, 0.3, "cutoff sweep length in seconds").log(),
    ParamSpec::mul(),
    ParamSpec::add(),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tb303Param {
    Freq,
    Duty,
    Cutoff,
    Res,
    Octave,
    EnvMod,
    Decay,
    Mul,
    Add,
}

impl ParamId for Tb303Param {
    const ALL: &'static [Self] = &[
        Tb303Param::Freq,
        Tb303Param::Duty,
        Tb303Param::Cutoff,
        Tb303Param::Res,
        Tb303Param::Octave,
        Tb303Param::EnvMod,
        Tb303Param::Decay,
        Tb303Param::Mul,
        Tb303Param::Add,
    ];

    fn spec(self) -> &'static ParamSpec {
        &TB303_PARAMS[self as usize]
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tb303Settings {
    pub freq: Sample,
    pub duty: Sample,
    pub cutoff: Sample,
    pub res: Sample,
    pub octave: Sample,
    pub envmod: Sample,
    pub decay: Sample,
    pub mul: Sample,
    pub add: Sample,
}

impl Default for Tb303Settings {
    fn default() -> Self {
        Self {
            freq: 100.0,
            duty: 0.5,
            cutoff: 1000.0,
            res: 1.0,
            octave: -3.0,
            envmod: 0.0,
            decay: 0.3,
            mul: 1.0,
            add: 0.0,
        }
    }
}

struct AcidVoice {
    phasor: Phasor,
    ladder: Ladder,
    dc: DcBlock,
    amp: Envelope,
    sweep: DecayEnvelope,
}

impl AcidVoice {
    fn new(sample_rate: Sample) -> Self {
        let mut amp = Envelope::adsr(ATTACK, DECAY, SUSTAIN, RELEASE);
        amp.open();
        Self {
            phasor: Phasor::new(),
            ladder: Ladder::new(1000.0, sample_rate),
            dc: DcBlock::new(),
            amp,
            sweep: DecayEnvelope::new(),
        }
    }

    fn reset(&mut self) {
        self.phasor.reset(0.0);
        self.ladder.reset();
        self.dc.reset();
        self.amp.reset();
        self.amp.open();
        self.sweep.reset();
    }
}

pub struct Tb303 {
    freq: ParamValue,
    duty: ParamValue,
    cutoff: ParamValue,
    res: ParamValue,
    octave: ParamValue,
    envmod: ParamValue,
    decay: ParamValue,
    mul: ParamValue,
    add: ParamValue,
    voices: Vec<AcidVoice>,
    sample_rate: Sample,
}

impl Tb303 {
    pub fn new(config: &AudioConfig) -> Self {
        Self::build(config, &Tb303Settings::default())
    }

    /// Build from `settings`, rejecting values outside their domains.
    pub fn from_settings(config: &AudioConfig, settings: &Tb303Settings) -> Result<Self> {
        let voice = Self::build(config, settings);
        validate_all(&voice)?;
        Ok(voice)
    }

    fn build(config: &AudioConfig, settings: &Tb303Settings) -> Self {
        let mut voice = Self {
            freq: settings.freq.into(),
            duty: settings.duty.into(),
            cutoff: settings.cutoff.into(),
            res: settings.res.into(),
            octave: settings.octave.into(),
            envmod: settings.envmod.into(),
            decay: settings.decay.into(),
            mul: settings.mul.into(),
            add: settings.add.into(),
            voices: Vec::new(),
            sample_rate: config.sample_rate,
        };
        voice.reconfigure();
        debug!(unit = Self::UNIT, channels = voice.voices.len(), "created");
        voice
    }

    /// Restart the amplitude envelope and the cutoff sweep on every channel.
    pub fn trigger(&mut self) {
        for voice in &mut self.voices {
            voice.amp.trigger();
            voice.sweep.trigger();
        }
    }

    /// Close the gate; the voice fades out over the release time.
    pub fn release(&mut self) {
        let ctx = RenderCtx::new(self.sample_rate);
        for voice in &mut self.voices {
            voice.amp.release(&ctx);
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.voices.iter().any(|voice| voice.amp.is_active())
    }

    fn param_mut(&mut self, param: Tb303Param) -> &mut ParamValue {
        match param {
            Tb303Param::Freq => &mut self.freq,
            Tb303Param::Duty => &mut self.duty,
            Tb303Param::Cutoff => &mut self.cutoff,
            Tb303Param::Res => &mut self.res,
            Tb303Param::Octave => &mut self.octave,
            Tb303Param::EnvMod => &mut self.envmod,
            Tb303Param::Decay => &mut self.decay,
            Tb303Param::Mul => &mut self.mul,
            Tb303Param::Add => &mut self.add,
        }
    }

    pub fn set_freq(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(Tb303Param::Freq, value)
    }

    pub fn set_duty(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(Tb303Param::Duty, value)
    }

    pub fn set_cutoff(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(Tb303Param::Cutoff, value)
    }

    pub fn set_res(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(Tb303Param::Res, value)
    }

    pub fn set_octave(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(Tb303Param::Octave, value)
    }

    pub fn set_envmod(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(Tb303Param::EnvMod, value)
    }

    pub fn set_decay(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(Tb303Param::Decay, value)
    }

    pub fn set_mul(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(Tb303Param::Mul, value)
    }

    pub fn set_add(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(Tb303Param::Add, value)
    }

    fn width(&self) -> usize {
        max_width([
            &self.freq,
            &self.duty,
            &self.cutoff,
            &self.res,
            &self.octave,
            &self.envmod,
            &self.decay,
            &self.mul,
            &self.add,
        ])
    }
}

impl GraphNode for Tb303 {
    fn channels(&self) -> usize {
        self.voices.len().max(self.width())
    }

    fn reconfigure(&mut self) {
        let width = self.width();
        if width > self.voices.len() {
            debug!(unit = Self::UNIT, channels = width, "expanding channels");
            let sr = self.sample_rate;
            self.voices.resize_with(width, || AcidVoice::new(sr));
        }
    }

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
        self.reconfigure();
        out.set_channels(self.voices.len());
        let frames = out.frames();
        for param in Tb303Param::ALL {
            self.param_mut(*param).prepare(frames, ctx);
        }

        let sr = ctx.sample_rate;
        let freq = Tb303Param::Freq.spec();
        let duty = Tb303Param::Duty.spec();
        let cutoff = Tb303Param::Cutoff.spec();
        let res = Tb303Param::Res.spec();
        let octave = Tb303Param::Octave.spec();
        let envmod = Tb303Param::EnvMod.spec();
        let decay = Tb303Param::Decay.spec();

        for (c, voice) in self.voices.iter_mut().enumerate() {
            for (i, sample) in out.channel_mut(c).iter_mut().enumerate() {
                let d = duty.clamp(self.duty.at(c, i)).clamp(MIN_DUTY, MAX_DUTY);
                let raw = unipolar_pulse(voice.phasor.phase(), d) - 0.5;
                let transpose = octave.clamp(self.octave.at(c, i)).exp2();
                voice.phasor.advance(freq.clamp(self.freq.at(c, i)) * transpose, sr);

                let sweep = voice.sweep.next_sample(decay.clamp(self.decay.at(c, i)), ctx);
                let lift = (envmod.clamp(self.envmod.at(c, i)) * sweep).exp2();
                let fc = cutoff.clamp(self.cutoff.at(c, i)) * lift;
                voice.ladder.set_cutoff(fc, sr);
                voice.ladder.set_resonance(res.clamp(self.res.at(c, i)));

                let filtered = voice.dc.next_sample(voice.ladder.next_sample(raw));
                *sample = filtered * voice.amp.next_sample(ctx);
            }
        }

        scale_output(out, &self.mul, &self.add);
    }

    fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        for param in Tb303Param::ALL {
            self.param_mut(*param).reset();
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        &TB303_PARAMS
    }

    fn configure(&mut self, name: &str, value: ParamValue) -> Result<()> {
        configure_named(self, name, value)
    }
}

impl Modulatable for Tb303 {
    type Param = Tb303Param;
    type Stager = NoStage;

    const UNIT: &'static str = "TB303";

    fn param(&self, param: Tb303Param) -> &ParamValue {
        match param {
            Tb303Param::Freq => &self.freq,
            Tb303Param::Duty => &self.duty,
            Tb303Param::Cutoff => &self.cutoff,
            Tb303Param::Res => &self.res,
            Tb303Param::Octave => &self.octave,
            Tb303Param::EnvMod => &self.envmod,
            Tb303Param::Decay => &self.decay,
            Tb303Param::Mul => &self.mul,
            Tb303Param::Add => &self.add,
        }
    }

    fn stager(&self) -> NoStage {
        NoStage
    }

    fn install(&mut self, param: Tb303Param, value: ParamValue, _staged: Option<()>) -> Retired<()> {
        Retired::value(std::mem::replace(self.param_mut(param), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParamError;

    const SR: Sample = 48_000.0;

    fn render(voice: &mut Tb303, frames: usize) -> Vec<Sample> {
        let ctx = RenderCtx::new(SR);
        let mut block = Block::new(1, 0);
        let mut out = Vec::with_capacity(frames);
        while out.len() < frames {
            block.set_frames((frames - out.len()).min(512));
            voice.render_block(&mut block, &ctx);
            out.extend_from_slice(block.channel(0));
        }
        out
    }

    fn rms(samples: &[Sample]) -> Sample {
        (samples.iter().map(|s| s * s).sum::<Sample>() / samples.len() as Sample).sqrt()
    }

    /// Rising zero crossings per second.
    fn crossings(samples: &[Sample]) -> usize {
        samples.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count()
    }

    #[test]
    fn drones_until_released() {
        let mut voice = Tb303::new(&AudioConfig::new(SR));
        assert!(voice.is_sounding());
        let out = render(&mut voice, 24_000);
        assert!(rms(&out[4_800..]) > 0.01);

        voice.release();
        render(&mut voice, 4_800);
        assert!(!voice.is_sounding());
        let tail = render(&mut voice, 4_800);
        assert!(tail.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn octave_shifts_pitch_by_powers_of_two() {
        let config = AudioConfig::new(SR);
        let mut low = Tb303::new(&config);
        low.set_freq(800.0).unwrap();
        low.set_octave(-2.0).unwrap();
        low.set_res(0.0).unwrap();
        low.set_cutoff(400.0).unwrap();
        let mut high = Tb303::new(&config);
        high.set_freq(800.0).unwrap();
        high.set_octave(-1.0).unwrap();
        high.set_res(0.0).unwrap();
        high.set_cutoff(800.0).unwrap();

        let slow = crossings(&render(&mut low, 48_000)[4_800..]) as Sample;
        let fast = crossings(&render(&mut high, 48_000)[4_800..]) as Sample;
        let ratio = fast / slow;
        assert!((ratio - 2.0).abs() < 0.1, "ratio {ratio}");
    }

    #[test]
    fn envmod_brightens_after_trigger() {
        let config = AudioConfig::new(SR);
        let mut flat = Tb303::new(&config);
        flat.set_cutoff(200.0).unwrap();
        let mut swept = Tb303::new(&config);
        swept.set_cutoff(200.0).unwrap();
        swept.set_envmod(4.0).unwrap();
        flat.trigger();
        swept.trigger();
        let a = render(&mut flat, 4_800);
        let b = render(&mut swept, 4_800);
        assert_ne!(a, b);
    }

    #[test]
    fn trigger_restarts_attack() {
        let mut voice = Tb303::new(&AudioConfig::new(SR));
        voice.trigger();
        let out = render(&mut voice, 16);
        assert!(out[0].abs() < 1e-3);
        assert!(voice.is_sounding());
    }

    #[test]
    fn rejects_bad_freq() {
        let mut voice = Tb303::new(&AudioConfig::default());
        let err = voice.set_freq(Sample::NAN).unwrap_err();
        assert!(matches!(err, ParamError::InvalidParameter { .. }));
    }
}
