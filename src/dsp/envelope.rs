use crate::{graph::node::RenderCtx, Sample, MIN_TIME};

/*
Envelopes
=========

Two shapes are used by the composite voices.

Gate envelope (ADSR)
--------------------

    level
    1.0 ┤   ╱╲
        │  ╱  ╲_________
      S │ ╱             ╲
    0.0 ┼╱───────────────╲──→ time
         A   D     S      R

Linear segments driven by a small state machine. `trigger()` restarts the
attack from zero, `release()` ramps from wherever the level currently is, so
releasing mid-attack does not click. `open()` jumps straight to the sustain
stage: a voice built with an open gate sounds continuously until released,
which is how the bass voices behave when nobody plays them.

    Idle ──trigger──▶ Attack ──1.0──▶ Decay ──S──▶ Sustain
      ▲                 │               │            │
      └──── 0.0 ─── Release ◀──release──┴────────────┘

Decay envelope
--------------

    1.0 ┤╲
        │ ╲
        │  ╲__
    0.0 ┼─────‾‾‾‾────→ time
         decay (-60 dB)

A one-shot exponential fall used to sweep a filter cutoff: `trigger()` sets
the level to 1 and each sample multiplies it by a coefficient chosen so the
level drops by 60 dB over `decay` seconds.
*/

const SILENCE_DB: Sample = -60.0;

/// Stage of the gate envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    attack_time: Sample,
    decay_time: Sample,
    sustain_level: Sample,
    release_time: Sample,

    stage: EnvelopeState,
    level: Sample,
    release_step: Sample,
}

impl Envelope {
    pub fn adsr(attack: Sample, decay: Sample, sustain: Sample, release: Sample) -> Self {
        Self {
            attack_time: attack.max(MIN_TIME),
            decay_time: decay.max(MIN_TIME),
            sustain_level: sustain.clamp(0.0, 1.0),
            release_time: release.max(MIN_TIME),
            stage: EnvelopeState::Idle,
            level: 0.0,
            release_step: 0.0,
        }
    }

    /// Hold the gate open at the sustain level without an attack.
    pub fn open(&mut self) {
        self.stage = EnvelopeState::Sustain;
        self.level = self.sustain_level;
    }

    /// Restart the attack from zero.
    pub fn trigger(&mut self) {
        self.level = 0.0;
        self.stage = EnvelopeState::Attack;
    }

    /// Ramp from the current level to zero over the release time.
    pub fn release(&mut self, ctx: &RenderCtx) {
        if self.stage == EnvelopeState::Idle {
            return;
        }
        let samples = (self.release_time * ctx.sample_rate).round().max(1.0);
        self.release_step = self.level / samples;
        self.stage = EnvelopeState::Release;
    }

    /// Advance one sample and return the new level.
    #[inline]
    pub fn next_sample(&mut self, ctx: &RenderCtx) -> Sample {
        match self.stage {
            EnvelopeState::Idle => self.level = 0.0,
            EnvelopeState::Attack => {
                self.level += 1.0 / (self.attack_time * ctx.sample_rate);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeState::Decay;
                }
            }
            EnvelopeState::Decay => {
                let drop = 1.0 - self.sustain_level;
                self.level -= drop / (self.decay_time * ctx.sample_rate);
                if self.level <= self.sustain_level {
                    self.level = self.sustain_level;
                    self.stage = EnvelopeState::Sustain;
                }
            }
            EnvelopeState::Sustain => self.level = self.sustain_level,
            EnvelopeState::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeState::Idle;
                }
            }
        }
        self.level
    }

    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeState::Idle
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeState::Idle;
        self.level = 0.0;
        self.release_step = 0.0;
    }

    pub fn level(&self) -> Sample {
        self.level
    }

    pub fn state(&self) -> EnvelopeState {
        self.stage
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecayEnvelope {
    level: Sample,
    decay_time: Sample,
    coef: Sample,
    rate: Sample,
}

impl DecayEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&mut self) {
        self.level = 1.0;
    }

    /// Advance one sample with a decay time of `decay` seconds.
    #[inline]
    pub fn next_sample(&mut self, decay: Sample, ctx: &RenderCtx) -> Sample {
        if decay != self.decay_time || ctx.sample_rate != self.rate {
            self.decay_time = decay;
            self.rate = ctx.sample_rate;
            let samples = decay.max(MIN_TIME) * ctx.sample_rate;
            self.coef = (10.0 as Sample).powf(SILENCE_DB / 20.0 / samples);
        }
        let out = self.level;
        self.level *= self.coef;
        out
    }

    pub fn level(&self) -> Sample {
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: Sample = 1_000.0;

    fn ctx() -> RenderCtx {
        RenderCtx::new(SAMPLE_RATE)
    }

    fn render_samples(env: &mut Envelope, samples: usize) {
        let ctx = ctx();
        for _ in 0..samples {
            env.next_sample(&ctx);
        }
    }

    #[test]
    fn attack_reaches_full_level() {
        let mut env = Envelope::adsr(0.01, 0.1, 0.7, 0.2);
        env.trigger();
        render_samples(&mut env, (0.01 * SAMPLE_RATE) as usize + 1);

        assert!(env.level() > 0.99, "expected attack to reach full level");
        assert_ne!(env.state(), EnvelopeState::Attack);
    }

    #[test]
    fn sustain_holds_target_level() {
        let sustain = 0.6;
        let mut env = Envelope::adsr(0.01, 0.05, sustain, 0.2);
        env.trigger();
        render_samples(&mut env, ((0.01 + 0.05) * SAMPLE_RATE) as usize + 5);

        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert!((env.level() - sustain).abs() < 0.05);
    }

    #[test]
    fn open_gate_sounds_immediately() {
        let mut env = Envelope::adsr(0.01, 0.05, 1.0, 0.2);
        env.open();
        assert_eq!(env.next_sample(&ctx()), 1.0);
        assert!(env.is_active());
    }

    #[test]
    fn release_falls_back_to_idle() {
        let release = 0.03;
        let mut env = Envelope::adsr(0.01, 0.05, 0.5, release);
        env.trigger();
        render_samples(&mut env, 20);

        env.release(&ctx());
        render_samples(&mut env, (release * SAMPLE_RATE) as usize + 2);

        assert!(env.level() <= 0.001, "release should fall back to zero");
        assert_eq!(env.state(), EnvelopeState::Idle);
    }

    #[test]
    fn decay_reaches_minus_60_db() {
        let mut env = DecayEnvelope::new();
        let ctx = ctx();
        assert_eq!(env.next_sample(0.3, &ctx), 0.0);

        env.trigger();
        let mut last = 1.0;
        for _ in 0..300 {
            last = env.next_sample(0.3, &ctx);
        }
        assert!(last > 0.0009 && last < 0.0012, "level after decay: {last}");
    }
}
