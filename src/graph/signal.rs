use crate::{
    dsp::{
        lfo::{lfo_value, LfoShape},
        phasor::Phasor,
    },
    graph::node::{Block, GraphNode, RenderCtx},
    Sample,
};

/*
Control Sources
===============

Any node can drive a parameter, but two small ones cover most needs:

  Sig       a constant, useful to pass a fixed value where a signal is
            expected or to feed a unit with DC
  LfoNode   a periodic sweep mapped into [lo, hi]

Example usage:
  let vib = LfoNode::sine(5.0).range(435.0, 445.0);
  let osc = Pwm::new().modulate(PwmParam::Freq, vib)?;
*/

/// Constant signal.
#[derive(Debug, Clone, Copy)]
pub struct Sig {
    value: Sample,
}

impl Sig {
    pub fn new(value: Sample) -> Self {
        Self { value }
    }

    pub fn value(&self) -> Sample {
        self.value
    }
}

impl GraphNode for Sig {
    fn channels(&self) -> usize {
        1
    }

    fn render_block(&mut self, out: &mut Block, _ctx: &RenderCtx) {
        out.set_channels(1);
        out.fill(self.value);
    }

    fn reset(&mut self) {}
}

/// Low frequency oscillator mapped into `[lo, hi]`.
pub struct LfoNode {
    shape: LfoShape,
    rate: Sample,
    lo: Sample,
    hi: Sample,
    phasor: Phasor,
}

impl LfoNode {
    pub fn new(shape: LfoShape, rate: Sample) -> Self {
        Self {
            shape,
            rate,
            lo: -1.0,
            hi: 1.0,
            phasor: Phasor::new(),
        }
    }

    pub fn sine(rate: Sample) -> Self {
        Self::new(LfoShape::Sine, rate)
    }

    pub fn triangle(rate: Sample) -> Self {
        Self::new(LfoShape::Triangle, rate)
    }

    pub fn saw(rate: Sample) -> Self {
        Self::new(LfoShape::Saw, rate)
    }

    pub fn square(rate: Sample) -> Self {
        Self::new(LfoShape::Square, rate)
    }

    /// Map the bipolar sweep onto `[lo, hi]`.
    pub fn range(mut self, lo: Sample, hi: Sample) -> Self {
        self.lo = lo;
        self.hi = hi;
        self
    }
}

impl GraphNode for LfoNode {
    fn channels(&self) -> usize {
        1
    }

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
        out.set_channels(1);
        let half = 0.5 * (self.hi - self.lo);
        let mid = self.lo + half;
        for sample in out.channel_mut(0) {
            let phase = self.phasor.next_sample(self.rate, ctx.sample_rate);
            *sample = mid + half * lfo_value(self.shape, phase);
        }
    }

    fn reset(&mut self) {
        self.phasor.reset(0.0);
    }
}
