//! Parameter values, domains and per-block resolution.

/*
Parameters
==========

Every unit parameter holds a `ParamValue`. Most are lists of `Control`s:

    Control::Constant(440.0)              fixed value
    Control::Signal(SignalRef)            another node, rendered each block

A list longer than one expands the unit to that many channels; a single
value broadcasts to all of them:

    freq = [100, 150, 200]   duty = 0.5      →  3 channels
             │    │    │            │
    ch 0 ────┘    │    │   0.5 ─────┤
    ch 1 ─────────┘    │   0.5 ─────┤
    ch 2 ──────────────┘   0.5 ─────┘

Signals are pulled once per block (`prepare`), after which reading a value
is an array index. There is no dispatch inside the per-sample loop beyond a
match on the variant.

Domains
-------

Each parameter has a static `ParamSpec`: kind, bounds, default and what to
do with out-of-range constants. Setters check constants against it
synchronously (`validate`). Signal values cannot be checked ahead of time,
so units clamp them per sample with the same bounds (`clamp`); NaN becomes
the default.

    policy   constant outside bounds      signal outside bounds
    Clamp    accepted, clamped on use     clamped per sample
    Reject   InvalidParameter             clamped per sample
*/

use std::fmt;

use crate::{
    dsp::{spacing::Spacing, table::Table, xfade::FadeSlots},
    error::{ParamError, Result},
    graph::node::{Block, GraphNode, RenderCtx},
    Sample,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Constant or signal, per channel.
    Control,
    /// Whole-number constant, per channel.
    Integer,
    /// `(min, max)` pair.
    Range,
    /// Spacing mode name.
    Mode,
    /// Single-cycle wavetable.
    Table,
    /// Audio input.
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Lin,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Clamp,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub min: Sample,
    pub max: Sample,
    pub default: Sample,
    pub scale: Scale,
    pub policy: Policy,
    pub doc: &'static str,
}

impl ParamSpec {
    const fn base(name: &'static str, kind: ParamKind, min: Sample, max: Sample, default: Sample, doc: &'static str) -> Self {
        Self {
            name,
            kind,
            min,
            max,
            default,
            scale: Scale::Lin,
            policy: Policy::Clamp,
            doc,
        }
    }

    pub const fn control(name: &'static str, min: Sample, max: Sample, default: Sample, doc: &'static str) -> Self {
        Self::base(name, ParamKind::Control, min, max, default, doc)
    }

    pub const fn integer(name: &'static str, min: Sample, max: Sample, default: Sample, doc: &'static str) -> Self {
        Self::base(name, ParamKind::Integer, min, max, default, doc)
    }

    pub const fn range(name: &'static str, min: Sample, max: Sample, doc: &'static str) -> Self {
        Self::base(name, ParamKind::Range, min, max, min, doc).reject()
    }

    pub const fn mode(name: &'static str, doc: &'static str) -> Self {
        Self::base(name, ParamKind::Mode, 0.0, 0.0, 0.0, doc)
    }

    pub const fn table(name: &'static str, doc: &'static str) -> Self {
        Self::base(name, ParamKind::Table, 0.0, 0.0, 0.0, doc)
    }

    pub const fn input(name: &'static str, doc: &'static str) -> Self {
        Self::base(name, ParamKind::Input, 0.0, 0.0, 0.0, doc)
    }

    /// Output gain, any finite value.
    pub const fn mul() -> Self {
        Self::control("mul", Sample::MIN, Sample::MAX, 1.0, "output gain")
    }

    /// Output offset, any finite value.
    pub const fn add() -> Self {
        Self::control("add", Sample::MIN, Sample::MAX, 0.0, "output offset")
    }

    pub const fn log(mut self) -> Self {
        self.scale = Scale::Log;
        self
    }

    pub const fn reject(mut self) -> Self {
        self.policy = Policy::Reject;
        self
    }

    /// Human-readable domain for error messages.
    pub fn domain(&self) -> String {
        match self.kind {
            ParamKind::Control if self.min == Sample::MIN => "a finite number or a signal".into(),
            ParamKind::Control => format!("a number in [{}, {}] or a signal", self.min, self.max),
            ParamKind::Integer => format!("a whole number in [{}, {}]", self.min, self.max),
            ParamKind::Range => format!("a (min, max) pair within [{}, {}]", self.min, self.max),
            ParamKind::Mode => {
                let names: Vec<&str> = Spacing::ALL.iter().map(|s| s.name()).collect();
                format!("one of {}", names.join(", "))
            }
            ParamKind::Table => "a wavetable of at least 4 points".into(),
            ParamKind::Input => "an audio signal".into(),
        }
    }

    #[inline]
    fn in_bounds(&self, v: Sample) -> bool {
        v >= self.min && v <= self.max
    }

    /// Clamp a per-sample value into bounds; NaN becomes the default.
    #[inline]
    pub fn clamp(&self, v: Sample) -> Sample {
        if v.is_nan() {
            self.default
        } else {
            v.clamp(self.min, self.max)
        }
    }

    /// Clamped whole value of an integer parameter for `channel`.
    pub fn whole_at(&self, value: &ParamValue, channel: usize) -> usize {
        let v = value.constant_at(channel).unwrap_or(self.default);
        self.clamp(v).max(0.0) as usize
    }

    fn invalid(&self, unit: &'static str, value: impl ToString) -> ParamError {
        ParamError::invalid(unit, self.name, value, self.domain())
    }

    /// Check `value` against this domain.
    pub fn validate(&self, unit: &'static str, value: &ParamValue) -> Result<()> {
        match (self.kind, value) {
            (ParamKind::Control, ParamValue::Controls(controls)) => {
                if controls.is_empty() {
                    return Err(self.invalid(unit, "[]"));
                }
                for control in controls {
                    if let Control::Constant(v) = *control {
                        if !v.is_finite() || (self.policy == Policy::Reject && !self.in_bounds(v)) {
                            return Err(self.invalid(unit, v));
                        }
                    }
                }
                Ok(())
            }
            (ParamKind::Integer, ParamValue::Controls(controls)) => {
                if controls.is_empty() {
                    return Err(self.invalid(unit, "[]"));
                }
                for control in controls {
                    let Control::Constant(v) = *control else {
                        return Err(self.invalid(unit, "a signal"));
                    };
                    if !v.is_finite()
                        || v.fract() != 0.0
                        || (self.policy == Policy::Reject && !self.in_bounds(v))
                    {
                        return Err(self.invalid(unit, v));
                    }
                }
                Ok(())
            }
            (ParamKind::Range, &ParamValue::Range(lo, hi)) => {
                if !lo.is_finite() || !hi.is_finite() {
                    return Err(self.invalid(unit, format!("({lo}, {hi})")));
                }
                if lo > hi {
                    return Err(ParamError::conflict(
                        unit,
                        self.name,
                        format!("min {lo} is greater than max {hi}"),
                    ));
                }
                if !self.in_bounds(lo) || !self.in_bounds(hi) {
                    return Err(self.invalid(unit, format!("({lo}, {hi})")));
                }
                Ok(())
            }
            (ParamKind::Mode, ParamValue::Mode(_)) => Ok(()),
            (ParamKind::Table, ParamValue::Table(table)) if table.len() >= 4 => Ok(()),
            (ParamKind::Table, ParamValue::Table(table)) => {
                Err(self.invalid(unit, format!("a table of {} points", table.len())))
            }
            (ParamKind::Input, ParamValue::Input(_)) => Ok(()),
            (_, other) => Err(self.invalid(unit, other.describe())),
        }
    }
}

/// Another node whose output is read as a parameter or input.
pub struct SignalRef {
    node: Box<dyn GraphNode>,
    block: Block,
}

impl SignalRef {
    pub fn new(node: impl GraphNode + 'static) -> Self {
        Self::boxed(Box::new(node))
    }

    pub fn boxed(node: Box<dyn GraphNode>) -> Self {
        let channels = node.channels();
        Self {
            node,
            block: Block::new(channels, 0),
        }
    }

    pub fn channels(&self) -> usize {
        self.node.channels()
    }

    /// Render the next `frames` frames of the source.
    pub fn prepare(&mut self, frames: usize, ctx: &RenderCtx) {
        self.block.set_frames(frames);
        self.node.render_block(&mut self.block, ctx);
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn reset(&mut self) {
        self.node.reset();
        self.block.fill(0.0);
    }
}

impl fmt::Debug for SignalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalRef")
            .field("channels", &self.channels())
            .finish()
    }
}

#[derive(Debug)]
pub enum Control {
    Constant(Sample),
    Signal(SignalRef),
}

impl Control {
    pub fn signal(node: impl GraphNode + 'static) -> Self {
        Control::Signal(SignalRef::new(node))
    }

    fn width(&self) -> usize {
        match self {
            Control::Constant(_) => 1,
            Control::Signal(signal) => signal.channels(),
        }
    }

    #[inline]
    fn at(&self, channel: usize, i: usize) -> Sample {
        match self {
            Control::Constant(v) => *v,
            Control::Signal(signal) => signal.block.get(channel, i),
        }
    }
}

#[derive(Debug)]
pub enum ParamValue {
    Controls(Vec<Control>),
    Range(Sample, Sample),
    Mode(Spacing),
    Table(Table),
    Input(SignalRef),
}

impl ParamValue {
    pub fn constant(value: Sample) -> Self {
        ParamValue::Controls(vec![Control::Constant(value)])
    }

    /// One constant per channel.
    pub fn list(values: impl IntoIterator<Item = Sample>) -> Self {
        ParamValue::Controls(values.into_iter().map(Control::Constant).collect())
    }

    /// Drive the parameter from another node's output.
    pub fn signal(node: impl GraphNode + 'static) -> Self {
        ParamValue::Controls(vec![Control::signal(node)])
    }

    /// Use another node as an audio input.
    pub fn input(node: impl GraphNode + 'static) -> Self {
        ParamValue::Input(SignalRef::new(node))
    }

    fn describe(&self) -> String {
        match self {
            ParamValue::Controls(c) if c.len() == 1 => match c[0] {
                Control::Constant(v) => v.to_string(),
                Control::Signal(_) => "a signal".into(),
            },
            ParamValue::Controls(c) => format!("a list of {}", c.len()),
            ParamValue::Range(lo, hi) => format!("({lo}, {hi})"),
            ParamValue::Mode(mode) => mode.name().into(),
            ParamValue::Table(_) => "a table".into(),
            ParamValue::Input(_) => "an audio input".into(),
        }
    }

    /// Channels this value asks for.
    pub fn width(&self) -> usize {
        match self {
            ParamValue::Controls(controls) if controls.len() == 1 => controls[0].width(),
            ParamValue::Controls(controls) => controls.len(),
            ParamValue::Input(signal) => signal.channels(),
            _ => 1,
        }
    }

    /// Render any signals for the coming block.
    pub fn prepare(&mut self, frames: usize, ctx: &RenderCtx) {
        match self {
            ParamValue::Controls(controls) => {
                for control in controls {
                    if let Control::Signal(signal) = control {
                        signal.prepare(frames, ctx);
                    }
                }
            }
            ParamValue::Input(signal) => signal.prepare(frames, ctx),
            _ => {}
        }
    }

    /// Value for `channel` at frame `i` of the prepared block.
    #[inline]
    pub fn at(&self, channel: usize, i: usize) -> Sample {
        match self {
            ParamValue::Controls(controls) if controls.len() == 1 => controls[0].at(channel, i),
            ParamValue::Controls(controls) => controls[channel % controls.len()].at(channel, i),
            ParamValue::Input(signal) => signal.block.get(channel, i),
            _ => 0.0,
        }
    }

    /// Constant for `channel`, if that channel is not signal-driven.
    pub fn constant_at(&self, channel: usize) -> Option<Sample> {
        match self {
            ParamValue::Controls(controls) if !controls.is_empty() => {
                match controls[channel % controls.len()] {
                    Control::Constant(v) => Some(v),
                    Control::Signal(_) => None,
                }
            }
            _ => None,
        }
    }

    pub fn is_constant(&self, value: Sample) -> bool {
        matches!(self, ParamValue::Controls(c) if c.len() == 1 && matches!(c[0], Control::Constant(v) if v == value))
    }

    pub fn as_range(&self) -> Option<(Sample, Sample)> {
        match *self {
            ParamValue::Range(lo, hi) => Some((lo, hi)),
            _ => None,
        }
    }

    pub fn as_mode(&self) -> Option<Spacing> {
        match *self {
            ParamValue::Mode(mode) => Some(mode),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            ParamValue::Table(table) => Some(table),
            _ => None,
        }
    }

    /// True when both hold the same constants (signals never compare equal).
    pub fn same_constants(&self, other: &ParamValue) -> bool {
        match (self, other) {
            (ParamValue::Controls(a), ParamValue::Controls(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|pair| {
                        matches!(pair, (Control::Constant(x), Control::Constant(y)) if x == y)
                    })
            }
            (ParamValue::Range(a0, a1), ParamValue::Range(b0, b1)) => a0 == b0 && a1 == b1,
            (ParamValue::Mode(a), ParamValue::Mode(b)) => a == b,
            (ParamValue::Table(a), ParamValue::Table(b)) => a == b,
            _ => false,
        }
    }

    /// Reset any signal sources.
    pub fn reset(&mut self) {
        match self {
            ParamValue::Controls(controls) => {
                for control in controls {
                    if let Control::Signal(signal) = control {
                        signal.reset();
                    }
                }
            }
            ParamValue::Input(signal) => signal.reset(),
            _ => {}
        }
    }
}

impl From<Sample> for ParamValue {
    fn from(value: Sample) -> Self {
        ParamValue::constant(value)
    }
}

impl From<Vec<Sample>> for ParamValue {
    fn from(values: Vec<Sample>) -> Self {
        ParamValue::list(values)
    }
}

impl From<&[Sample]> for ParamValue {
    fn from(values: &[Sample]) -> Self {
        ParamValue::list(values.iter().copied())
    }
}

impl<const N: usize> From<[Sample; N]> for ParamValue {
    fn from(values: [Sample; N]) -> Self {
        ParamValue::list(values)
    }
}

impl From<(Sample, Sample)> for ParamValue {
    fn from((lo, hi): (Sample, Sample)) -> Self {
        ParamValue::Range(lo, hi)
    }
}

impl From<Spacing> for ParamValue {
    fn from(mode: Spacing) -> Self {
        ParamValue::Mode(mode)
    }
}

impl From<Table> for ParamValue {
    fn from(table: Table) -> Self {
        ParamValue::Table(table)
    }
}

impl From<Control> for ParamValue {
    fn from(control: Control) -> Self {
        ParamValue::Controls(vec![control])
    }
}

impl From<Vec<Control>> for ParamValue {
    fn from(controls: Vec<Control>) -> Self {
        ParamValue::Controls(controls)
    }
}

/// Widest channel request among `values`.
pub fn max_width<'a>(values: impl IntoIterator<Item = &'a ParamValue>) -> usize {
    values.into_iter().map(ParamValue::width).max().unwrap_or(1).max(1)
}

/// `out = out * mul + add`, skipped entirely for the identity.
pub fn scale_output(out: &mut Block, mul: &ParamValue, add: &ParamValue) {
    if mul.is_constant(1.0) && add.is_constant(0.0) {
        return;
    }
    for c in 0..out.channels() {
        for (i, sample) in out.channel_mut(c).iter_mut().enumerate() {
            *sample = *sample * mul.at(c, i) + add.at(c, i);
        }
    }
}

/// Audio input that crossfades when it is replaced. A replacement made
/// while a fade runs waits for it and starts at the next block.
pub struct InputFader {
    slots: FadeSlots<ParamValue>,
}

impl InputFader {
    pub fn new(input: ParamValue, fade_len: usize) -> Self {
        Self {
            slots: FadeSlots::new(input, fade_len),
        }
    }

    pub fn current(&self) -> &ParamValue {
        self.slots.current()
    }

    pub fn is_fading(&self) -> bool {
        self.slots.is_fading()
    }

    /// Fade to `input`. Returns an earlier input that is no longer read.
    pub fn replace(&mut self, input: ParamValue) -> Option<ParamValue> {
        self.slots.install(input)
    }

    pub fn channels(&self) -> usize {
        self.slots.current().width()
    }

    pub fn prepare(&mut self, frames: usize, ctx: &RenderCtx) {
        self.slots.promote();
        self.slots.current_mut().prepare(frames, ctx);
        if let Some(previous) = self.slots.previous_mut() {
            previous.prepare(frames, ctx);
        }
    }

    #[inline]
    pub fn at(&self, channel: usize, i: usize) -> Sample {
        let now = self.slots.current().at(channel, i);
        match (self.slots.gains_after(i), self.slots.previous()) {
            (Some((g_old, g_new)), Some(previous)) => g_old * previous.at(channel, i) + g_new * now,
            _ => now,
        }
    }

    /// Mean of all input channels at frame `i`.
    #[inline]
    pub fn mono(&self, i: usize) -> Sample {
        let channels = self.channels();
        let sum: Sample = (0..channels).map(|c| self.at(c, i)).sum();
        sum / channels as Sample
    }

    /// Move the fade forward after a block of `frames`.
    pub fn advance(&mut self, frames: usize) {
        self.slots.advance(frames);
    }

    pub fn reset(&mut self) {
        self.slots.current_mut().reset();
        self.slots.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::signal::Sig;

    const FREQ: ParamSpec = ParamSpec::control("freq", 0.001, 96_000.0, 100.0, "Hz").log().reject();
    const DUTY: ParamSpec = ParamSpec::control("duty", 0.0, 1.0, 0.5, "pulse width");
    const COUNT: ParamSpec = ParamSpec::integer("count", 1.0, 16.0, 8.0, "lines").reject();
    const SPAN: ParamSpec = ParamSpec::range("span", 0.0, 2.0, "seconds");

    #[test]
    fn rejects_out_of_domain_constants() {
        assert!(FREQ.validate("Osc", &(-5.0).into()).is_err());
        assert!(FREQ.validate("Osc", &0.0.into()).is_err());
        assert!(FREQ.validate("Osc", &Sample::NAN.into()).is_err());
        assert!(FREQ.validate("Osc", &440.0.into()).is_ok());
    }

    #[test]
    fn clamp_policy_accepts_and_clamps() {
        assert!(DUTY.validate("Osc", &1.5.into()).is_ok());
        assert_eq!(DUTY.clamp(1.5), 1.0);
        assert_eq!(DUTY.clamp(Sample::NAN), 0.5);
        assert!(DUTY.validate("Osc", &Sample::INFINITY.into()).is_err());
    }

    #[test]
    fn signals_pass_validation() {
        assert!(FREQ.validate("Osc", &ParamValue::signal(Sig::new(-3.0))).is_ok());
        assert!(COUNT.validate("Verb", &ParamValue::signal(Sig::new(3.0))).is_err());
    }

    #[test]
    fn integers_must_be_whole() {
        assert!(COUNT.validate("Verb", &4.0.into()).is_ok());
        assert!(COUNT.validate("Verb", &4.5.into()).is_err());
        let err = COUNT.validate("Verb", &0.0.into()).unwrap_err();
        assert!(matches!(err, ParamError::InvalidParameter { .. }));
        assert!(err.to_string().contains("whole number in [1, 16]"));
    }

    #[test]
    fn ranges_report_conflicts() {
        assert!(SPAN.validate("Verb", &(0.03, 0.08).into()).is_ok());
        let err = SPAN.validate("Verb", &(0.08, 0.03).into()).unwrap_err();
        assert!(matches!(err, ParamError::ConfigurationConflict { .. }));
        let err = SPAN.validate("Verb", &(-0.1, 0.03).into()).unwrap_err();
        assert!(matches!(err, ParamError::InvalidParameter { .. }));
    }

    #[test]
    fn wrong_kind_is_invalid() {
        assert!(SPAN.validate("Verb", &0.5.into()).is_err());
        assert!(FREQ.validate("Osc", &Spacing::ExpMin.into()).is_err());
    }

    #[test]
    fn lists_expand_and_scalars_broadcast() {
        let list: ParamValue = [100.0, 150.0, 200.0].into();
        let scalar: ParamValue = 0.5.into();
        assert_eq!(max_width([&list, &scalar]), 3);
        assert_eq!(list.at(1, 0), 150.0);
        assert_eq!(list.at(4, 0), 150.0);
        assert_eq!(scalar.at(2, 0), 0.5);
    }

    #[test]
    fn signals_resolve_per_block() {
        let ctx = RenderCtx::new(48_000.0);
        let mut value = ParamValue::signal(Sig::new(0.25));
        value.prepare(32, &ctx);
        assert_eq!(value.at(0, 31), 0.25);
        assert_eq!(value.constant_at(0), None);
    }

    #[test]
    fn scaling_applies_mul_then_add() {
        let mut block = Block::new(2, 4);
        block.fill(1.0);
        scale_output(&mut block, &[2.0, 3.0].into(), &0.5.into());
        assert_eq!(block.channel(0), &[2.5; 4]);
        assert_eq!(block.channel(1), &[3.5; 4]);
    }

    #[test]
    fn input_fader_crossfades() {
        let ctx = RenderCtx::new(48_000.0);
        let mut fader = InputFader::new(ParamValue::input(Sig::new(1.0)), 8);
        fader.prepare(4, &ctx);
        assert_eq!(fader.at(0, 0), 1.0);

        let retired = fader.replace(ParamValue::input(Sig::new(0.0)));
        assert!(retired.is_none());
        fader.prepare(16, &ctx);
        let values: Vec<Sample> = (0..16).map(|i| fader.at(0, i)).collect();
        for pair in values.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        assert!(values[0] > 0.9);
        assert_eq!(values[15], 0.0);
        fader.advance(16);
        assert!(!fader.is_fading());
    }

    #[test]
    fn replacement_mid_fade_waits_for_next_block() {
        let ctx = RenderCtx::new(48_000.0);
        let mut fader = InputFader::new(ParamValue::input(Sig::new(1.0)), 8);
        fader.prepare(4, &ctx);
        fader.replace(ParamValue::input(Sig::new(0.0)));
        fader.prepare(4, &ctx);
        let before = fader.at(0, 3);
        fader.advance(4);

        // arrives halfway through the fade from 1.0 to 0.0
        assert!(fader.replace(ParamValue::input(Sig::new(-1.0))).is_none());
        fader.prepare(4, &ctx);
        let first = fader.at(0, 0);
        assert!((first - before).abs() < 0.3, "{before} -> {first}");
        assert!(fader.at(0, 3).abs() < 1e-6);
        fader.advance(4);
        assert!(fader.is_fading());

        // the next block fades from 0.0 to -1.0
        fader.prepare(8, &ctx);
        assert!(fader.at(0, 0) < 0.0 && fader.at(0, 0) > -0.3);
        assert!((fader.at(0, 7) + 1.0).abs() < 1e-6);
        fader.advance(8);
        assert!(!fader.is_fading());
    }
}
