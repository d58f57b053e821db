use tracing::{debug, warn};

use crate::{
    error::{ParamError, Result},
    graph::param::{ParamSpec, ParamValue},
    Sample, MAX_BLOCK_SIZE,
};

/// Context passed to graph nodes during rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCtx {
    pub sample_rate: Sample,
}

impl RenderCtx {
    pub fn new(sample_rate: Sample) -> Self {
        Self { sample_rate }
    }
}

/// Multichannel block of samples.
///
/// Storage is channel-major with a fixed stride of `MAX_BLOCK_SIZE`, so
/// changing the frame count never reallocates. Only growing the channel count
/// past what was allocated before does.
#[derive(Debug, Clone)]
pub struct Block {
    data: Vec<Sample>,
    channels: usize,
    frames: usize,
}

impl Block {
    pub fn new(channels: usize, frames: usize) -> Self {
        let channels = channels.max(1);
        Self {
            data: vec![0.0; channels * MAX_BLOCK_SIZE],
            channels,
            frames: frames.min(MAX_BLOCK_SIZE),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Set the frame count (clamped to `MAX_BLOCK_SIZE`).
    pub fn set_frames(&mut self, frames: usize) {
        self.frames = frames.min(MAX_BLOCK_SIZE);
    }

    /// Set the channel count. Allocates only when growing past the largest
    /// count this block has held.
    pub fn set_channels(&mut self, channels: usize) {
        let channels = channels.max(1);
        let needed = channels * MAX_BLOCK_SIZE;
        if self.data.len() < needed {
            self.data.resize(needed, 0.0);
        }
        self.channels = channels;
    }

    #[inline]
    pub fn channel(&self, channel: usize) -> &[Sample] {
        let start = channel * MAX_BLOCK_SIZE;
        &self.data[start..start + self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, channel: usize) -> &mut [Sample] {
        let start = channel * MAX_BLOCK_SIZE;
        &mut self.data[start..start + self.frames]
    }

    /// Sample `i` of `channel`, wrapping the channel index.
    #[inline]
    pub fn get(&self, channel: usize, i: usize) -> Sample {
        self.data[(channel % self.channels) * MAX_BLOCK_SIZE + i]
    }

    /// Mean of every channel at frame `i`.
    #[inline]
    pub fn mono(&self, i: usize) -> Sample {
        let sum: Sample = (0..self.channels).map(|c| self.get(c, i)).sum();
        sum / self.channels as Sample
    }

    pub fn fill(&mut self, value: Sample) {
        for c in 0..self.channels {
            self.channel_mut(c).fill(value);
        }
    }
}

/// Core trait for audio processing graph nodes.
///
/// A node renders `out.frames()` frames into every channel of `out`, setting
/// `out`'s channel count to its own first.
pub trait GraphNode: Send {
    /// Output channel count after any pending expansion.
    fn channels(&self) -> usize;

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx);

    /// Resolve a pending channel expansion now instead of at the next render.
    fn reconfigure(&mut self) {}

    /// Silence the output and clear all internal state.
    fn reset(&mut self);

    /// Every parameter this node accepts, in declaration order.
    fn params(&self) -> &'static [ParamSpec] {
        &[]
    }

    fn param_spec(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params().iter().find(|spec| spec.name == name)
    }

    /// Set a parameter by name.
    fn configure(&mut self, name: &str, _value: ParamValue) -> Result<()> {
        Err(ParamError::invalid("node", name, "<any>", "a known parameter name"))
    }
}

/// Allow boxed graph nodes to be used as graph nodes (for dynamic dispatch).
impl GraphNode for Box<dyn GraphNode> {
    fn channels(&self) -> usize {
        (**self).channels()
    }

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
        (**self).render_block(out, ctx)
    }

    fn reconfigure(&mut self) {
        (**self).reconfigure()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn params(&self) -> &'static [ParamSpec] {
        (**self).params()
    }

    fn configure(&mut self, name: &str, value: ParamValue) -> Result<()> {
        (**self).configure(name, value)
    }
}

/// Typed parameter identifier of one unit.
pub trait ParamId: Copy + Send + std::fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn spec(self) -> &'static ParamSpec;

    fn name(self) -> &'static str {
        self.spec().name
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }
}

/// Prepares heavy state for a parameter change away from the audio thread.
///
/// The stager mirrors whatever settings it needs to build that state, so it
/// can live on a control thread while the unit itself renders elsewhere.
pub trait Stage<P>: Send {
    type Staged: Send;

    /// Build the state `value` needs, or `None` when nothing has to change.
    fn stage(&mut self, param: P, value: &ParamValue) -> Result<Option<Self::Staged>>;
}

/// Stager for units whose parameters need no preparation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStage;

impl<P> Stage<P> for NoStage {
    type Staged = ();

    fn stage(&mut self, _param: P, _value: &ParamValue) -> Result<Option<()>> {
        Ok(None)
    }
}

/// Values an install displaced. Dropping it frees them, so it should be
/// dropped off the audio thread.
pub struct Retired<S> {
    pub value: Option<ParamValue>,
    pub staged: Option<S>,
}

impl<S> Retired<S> {
    pub fn value(value: ParamValue) -> Self {
        Self {
            value: Some(value),
            staged: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.staged.is_none()
    }
}

impl<S> Default for Retired<S> {
    fn default() -> Self {
        Self {
            value: None,
            staged: None,
        }
    }
}

/// Trait for nodes whose parameters accept constants, per-channel lists or
/// audio-rate signals.
pub trait Modulatable: GraphNode + Sized {
    type Param: ParamId;
    type Stager: Stage<Self::Param> + 'static;

    /// Name used in error messages and logs.
    const UNIT: &'static str;

    /// Value currently installed for `param`.
    fn param(&self, param: Self::Param) -> &ParamValue;

    /// A stager primed with this unit's current settings.
    fn stager(&self) -> Self::Stager;

    /// Swap in a validated value (and its staged state). Realtime-safe: never
    /// allocates or frees; everything displaced comes back in `Retired`.
    fn install(
        &mut self,
        param: Self::Param,
        value: ParamValue,
        staged: Option<<Self::Stager as Stage<Self::Param>>::Staged>,
    ) -> Retired<<Self::Stager as Stage<Self::Param>>::Staged>;

    /// Validate, stage and install `value` in one go.
    fn set(&mut self, param: Self::Param, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        validate::<Self>(param, &value)?;
        let staged = self.stager().stage(param, &value)?;
        let retired = self.install(param, value, staged);
        drop(retired);
        Ok(())
    }
}

/// Check `value` against `param`'s domain, logging rejections.
pub fn validate<M: Modulatable>(param: M::Param, value: &ParamValue) -> Result<()> {
    param.spec().validate(M::UNIT, value).inspect_err(|err| {
        warn!(unit = M::UNIT, param = param.name(), %err, "rejected parameter value");
    })
}

/// Check every installed value, for units built from settings.
pub fn validate_all<M: Modulatable>(unit: &M) -> Result<()> {
    M::Param::ALL
        .iter()
        .try_for_each(|&param| validate::<M>(param, unit.param(param)))
}

/// Shared body of `GraphNode::configure` for modulatable units.
pub fn configure_named<M: Modulatable>(unit: &mut M, name: &str, value: ParamValue) -> Result<()> {
    let Some(param) = M::Param::from_name(name) else {
        let known: Vec<&str> = M::Param::ALL.iter().map(|p| p.name()).collect();
        return Err(ParamError::invalid(
            M::UNIT,
            name,
            "<unknown>",
            format!("one of {}", known.join(", ")),
        ));
    };
    debug!(unit = M::UNIT, param = name, "configure");
    unit.set(param, value)
}
