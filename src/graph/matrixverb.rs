use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    config::AudioConfig,
    dsp::{
        reverb::{VerbControls, VerbCore, VerbLayout, MAX_MOD_DEPTH, MIN_LINE_SAMPLES},
        spacing::{sample_span, Spacing},
        xfade::{ms_to_samples, FadeSlots},
    },
    error::{ParamError, Result},
    graph::{
        node::{
            configure_named, validate_all, Block, GraphNode, Modulatable, ParamId, RenderCtx, Retired, Stage,
        },
        param::{scale_output, InputFader, ParamSpec, ParamValue},
    },
    Sample, MAX_FREQUENCY,
};

/*
Matrix Reverb
=============

Wraps the feedback delay network of dsp::reverb as a unit:

    input ──┬────────────────────────────── × (1 − balance) ──┐
            │                                                 (+)──► L, R
            └── mono ──► [VerbCore] ── L, R ── × balance ──────┘

Parameters fall in two groups.

Continuous (liveness, depth, crossover, highdamp, balance, moddepth,
modspeed, mul, add) are read every sample (depth once per block) and may
be signals.

Structural (numechoes, echoesrange, echoesmode, matrixrange, matrixmode,
filtorder, quality) decide how the network is built. Changing one draws a
whole new core. The stager builds it off the audio thread, install swaps
it in, and the two cores run side by side for a 50 ms equal-power
crossfade:

    old core  ━━━━━━━━━╲______
    new core  _________╱━━━━━━
                       ↑ install

A core installed while a swap is still fading waits until that fade lands,
then fades in over the core that just finished fading in. Another install
during the wait replaces the waiting core, which was never heard.

Setting a structural parameter to the value it already has builds
nothing, so the output carries on bit for bit.

The output is always stereo. Dry left/right take input channels 0/1 (a
mono input feeds both); the network hears the mean of all input channels.

Example usage:
  let verb = MatrixVerb::new(&config, source)
      .with(MatrixVerbParam::Liveness, 0.9)?
      .with(MatrixVerbParam::NumEchoes, 12.0)?
      .with(MatrixVerbParam::EchoesRange, (0.02, 0.12))?;
*/

/// Crossfade between an outgoing and incoming core, and between inputs.
pub const SWAP_FADE_MS: Sample = 50.0;
pub const MAX_ECHOES: usize = 64;
/// Longest delay a line may be drawn with, in seconds.
pub const MAX_ECHO_SECS: Sample = 2.0;

static MATRIX_VERB_PARAMS: [ParamSpec; 17] = [
    ParamSpec::input("input", "audio to reverberate"),
    ParamSpec::control("liveness", 0.0, 1.0, 0.7, "feedback gain, kept below 1"),
    ParamSpec::control("depth", 0.0, 1.0, 0.7, "matrix diffusion"),
    ParamSpec::control("crossover", 0.0, MAX_FREQUENCY, 3500.0, "damping crossover in Hz").log(),
    ParamSpec::control("highdamp", 0.0, 1.0, 0.75, "loss above the crossover"),
    ParamSpec::control("balance", 0.0, 1.0, 0.25, "dry (0) to wet (1)"),
    ParamSpec::control("moddepth", 0.0, MAX_MOD_DEPTH, 0.03, "relative delay modulation"),
    ParamSpec::control("modspeed", 0.0, 100.0, 1.0, "delay modulation rate in Hz"),
    ParamSpec::integer("numechoes", 1.0, MAX_ECHOES as Sample, 8.0, "delay line count").reject(),
    ParamSpec::integer("quality", 1.0, 4.0, 4.0, "tap interpolation: none, linear, cosine, cubic"),
    ParamSpec::integer("filtorder", 0.0, 8.0, 2.0, "damping filter order: 1, 2 or 4"),
    ParamSpec::range(
        "echoesrange",
        0.0,
        MAX_ECHO_SECS,
        "delay line lengths in seconds, holding at least one length of 2 samples or more",
    ),
    ParamSpec::mode("echoesmode", "how lengths spread over echoesrange"),
    ParamSpec::range("matrixrange", 0.0, 1.0, "rotation coefficients"),
    ParamSpec::mode("matrixmode", "how coefficients spread over matrixrange"),
    ParamSpec::mul(),
    ParamSpec::add(),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixVerbParam {
    Input,
    Liveness,
    Depth,
    Crossover,
    HighDamp,
    Balance,
    ModDepth,
    ModSpeed,
    NumEchoes,
    Quality,
    FiltOrder,
    EchoesRange,
    EchoesMode,
    MatrixRange,
    MatrixMode,
    Mul,
    Add,
}

impl MatrixVerbParam {
    /// Whether changing this parameter rebuilds the network.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            MatrixVerbParam::NumEchoes
                | MatrixVerbParam::Quality
                | MatrixVerbParam::FiltOrder
                | MatrixVerbParam::EchoesRange
                | MatrixVerbParam::EchoesMode
                | MatrixVerbParam::MatrixRange
                | MatrixVerbParam::MatrixMode
        )
    }
}

impl ParamId for MatrixVerbParam {
    const ALL: &'static [Self] = &[
        MatrixVerbParam::Input,
        MatrixVerbParam::Liveness,
        MatrixVerbParam::Depth,
        MatrixVerbParam::Crossover,
        MatrixVerbParam::HighDamp,
        MatrixVerbParam::Balance,
        MatrixVerbParam::ModDepth,
        MatrixVerbParam::ModSpeed,
        MatrixVerbParam::NumEchoes,
        MatrixVerbParam::Quality,
        MatrixVerbParam::FiltOrder,
        MatrixVerbParam::EchoesRange,
        MatrixVerbParam::EchoesMode,
        MatrixVerbParam::MatrixRange,
        MatrixVerbParam::MatrixMode,
        MatrixVerbParam::Mul,
        MatrixVerbParam::Add,
    ];

    fn spec(self) -> &'static ParamSpec {
        &MATRIX_VERB_PARAMS[self as usize]
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixVerbSettings {
    pub liveness: Sample,
    pub depth: Sample,
    pub crossover: Sample,
    pub highdamp: Sample,
    pub balance: Sample,
    pub moddepth: Sample,
    pub modspeed: Sample,
    pub layout: VerbLayout,
    pub mul: Sample,
    pub add: Sample,
}

impl Default for MatrixVerbSettings {
    fn default() -> Self {
        Self {
            liveness: 0.7,
            depth: 0.7,
            crossover: 3500.0,
            highdamp: 0.75,
            balance: 0.25,
            moddepth: 0.03,
            modspeed: 1.0,
            layout: VerbLayout::default(),
            mul: 1.0,
            add: 0.0,
        }
    }
}

/// Reject an `echoesrange` that holds no whole line length at `sample_rate`.
fn check_echoes_range(range: (Sample, Sample), sample_rate: Sample) -> Result<()> {
    if sample_span(range, sample_rate, MIN_LINE_SAMPLES).is_some() {
        return Ok(());
    }
    let err = ParamError::invalid(
        MatrixVerb::UNIT,
        "echoesrange",
        format!("({}, {})", range.0, range.1),
        format!(
            "a range reaching at least {} s ({MIN_LINE_SAMPLES} samples at {sample_rate} Hz) and holding a whole sample count",
            MIN_LINE_SAMPLES as Sample / sample_rate
        ),
    );
    warn!(unit = MatrixVerb::UNIT, param = "echoesrange", %err, "rejected parameter value");
    Err(err)
}

/// Builds reverb cores for structural changes, away from the audio thread.
pub struct VerbStager {
    sample_rate: Sample,
    seed: u64,
    layout: VerbLayout,
    depth: Sample,
}

impl VerbStager {
    pub fn layout(&self) -> &VerbLayout {
        &self.layout
    }

    fn build(&self) -> Box<VerbCore> {
        Box::new(VerbCore::new(&self.layout, self.depth, self.sample_rate, self.seed))
    }
}

impl Stage<MatrixVerbParam> for VerbStager {
    type Staged = Box<VerbCore>;

    fn stage(&mut self, param: MatrixVerbParam, value: &ParamValue) -> Result<Option<Box<VerbCore>>> {
        let spec = param.spec();
        let mut layout = self.layout.clone();
        match param {
            MatrixVerbParam::Depth => {
                if let Some(depth) = value.constant_at(0) {
                    self.depth = spec.clamp(depth);
                }
                return Ok(None);
            }
            MatrixVerbParam::NumEchoes => layout.numechoes = spec.whole_at(value, 0),
            MatrixVerbParam::Quality => layout.quality = spec.whole_at(value, 0) as u32,
            MatrixVerbParam::FiltOrder => layout.filtorder = spec.whole_at(value, 0) as u32,
            MatrixVerbParam::EchoesRange => {
                if let Some(range) = value.as_range() {
                    check_echoes_range(range, self.sample_rate)?;
                    layout.echoes_range = range;
                }
            }
            MatrixVerbParam::EchoesMode => layout.echoes_mode = value.as_mode().unwrap_or(layout.echoes_mode),
            MatrixVerbParam::MatrixRange => {
                layout.matrix_range = value.as_range().unwrap_or(layout.matrix_range)
            }
            MatrixVerbParam::MatrixMode => layout.matrix_mode = value.as_mode().unwrap_or(layout.matrix_mode),
            _ => return Ok(None),
        }

        if layout == self.layout {
            return Ok(None);
        }
        self.layout = layout;
        debug!(
            unit = MatrixVerb::UNIT,
            param = param.name(),
            lines = self.layout.numechoes,
            "drawing new reverb core"
        );
        Ok(Some(self.build()))
    }
}

pub struct MatrixVerb {
    input: InputFader,
    liveness: ParamValue,
    depth: ParamValue,
    crossover: ParamValue,
    highdamp: ParamValue,
    balance: ParamValue,
    moddepth: ParamValue,
    modspeed: ParamValue,
    numechoes: ParamValue,
    quality: ParamValue,
    filtorder: ParamValue,
    echoesrange: ParamValue,
    echoesmode: ParamValue,
    matrixrange: ParamValue,
    matrixmode: ParamValue,
    mul: ParamValue,
    add: ParamValue,
    cores: FadeSlots<Box<VerbCore>>,
    sample_rate: Sample,
    seed: u64,
}

impl MatrixVerb {
    pub fn new(config: &AudioConfig, input: impl GraphNode + 'static) -> Self {
        Self::build(config, ParamValue::input(input), &MatrixVerbSettings::default())
    }

    /// Build from `settings`, rejecting values outside their domains.
    pub fn from_settings(
        config: &AudioConfig,
        input: ParamValue,
        settings: &MatrixVerbSettings,
    ) -> Result<Self> {
        let verb = Self::build(config, input, settings);
        validate_all(&verb)?;
        check_echoes_range(settings.layout.echoes_range, config.sample_rate)?;
        Ok(verb)
    }

    fn build(config: &AudioConfig, input: ParamValue, settings: &MatrixVerbSettings) -> Self {
        let layout = &settings.layout;
        let fade_len = ms_to_samples(SWAP_FADE_MS, config.sample_rate);
        let depth = settings.depth.clamp(0.0, 1.0);
        let core = Box::new(VerbCore::new(layout, depth, config.sample_rate, config.seed));
        debug!(unit = Self::UNIT, lines = core.line_count(), "created");
        Self {
            input: InputFader::new(input, fade_len),
            liveness: settings.liveness.into(),
            depth: settings.depth.into(),
            crossover: settings.crossover.into(),
            highdamp: settings.highdamp.into(),
            balance: settings.balance.into(),
            moddepth: settings.moddepth.into(),
            modspeed: settings.modspeed.into(),
            numechoes: (layout.numechoes as Sample).into(),
            quality: (layout.quality as Sample).into(),
            filtorder: (layout.filtorder as Sample).into(),
            echoesrange: layout.echoes_range.into(),
            echoesmode: layout.echoes_mode.into(),
            matrixrange: layout.matrix_range.into(),
            matrixmode: layout.matrix_mode.into(),
            mul: settings.mul.into(),
            add: settings.add.into(),
            cores: FadeSlots::new(core, fade_len),
            sample_rate: config.sample_rate,
            seed: config.seed,
        }
    }

    /// Layout the current core was drawn with.
    pub fn layout(&self) -> VerbLayout {
        let whole = |p: MatrixVerbParam, v: &ParamValue| p.spec().whole_at(v, 0);
        let defaults = VerbLayout::default();
        VerbLayout {
            numechoes: whole(MatrixVerbParam::NumEchoes, &self.numechoes),
            echoes_range: self.echoesrange.as_range().unwrap_or(defaults.echoes_range),
            echoes_mode: self.echoesmode.as_mode().unwrap_or(defaults.echoes_mode),
            matrix_range: self.matrixrange.as_range().unwrap_or(defaults.matrix_range),
            matrix_mode: self.matrixmode.as_mode().unwrap_or(defaults.matrix_mode),
            filtorder: whole(MatrixVerbParam::FiltOrder, &self.filtorder) as u32,
            quality: whole(MatrixVerbParam::Quality, &self.quality) as u32,
        }
    }

    /// Depth a freshly drawn core starts with. Signal-driven depth is
    /// applied again at the next block.
    fn staged_depth(&self) -> Sample {
        let spec = MatrixVerbParam::Depth.spec();
        spec.clamp(self.depth.constant_at(0).unwrap_or(spec.default))
    }

    pub fn line_count(&self) -> usize {
        self.cores.current().line_count()
    }

    /// Drawn line lengths in samples.
    pub fn delays(&self) -> Vec<Sample> {
        self.cores.current().delays().collect()
    }

    pub fn is_crossfading(&self) -> bool {
        self.cores.is_fading() || self.input.is_fading()
    }

    /// Slot for every parameter except the input, which lives in the fader.
    fn param_mut(&mut self, param: MatrixVerbParam) -> Option<&mut ParamValue> {
        let slot = match param {
            MatrixVerbParam::Input => return None,
            MatrixVerbParam::Liveness => &mut self.liveness,
            MatrixVerbParam::Depth => &mut self.depth,
            MatrixVerbParam::Crossover => &mut self.crossover,
            MatrixVerbParam::HighDamp => &mut self.highdamp,
            MatrixVerbParam::Balance => &mut self.balance,
            MatrixVerbParam::ModDepth => &mut self.moddepth,
            MatrixVerbParam::ModSpeed => &mut self.modspeed,
            MatrixVerbParam::NumEchoes => &mut self.numechoes,
            MatrixVerbParam::Quality => &mut self.quality,
            MatrixVerbParam::FiltOrder => &mut self.filtorder,
            MatrixVerbParam::EchoesRange => &mut self.echoesrange,
            MatrixVerbParam::EchoesMode => &mut self.echoesmode,
            MatrixVerbParam::MatrixRange => &mut self.matrixrange,
            MatrixVerbParam::MatrixMode => &mut self.matrixmode,
            MatrixVerbParam::Mul => &mut self.mul,
            MatrixVerbParam::Add => &mut self.add,
        };
        Some(slot)
    }

    pub fn set_input(&mut self, input: impl GraphNode + 'static) -> Result<()> {
        self.set(MatrixVerbParam::Input, ParamValue::input(input))
    }

    pub fn set_liveness(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(MatrixVerbParam::Liveness, value)
    }

    pub fn set_depth(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(MatrixVerbParam::Depth, value)
    }

    pub fn set_crossover(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(MatrixVerbParam::Crossover, value)
    }

    pub fn set_highdamp(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(MatrixVerbParam::HighDamp, value)
    }

    pub fn set_balance(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(MatrixVerbParam::Balance, value)
    }

    pub fn set_moddepth(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(MatrixVerbParam::ModDepth, value)
    }

    pub fn set_modspeed(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(MatrixVerbParam::ModSpeed, value)
    }

    pub fn set_numechoes(&mut self, count: usize) -> Result<()> {
        self.set(MatrixVerbParam::NumEchoes, count as Sample)
    }

    pub fn set_quality(&mut self, quality: u32) -> Result<()> {
        self.set(MatrixVerbParam::Quality, quality as Sample)
    }

    pub fn set_filtorder(&mut self, order: u32) -> Result<()> {
        self.set(MatrixVerbParam::FiltOrder, order as Sample)
    }

    pub fn set_echoesrange(&mut self, min: Sample, max: Sample) -> Result<()> {
        self.set(MatrixVerbParam::EchoesRange, (min, max))
    }

    pub fn set_echoesmode(&mut self, mode: Spacing) -> Result<()> {
        self.set(MatrixVerbParam::EchoesMode, mode)
    }

    pub fn set_matrixrange(&mut self, min: Sample, max: Sample) -> Result<()> {
        self.set(MatrixVerbParam::MatrixRange, (min, max))
    }

    pub fn set_matrixmode(&mut self, mode: Spacing) -> Result<()> {
        self.set(MatrixVerbParam::MatrixMode, mode)
    }

    pub fn set_mul(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(MatrixVerbParam::Mul, value)
    }

    pub fn set_add(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(MatrixVerbParam::Add, value)
    }
}

impl GraphNode for MatrixVerb {
    fn channels(&self) -> usize {
        2
    }

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
        out.set_channels(2);
        let frames = out.frames();
        self.input.prepare(frames, ctx);
        for value in [
            &mut self.liveness,
            &mut self.depth,
            &mut self.crossover,
            &mut self.highdamp,
            &mut self.balance,
            &mut self.moddepth,
            &mut self.modspeed,
            &mut self.mul,
            &mut self.add,
        ] {
            value.prepare(frames, ctx);
        }

        let depth = MatrixVerbParam::Depth.spec().clamp(self.depth.at(0, 0));
        for core in self.cores.iter_mut() {
            core.set_depth(depth);
        }

        let liveness = MatrixVerbParam::Liveness.spec();
        let crossover = MatrixVerbParam::Crossover.spec();
        let highdamp = MatrixVerbParam::HighDamp.spec();
        let balance = MatrixVerbParam::Balance.spec();
        let moddepth = MatrixVerbParam::ModDepth.spec();
        let modspeed = MatrixVerbParam::ModSpeed.spec();

        for i in 0..frames {
            let controls = VerbControls {
                feedback: liveness.clamp(self.liveness.at(0, i)),
                crossover: crossover.clamp(self.crossover.at(0, i)),
                highdamp: highdamp.clamp(self.highdamp.at(0, i)),
                moddepth: moddepth.clamp(self.moddepth.at(0, i)),
                modspeed: modspeed.clamp(self.modspeed.at(0, i)),
            };
            let x = self.input.mono(i);
            self.cores.promote();
            let (mut wet_l, mut wet_r) = self.cores.current_mut().process(x, &controls);
            if self.cores.fade_active() {
                let (g_old, g_new) = self.cores.next_gains();
                if let Some(previous) = self.cores.previous_mut() {
                    let (old_l, old_r) = previous.process(x, &controls);
                    wet_l = g_old * old_l + g_new * wet_l;
                    wet_r = g_old * old_r + g_new * wet_r;
                }
            }

            let bal_l = balance.clamp(self.balance.at(0, i));
            let bal_r = balance.clamp(self.balance.at(1, i));
            out.channel_mut(0)[i] = self.input.at(0, i) * (1.0 - bal_l) + wet_l * bal_l;
            out.channel_mut(1)[i] = self.input.at(1, i) * (1.0 - bal_r) + wet_r * bal_r;
        }
        self.input.advance(frames);

        scale_output(out, &self.mul, &self.add);
    }

    fn reset(&mut self) {
        for core in self.cores.iter_mut() {
            core.reset();
        }
        self.cores.finish();
        self.input.reset();
        for &param in MatrixVerbParam::ALL {
            if let Some(value) = self.param_mut(param) {
                value.reset();
            }
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        &MATRIX_VERB_PARAMS
    }

    fn configure(&mut self, name: &str, value: ParamValue) -> Result<()> {
        configure_named(self, name, value)
    }
}

impl Modulatable for MatrixVerb {
    type Param = MatrixVerbParam;
    type Stager = VerbStager;

    const UNIT: &'static str = "MatrixVerb";

    fn param(&self, param: MatrixVerbParam) -> &ParamValue {
        match param {
            MatrixVerbParam::Input => self.input.current(),
            MatrixVerbParam::Liveness => &self.liveness,
            MatrixVerbParam::Depth => &self.depth,
            MatrixVerbParam::Crossover => &self.crossover,
            MatrixVerbParam::HighDamp => &self.highdamp,
            MatrixVerbParam::Balance => &self.balance,
            MatrixVerbParam::ModDepth => &self.moddepth,
            MatrixVerbParam::ModSpeed => &self.modspeed,
            MatrixVerbParam::NumEchoes => &self.numechoes,
            MatrixVerbParam::Quality => &self.quality,
            MatrixVerbParam::FiltOrder => &self.filtorder,
            MatrixVerbParam::EchoesRange => &self.echoesrange,
            MatrixVerbParam::EchoesMode => &self.echoesmode,
            MatrixVerbParam::MatrixRange => &self.matrixrange,
            MatrixVerbParam::MatrixMode => &self.matrixmode,
            MatrixVerbParam::Mul => &self.mul,
            MatrixVerbParam::Add => &self.add,
        }
    }

    fn stager(&self) -> VerbStager {
        VerbStager {
            sample_rate: self.sample_rate,
            seed: self.seed,
            layout: self.layout(),
            depth: self.staged_depth(),
        }
    }

    fn install(
        &mut self,
        param: MatrixVerbParam,
        value: ParamValue,
        staged: Option<Box<VerbCore>>,
    ) -> Retired<Box<VerbCore>> {
        let mut retired = Retired::default();
        if let Some(core) = staged {
            retired.staged = self.cores.install(core);
        }
        retired.value = match self.param_mut(param) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => self.input.replace(value),
        };
        retired
    }
}
