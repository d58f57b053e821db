use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{
        filter::DcBlock,
        phasor::Phasor,
        table::Table,
        xfade::{ms_to_samples, Crossfade},
    },
    error::Result,
    graph::{
        node::{configure_named, validate_all, Block, GraphNode, Modulatable, NoStage, ParamId, RenderCtx, Retired},
        param::{max_width, scale_output, ParamSpec, ParamValue},
    },
    Sample, MAX_FREQUENCY, MIN_FREQUENCY,
};

/*
Soft-Synced Oscillator
======================

Hard sync pairs two oscillators. The slave reads a wavetable at its own
frequency, and every time the master completes a cycle the slave is forced
back to the start of the table:

    master   /|  /|  /|          (period sets the pitch)
    slave    /|/|/ /|/|/ /|/|/   (restarts on every master wrap)

Sweeping the slave frequency while the master stays put produces the
characteristic tearing, formant-like sweep.

A hard reset is a discontinuity and aliases. Here there are two slave
read-heads. On each master wrap the idle head restarts at 0 and takes over,
while the head that was playing keeps running and fades out:

    head A  ━━━━━━━━━━╲___________╱━━━━━━━━━━
    head B  __________╱━━━━━━━━━━━╲__________
                      ↑ wrap      ↑ wrap

The equal-power fade lasts `xfade` milliseconds (0 to 5). Zero gives the
plain hard-sync sound. The table is read with cubic interpolation and the
sum goes through a DC blocker, since a truncated cycle rarely averages to
zero.

Example usage:
  let sync = OscSync::new(Table::harmonics(&[1.0, 0.5, 0.33]))
      .with(OscSyncParam::Master, 110.0)?
      .modulate(OscSyncParam::Slave, LfoNode::sine(0.2).range(200.0, 800.0))?;
*/

/// Longest crossfade between slave heads, in milliseconds.
pub const MAX_XFADE_MS: Sample = 5.0;

static OSC_SYNC_PARAMS: [ParamSpec; 6] = [
    ParamSpec::table("table", "single-cycle waveform read by the slave"),
    ParamSpec::control("master", MIN_FREQUENCY, MAX_FREQUENCY, 100.0, "sync frequency in Hz")
        .log()
        .reject(),
    ParamSpec::control("slave", MIN_FREQUENCY, MAX_FREQUENCY, 110.0, "table frequency in Hz")
        .log()
        .reject(),
    ParamSpec::control("xfade", 0.0, MAX_XFADE_MS, 0.5, "reset crossfade in ms"),
    ParamSpec::mul(),
    ParamSpec::add(),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscSyncParam {
    Table,
    Master,
    Slave,
    Xfade,
    Mul,
    Add,
}

impl ParamId for OscSyncParam {
    const ALL: &'static [Self] = &[
        OscSyncParam::Table,
        OscSyncParam::Master,
        OscSyncParam::Slave,
        OscSyncParam::Xfade,
        OscSyncParam::Mul,
        OscSyncParam::Add,
    ];

    fn spec(self) -> &'static ParamSpec {
        &OSC_SYNC_PARAMS[self as usize]
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscSyncSettings {
    pub master: Sample,
    pub slave: Sample,
    pub xfade: Sample,
    pub mul: Sample,
    pub add: Sample,
}

impl Default for OscSyncSettings {
    fn default() -> Self {
        Self {
            master: 100.0,
            slave: 110.0,
            xfade: 0.5,
            mul: 1.0,
            add: 0.0,
        }
    }
}

struct SyncVoice {
    master: Phasor,
    heads: [Phasor; 2],
    active: usize,
    fade: Crossfade,
    dc: DcBlock,
    resets: u64,
}

impl SyncVoice {
    fn new() -> Self {
        Self {
            master: Phasor::new(),
            heads: [Phasor::new(); 2],
            active: 0,
            fade: Crossfade::new(),
            dc: DcBlock::new(),
            resets: 0,
        }
    }

    #[inline]
    fn next_sample(&mut self, table: &Table, master: Sample, slave: Sample, xfade: usize, sr: Sample) -> Sample {
        let (g_old, g_new) = self.fade.next_gains();
        let mut y = g_new * table.read_cubic(self.heads[self.active].phase());
        if g_old > 0.0 {
            y += g_old * table.read_cubic(self.heads[1 - self.active].phase());
        }

        let inc = Phasor::increment(slave, sr);
        for head in &mut self.heads {
            head.advance_by(inc);
        }
        if self.master.advance(master, sr) {
            self.active = 1 - self.active;
            self.heads[self.active].reset(0.0);
            self.fade.start(xfade);
            self.resets += 1;
        }

        self.dc.next_sample(y)
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

pub struct OscSync {
    table: ParamValue,
    master: ParamValue,
    slave: ParamValue,
    xfade: ParamValue,
    mul: ParamValue,
    add: ParamValue,
    voices: Vec<SyncVoice>,
}

impl OscSync {
    pub fn new(table: Table) -> Self {
        Self::build(table, &OscSyncSettings::default())
    }

    /// Build from `settings`, rejecting values outside their domains.
    pub fn from_settings(table: Table, settings: &OscSyncSettings) -> Result<Self> {
        let osc = Self::build(table, settings);
        validate_all(&osc)?;
        Ok(osc)
    }

    fn build(table: Table, settings: &OscSyncSettings) -> Self {
        let mut osc = Self {
            table: table.into(),
            master: settings.master.into(),
            slave: settings.slave.into(),
            xfade: settings.xfade.into(),
            mul: settings.mul.into(),
            add: settings.add.into(),
            voices: Vec::new(),
        };
        osc.reconfigure();
        debug!(unit = Self::UNIT, channels = osc.voices.len(), "created");
        osc
    }

    fn param_mut(&mut self, param: OscSyncParam) -> &mut ParamValue {
        match param {
            OscSyncParam::Table => &mut self.table,
            OscSyncParam::Master => &mut self.master,
            OscSyncParam::Slave => &mut self.slave,
            OscSyncParam::Xfade => &mut self.xfade,
            OscSyncParam::Mul => &mut self.mul,
            OscSyncParam::Add => &mut self.add,
        }
    }

    pub fn set_table(&mut self, table: Table) -> Result<()> {
        self.set(OscSyncParam::Table, table)
    }

    pub fn set_master(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(OscSyncParam::Master, value)
    }

    pub fn set_slave(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(OscSyncParam::Slave, value)
    }

    pub fn set_xfade(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(OscSyncParam::Xfade, value)
    }

    pub fn set_mul(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(OscSyncParam::Mul, value)
    }

    pub fn set_add(&mut self, value: impl Into<ParamValue>) -> Result<()> {
        self.set(OscSyncParam::Add, value)
    }

    /// Slave resets performed so far on `channel`.
    pub fn sync_count(&self, channel: usize) -> u64 {
        self.voices.get(channel).map_or(0, |voice| voice.resets)
    }

    fn width(&self) -> usize {
        max_width([&self.master, &self.slave, &self.xfade, &self.mul, &self.add])
    }
}

impl GraphNode for OscSync {
    fn channels(&self) -> usize {
        self.voices.len().max(self.width())
    }

    fn reconfigure(&mut self) {
        let width = self.width();
        if width > self.voices.len() {
            debug!(unit = Self::UNIT, channels = width, "expanding channels");
            self.voices.resize_with(width, SyncVoice::new);
        }
    }

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
        self.reconfigure();
        out.set_channels(self.voices.len());
        let frames = out.frames();
        let Some(table) = self.table.as_table() else {
            out.fill(0.0);
            return;
        };
        self.master.prepare(frames, ctx);
        self.slave.prepare(frames, ctx);
        self.xfade.prepare(frames, ctx);
        self.mul.prepare(frames, ctx);
        self.add.prepare(frames, ctx);

        let sr = ctx.sample_rate;
        let master = OscSyncParam::Master.spec();
        let slave = OscSyncParam::Slave.spec();
        let xfade = OscSyncParam::Xfade.spec();

        for (c, voice) in self.voices.iter_mut().enumerate() {
            for (i, sample) in out.channel_mut(c).iter_mut().enumerate() {
                let fade = ms_to_samples(xfade.clamp(self.xfade.at(c, i)), sr);
                *sample = voice.next_sample(
                    table,
                    master.clamp(self.master.at(c, i)),
                    slave.clamp(self.slave.at(c, i)),
                    fade,
                    sr,
                );
            }
        }

        scale_output(out, &self.mul, &self.add);
    }

    fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        for param in OscSyncParam::ALL {
            self.param_mut(*param).reset();
        }
    }

    fn params(&self) -> &'static [ParamSpec] {
        &OSC_SYNC_PARAMS
    }

    fn configure(&mut self, name: &str, value: ParamValue) -> Result<()> {
        configure_named(self, name, value)
    }
}

impl Modulatable for OscSync {
    type Param = OscSyncParam;
    type Stager = NoStage;

    const UNIT: &'static str = "OscSync";

    fn param(&self, param: OscSyncParam) -> &ParamValue {
        match param {
            OscSyncParam::Table => &self.table,
            OscSyncParam::Master => &self.master,
            OscSyncParam::Slave => &self.slave,
            OscSyncParam::Xfade => &self.xfade,
            OscSyncParam::Mul => &self.mul,
            OscSyncParam::Add => &self.add,
        }
    }

    fn stager(&self) -> NoStage {
        NoStage
    }

    fn install(&mut self, param: OscSyncParam, value: ParamValue, _staged: Option<()>) -> Retired<()> {
        Retired::value(std::mem::replace(self.param_mut(param), value))
    }
}
