use rtrb::{Consumer, Producer, PushError, RingBuffer};
use tracing::{debug, warn};

use crate::{
    error::SendError,
    graph::{
        node::{validate, Block, GraphNode, Modulatable, RenderCtx, Retired, Stage},
        param::{ParamSpec, ParamValue},
    },
    Result,
};

/*
Remote Control
==============

Changes a unit from a control thread while it renders on the audio thread.

    control thread                          audio thread
    ──────────────                          ────────────
    UnitHandle::set                         Remote::render_block
      validate (errors return here)           drain commands ──► install
      stage (build reverb cores etc.)         render unit
      push ──────── commands ─────────────►
    UnitHandle::collect ◄──── retired ──────  push displaced values

The audio side never allocates or frees for a change: heavy state arrives
ready-built, and whatever an install displaces travels back to be dropped
by `collect()`. The handle drains the retired queue before each push and
both queues share one capacity, so the retired queue always has room.

Example usage:
  let (mut handle, remote) = remote::split(MatrixVerb::new(&config, osc), 64);
  // move `remote` into the audio callback
  handle.set(MatrixVerbParam::NumEchoes, 12.0)?;
*/

type Staged<M> = <<M as Modulatable>::Stager as Stage<<M as Modulatable>::Param>>::Staged;

/// Message from a handle to its remote unit.
pub enum Command<M: Modulatable> {
    Set {
        param: M::Param,
        value: ParamValue,
        staged: Option<Staged<M>>,
    },
    /// Flush all state and output silence.
    Stop,
    /// Resume after a stop.
    Play,
}

/// Split `unit` into a control handle and the node that renders it.
///
/// `capacity` bounds how many changes may be in flight at once.
pub fn split<M>(unit: M, capacity: usize) -> (UnitHandle<M>, Remote<M>)
where
    M: Modulatable + 'static,
{
    let capacity = capacity.max(1);
    let (commands, inbox) = RingBuffer::new(capacity);
    let (trash, retired) = RingBuffer::new(capacity);
    debug!(unit = M::UNIT, capacity, "split for remote control");

    let handle = UnitHandle {
        stager: unit.stager(),
        commands,
        retired,
        capacity,
    };
    let remote = Remote {
        unit,
        inbox,
        trash,
        stopped: false,
    };
    (handle, remote)
}

/// Control-thread side of a remote unit.
pub struct UnitHandle<M: Modulatable> {
    stager: M::Stager,
    commands: Producer<Command<M>>,
    retired: Consumer<Retired<Staged<M>>>,
    capacity: usize,
}

impl<M: Modulatable> UnitHandle<M> {
    /// Validate and stage `value`, then queue it for the audio thread.
    pub fn set(&mut self, param: M::Param, value: impl Into<ParamValue>) -> std::result::Result<(), SendError> {
        let value = value.into();
        validate::<M>(param, &value)?;
        self.collect();
        // checked before staging so the stager never runs ahead of the unit
        if self.commands.is_full() {
            return Err(SendError::Full);
        }
        let staged = self.stager.stage(param, &value)?;
        self.push(Command::Set { param, value, staged })
    }

    pub fn stop(&mut self) -> std::result::Result<(), SendError> {
        self.push(Command::Stop)
    }

    pub fn play(&mut self) -> std::result::Result<(), SendError> {
        self.push(Command::Play)
    }

    /// Drop everything the audio thread has retired. Returns how many
    /// installs were cleaned up.
    pub fn collect(&mut self) -> usize {
        let mut count = 0;
        while let Ok(retired) = self.retired.pop() {
            drop(retired);
            count += 1;
        }
        count
    }

    /// Changes queued but not yet picked up by the audio thread.
    pub fn pending(&self) -> usize {
        self.capacity - self.commands.slots()
    }

    fn push(&mut self, command: Command<M>) -> std::result::Result<(), SendError> {
        self.commands.push(command).map_err(|_| SendError::Full)
    }
}

/// Audio-thread side of a remote unit.
pub struct Remote<M: Modulatable> {
    unit: M,
    inbox: Consumer<Command<M>>,
    trash: Producer<Retired<Staged<M>>>,
    stopped: bool,
}

impl<M: Modulatable> Remote<M> {
    pub fn unit(&self) -> &M {
        &self.unit
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Apply every queued command.
    fn drain(&mut self) {
        while let Ok(command) = self.inbox.pop() {
            match command {
                Command::Set { param, value, staged } => {
                    let retired = self.unit.install(param, value, staged);
                    if retired.is_empty() {
                        continue;
                    }
                    // the shared capacity leaves room, so this only fires if
                    // that invariant is broken
                    if let Err(PushError::Full(retired)) = self.trash.push(retired) {
                        warn!(unit = M::UNIT, "retired queue full, freeing on the audio thread");
                        drop(retired);
                    }
                }
                Command::Stop => {
                    self.unit.reset();
                    self.stopped = true;
                }
                Command::Play => self.stopped = false,
            }
        }
    }
}

impl<M: Modulatable> GraphNode for Remote<M> {
    fn channels(&self) -> usize {
        self.unit.channels()
    }

    fn render_block(&mut self, out: &mut Block, ctx: &RenderCtx) {
        self.drain();
        if self.stopped {
            out.set_channels(self.unit.channels());
            out.fill(0.0);
        } else {
            self.unit.render_block(out, ctx);
        }
    }

    fn reconfigure(&mut self) {
        self.unit.reconfigure();
    }

    fn reset(&mut self) {
        self.unit.reset();
    }

    fn params(&self) -> &'static [ParamSpec] {
        self.unit.params()
    }

    fn configure(&mut self, name: &str, value: ParamValue) -> Result<()> {
        self.unit.configure(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AudioConfig,
        graph::{
            matrixverb::{MatrixVerb, MatrixVerbParam},
            pwm::{Pwm, PwmParam},
            signal::Sig,
        },
        ParamError, Sample,
    };

    #[test]
    fn changes_land_at_next_block() {
        let (mut handle, mut remote) = split(Pwm::new(), 8);
        handle.set(PwmParam::Duty, 0.25).unwrap();
        assert_eq!(handle.pending(), 1);
        assert_eq!(remote.unit().param(PwmParam::Duty).constant_at(0), Some(0.5));

        let mut block = Block::new(1, 64);
        remote.render_block(&mut block, &RenderCtx::new(48_000.0));
        assert_eq!(remote.unit().param(PwmParam::Duty).constant_at(0), Some(0.25));
        assert_eq!(handle.pending(), 0);
        assert_eq!(handle.collect(), 1);
    }

    #[test]
    fn invalid_values_fail_on_control_thread() {
        let (mut handle, _remote) = split(Pwm::new(), 8);
        let err = handle.set(PwmParam::Freq, -1.0).unwrap_err();
        assert!(matches!(err, SendError::Param(ParamError::InvalidParameter { .. })));
        assert_eq!(handle.pending(), 0);
    }

    #[test]
    fn every_retired_value_reaches_the_control_thread() {
        let (mut handle, mut remote) = split(Pwm::new(), 2);
        let ctx = RenderCtx::new(48_000.0);
        let mut block = Block::new(1, 64);
        let mut collected = 0;
        for round in 0..5 {
            collected += handle.collect();
            handle.set(PwmParam::Duty, 0.1 * (round + 1) as Sample).unwrap();
            handle.set(PwmParam::Freq, 200.0 + round as Sample).unwrap();
            remote.render_block(&mut block, &ctx);
        }
        collected += handle.collect();
        assert_eq!(collected, 10);
    }

    #[test]
    fn full_queue_is_reported() {
        let (mut handle, _remote) = split(Pwm::new(), 2);
        handle.set(PwmParam::Duty, 0.1).unwrap();
        handle.set(PwmParam::Duty, 0.2).unwrap();
        assert_eq!(handle.set(PwmParam::Duty, 0.3), Err(SendError::Full));
    }

    #[test]
    fn reverb_core_is_built_off_thread() {
        let config = AudioConfig::default();
        let (mut handle, mut remote) = split(MatrixVerb::new(&config, Sig::new(0.0)), 4);
        handle.set(MatrixVerbParam::NumEchoes, 4.0).unwrap();
        let mut block = Block::new(2, 128);
        remote.render_block(&mut block, &config.ctx());
        assert_eq!(remote.unit().line_count(), 4);
        assert!(remote.unit().is_crossfading());
    }

    #[test]
    fn stop_silences_until_play() {
        let (mut handle, mut remote) = split(Pwm::new(), 4);
        let ctx = RenderCtx::new(48_000.0);
        let mut block = Block::new(1, 64);
        handle.stop().unwrap();
        remote.render_block(&mut block, &ctx);
        assert!(remote.is_stopped());
        assert!(block.channel(0).iter().all(|&s| s == 0.0));

        handle.play().unwrap();
        remote.render_block(&mut block, &ctx);
        assert!(block.channel(0).iter().any(|&s| s != 0.0));
    }
}
