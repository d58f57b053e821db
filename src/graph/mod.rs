//! Parameterized audio units and the plumbing they share.
//!
//! Units wrap the low-level DSP primitives with the parameter contract:
//! every parameter accepts a constant, a per-channel list or another node as
//! an audio-rate signal, and lists or multichannel signals expand the unit to
//! that many independent channels. The `extensions` module adds fluent
//! helpers so units can be configured with a chainable API.

/// Fluent combinators (`.with()`, `.modulate()`, `.boxed()`).
pub mod extensions;
/// Band-limited saw/square/triangle oscillator.
pub mod blosc;
/// Harmonic comb filter with a replaceable input.
pub mod harmofilter;
/// Rotating-matrix feedback delay reverb.
pub mod matrixverb;
/// Core traits shared by all units.
pub mod node;
/// Hard-synced wavetable oscillator.
pub mod oscsync;
/// Parameter domains and values.
pub mod param;
/// Pulse oscillator with duty control.
pub mod pwm;
/// Constant and LFO nodes for driving parameters.
pub mod signal;
/// Saw/triangle/ramp morphing oscillator.
pub mod vco;

pub use blosc::{BLOsc, BLOscParam, BLOscSettings};
pub use harmofilter::{HarmoFilter, HarmoFilterParam, HarmoFilterSettings};
pub use matrixverb::{MatrixVerb, MatrixVerbParam, MatrixVerbSettings};
pub use node::{Block, GraphNode, Modulatable, ParamId, RenderCtx};
pub use oscsync::{OscSync, OscSyncParam, OscSyncSettings};
pub use param::{Control, ParamKind, ParamSpec, ParamValue};
pub use pwm::{Pwm, PwmParam, PwmSettings};
pub use signal::{LfoNode, Sig};
pub use vco::{Vco, VcoParam, VcoSettings};

use crate::{Sample, MAX_BLOCK_SIZE};

/// Render `frames` frames of `node` offline, one `Vec` per output channel.
///
/// Blocks are at most [`MAX_BLOCK_SIZE`] frames. A node that grows its
/// channel count mid-render gets the new channels zero-filled for the
/// frames before the growth.
pub fn bounce(node: &mut impl GraphNode, frames: usize, ctx: &RenderCtx) -> Vec<Vec<Sample>> {
    let mut block = Block::new(node.channels().max(1), 0);
    let mut channels: Vec<Vec<Sample>> = Vec::new();
    let mut done = 0;
    while done < frames {
        let n = (frames - done).min(MAX_BLOCK_SIZE);
        block.set_frames(n);
        node.render_block(&mut block, ctx);
        while channels.len() < block.channels() {
            channels.push(vec![0.0; done]);
        }
        for (c, samples) in channels.iter_mut().enumerate() {
            samples.extend_from_slice(block.channel(c % block.channels()));
        }
        done += n;
    }
    channels
}
