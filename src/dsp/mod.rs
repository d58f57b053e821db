//! Low-level DSP primitives used by the parameterized units.
//!
//! These components are allocation-free once constructed and realtime-safe,
//! making them safe to embed directly inside unit structs. They intentionally
//! stay focused on the signal-processing math so the graph layer can handle
//! parameters, channel expansion and output scaling.

/// Fractional delay line with selectable interpolation.
pub mod delay;
/// Attack/decay/sustain/release and one-shot decay envelopes.
pub mod envelope;
/// One-pole, state-variable, ladder and DC-blocking filters.
pub mod filter;
/// Linear-phase windowed-sinc lowpass used for edge damping.
pub mod fir;
/// Harmonic comb (notch) filter with click-free delay changes.
pub mod comb;
/// Random interpolated modulators.
pub mod lfo;
/// Givens-rotation mixing matrix for the reverb feedback network.
pub mod matrix;
/// Phase accumulator shared by every oscillator.
pub mod phasor;
/// Feedback delay network core of the matrix reverb.
pub mod reverb;
/// Phase-to-amplitude waveshaping functions.
pub mod shape;
/// Prime-number delay candidates and named distribution modes.
pub mod spacing;
/// Single-cycle and band-limited wavetables.
pub mod table;
/// Equal-power crossfades.
pub mod xfade;

pub use delay::{DelayLine, Interpolation};
pub use envelope::EnvelopeState;
pub use phasor::Phasor;
pub use spacing::Spacing;
pub use table::Table;
