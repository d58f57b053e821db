//! Realtime-safe audio units: phase-accumulator oscillators, a harmonic comb
//! filter, composite bass voices and a rotating-matrix feedback reverb.
//!
//! Every unit implements [`graph::GraphNode`] (multichannel block rendering,
//! parameter introspection) and [`graph::Modulatable`] (typed setters that
//! accept a constant, a list of per-channel values, or another node as an
//! audio-rate signal).

pub mod config;
pub mod dsp;
pub mod error;
pub mod graph; // Parameterized units and the signal-graph plumbing
#[cfg(feature = "rtrb")]
pub mod remote; // Lock-free control handles
pub mod voices; // Composite assemblies

pub use config::AudioConfig;
pub use error::{ParamError, Result, SendError};

/// Numeric type every unit renders with. Selected at build time with the
/// `f64` feature.
#[cfg(not(feature = "f64"))]
pub type Sample = f32;
#[cfg(feature = "f64")]
pub type Sample = f64;

#[cfg(not(feature = "f64"))]
pub(crate) use std::f32::consts;
#[cfg(feature = "f64")]
pub(crate) use std::f64::consts;

pub const MAX_BLOCK_SIZE: usize = 2048;

/// Floor applied to every oscillator frequency so the phase increment stays
/// positive.
pub const MIN_FREQUENCY: Sample = 0.001;
pub const MAX_FREQUENCY: Sample = 96_000.0;
pub(crate) const MIN_TIME: Sample = 1.0 / 48_000.0;
