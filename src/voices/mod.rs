//! Composite bass voices.
//!
//! Each voice combines oscillator phases, a resonant ladder lowpass and
//! (for the acid voice) envelopes into a single modulatable unit. They share
//! the parameter contract of the graph units: typed setters, per-channel
//! lists, signal-rate modulation and `configure` by name.
//!
//! # Example
//!
//! ```ignore
//! use modcore_dsp::{voices::{FatBass, Tb303}, AudioConfig};
//!
//! let config = AudioConfig::default();
//! let mut bass = FatBass::new(&config);
//! bass.set_octave(0.5)?;
//!
//! let mut acid = Tb303::new(&config);
//! acid.set_envmod(3.0)?;
//! acid.trigger();
//! ```

mod fatbass;
mod tb303;

pub use fatbass::{FatBass, FatBassParam, FatBassSettings};
pub use tb303::{Tb303, Tb303Param, Tb303Settings};
