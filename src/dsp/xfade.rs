//! Equal-power crossfades.

/*
Crossfading
===========

Swapping one signal for another mid-stream clicks unless the two overlap.
The gains follow a quarter cycle of sine and cosine:

    gain
    1.0 ┤‾‾‾──╮        ╭──‾‾‾    out = cos(t·π/2)
        │      ╲      ╱          in  = sin(t·π/2)
        │       ╲    ╱
        │        ╳╳╳           out² + in² = 1 for every t
        │       ╱    ╲
    0.0 ┼──────╯      ╰──────→ t (0..1)

For uncorrelated material (an old and a new reverb tail) the summed power
stays constant through the fade. For identical material it bulges by 3 dB
at the midpoint, which is inaudible over the short windows used here.

Back-to-back changes
--------------------

A fade only ever has two sides. A third value arriving mid-fade waits in a
pending slot and takes over once the running fade lands:

    install A        install B        install C          fade lands
    cur=A prev=0     cur=A prev=0     cur=A prev=0       cur=C prev=A
    fade starts      pend=B           pend=C (B out)     next fade starts

Values are parked, never dropped, when they stop playing. Whatever a slot
held comes back from `install` when the slot is filled again, so the caller
decides where it is freed.
*/

use crate::{consts::FRAC_PI_2, Sample};

/// Gains `(outgoing, incoming)` at position `t` in [0, 1].
#[inline]
pub fn equal_power(t: Sample) -> (Sample, Sample) {
    let angle = t.clamp(0.0, 1.0) * FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// A running crossfade of a fixed number of samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crossfade {
    elapsed: usize,
    length: usize,
}

impl Crossfade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh fade lasting `length` samples (at least one).
    pub fn start(&mut self, length: usize) {
        self.elapsed = 0;
        self.length = length.max(1);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.elapsed < self.length
    }

    /// Gains for the current sample, then advance. Once finished, returns
    /// `(0, 1)`.
    #[inline]
    pub fn next_gains(&mut self) -> (Sample, Sample) {
        if !self.is_active() {
            return (0.0, 1.0);
        }
        self.elapsed += 1;
        equal_power(self.elapsed as Sample / self.length as Sample)
    }

    /// Gains `offset` samples past the current position, without advancing.
    /// `None` once that position is past the end of the fade.
    #[inline]
    pub fn gains_after(&self, offset: usize) -> Option<(Sample, Sample)> {
        let pos = self.elapsed + offset;
        (pos < self.length).then(|| equal_power((pos + 1) as Sample / self.length as Sample))
    }

    pub fn advance(&mut self, frames: usize) {
        self.elapsed = (self.elapsed + frames).min(self.length);
    }

    /// Jump to the end of the fade.
    pub fn finish(&mut self) {
        self.elapsed = self.length;
    }
}

/// A value that is swapped by crossfading, with room for one more change
/// to wait while a fade runs.
pub struct FadeSlots<T> {
    current: T,
    parked: [Option<T>; 2],
    previous: Option<usize>,
    pending: Option<usize>,
    fade: Crossfade,
    length: usize,
}

impl<T> FadeSlots<T> {
    pub fn new(value: T, length: usize) -> Self {
        Self {
            current: value,
            parked: [None, None],
            previous: None,
            pending: None,
            fade: Crossfade::new(),
            length: length.max(1),
        }
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.current
    }

    /// The value fading out, while a fade runs.
    pub fn previous(&self) -> Option<&T> {
        if !self.fade.is_active() {
            return None;
        }
        self.parked[self.previous?].as_ref()
    }

    pub fn previous_mut(&mut self) -> Option<&mut T> {
        if !self.fade.is_active() {
            return None;
        }
        self.parked[self.previous?].as_mut()
    }

    /// True while a fade runs or a value waits for one.
    pub fn is_fading(&self) -> bool {
        self.fade.is_active() || self.pending.is_some()
    }

    #[inline]
    pub fn fade_active(&self) -> bool {
        self.fade.is_active()
    }

    /// Fade to `value` now, or queue it behind the running fade. Returns
    /// whatever the filled slot held before.
    pub fn install(&mut self, value: T) -> Option<T> {
        if let Some(slot) = self.pending {
            // the waiting value was never heard
            return self.parked[slot].replace(value);
        }
        if self.fade.is_active() {
            let slot = if self.previous == Some(0) { 1 } else { 0 };
            self.pending = Some(slot);
            return self.parked[slot].replace(value);
        }
        let slot = self.previous.unwrap_or(0);
        let old = std::mem::replace(&mut self.current, value);
        self.previous = Some(slot);
        self.fade.start(self.length);
        self.parked[slot].replace(old)
    }

    /// Start fading to the waiting value once the running fade has landed.
    pub fn promote(&mut self) -> bool {
        if self.fade.is_active() {
            return false;
        }
        let Some(slot) = self.pending.take() else {
            return false;
        };
        let Some(next) = self.parked[slot].take() else {
            return false;
        };
        let old = std::mem::replace(&mut self.current, next);
        self.parked[slot] = Some(old);
        self.previous = Some(slot);
        self.fade.start(self.length);
        true
    }

    #[inline]
    pub fn next_gains(&mut self) -> (Sample, Sample) {
        self.fade.next_gains()
    }

    #[inline]
    pub fn gains_after(&self, offset: usize) -> Option<(Sample, Sample)> {
        self.fade.gains_after(offset)
    }

    pub fn advance(&mut self, frames: usize) {
        self.fade.advance(frames);
    }

    pub fn finish(&mut self) {
        self.fade.finish();
    }

    /// Every value held, playing or parked.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        std::iter::once(&mut self.current).chain(self.parked.iter_mut().flatten())
    }
}

/// Convert milliseconds to a whole number of samples.
#[inline]
pub fn ms_to_samples(ms: Sample, sample_rate: Sample) -> usize {
    (ms.max(0.0) * 0.001 * sample_rate).round() as usize
}
