//! Feed-forward comb that notches every Nth harmonic.

/*
Harmonic Comb
=============

Subtracting a delayed copy of a signal cancels every frequency whose period
divides the delay:

    y[n] = 0.5 · (x[n] − x[n − D])

    |H(f)| = |sin(π f D / sr)|

    gain
    1 ┤ ╭─╮   ╭─╮   ╭─╮
      │╱   ╲ ╱   ╲ ╱   ╲
    0 ┼─────●─────●─────●──→ f
           sr/D  2sr/D  3sr/D

With D = sr / (freq · harm) the nulls land on harmonics harm, 2·harm, 3·harm
... of `freq`. For harm = 2 the odd harmonics sit exactly on the peaks, so
they pass at unity gain while every even harmonic vanishes.

D is fractional and read with cubic interpolation, so slow sweeps of `freq`
glide smoothly. A sudden jump (a new harm, a stepped freq) would tear the
waveform; instead the old tap keeps playing and is crossfaded into the new
one over a short window. While that fade runs the incoming tap only glides;
a further jump waits and starts its own fade once the first one lands.
*/

use crate::{
    dsp::{
        delay::{DelayLine, Interpolation},
        xfade::Crossfade,
    },
    Sample,
};

/// Delay changes larger than this many samples are crossfaded.
const JUMP_THRESHOLD: Sample = 4.0;
pub const JUMP_FADE_SAMPLES: usize = 256;

pub struct HarmonicComb {
    line: DelayLine,
    delay: Sample,
    old_delay: Sample,
    fade: Crossfade,
}

impl HarmonicComb {
    pub fn new(max_delay: usize) -> Self {
        Self {
            line: DelayLine::new(max_delay),
            delay: Sample::NAN,
            old_delay: 0.0,
            fade: Crossfade::new(),
        }
    }

    /// Delay in samples that notches harmonic `harm` of `freq`.
    #[inline]
    pub fn delay_for(freq: Sample, harm: Sample, sample_rate: Sample) -> Sample {
        sample_rate / (freq * harm)
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_active()
    }

    #[inline]
    pub fn next_sample(&mut self, x: Sample, delay: Sample) -> Sample {
        let delay = delay.clamp(Interpolation::Cubic.min_delay(), self.line.max_delay());
        let jump = (delay - self.delay).abs() > JUMP_THRESHOLD;
        if self.delay.is_nan() || !jump {
            self.delay = delay;
        } else if !self.fade.is_active() {
            self.old_delay = self.delay;
            self.fade.start(JUMP_FADE_SAMPLES);
            self.delay = delay;
        }

        let tap = if self.fade.is_active() {
            let (g_old, g_new) = self.fade.next_gains();
            g_old * self.line.read(self.old_delay, Interpolation::Cubic)
                + g_new * self.line.read(self.delay, Interpolation::Cubic)
        } else {
            self.line.read(self.delay, Interpolation::Cubic)
        };
        self.line.write(x);
        0.5 * (x - tap)
    }

    pub fn reset(&mut self) {
        self.line.reset();
        self.delay = Sample::NAN;
        self.fade.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::TAU;

    const SR: Sample = 48_000.0;

    fn steady_peak(comb: &mut HarmonicComb, freq: Sample, delay: Sample) -> Sample {
        let mut peak: Sample = 0.0;
        for n in 0..4_800 {
            let x = (TAU * freq * n as Sample / SR).sin();
            let y = comb.next_sample(x, delay);
            if n > 2_400 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn notches_even_harmonics_passes_odd() {
        // freq 200, harm 2 → D = 120 samples
        let d = HarmonicComb::delay_for(200.0, 2.0, SR);
        assert!((d - 120.0).abs() < 1e-3);

        let odd = steady_peak(&mut HarmonicComb::new(4_800), 600.0, d);
        let even = steady_peak(&mut HarmonicComb::new(4_800), 800.0, d);
        assert!((odd - 1.0).abs() < 0.01, "odd harmonic gain {odd}");
        assert!(even < 0.01, "even harmonic leak {even}");
    }

    #[test]
    fn delay_jump_is_crossfaded() {
        let mut comb = HarmonicComb::new(4_800);
        for _ in 0..1_000 {
            comb.next_sample(0.5, 120.0);
        }
        comb.next_sample(0.5, 40.0);
        assert!(comb.is_fading());

        // constant input: both taps agree, so the output stays near zero
        let mut worst: Sample = 0.0;
        for _ in 0..JUMP_FADE_SAMPLES {
            worst = worst.max(comb.next_sample(0.5, 40.0).abs());
        }
        assert!(!comb.is_fading());
        assert!(worst < 0.11, "jump leaked {worst}");
    }

    #[test]
    fn jump_during_fade_waits_for_it() {
        let sine = |n: usize| (TAU * 330.0 * n as Sample / SR).sin();
        let mut twice = HarmonicComb::new(4_800);
        let mut once = HarmonicComb::new(4_800);
        let mut n = 0;
        for _ in 0..1_000 {
            twice.next_sample(sine(n), 120.0);
            once.next_sample(sine(n), 120.0);
            n += 1;
        }
        for _ in 0..100 {
            twice.next_sample(sine(n), 40.0);
            once.next_sample(sine(n), 40.0);
            n += 1;
        }

        // the first fade finishes as if the second jump never came
        for _ in 100..JUMP_FADE_SAMPLES {
            assert_eq!(twice.next_sample(sine(n), 200.0), once.next_sample(sine(n), 40.0));
            n += 1;
        }
        assert!(!once.is_fading());

        // then the held jump gets a fade of its own
        let mut last = once.next_sample(sine(n), 40.0);
        let first = twice.next_sample(sine(n), 200.0);
        assert!(twice.is_fading());
        assert!((first - last).abs() < 0.05, "{last} -> {first}");
        for _ in 1..JUMP_FADE_SAMPLES {
            n += 1;
            let y = twice.next_sample(sine(n), 200.0);
            assert!((y - last).abs() < 0.1, "step {last} -> {y}");
            last = y;
        }
        assert!(!twice.is_fading());
    }

    #[test]
    fn small_moves_do_not_fade() {
        let mut comb = HarmonicComb::new(4_800);
        comb.next_sample(0.0, 100.0);
        comb.next_sample(0.0, 101.5);
        assert!(!comb.is_fading());
    }
}
