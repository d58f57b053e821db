//! Phase-to-amplitude waveshaping.

/*
Waveshaping
===========

The oscillators share one phase accumulator and differ only in the function
that maps phase (0..1) to amplitude:

  pulse      phase < duty  →  +1, otherwise -1

             +1 ┌────┐    ┌────┐
                │    │    │    │
             -1 ┘    └────┘    └──
                 duty

  morph      a ramp that rises for `shape` of the cycle and falls for the
             rest. shape = 0 is a falling saw, 0.5 a triangle, 1 a rising
             ramp. The shape is kept inside [0.0001, 0.9999] so neither
             segment divides by zero.

                shape=0      shape=0.5     shape=1
                ╲  ╲  ╲      ╱╲  ╱╲        ╱  ╱  ╱

Because the shape functions read the current phase directly, changing duty
or shape re-maps the waveform on the very next sample instead of restarting
the cycle.
*/

use crate::Sample;

pub const MIN_MORPH: Sample = 0.0001;
pub const MAX_MORPH: Sample = 0.9999;

/// Bipolar pulse: +1 while `phase < duty`, -1 otherwise.
#[inline]
pub fn pulse(phase: Sample, duty: Sample) -> Sample {
    if phase < duty {
        1.0
    } else {
        -1.0
    }
}

/// Unipolar pulse: 1 while `phase < duty`, 0 otherwise.
#[inline]
pub fn unipolar_pulse(phase: Sample, duty: Sample) -> Sample {
    if phase < duty {
        1.0
    } else {
        0.0
    }
}

/// Bipolar square at 50% duty.
#[inline]
pub fn square(phase: Sample) -> Sample {
    pulse(phase, 0.5)
}

/// Saw → triangle → ramp morph, bipolar.
#[inline]
pub fn morph(phase: Sample, shape: Sample) -> Sample {
    let shape = shape.clamp(MIN_MORPH, MAX_MORPH);
    let unipolar = if phase < shape {
        phase / shape
    } else {
        (1.0 - phase) / (1.0 - shape)
    };
    unipolar_to_bipolar(unipolar)
}

/// Convert unipolar signal (0.0 to 1.0) to bipolar (-1.0 to +1.0).
#[inline]
pub fn unipolar_to_bipolar(unipolar: Sample) -> Sample {
    (unipolar * 2.0) - 1.0
}

#[inline]
pub fn lerp(a: Sample, b: Sample, t: Sample) -> Sample {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_respects_duty() {
        assert_eq!(pulse(0.1, 0.25), 1.0);
        assert_eq!(pulse(0.3, 0.25), -1.0);
        assert_eq!(unipolar_pulse(0.3, 0.25), 0.0);
    }

    #[test]
    fn morph_endpoints() {
        // shape 0: falling saw, starts at the top
        assert!((morph(0.001, 0.0) - 1.0).abs() < 1e-2);
        assert!((morph(0.5, 0.0) - 0.0).abs() < 1e-3);
        // shape 0.5: triangle peaking mid-cycle
        assert!((morph(0.5, 0.5) - 1.0).abs() < 1e-6);
        assert!((morph(0.25, 0.5) - 0.0).abs() < 1e-6);
        // shape 1: rising ramp
        assert!((morph(0.5, 1.0) - 0.0).abs() < 1e-3);
        assert!(morph(0.99, 1.0) > 0.97);
    }

    #[test]
    fn morph_stays_bounded() {
        for i in 0..100 {
            let phase = i as Sample / 100.0;
            for &shape in &[-1.0, 0.0, 0.3, 0.7, 1.0, 2.0] {
                let y = morph(phase, shape);
                assert!((-1.0..=1.0).contains(&y), "morph({phase}, {shape}) = {y}");
            }
        }
    }
}
