use crate::{
    consts::{FRAC_1_SQRT_2, PI, TAU},
    Sample,
};

/*
| filter      | order | slope     | used by                                   |
| ----------- | ----- | --------- | ----------------------------------------- |
| OnePole     | 1     | 6 dB/oct  | reverb input pre-filter, filtorder 1      |
| SVFilter    | 2     | 12 dB/oct | reverb damping (Butterworth), filtorder 2 |
| Ladder      | 4     | 24 dB/oct | FatBass, TB303, reverb filtorder 4        |
| DcBlock     | 1     | highpass  | OscSync and TB303 outputs                 |

All of them are topology-preserving (trapezoidal) designs except the DC
blocker, so their cutoff can move every sample without blowing up. Cutoffs
are kept below 0.49 * sample_rate where the tan() prewarp stays finite.
*/

const MAX_CUTOFF_RATIO: Sample = 0.49;
const MIN_CUTOFF: Sample = 1.0;

/// Clamp a cutoff into the range every filter here can realize.
#[inline]
pub fn clamp_cutoff(cutoff_hz: Sample, sample_rate: Sample) -> Sample {
    if cutoff_hz.is_nan() {
        return MIN_CUTOFF;
    }
    cutoff_hz.clamp(MIN_CUTOFF, sample_rate * MAX_CUTOFF_RATIO)
}

/// Prewarped integrator gain for a trapezoidal filter at `cutoff_hz`.
#[inline]
pub fn compute_g(cutoff_hz: Sample, sample_rate: Sample) -> Sample {
    let wd = TAU * clamp_cutoff(cutoff_hz, sample_rate);
    let wa = (2.0 * sample_rate) * (wd / (2.0 * sample_rate)).tan();
    wa / (2.0 * sample_rate)
}

/// First-order lowpass (6 dB/oct).
#[derive(Debug, Clone, Default)]
pub struct OnePole {
    state: Sample,
    g: Sample,
    cutoff_hz: Sample,
}

impl OnePole {
    pub fn new(cutoff_hz: Sample, sample_rate: Sample) -> Self {
        let mut filter = Self::default();
        filter.set_cutoff(cutoff_hz, sample_rate);
        filter
    }

    /// Recomputes the coefficient only when the cutoff actually moved.
    #[inline]
    pub fn set_cutoff(&mut self, cutoff_hz: Sample, sample_rate: Sample) {
        if cutoff_hz != self.cutoff_hz || self.g == 0.0 {
            self.cutoff_hz = cutoff_hz;
            let g = compute_g(cutoff_hz, sample_rate);
            self.g = g / (1.0 + g);
        }
    }

    #[inline]
    pub fn next_sample(&mut self, sample: Sample) -> Sample {
        let v = self.g * (sample - self.state);
        let lp = v + self.state;
        self.state = lp + v;
        lp
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

pub struct FilterOutputs {
    pub lowpass: Sample,
    pub bandpass: Sample,
    pub highpass: Sample,
    pub notch: Sample,
}

/// Second-order state-variable filter. Resonance 0 gives k = 2 (Q = 0.5);
/// the Butterworth response sits at k = sqrt(2).
#[derive(Debug, Clone)]
pub struct SVFilter {
    ic1eq: Sample, // First integrator's memory
    ic2eq: Sample, // Second integrator's memory

    pub cutoff_hz: Sample,
    pub resonance: Sample,
    g: Sample,
}

impl SVFilter {
    pub fn lowpass(cutoff_hz: Sample, sample_rate: Sample) -> Self {
        let mut filter = Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            cutoff_hz,
            resonance: 0.0,
            g: 0.0,
        };
        filter.g = compute_g(cutoff_hz, sample_rate);
        filter
    }

    /// Maximally flat lowpass (Q = 1/sqrt(2)).
    pub fn butterworth(cutoff_hz: Sample, sample_rate: Sample) -> Self {
        let mut filter = Self::lowpass(cutoff_hz, sample_rate);
        filter.resonance = 1.0 - FRAC_1_SQRT_2;
        filter
    }

    #[inline]
    fn k(&self) -> Sample {
        2.0 - (2.0 * self.resonance)
    }

    #[inline]
    pub fn set_cutoff(&mut self, cutoff_hz: Sample, sample_rate: Sample) {
        if cutoff_hz != self.cutoff_hz {
            self.cutoff_hz = cutoff_hz;
            self.g = compute_g(cutoff_hz, sample_rate);
        }
    }

    pub fn set_resonance(&mut self, resonance: Sample) {
        self.resonance = resonance;
    }

    pub fn next_sample(&mut self, sample: Sample, k: Sample, g: Sample) -> FilterOutputs {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
            notch: sample - k * v1,
        }
    }

    #[inline]
    pub fn process_lowpass(&mut self, sample: Sample) -> Sample {
        let (k, g) = (self.k(), self.g);
        self.next_sample(sample, k, g).lowpass
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

/// Four cascaded one-pole stages with saturated global feedback.
///
/// `resonance` runs 0..2; the loop gain is `2 * resonance`, so the filter
/// starts to self-oscillate near the top of the range.
#[derive(Debug, Clone)]
pub struct Ladder {
    stage: [Sample; 4],
    cutoff_hz: Sample,
    resonance: Sample,
    g1: Sample,
}

impl Ladder {
    pub const MAX_RESONANCE: Sample = 2.0;

    pub fn new(cutoff_hz: Sample, sample_rate: Sample) -> Self {
        let mut ladder = Self {
            stage: [0.0; 4],
            cutoff_hz: Sample::NAN,
            resonance: 0.0,
            g1: 0.0,
        };
        ladder.set_cutoff(cutoff_hz, sample_rate);
        ladder
    }

    #[inline]
    pub fn set_cutoff(&mut self, cutoff_hz: Sample, sample_rate: Sample) {
        if cutoff_hz != self.cutoff_hz {
            self.cutoff_hz = cutoff_hz;
            let fc = clamp_cutoff(cutoff_hz, sample_rate);
            let g = (PI * fc / sample_rate).tan();
            self.g1 = g / (1.0 + g);
        }
    }

    #[inline]
    pub fn set_resonance(&mut self, resonance: Sample) {
        self.resonance = if resonance.is_nan() {
            0.0
        } else {
            resonance.clamp(0.0, Self::MAX_RESONANCE)
        };
    }

    #[inline]
    pub fn next_sample(&mut self, input: Sample) -> Sample {
        let feedback = self.resonance * 2.0 * self.stage[3];
        let x = (input - feedback).tanh();
        let g1 = self.g1;

        self.stage[0] += g1 * (x - self.stage[0]);
        self.stage[1] += g1 * (self.stage[0] - self.stage[1]);
        self.stage[2] += g1 * (self.stage[1] - self.stage[2]);
        self.stage[3] += g1 * (self.stage[2] - self.stage[3]);

        self.stage[3]
    }

    pub fn reset(&mut self) {
        self.stage = [0.0; 4];
    }
}

/// One-zero one-pole DC blocker.
#[derive(Debug, Clone, Default)]
pub struct DcBlock {
    x1: Sample,
    y1: Sample,
}

impl DcBlock {
    const POLE: Sample = 0.995;

    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn next_sample(&mut self, x: Sample) -> Sample {
        let y = x - self.x1 + Self::POLE * self.y1;
        self.x1 = x;
        self.y1 = y;
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

/// Lowpass whose order is picked at construction: 1 (one-pole),
/// 2 (Butterworth) or 4 (ladder). Any other order falls back to 2.
#[derive(Debug, Clone)]
pub enum DampingFilter {
    OnePole(OnePole),
    Butterworth(SVFilter),
    Ladder(Ladder),
}

impl DampingFilter {
    pub fn with_order(order: u32, cutoff_hz: Sample, sample_rate: Sample) -> Self {
        match order {
            1 => Self::OnePole(OnePole::new(cutoff_hz, sample_rate)),
            4 => Self::Ladder(Ladder::new(cutoff_hz, sample_rate)),
            _ => Self::Butterworth(SVFilter::butterworth(cutoff_hz, sample_rate)),
        }
    }

    /// Effective order after the fallback.
    pub fn order(&self) -> u32 {
        match self {
            Self::OnePole(_) => 1,
            Self::Butterworth(_) => 2,
            Self::Ladder(_) => 4,
        }
    }

    #[inline]
    pub fn set_cutoff(&mut self, cutoff_hz: Sample, sample_rate: Sample) {
        match self {
            Self::OnePole(f) => f.set_cutoff(cutoff_hz, sample_rate),
            Self::Butterworth(f) => f.set_cutoff(cutoff_hz, sample_rate),
            Self::Ladder(f) => f.set_cutoff(cutoff_hz, sample_rate),
        }
    }

    #[inline]
    pub fn lowpass(&mut self, x: Sample) -> Sample {
        match self {
            Self::OnePole(f) => f.next_sample(x),
            Self::Butterworth(f) => f.process_lowpass(x),
            Self::Ladder(f) => f.next_sample(x),
        }
    }

    /// Blend between the input (`damp = 0`) and its lowpassed copy
    /// (`damp = 1`).
    #[inline]
    pub fn damp(&mut self, x: Sample, damp: Sample) -> Sample {
        x + damp * (self.lowpass(x) - x)
    }

    pub fn reset(&mut self) {
        match self {
            Self::OnePole(f) => f.reset(),
            Self::Butterworth(f) => f.reset(),
            Self::Ladder(f) => f.reset(),
        }
    }
}
