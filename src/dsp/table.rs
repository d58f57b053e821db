//! Single-cycle wavetables.

/*
Wavetables
==========

A table holds exactly one cycle of a waveform. Reading it at phase p (0..1)
looks up position p * len, interpolating between the stored points and
wrapping past the end:

    index  0   1   2   3  ...  len-1 | 0   1
           ●───●───●───●── ... ──●───|─●───●   (wraps)
                 ▲
             p * len

Band-limited sets
-----------------

A naive sawtooth contains harmonics all the way up; above Nyquist they fold
back as aliasing. The band-limited set stores each waveform family at a
ladder of partial counts: every count from 1 to 32, then four steps per
octave up to 2048 (additive synthesis, normalized to a peak of 1).

A reader asks for a fractional harmonic count h and only ever touches
tables with at most h partials. It finds the highest rung at or below h
and fades from the rung beneath it as h climbs toward the next rung:

    rung      ... 5     6     7 ...
                        ▲     ▲
                   h = 6.5    next rung
    output = lerp(table(5), table(6), (6.5 - 6) / (7 - 6))

The blend is continuous in h: arriving at a rung reads exactly the table
one step below it.

The set is built once, on first use, and shared by every oscillator.
*/

use std::sync::{Arc, OnceLock};

use crate::{
    consts::{PI, TAU},
    Sample,
};

pub const DEFAULT_TABLE_SIZE: usize = 8192;
pub const BAND_LIMITED_SIZE: usize = 2048;
/// Every partial count up to this one has its own table.
pub const EXACT_COUNTS: usize = 32;
pub const MAX_PARTIALS: usize = 2048;
/// Ratio between rungs above `EXACT_COUNTS` (2^(1/4)).
const LADDER_STEP: Sample = 1.189_207_1;

/// One cycle of a waveform, shared cheaply between units.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    data: Arc<[Sample]>,
}

impl Table {
    /// Wrap raw samples. An empty input becomes a single silent point.
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let samples = if samples.is_empty() { vec![0.0] } else { samples };
        Self { data: samples.into() }
    }

    pub fn sine() -> Self {
        Self::harmonics(&[1.0])
    }

    /// Additive table: `amps[k]` is the amplitude of harmonic `k + 1`.
    /// Normalized to a peak of 1.
    pub fn harmonics(amps: &[Sample]) -> Self {
        let mut data = vec![0.0; DEFAULT_TABLE_SIZE];
        for (k, &amp) in amps.iter().enumerate() {
            add_partial(&mut data, k + 1, amp);
        }
        Self::from_samples(normalized(data))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.data
    }

    #[inline]
    fn at(&self, index: isize) -> Sample {
        let len = self.data.len() as isize;
        self.data[index.rem_euclid(len) as usize]
    }

    #[inline]
    pub fn read_linear(&self, phase: Sample) -> Sample {
        let pos = phase * self.data.len() as Sample;
        let whole = pos.floor();
        let frac = pos - whole;
        let i = whole as isize;
        let x0 = self.at(i);
        x0 + (self.at(i + 1) - x0) * frac
    }

    /// 4-point Lagrange read.
    #[inline]
    pub fn read_cubic(&self, phase: Sample) -> Sample {
        let pos = phase * self.data.len() as Sample;
        let whole = pos.floor();
        let f = pos - whole;
        let i = whole as isize;
        let (xm1, x0, x1, x2) = (self.at(i - 1), self.at(i), self.at(i + 1), self.at(i + 2));
        let cm1 = -f * (f - 1.0) * (f - 2.0) / 6.0;
        let c0 = (f + 1.0) * (f - 1.0) * (f - 2.0) * 0.5;
        let c1 = -(f + 1.0) * f * (f - 2.0) * 0.5;
        let c2 = (f + 1.0) * f * (f - 1.0) / 6.0;
        cm1 * xm1 + c0 * x0 + c1 * x1 + c2 * x2
    }
}

/// Add one sine partial. The phase index is reduced exactly in integers so
/// high harmonics keep full precision.
fn add_partial(data: &mut [Sample], harmonic: usize, amp: Sample) {
    let size = data.len();
    for (n, v) in data.iter_mut().enumerate() {
        let idx = (harmonic * n) % size;
        *v += amp * (TAU * idx as Sample / size as Sample).sin();
    }
}

fn normalized(mut data: Vec<Sample>) -> Vec<Sample> {
    let peak = data.iter().fold(0.0, |acc: Sample, &v| acc.max(v.abs()));
    if peak > 0.0 {
        data.iter_mut().for_each(|v| *v /= peak);
    }
    data
}

/// Partial counts stored per family, ascending.
fn ladder() -> Vec<usize> {
    let mut counts: Vec<usize> = (1..=EXACT_COUNTS).collect();
    for step in 1.. {
        let next = (EXACT_COUNTS as f64 * 2f64.powf(step as f64 / 4.0)).round() as usize;
        if next > MAX_PARTIALS {
            break;
        }
        counts.push(next);
    }
    counts
}

/// Waveform families of the band-limited set, in blend order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Saw,
    Square,
    Triangle,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Saw, Family::Square, Family::Triangle];

    /// Amplitude of harmonic `n` (1-based).
    fn partial(self, n: usize) -> Sample {
        let n_f = n as Sample;
        match self {
            Family::Saw => 2.0 / (PI * n_f),
            Family::Square if n % 2 == 1 => 4.0 / (PI * n_f),
            Family::Triangle if n % 2 == 1 => {
                let sign = if (n / 2) % 2 == 0 { 1.0 } else { -1.0 };
                sign * 8.0 / (PI * PI * n_f * n_f)
            }
            _ => 0.0,
        }
    }
}

pub struct BandLimitedSet {
    counts: Vec<usize>,
    levels: [Vec<Table>; 3],
}

impl BandLimitedSet {
    fn build() -> Self {
        let counts = ladder();
        let family = |f: Family| -> Vec<Table> {
            let mut sum = vec![0.0; BAND_LIMITED_SIZE];
            let mut done = 0;
            counts
                .iter()
                .map(|&count| {
                    for n in done + 1..=count {
                        let amp = f.partial(n);
                        if amp != 0.0 {
                            add_partial(&mut sum, n, amp);
                        }
                    }
                    done = count;
                    Table::from_samples(normalized(sum.clone()))
                })
                .collect()
        };
        Self {
            levels: [family(Family::Saw), family(Family::Square), family(Family::Triangle)],
            counts,
        }
    }

    /// Partial count of each rung.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn table(&self, family: Family, level: usize) -> &Table {
        let levels = &self.levels[family as usize];
        &levels[level.min(levels.len() - 1)]
    }

    /// Read `family` at `phase` using no partial above `harmonics`.
    #[inline]
    pub fn read(&self, family: Family, harmonics: Sample, phase: Sample) -> Sample {
        let h = harmonics.max(1.0);
        let level = self
            .counts
            .partition_point(|&c| c as Sample <= h)
            .saturating_sub(1);
        let a = self.table(family, level).read_linear(phase);
        if level == 0 {
            return a;
        }
        let count = self.counts[level] as Sample;
        let next = self
            .counts
            .get(level + 1)
            .map_or(count * LADDER_STEP, |&n| n as Sample);
        let t = ((h - count) / (next - count)).min(1.0);
        let below = self.table(family, level - 1).read_linear(phase);
        below + (a - below) * t
    }
}

static BAND_LIMITED: OnceLock<BandLimitedSet> = OnceLock::new();

/// Shared band-limited tables, built on first call.
pub fn band_limited() -> &'static BandLimitedSet {
    BAND_LIMITED.get_or_init(BandLimitedSet::build)
}
