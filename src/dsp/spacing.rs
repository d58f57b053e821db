//! Distribution modes for picking values out of a range.

/*
Spacing Modes
=============

The reverb needs a handful of values (delay lengths, rotation coefficients)
spread over a user-given range. Rather than drawing them uniformly, each mode
walks a sorted candidate list with a different index curve. With L
candidates and n values, value i sits at:

  lin    i·(L / n)
  exp    (e^(i/n) − 1) / (e − 1) · L
  sqrt   sqrt(i/n) · L
  pow    (10^(i/n) − 1) / 9 · L
  rand   n distinct candidates, seeded

The `min` variants count up from the smallest candidate; the `max` variants
count down from the largest:

    candidates   ●●●●●●●●●●●●●●●●●●●●●●●●●●●●●●●●
    linmin       ▲       ▲       ▲       ▲
    expmin       ▲   ▲    ▲      ▲
    sqrtmin      ▲         ▲     ▲    ▲
    linmax           ▲       ▲       ▲       ▲   (from the right)

exp and pow cluster near the starting end; sqrt spreads away from it.

Delay candidates are prime sample counts, so no two lines share a common
period and their echoes never pile up on the same sample. A narrow range may
not hold enough primes; then every integer in the range is a candidate
instead, which keeps every drawn delay inside the range.
*/

use rand::{rngs::StdRng, seq::index};

use crate::{consts::E, Sample};

/// Number of grid points drawn from when spacing plain coefficients.
pub const COEFFICIENT_GRID: usize = 256;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Spacing {
    #[default]
    LinMin,
    LinMax,
    ExpMin,
    ExpMax,
    SqrtMin,
    SqrtMax,
    PowMin,
    PowMax,
    Rand,
}

impl Spacing {
    pub const ALL: [Spacing; 9] = [
        Spacing::LinMin,
        Spacing::LinMax,
        Spacing::ExpMin,
        Spacing::ExpMax,
        Spacing::SqrtMin,
        Spacing::SqrtMax,
        Spacing::PowMin,
        Spacing::PowMax,
        Spacing::Rand,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Spacing::LinMin => "linmin",
            Spacing::LinMax => "linmax",
            Spacing::ExpMin => "expmin",
            Spacing::ExpMax => "expmax",
            Spacing::SqrtMin => "sqrtmin",
            Spacing::SqrtMax => "sqrtmax",
            Spacing::PowMin => "powmin",
            Spacing::PowMax => "powmax",
            Spacing::Rand => "rand",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Pick `count` indices into a sorted candidate list of length `len`.
    pub fn indices(self, len: usize, count: usize, rng: &mut StdRng) -> Vec<usize> {
        if len == 0 || count == 0 {
            return Vec::new();
        }
        if self == Spacing::Rand {
            if count <= len {
                return index::sample(rng, len, count).into_vec();
            }
            // not enough distinct candidates: cycle through a shuffle
            let order = index::sample(rng, len, len).into_vec();
            return (0..count).map(|i| order[i % len]).collect();
        }

        let l = len as Sample;
        let n = count as Sample;
        let last = len - 1;
        let step = len / count;
        (0..count)
            .map(|i| {
                let t = i as Sample / n;
                let offset = match self {
                    Spacing::LinMin | Spacing::LinMax if step > 0 => step * i,
                    Spacing::LinMin | Spacing::LinMax => i * len / count,
                    Spacing::ExpMin | Spacing::ExpMax => ((t.exp() - 1.0) / (E - 1.0) * l) as usize,
                    Spacing::SqrtMin | Spacing::SqrtMax => (t.sqrt() * l) as usize,
                    _ => (((10.0 as Sample).powf(t) - 1.0) / 9.0 * l) as usize,
                };
                let offset = offset.min(last);
                match self {
                    Spacing::LinMax | Spacing::ExpMax | Spacing::SqrtMax | Spacing::PowMax => {
                        last - offset
                    }
                    _ => offset,
                }
            })
            .collect()
    }

    /// Pick `count` values out of `candidates`.
    pub fn select<T: Copy>(self, candidates: &[T], count: usize, rng: &mut StdRng) -> Vec<T> {
        self.indices(candidates.len(), count, rng)
            .into_iter()
            .map(|i| candidates[i])
            .collect()
    }
}

/// Prime numbers in `[lo, hi]`.
pub fn primes_between(lo: usize, hi: usize) -> Vec<usize> {
    if hi < 2 || lo > hi {
        return Vec::new();
    }
    let mut composite = vec![false; hi + 1];
    let mut n = 2;
    while n * n <= hi {
        if !composite[n] {
            let mut m = n * n;
            while m <= hi {
                composite[m] = true;
                m += n;
            }
        }
        n += 1;
    }
    (lo.max(2)..=hi).filter(|&k| !composite[k]).collect()
}

/// Whole sample counts `(lo, hi)` inside a `(min, max)` range in seconds,
/// none shorter than `min_samples`. `None` when the range holds no such count.
pub fn sample_span(range: (Sample, Sample), sample_rate: Sample, min_samples: usize) -> Option<(usize, usize)> {
    let lo = ((range.0 * sample_rate).ceil().max(0.0) as usize).max(min_samples);
    let hi = (range.1 * sample_rate).floor();
    if hi.is_nan() || hi < lo as Sample {
        return None;
    }
    Some((lo, hi as usize))
}

/// Candidate delay lengths, in samples, for a `(min, max)` range in seconds.
///
/// Prime counts when there are at least `count` of them, otherwise every
/// integer in the range. Never shorter than `min_samples`; empty when the
/// range holds no such length.
pub fn delay_candidates(
    range: (Sample, Sample),
    sample_rate: Sample,
    count: usize,
    min_samples: usize,
) -> Vec<usize> {
    let Some((lo, hi)) = sample_span(range, sample_rate, min_samples) else {
        return Vec::new();
    };
    let primes = primes_between(lo, hi);
    if primes.len() >= count {
        return primes;
    }
    let integers: Vec<usize> = (lo..=hi).collect();
    if integers.len() > primes.len() {
        integers
    } else {
        primes
    }
}

/// An evenly spaced grid of `COEFFICIENT_GRID` values over `(min, max)`.
pub fn coefficient_grid(range: (Sample, Sample)) -> Vec<Sample> {
    let (lo, hi) = range;
    let steps = (COEFFICIENT_GRID - 1) as Sample;
    (0..COEFFICIENT_GRID)
        .map(|i| lo + (hi - lo) * i as Sample / steps)
        .collect()
}
