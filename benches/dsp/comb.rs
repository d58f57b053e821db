//! Benchmarks for the harmonic comb, steady and while gliding.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use modcore_dsp::{dsp::comb::HarmonicComb, Sample};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_comb(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/comb");

    for &size in BLOCK_SIZES {
        let input: Vec<Sample> = (0..size).map(|i| (i as Sample * 0.05).sin()).collect();

        let mut comb = HarmonicComb::new(SAMPLE_RATE as usize);
        let delay = HarmonicComb::delay_for(110.0, 2.0, SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::new("steady", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0;
                for &sample in &input {
                    sum += comb.next_sample(black_box(sample), delay);
                }
                sum
            })
        });

        // delay sweeps every sample, forcing repeated crossfades
        let mut comb = HarmonicComb::new(SAMPLE_RATE as usize);
        group.bench_with_input(BenchmarkId::new("gliding", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0;
                for (i, &sample) in input.iter().enumerate() {
                    let freq = 110.0 + (i % 64) as Sample * 10.0;
                    sum += comb.next_sample(black_box(sample), HarmonicComb::delay_for(freq, 2.0, SAMPLE_RATE));
                }
                sum
            })
        });
    }

    group.finish();
}
