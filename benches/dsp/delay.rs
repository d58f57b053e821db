//! Benchmarks for the fractional delay line at each interpolation order.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use modcore_dsp::{
    dsp::delay::{DelayLine, Interpolation},
    Sample,
};

use crate::BLOCK_SIZES;

pub fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/delay");

    let orders = [
        ("none", Interpolation::None),
        ("linear", Interpolation::Linear),
        ("cosine", Interpolation::Cosine),
        ("cubic", Interpolation::Cubic),
    ];

    for &size in BLOCK_SIZES {
        let input: Vec<Sample> = (0..size).map(|i| (i as Sample * 0.05).sin()).collect();

        for (name, interp) in orders {
            let mut line = DelayLine::new(4_800);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    let mut sum = 0.0;
                    for &sample in &input {
                        sum += line.next_sample(black_box(sample), black_box(1_234.37), interp);
                    }
                    sum
                })
            });
        }
    }

    group.finish();
}
