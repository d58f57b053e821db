//! Benchmarks for the linear-phase edge lowpass at several orders.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use modcore_dsp::{dsp::fir::LinearPhaseLowpass, Sample};

use crate::BLOCK_SIZES;

pub fn bench_fir(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/fir");

    for &size in BLOCK_SIZES {
        let input: Vec<Sample> = (0..size).map(|i| if i % 32 < 16 { 1.0 } else { -1.0 }).collect();

        for damp in [1, 8, 32] {
            let mut lowpass = LinearPhaseLowpass::new(damp);
            group.bench_with_input(BenchmarkId::new(format!("damp_{damp}"), size), &size, |b, _| {
                b.iter(|| {
                    let mut sum = 0.0;
                    for &sample in &input {
                        sum += lowpass.process(black_box(sample));
                    }
                    sum
                })
            });
        }
    }

    group.finish();
}
