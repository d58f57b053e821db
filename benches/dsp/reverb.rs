//! Benchmarks for the feedback delay network core.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use modcore_dsp::{
    dsp::reverb::{VerbControls, VerbCore, VerbLayout},
    Sample,
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_reverb(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/reverb");

    let controls = VerbControls::default();

    for &size in BLOCK_SIZES {
        // Generate a test signal (impulse-like with some content)
        let input: Vec<Sample> = (0..size)
            .map(|i| {
                if i < 10 {
                    1.0 - (i as Sample / 10.0)
                } else {
                    (i as Sample * 0.05).sin() * 0.1
                }
            })
            .collect();

        for (name, lines, quality) in [("sparse", 4, 2), ("default", 8, 4), ("dense", 32, 4)] {
            let layout = VerbLayout {
                numechoes: lines,
                quality,
                ..VerbLayout::default()
            };
            let mut core = VerbCore::new(&layout, 0.7, SAMPLE_RATE, 0x5EED);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    let mut sum = 0.0;
                    for &sample in &input {
                        let (l, r) = core.process(black_box(sample), &controls);
                        sum += l + r;
                    }
                    sum
                })
            });
        }
    }

    // drawing a new network, as a structural change does off the audio thread
    group.bench_function("draw_core", |b| {
        let layout = VerbLayout {
            numechoes: 16,
            ..VerbLayout::default()
        };
        b.iter(|| VerbCore::new(black_box(&layout), 0.7, SAMPLE_RATE, 0x5EED))
    });

    group.finish();
}
