//! Benchmarks for the composite bass voices.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use modcore_dsp::{
    graph::{Block, GraphNode, LfoNode, ParamValue, RenderCtx},
    voices::{FatBass, Tb303},
    AudioConfig,
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("units/voices");
    let config = AudioConfig::new(SAMPLE_RATE);
    let ctx = RenderCtx::new(SAMPLE_RATE);

    for &size in BLOCK_SIZES {
        let mut bass = FatBass::new(&config);
        bass.set_octave(ParamValue::signal(LfoNode::sine(0.15).range(0.1, 0.9)))
            .unwrap();
        let mut block = Block::new(1, size);
        group.bench_with_input(BenchmarkId::new("fatbass", size), &size, |b, _| {
            b.iter(|| bass.render_block(black_box(&mut block), black_box(&ctx)))
        });

        let mut acid = Tb303::new(&config);
        acid.set_envmod(3.0).unwrap();
        acid.trigger();
        let mut block = Block::new(1, size);
        group.bench_with_input(BenchmarkId::new("tb303", size), &size, |b, _| {
            b.iter(|| acid.render_block(black_box(&mut block), black_box(&ctx)))
        });
    }

    group.finish();
}
