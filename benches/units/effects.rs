//! Benchmarks for the effect units fed by an oscillator.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use modcore_dsp::{
    graph::{Block, GraphNode, HarmoFilter, MatrixVerb, RenderCtx, Vco},
    AudioConfig,
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_effects(c: &mut Criterion) {
    let mut group = c.benchmark_group("units/effects");
    let config = AudioConfig::new(SAMPLE_RATE);
    let ctx = RenderCtx::new(SAMPLE_RATE);

    for &size in BLOCK_SIZES {
        let mut filter = HarmoFilter::new(&config, Vco::new());
        let mut block = Block::new(1, size);
        group.bench_with_input(BenchmarkId::new("harmofilter", size), &size, |b, _| {
            b.iter(|| filter.render_block(black_box(&mut block), black_box(&ctx)))
        });

        let mut verb = MatrixVerb::new(&config, Vco::new());
        let mut block = Block::new(2, size);
        group.bench_with_input(BenchmarkId::new("matrixverb", size), &size, |b, _| {
            b.iter(|| verb.render_block(black_box(&mut block), black_box(&ctx)))
        });

        let mut dense = MatrixVerb::new(&config, Vco::new());
        dense.set_numechoes(32).unwrap();
        let mut block = Block::new(2, size);
        group.bench_with_input(BenchmarkId::new("matrixverb_32_lines", size), &size, |b, _| {
            b.iter(|| dense.render_block(black_box(&mut block), black_box(&ctx)))
        });
    }

    group.finish();
}
