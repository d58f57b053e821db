//! Benchmarks for the oscillator units, with constant and modulated controls.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use modcore_dsp::{
    dsp::table::Table,
    graph::{
        extensions::NodeExt, BLOsc, BLOscParam, Block, GraphNode, LfoNode, OscSync, Pwm, PwmParam, RenderCtx, Vco,
        VcoParam,
    },
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn bench_node(c: &mut Criterion, name: &str, mut make: impl FnMut() -> Box<dyn GraphNode>) {
    let mut group = c.benchmark_group(format!("units/{name}"));
    let ctx = RenderCtx::new(SAMPLE_RATE);

    for &size in BLOCK_SIZES {
        let mut node = make();
        let mut block = Block::new(node.channels(), size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| node.render_block(black_box(&mut block), black_box(&ctx)))
        });
    }

    group.finish();
}

pub fn bench_oscillators(c: &mut Criterion) {
    bench_node(c, "pwm", || Pwm::new().boxed());

    // duty swept by an LFO, the usual way PWM is played
    bench_node(c, "pwm_swept", || {
        Pwm::new()
            .modulate(PwmParam::Duty, LfoNode::sine(0.5).range(0.1, 0.9))
            .unwrap()
            .boxed()
    });

    bench_node(c, "pwm_damped", || Pwm::new().with(PwmParam::Damp, 8.0).unwrap().boxed());

    bench_node(c, "vco_stereo", || {
        Vco::new()
            .with(VcoParam::Freq, [110.0, 110.5])
            .unwrap()
            .with(VcoParam::Shape, 0.5)
            .unwrap()
            .boxed()
    });

    bench_node(c, "oscsync", || OscSync::new(Table::harmonics(&[1.0, 0.5, 0.33, 0.25])).boxed());

    bench_node(c, "blosc", || {
        BLOsc::new()
            .modulate(BLOscParam::Shape, LfoNode::triangle(0.2).range(0.0, 1.0))
            .unwrap()
            .boxed()
    });
}
