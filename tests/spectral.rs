use modcore_dsp::{
    graph::{bounce, BLOsc, HarmoFilter, RenderCtx, Vco},
    AudioConfig, Sample,
};
use rustfft::{num_complex::Complex, FftPlanner};

const SR: Sample = 48_000.0;
// 256 samples per cycle, so an 8192-point FFT holds exactly 32 cycles
const FUNDAMENTAL: Sample = 187.5;
const FFT_LEN: usize = 8192;
const BINS_PER_HARMONIC: usize = FFT_LEN / 256;

fn magnitudes(samples: &[Sample]) -> Vec<Sample> {
    let mut buffer: Vec<Complex<Sample>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    FftPlanner::<Sample>::new()
        .plan_fft_forward(buffer.len())
        .process(&mut buffer);
    buffer.iter().map(|c| c.norm()).collect()
}

fn saw() -> Vco {
    let mut vco = Vco::new();
    vco.set_freq(FUNDAMENTAL).unwrap();
    vco
}

fn steady_spectrum(node: &mut impl modcore_dsp::graph::GraphNode) -> Vec<Sample> {
    let out = bounce(node, 16_384 + FFT_LEN, &RenderCtx::new(SR)).remove(0);
    magnitudes(&out[16_384..])
}

#[test]
fn harmofilter_removes_even_harmonics_of_saw() {
    let config = AudioConfig::new(SR);
    let reference = steady_spectrum(&mut saw());

    let mut filter = HarmoFilter::new(&config, saw());
    filter.set_freq(FUNDAMENTAL).unwrap();
    filter.set_harm(2.0).unwrap();
    let filtered = steady_spectrum(&mut filter);

    for k in 1..=12 {
        let bin = k * BINS_PER_HARMONIC;
        let gain = filtered[bin] / reference[bin];
        if k % 2 == 0 {
            assert!(gain < 0.01, "harmonic {k} gain {gain}");
        } else {
            assert!(gain > 0.9, "harmonic {k} gain {gain}");
        }
    }
}

#[test]
fn harm_four_removes_every_fourth_harmonic() {
    let config = AudioConfig::new(SR);
    let reference = steady_spectrum(&mut saw());

    let mut filter = HarmoFilter::new(&config, saw());
    filter.set_freq(FUNDAMENTAL).unwrap();
    filter.set_harm(4.0).unwrap();
    let filtered = steady_spectrum(&mut filter);

    for k in 1..=12 {
        let bin = k * BINS_PER_HARMONIC;
        let gain = filtered[bin] / reference[bin];
        if k % 4 == 0 {
            assert!(gain < 0.01, "harmonic {k} gain {gain}");
        } else {
            assert!(gain > 0.3, "harmonic {k} gain {gain}");
        }
    }
}

#[test]
fn high_blosc_saw_has_no_aliases() {
    let freq = 3_500.0;
    let mut osc = BLOsc::new();
    osc.set_freq(freq).unwrap();
    osc.set_bright(1.0).unwrap();
    // one second at 48 kHz gives 1 Hz bins; 3500 Hz lands exactly on a bin
    let out = bounce(&mut osc, 96_000, &RenderCtx::new(SR)).remove(0);
    let spectrum = magnitudes(&out[48_000..]);

    let harmonic = freq as usize;
    let fundamental = spectrum[harmonic];
    for (bin, &mag) in spectrum.iter().enumerate().take(24_000) {
        let offset = bin % harmonic;
        if offset <= 2 || offset >= harmonic - 2 {
            continue;
        }
        assert!(mag < fundamental * 1e-3, "bin {bin} Hz at {} dB", 20.0 * (mag / fundamental).log10());
    }
}
