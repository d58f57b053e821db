//! Orthogonal mixing matrix built from Givens rotations.

/*
Rotating Mixing Matrix
======================

A feedback delay network recirculates every line's output into every line's
input. If the mixing matrix is orthogonal it neither adds nor removes energy,
so the only loss in the loop is the explicit feedback gain and damping, and
the tail can be tuned without runaway or premature decay.

Any product of plane rotations is orthogonal. The matrix here is a butterfly
cascade: stage s pairs line i with line i+s for strides 1, 2, 4, ... and
rotates each pair by its own angle:

    stride 1     stride 2
    0 ──╮╭──     0 ──╮  ╭──
    1 ──╯╰──     1 ──┼╮╭┼──
    2 ──╮╭──     2 ──╯┼┼╯──
    3 ──╯╰──     3 ───╯╰───

    | a' |   | cos θ  -sin θ | | a |
    | b' | = | sin θ   cos θ | | b |

After log2(k) stages every output depends on every input. For a line count
that is not a power of two, pairs that would fall off the end are skipped;
the result is still orthogonal.

Each angle blends a drawn coefficient c (0..1) with a 45° rotation:

    θ = depth · π/4 + (1 − depth) · asin(c)

depth = 1 gives maximal diffusion (every pair mixed half and half, a
Hadamard-like dense tail). Lower depth lets the drawn coefficients through:
small c keeps energy on its own line, so echoes stay distinct for longer.
*/

use crate::{consts::FRAC_PI_4, Sample};

pub struct RotationMatrix {
    size: usize,
    pairs: Vec<(usize, usize)>,
    coefficients: Vec<Sample>,
    cos: Vec<Sample>,
    sin: Vec<Sample>,
    depth: Sample,
}

/// Butterfly pairs for `size` lines, in application order.
pub fn butterfly_pairs(size: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    let mut stride = 1;
    while stride < size {
        for i in 0..size {
            if i & stride == 0 && i + stride < size {
                pairs.push((i, i + stride));
            }
        }
        stride <<= 1;
    }
    pairs
}

impl RotationMatrix {
    /// `coefficients` supplies one value per pair and is cycled if short.
    pub fn new(size: usize, coefficients: &[Sample], depth: Sample) -> Self {
        let pairs = butterfly_pairs(size);
        let coefficients: Vec<Sample> = if coefficients.is_empty() {
            vec![0.0; pairs.len()]
        } else {
            (0..pairs.len())
                .map(|j| coefficients[j % coefficients.len()].clamp(0.0, 1.0))
                .collect()
        };
        let mut matrix = Self {
            size,
            cos: vec![1.0; pairs.len()],
            sin: vec![0.0; pairs.len()],
            pairs,
            coefficients,
            depth: Sample::NAN,
        };
        matrix.set_depth(depth);
        matrix
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn depth(&self) -> Sample {
        self.depth
    }

    /// Recompute the angles for a new depth. No-op when unchanged.
    pub fn set_depth(&mut self, depth: Sample) {
        let depth = if depth.is_nan() { 0.0 } else { depth.clamp(0.0, 1.0) };
        if depth == self.depth {
            return;
        }
        self.depth = depth;
        for ((c, cos), sin) in self.coefficients.iter().zip(&mut self.cos).zip(&mut self.sin) {
            let theta = depth * FRAC_PI_4 + (1.0 - depth) * c.asin();
            *cos = theta.cos();
            *sin = theta.sin();
        }
    }

    /// `output = M · input`. Both slices must be `size` long.
    #[inline]
    pub fn apply(&self, input: &[Sample], output: &mut [Sample]) {
        output[..self.size].copy_from_slice(&input[..self.size]);
        for (j, &(a, b)) in self.pairs.iter().enumerate() {
            let (x, y) = (output[a], output[b]);
            output[a] = self.cos[j] * x - self.sin[j] * y;
            output[b] = self.sin[j] * x + self.cos[j] * y;
        }
    }
}
