// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Default partition size in frames. This is also the convolver's latency.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// A uniformly partitioned overlap-save FFT convolver.
///
/// The impulse response is split into `block_size` partitions, each transformed
/// once up front. Input is consumed one sample at a time; every `block_size`
/// samples the newest input spectrum is multiplied against all partitions and
/// the result is written into the output block. All buffers are allocated in
/// [Convolver::new], so processing never allocates.
pub struct Convolver {
    block_size: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Spectra of the impulse response partitions.
    partitions: Vec<Vec<Complex<f32>>>,
    /// Ring of past input spectra, one per partition.
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    /// The previous input block followed by the block being filled.
    window: Vec<f32>,
    fill: usize,
    output: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    accumulator: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Convolver {
    /// Creates a convolver for the given impulse response.
    pub fn new(impulse: &[f32], block_size: usize) -> Convolver {
        let block_size = block_size.max(1);
        let fft_size = block_size * 2;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);
        let mut scratch = vec![
            Complex::default();
            fft.get_inplace_scratch_len()
                .max(ifft.get_inplace_scratch_len())
        ];

        let mut partitions: Vec<Vec<Complex<f32>>> = impulse
            .chunks(block_size)
            .map(|chunk| {
                let mut partition = vec![Complex::default(); fft_size];
                for (dst, &src) in partition.iter_mut().zip(chunk) {
                    *dst = Complex::new(src, 0.0);
                }
                fft.process_with_scratch(&mut partition, &mut scratch);
                partition
            })
            .collect();
        if partitions.is_empty() {
            partitions.push(vec![Complex::default(); fft_size]);
        }

        let history = vec![vec![Complex::default(); fft_size]; partitions.len()];

        Convolver {
            block_size,
            fft,
            ifft,
            partitions,
            history,
            head: 0,
            window: vec![0.0; fft_size],
            fill: 0,
            output: vec![0.0; block_size],
            spectrum: vec![Complex::default(); fft_size],
            accumulator: vec![Complex::default(); fft_size],
            scratch,
        }
    }

    /// The number of samples between an input and its first contribution to the output.
    pub fn latency(&self) -> usize {
        self.block_size
    }

    /// Pushes one input sample and returns one output sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = self.output[self.fill];
        self.window[self.block_size + self.fill] = input;
        self.fill += 1;
        if self.fill == self.block_size {
            self.process_block();
            self.fill = 0;
        }
        out
    }

    fn process_block(&mut self) {
        let block_size = self.block_size;

        for (dst, &src) in self.spectrum.iter_mut().zip(self.window.iter()) {
            *dst = Complex::new(src, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);
        self.history[self.head].copy_from_slice(&self.spectrum);

        // Partition i pairs with the input spectrum from i blocks ago.
        let count = self.partitions.len();
        self.accumulator.fill(Complex::default());
        for (i, partition) in self.partitions.iter().enumerate() {
            let past = &self.history[(self.head + count - i) % count];
            for ((acc, x), h) in self.accumulator.iter_mut().zip(past).zip(partition) {
                *acc += x * h;
            }
        }

        self.ifft
            .process_with_scratch(&mut self.accumulator, &mut self.scratch);
        let norm = 1.0 / (block_size * 2) as f32;
        for (out, y) in self.output.iter_mut().zip(&self.accumulator[block_size..]) {
            *out = y.re * norm;
        }

        self.window.copy_within(block_size.., 0);
        self.head = (self.head + 1) % count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(convolver: &mut Convolver, input: &[f32]) -> Vec<f32> {
        input.iter().map(|&x| convolver.process(x)).collect()
    }

    #[test]
    fn test_identity_is_a_delay() {
        let mut convolver = Convolver::new(&[1.0], 4);
        assert_eq!(convolver.latency(), 4);

        let input: Vec<f32> = (1..=12).map(|i| i as f32).collect();
        let output = run(&mut convolver, &input);

        for (i, y) in output.iter().enumerate() {
            let expected = if i < 4 { 0.0 } else { input[i - 4] };
            assert!((y - expected).abs() < 1e-4, "{}: {} != {}", i, y, expected);
        }
    }

    #[test]
    fn test_impulse_response_spans_partitions() {
        let impulse: Vec<f32> = (0..10).map(|i| 1.0 - i as f32 * 0.1).collect();
        let mut convolver = Convolver::new(&impulse, 4);

        let mut input = vec![0.0; 24];
        input[0] = 1.0;
        let output = run(&mut convolver, &input);

        for (i, y) in output.iter().enumerate() {
            let expected = i
                .checked_sub(4)
                .and_then(|j| impulse.get(j))
                .copied()
                .unwrap_or(0.0);
            assert!((y - expected).abs() < 1e-4, "{}: {} != {}", i, y, expected);
        }
    }

    #[test]
    fn test_matches_direct_convolution() {
        let impulse = [0.5, -0.25, 0.125, 0.0, 0.75, 0.1, -0.3];
        let input: Vec<f32> = (0..40).map(|i| ((i * 7) % 5) as f32 - 2.0).collect();
        let mut convolver = Convolver::new(&impulse, 3);
        let output = run(&mut convolver, &input);

        for (n, y) in output.iter().enumerate() {
            let Some(m) = n.checked_sub(3) else {
                assert!(y.abs() < 1e-4);
                continue;
            };
            let expected: f32 = impulse
                .iter()
                .enumerate()
                .filter(|(k, _)| *k <= m)
                .map(|(k, h)| h * input[m - k])
                .sum();
            assert!((y - expected).abs() < 1e-3, "{}: {} != {}", n, y, expected);
        }
    }

    #[test]
    fn test_empty_impulse_is_silent() {
        let mut convolver = Convolver::new(&[], 4);
        let output = run(&mut convolver, &[1.0; 16]);
        assert!(output.iter().all(|y| y.abs() < 1e-6));
    }
}
