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
use std::f32::consts::TAU;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Sine,
    Triangle,
}

/// A phase-accumulating oscillator whose frequency may change every frame.
#[derive(Clone, Debug)]
pub struct Oscillator {
    waveform: Waveform,
    phase: f32,
    sample_rate: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: u32) -> Oscillator {
        Oscillator {
            waveform,
            phase: 0.0,
            sample_rate: sample_rate.max(1) as f32,
        }
    }

    /// Returns the next sample at the given frequency.
    #[inline]
    pub fn next_sample(&mut self, frequency: f32) -> f32 {
        let sample = match self.waveform {
            Waveform::Sine => (self.phase * TAU).sin(),
            // Starts at zero and rises, like the sine.
            Waveform::Triangle => {
                let shifted = (self.phase + 0.25).fract();
                1.0 - 4.0 * (shifted - 0.5).abs()
            }
        };

        self.phase = (self.phase + frequency / self.sample_rate).fract();
        sample
    }
}

/// Fills a buffer of the given length with uniform white noise in [-1, 1).
pub fn noise_buffer<R: Rng + ?Sized>(frames: usize, rng: &mut R) -> Vec<f32> {
    (0..frames).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}
