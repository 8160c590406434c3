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
use ::biquad::{Biquad as _, Coefficients, DirectForm2Transposed, Errors, Hertz, ToHertz, Type};
use tracing::warn;

/// Q of a highpass with the conventional 1 dB resonance.
pub const DEFAULT_HIGHPASS_Q: f32 = 1.122_018_5;

/// Q of a bandpass with unit bandwidth. At this Q the filter peaks at 0 dB.
pub const DEFAULT_BANDPASS_Q: f32 = 1.0;

/// Coefficients that pass the input through untouched.
const PASSTHROUGH: Coefficients<f32> = Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

/// A second-order filter in transposed direct form II.
pub struct Biquad {
    filter: DirectForm2Transposed<f32>,
}

impl Biquad {
    pub fn highpass(frequency: f32, q: f32, sample_rate: u32) -> Biquad {
        Self::build(frequency, q, sample_rate, |fs, f0, q| {
            Coefficients::<f32>::from_params(Type::HighPass, fs, f0, q)
        })
    }

    pub fn bandpass(frequency: f32, q: f32, sample_rate: u32) -> Biquad {
        Self::build(frequency, q, sample_rate, |fs, f0, q| {
            Coefficients::<f32>::from_params(Type::BandPass, fs, f0, q)
        })
    }

    /// Builds the filter. The frequency is kept between 10 Hz and just below Nyquist.
    fn build<F>(frequency: f32, q: f32, sample_rate: u32, coefficients: F) -> Biquad
    where
        F: FnOnce(Hertz<f32>, Hertz<f32>, f32) -> Result<Coefficients<f32>, Errors>,
    {
        let sample_rate = sample_rate.max(1) as f32;
        let frequency = frequency.clamp(10.0_f32.min(sample_rate * 0.45), sample_rate * 0.45);
        let coefficients = coefficients(sample_rate.hz(), frequency.hz(), q.max(0.001))
            .unwrap_or_else(|_| {
                warn!(frequency, q, "Invalid filter parameters, passing through");
                PASSTHROUGH
            });

        Biquad {
            filter: DirectForm2Transposed::<f32>::new(coefficients),
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.filter.run(x)
    }
}
