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
use rand::Rng;

/// Length of the synthesized impulse response.
pub const IMPULSE_SECONDS: u32 = 2;

/// Number of channels in the impulse response.
pub const IMPULSE_CHANNELS: usize = 2;

/// Convolution gain calibration (-58 dB) at the reference rate below.
const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000125;

/// A stereo impulse response used by the reverb bus.
#[derive(Clone, Debug)]
pub struct Impulse {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl Impulse {
    /// Synthesizes a decaying noise tail: each sample is `uniform(-1, 1) * (1 - i/len)^2`.
    pub fn generate<R: Rng + ?Sized>(sample_rate: u32, rng: &mut R) -> Impulse {
        let length = (sample_rate * IMPULSE_SECONDS) as usize;
        let channels = (0..IMPULSE_CHANNELS)
            .map(|_| {
                (0..length)
                    .map(|i| {
                        let decay = 1.0 - i as f32 / length as f32;
                        rng.gen_range(-1.0f32..1.0) * decay * decay
                    })
                    .collect()
            })
            .collect();
        Impulse {
            channels,
            sample_rate,
        }
    }

    /// Wraps existing impulse data. All channels must have the same length.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Impulse {
        Impulse {
            channels,
            sample_rate,
        }
    }

    /// Returns the samples of one channel.
    pub fn channel(&self, index: usize) -> &[f32] {
        self.channels
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns the length in frames.
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the scale that brings the convolved signal to a level comparable
    /// with the dry signal, regardless of the impulse's raw energy.
    pub fn normalization_scale(&self) -> f32 {
        let frames = self.len();
        if frames == 0 {
            return 1.0;
        }

        let sum_of_squares: f32 = self
            .channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|s| s * s)
            .sum();
        let mut power = (sum_of_squares / (self.channels.len() * frames) as f32).sqrt();
        if !power.is_finite() || power < MIN_POWER {
            power = MIN_POWER;
        }

        let mut scale = GAIN_CALIBRATION / power;
        if self.sample_rate > 0 {
            scale *= GAIN_CALIBRATION_SAMPLE_RATE / self.sample_rate as f32;
        }
        scale
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_impulse_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let impulse = Impulse::generate(8000, &mut rng);

        assert_eq!(impulse.channel_count(), 2);
        assert_eq!(impulse.len(), 16000);
        assert_eq!(impulse.channel(1).len(), 16000);

        for channel in 0..2 {
            for (i, sample) in impulse.channel(channel).iter().enumerate() {
                let envelope = (1.0 - i as f32 / 16000.0).powi(2);
                assert!(sample.abs() <= envelope + 1e-6);
            }
        }
    }

    #[test]
    fn test_impulse_decays() {
        let mut rng = StdRng::seed_from_u64(11);
        let impulse = Impulse::generate(8000, &mut rng);
        let left = impulse.channel(0);

        let head: f32 = left[..1000].iter().map(|s| s.abs()).sum();
        let tail: f32 = left[15000..].iter().map(|s| s.abs()).sum();
        assert!(head > tail * 10.0, "head={} tail={}", head, tail);

        // The two channels are decorrelated noise.
        assert_ne!(&impulse.channel(0)[..64], &impulse.channel(1)[..64]);
    }

    #[test]
    fn test_normalization_scale() {
        let flat = Impulse::from_channels(vec![vec![1.0; 100], vec![1.0; 100]], 44100);
        assert!((flat.normalization_scale() - GAIN_CALIBRATION).abs() < 1e-9);

        let silent = Impulse::from_channels(vec![vec![0.0; 100]], 44100);
        assert!((silent.normalization_scale() - GAIN_CALIBRATION / MIN_POWER).abs() < 1e-3);

        let empty = Impulse::from_channels(Vec::new(), 44100);
        assert_eq!(empty.normalization_scale(), 1.0);
    }
}
