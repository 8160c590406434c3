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

use crate::audio::{SharedGain, Source, CHANNELS};

/// Plays a shared in-memory buffer once. Mono buffers feed both sides;
/// channels past the second are ignored.
pub struct SampleSource {
    data: Arc<Vec<f32>>,
    channel_count: usize,
    position: usize,
    gain: SharedGain,
}

impl SampleSource {
    pub fn new(data: Arc<Vec<f32>>, channel_count: u16, gain: SharedGain) -> SampleSource {
        SampleSource {
            data,
            channel_count: channel_count.max(1) as usize,
            position: 0,
            gain,
        }
    }
}

impl Source for SampleSource {
    fn next_frame(&mut self, frame: &mut [f32; CHANNELS]) -> bool {
        let end = self.position + self.channel_count;
        let Some(samples) = self.data.get(self.position..end) else {
            return false;
        };
        self.position = end;

        let gain = self.gain.get();
        let left = samples[0];
        let right = samples.get(1).copied().unwrap_or(left);
        *frame = [left * gain, right * gain];
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut SampleSource) -> Vec<[f32; CHANNELS]> {
        let mut frames = Vec::new();
        let mut frame = [0.0; CHANNELS];
        while source.next_frame(&mut frame) {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_mono_feeds_both_sides() {
        let gain = SharedGain::new(0.5);
        let mut source = SampleSource::new(Arc::new(vec![1.0, -1.0]), 1, gain);
        assert_eq!(drain(&mut source), vec![[0.5, 0.5], [-0.5, -0.5]]);
    }

    #[test]
    fn test_extra_channels_are_ignored() {
        let gain = SharedGain::new(1.0);
        let data = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let mut source = SampleSource::new(Arc::new(data), 3, gain);
        assert_eq!(drain(&mut source), vec![[0.1, 0.2], [0.4, 0.5]]);
    }

    #[test]
    fn test_gain_is_live() {
        let gain = SharedGain::new(1.0);
        let mut source = SampleSource::new(Arc::new(vec![1.0; 8]), 2, gain.clone());
        let mut frame = [0.0; CHANNELS];
        assert!(source.next_frame(&mut frame));
        assert_eq!(frame, [1.0, 1.0]);

        gain.set(0.25);
        assert!(source.next_frame(&mut frame));
        assert_eq!(frame, [0.25, 0.25]);
    }
}
