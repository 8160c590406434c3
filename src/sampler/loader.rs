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
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::decode::decode_file;
use super::source::SampleSource;
use super::SampleError;
use crate::audio::SharedGain;

/// A loaded sample that can be played back.
/// The sample data is stored in an Arc so every playback shares one buffer.
#[derive(Clone, Debug)]
pub struct LoadedSample {
    /// The sample data as f32 samples (interleaved if multi-channel).
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Creates a new source for one playback. The gain is read live, so volume
    /// changes reach playbacks that are already sounding.
    pub fn create_source(&self, gain: SharedGain) -> SampleSource {
        SampleSource::new(self.data.clone(), self.channel_count, gain)
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the length in frames.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Turns a voice's source reference into playable audio.
pub trait AssetLoader: Send + Sync {
    fn load(&self, source: &str) -> Result<LoadedSample, SampleError>;
}

/// Loads assets from disk and converts them to the output sample rate.
pub struct FileLoader {
    root: PathBuf,
    target_sample_rate: u32,
}

impl FileLoader {
    /// Creates a loader. Relative source references resolve against `root`.
    pub fn new(root: &Path, target_sample_rate: u32) -> FileLoader {
        FileLoader {
            root: root.to_path_buf(),
            target_sample_rate,
        }
    }

    fn resolve(&self, source: &str) -> PathBuf {
        let path = Path::new(source);
        if path.is_absolute() || path.exists() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl AssetLoader for FileLoader {
    fn load(&self, source: &str) -> Result<LoadedSample, SampleError> {
        let path = self.resolve(source);
        info!(path = ?path, "Loading sample into memory");

        let decoded = decode_file(&path)?;
        let (samples, sample_rate) = if decoded.sample_rate != self.target_sample_rate {
            info!(
                source_rate = decoded.sample_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sample"
            );
            (
                transcode_samples(
                    &decoded.samples,
                    decoded.channels,
                    decoded.sample_rate,
                    self.target_sample_rate,
                ),
                self.target_sample_rate,
            )
        } else {
            (decoded.samples, decoded.sample_rate)
        };

        let loaded = LoadedSample::new(samples, decoded.channels, sample_rate);
        let duration = Duration::from_secs_f64(loaded.frames() as f64 / sample_rate.max(1) as f64);
        info!(
            path = ?path,
            channels = loaded.channel_count(),
            sample_rate,
            duration_ms = duration.as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );
        Ok(loaded)
    }
}

/// Transcodes samples from one sample rate to another using linear interpolation,
/// which is sufficient for one-shot drum hits.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let channels = channel_count.max(1) as usize;
    if source_rate == 0 || target_rate == 0 {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let s0 = samples
                .get(source_frame * channels + channel)
                .copied()
                .unwrap_or(0.0);
            let s1 = samples
                .get((source_frame + 1) * channels + channel)
                .copied()
                .unwrap_or(s0);
            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_transcode_samples() {
        let source_rate = 44100;
        let target_rate = 48000;
        let source_samples: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / source_rate as f32).sin())
            .collect();

        let result = transcode_samples(&source_samples, 1, source_rate, target_rate);

        // Should have more samples at higher rate
        assert!((4800..=4801).contains(&result.len()));
        assert!(result.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_transcode_interpolates_per_channel() {
        // Stereo ramp at 2 Hz upsampled to 4 Hz.
        let samples = [0.0, 1.0, 1.0, 0.0];
        let result = transcode_samples(&samples, 2, 2, 4);
        assert_eq!(result, vec![0.0, 1.0, 0.5, 0.5, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_file_loader_resamples() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_wav(&dir.path().join("snare.wav"), &[0i16; 100], 1, 22050);

        let loader = FileLoader::new(dir.path(), 44100);
        let loaded = loader.load("snare.wav").expect("load failed");
        assert_eq!(loaded.sample_rate(), 44100);
        assert_eq!(loaded.channel_count(), 1);
        assert_eq!(loaded.frames(), 200);

        let absolute = dir.path().join("snare.wav");
        let loaded = loader
            .load(&absolute.to_string_lossy())
            .expect("load failed");
        assert_eq!(loaded.frames(), 200);
    }

    #[test]
    fn test_file_loader_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loader = FileLoader::new(dir.path(), 44100);
        assert!(loader.load("nope.wav").is_err());
    }
}
