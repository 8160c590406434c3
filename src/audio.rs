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
use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use thiserror::Error;

pub mod convolver;
pub mod cpal;
pub mod impulse;
pub mod mixer;
pub mod mock;
pub mod reverb;

pub use mixer::{ActiveSource, AudioMixer, MixerHandle};

/// The mixer renders stereo frames.
pub const CHANNELS: usize = 2;

/// A renderable voice instance.
pub trait Source: Send {
    /// Writes the next stereo frame into `frame`. Returns false once the source is
    /// exhausted, leaving `frame` untouched.
    fn next_frame(&mut self, frame: &mut [f32; CHANNELS]) -> bool;
}

/// A gain value shared between the control side and the audio callback.
#[derive(Clone)]
pub struct SharedGain(Arc<AtomicU32>);

impl SharedGain {
    pub fn new(gain: f32) -> SharedGain {
        SharedGain(Arc::new(AtomicU32::new(gain.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(gain.to_bits(), Ordering::Relaxed);
    }
}

impl fmt::Debug for SharedGain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedGain").field(&self.get()).finish()
    }
}

/// Errors raised while opening an audio output.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no audio device found with name {0}")]
    NotFound(String),

    #[error("unable to list audio devices: {0}")]
    Devices(#[from] ::cpal::DevicesError),

    #[error("unable to query the device's output format: {0}")]
    DefaultConfig(#[from] ::cpal::DefaultStreamConfigError),

    #[error("unable to build the output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("unable to start the output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),

    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(String),
}

/// An open audio output. The output is released when dropped.
pub trait Output: fmt::Display {
    /// The rate at which the output consumes frames.
    fn sample_rate(&self) -> u32;
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, OutputError> {
    cpal::list_devices()
}

/// Opens the named device and hands it the mixer. Device names starting with
/// "mock" open a device that renders without a sound card.
pub fn open_output(device: &str, mixer: AudioMixer) -> Result<Box<dyn Output>, OutputError> {
    if device.starts_with("mock") {
        return Ok(Box::new(mock::Output::open(device, mixer)));
    }

    Ok(Box::new(cpal::Output::open(device, mixer)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_gain() {
        let gain = SharedGain::new(0.25);
        let other = gain.clone();
        assert_eq!(other.get(), 0.25);

        gain.set(0.8);
        assert_eq!(other.get(), 0.8);
    }
}
