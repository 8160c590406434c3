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
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tracing::{info, span, warn, Level};

use super::{AudioMixer, CHANNELS};
use crate::playsync::CancelHandle;

const BLOCK_FRAMES: usize = 256;

/// A mock output. Renders the mixer in real time and discards the result.
pub struct Output {
    name: String,
    sample_rate: u32,
    frames_rendered: Arc<AtomicU64>,
    cancel_handle: CancelHandle,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl Output {
    /// Opens the given mock output.
    pub fn open(name: &str, mut mixer: AudioMixer) -> Output {
        let sample_rate = mixer.sample_rate();
        let frames_rendered = Arc::new(AtomicU64::new(0));
        let cancel_handle = CancelHandle::new();

        let join_handle = {
            let name = name.to_string();
            let frames_rendered = frames_rendered.clone();
            let cancel_handle = cancel_handle.clone();
            let block_duration =
                Duration::from_secs_f64(BLOCK_FRAMES as f64 / sample_rate.max(1) as f64);
            thread::spawn(move || {
                let span = span!(Level::INFO, "mock output");
                let _enter = span.enter();
                info!(device = name, sample_rate, "Mock output started.");

                let mut block = vec![0.0f32; BLOCK_FRAMES * CHANNELS];
                while !cancel_handle.is_cancelled() {
                    mixer.process_into_output(&mut block, CHANNELS);
                    frames_rendered.fetch_add(BLOCK_FRAMES as u64, Ordering::Relaxed);
                    thread::sleep(block_duration);
                }
                info!(device = name, "Mock output stopped.");
            })
        };

        Output {
            name: name.to_string(),
            sample_rate,
            frames_rendered,
            cancel_handle,
            join_handle: Some(join_handle),
        }
    }

    /// Returns the number of frames rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }
}

impl super::Output for Output {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.cancel_handle.cancel();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                warn!(device = self.name, "Mock output thread panicked");
            }
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::impulse::Impulse;
    use crate::testutil::eventually;

    #[test]
    fn test_mock_output_renders() {
        let impulse = Impulse::from_channels(vec![vec![1.0], vec![1.0]], 8000);
        let (mixer, handle) = AudioMixer::new(8000, &impulse);
        let output = Output::open("mock-device", mixer);
        assert_eq!(output.to_string(), "mock-device (Mock)");
        assert_eq!(crate::audio::Output::sample_rate(&output), 8000);

        eventually(|| output.frames_rendered() > 0, "Mock output never rendered");

        drop(output);
        assert!(handle.add_source("kick", Box::new(Silence)).is_none());
    }

    #[test]
    fn test_render_thread_panic_is_contained() {
        let impulse = Impulse::from_channels(vec![vec![1.0], vec![1.0]], 8000);
        let (mixer, handle) = AudioMixer::new(8000, &impulse);
        assert!(handle.add_source("kick", Box::new(Explodes)).is_some());

        let output = Output::open("mock-device", mixer);
        // Joins the panicked thread without propagating the panic.
        drop(output);
        assert!(handle.add_source("kick", Box::new(Silence)).is_none());
    }

    struct Explodes;

    impl crate::audio::Source for Explodes {
        fn next_frame(&mut self, _: &mut [f32; CHANNELS]) -> bool {
            panic!("source failed");
        }
    }

    struct Silence;

    impl crate::audio::Source for Silence {
        fn next_frame(&mut self, _: &mut [f32; CHANNELS]) -> bool {
            false
        }
    }
}
