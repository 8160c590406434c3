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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::warn;

use super::convolver::DEFAULT_BLOCK_SIZE;
use super::impulse::Impulse;
use super::reverb::{ReverbGains, ReverbProcessor};
use super::{Source, CHANNELS};
use crate::playback::Playback;
use crate::playsync::CancelHandle;

/// Sources reserved up front so the callback rarely grows the list.
const SOURCE_CAPACITY: usize = 128;

/// Represents an active audio source in the mixer.
pub struct ActiveSource {
    /// The voice instance being rendered.
    pub source: Box<dyn Source>,
    /// Set by the mixer once the source runs out.
    pub is_finished: Arc<AtomicBool>,
    /// Cancel handle for this source.
    pub cancel_handle: CancelHandle,
}

/// Mixes active sources into the master bus and routes it through the reverb.
/// The mixer is owned by the audio callback.
pub struct AudioMixer {
    active_sources: Vec<ActiveSource>,
    source_rx: Receiver<ActiveSource>,
    reverb: ReverbProcessor,
    sample_rate: u32,
}

/// The control side's connection to the mixer.
#[derive(Clone)]
pub struct MixerHandle {
    source_tx: Sender<ActiveSource>,
    reverb_gains: ReverbGains,
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer and the handle used to feed it.
    pub fn new(sample_rate: u32, impulse: &Impulse) -> (AudioMixer, MixerHandle) {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        let reverb_gains = ReverbGains::new();

        let mixer = AudioMixer {
            active_sources: Vec::with_capacity(SOURCE_CAPACITY),
            source_rx,
            reverb: ReverbProcessor::new(impulse, reverb_gains.clone(), DEFAULT_BLOCK_SIZE),
            sample_rate,
        };
        let handle = MixerHandle {
            source_tx,
            reverb_gains,
            sample_rate,
        };
        (mixer, handle)
    }

    fn receive_sources(&mut self) {
        while let Ok(source) = self.source_rx.try_recv() {
            self.active_sources.push(source);
        }
    }

    /// Processes one frame of the master bus.
    fn process_frame(&mut self) -> [f32; CHANNELS] {
        let mut master = [0.0f32; CHANNELS];

        self.active_sources.retain_mut(|active_source| {
            if active_source.cancel_handle.is_cancelled() {
                return false;
            }

            let mut frame = [0.0f32; CHANNELS];
            if active_source.source.next_frame(&mut frame) {
                for (out, sample) in master.iter_mut().zip(frame) {
                    *out += sample;
                }
                true
            } else {
                active_source.is_finished.store(true, Ordering::Relaxed);
                false
            }
        });

        self.reverb.process(&mut master);
        master
    }

    /// Fills an interleaved output buffer with `num_channels` channels. Mono outputs
    /// receive the average of both sides; channels past the second are silent.
    pub fn process_into_output(&mut self, output: &mut [f32], num_channels: usize) {
        self.receive_sources();

        if num_channels == 0 {
            return;
        }
        let mut out_frames = output.chunks_exact_mut(num_channels);
        for out_frame in &mut out_frames {
            let frame = self.process_frame();
            if num_channels == 1 {
                out_frame[0] = (frame[0] + frame[1]) * 0.5;
                continue;
            }
            out_frame[..CHANNELS].copy_from_slice(&frame);
            out_frame[CHANNELS..].fill(0.0);
        }
        // A trailing partial frame is silenced.
        out_frames.into_remainder().fill(0.0);
    }

    /// The number of sources currently being rendered.
    pub fn active_source_count(&self) -> usize {
        self.active_sources.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl MixerHandle {
    /// Queues a source for the mixer. Returns None if the mixer has gone away.
    pub fn add_source(&self, voice_id: &str, source: Box<dyn Source>) -> Option<Playback> {
        let cancel_handle = CancelHandle::new();
        let is_finished = Arc::new(AtomicBool::new(false));
        let active_source = ActiveSource {
            source,
            is_finished: is_finished.clone(),
            cancel_handle: cancel_handle.clone(),
        };

        if self.source_tx.send(active_source).is_err() {
            warn!(voice = voice_id, "Mixer is gone, dropping playback");
            return None;
        }
        Some(Playback::new(voice_id, cancel_handle, is_finished))
    }

    pub fn reverb_gains(&self) -> &ReverbGains {
        &self.reverb_gains
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
