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
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use super::loader::{AssetLoader, LoadedSample};
use super::SampleError;
use crate::audio::{MixerHandle, SharedGain};
use crate::kit::{Voice, VoiceSource};
use crate::playback::{Playable, SharedTracker};

/// Gain changes at or below this are not applied.
const GAIN_EPSILON: f32 = 0.001;

struct LoadRequest {
    voice_id: String,
    source: String,
    generation: u64,
}

struct LoadResult {
    voice_id: String,
    generation: u64,
    result: Result<LoadedSample, SampleError>,
}

/// The cached asset for one voice. `sample` stays empty until the load for
/// `generation` completes.
struct Slot {
    source: String,
    generation: u64,
    sample: Option<LoadedSample>,
    gain: SharedGain,
}

/// Plays sample-backed voices.
///
/// Loads run on a background thread and complete asynchronously; playing a voice
/// whose asset has not arrived yet does nothing. Each slot carries a generation
/// that is bumped on every source change, so a completion for a superseded
/// source is discarded.
pub struct SamplePlayer {
    slots: HashMap<String, Slot>,
    mixer: MixerHandle,
    playbacks: SharedTracker,
    request_tx: Option<Sender<LoadRequest>>,
    result_rx: Receiver<LoadResult>,
    loader_thread: Option<thread::JoinHandle<()>>,
    /// Set on drop so queued loads are skipped.
    shutdown: Arc<AtomicBool>,
    next_generation: u64,
    pending: usize,
    loads_issued: u64,
    unloads: u64,
}

impl SamplePlayer {
    /// Creates a player and starts its loader thread.
    pub fn new(
        loader: Arc<dyn AssetLoader>,
        mixer: MixerHandle,
        playbacks: SharedTracker,
    ) -> SamplePlayer {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<LoadRequest>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let loader_shutdown = shutdown.clone();
        let loader_thread = thread::spawn(move || {
            for request in request_rx {
                if loader_shutdown.load(Ordering::Acquire) {
                    break;
                }
                let result = loader.load(&request.source);
                let result = LoadResult {
                    voice_id: request.voice_id,
                    generation: request.generation,
                    result,
                };
                if result_tx.send(result).is_err() {
                    break;
                }
            }
        });

        SamplePlayer {
            slots: HashMap::new(),
            mixer,
            playbacks,
            request_tx: Some(request_tx),
            result_rx,
            loader_thread: Some(loader_thread),
            shutdown,
            next_generation: 0,
            pending: 0,
            loads_issued: 0,
            unloads: 0,
        }
    }

    /// Applies every load completion that has arrived.
    fn drain_results(&mut self) {
        while let Ok(result) = self.result_rx.try_recv() {
            self.apply_result(result);
        }
    }

    fn apply_result(&mut self, result: LoadResult) {
        self.pending = self.pending.saturating_sub(1);

        let Some(slot) = self
            .slots
            .get_mut(&result.voice_id)
            .filter(|slot| slot.generation == result.generation)
        else {
            debug!(voice = result.voice_id, "Discarding stale load");
            return;
        };

        match result.result {
            Ok(sample) => {
                debug!(voice = result.voice_id, source = slot.source, "Sample ready");
                slot.sample = Some(sample);
            }
            Err(e) => {
                warn!(
                    voice = result.voice_id,
                    source = slot.source,
                    err = e.to_string(),
                    "Failed to load sample, voice will be silent"
                );
            }
        }
    }

    fn request_load(&mut self, voice_id: &str, source: &str, gain: f32) {
        let generation = self.next_generation;
        self.next_generation += 1;

        self.slots.insert(
            voice_id.to_string(),
            Slot {
                source: source.to_string(),
                generation,
                sample: None,
                gain: SharedGain::new(gain),
            },
        );

        let Some(request_tx) = &self.request_tx else {
            return;
        };
        let request = LoadRequest {
            voice_id: voice_id.to_string(),
            source: source.to_string(),
            generation,
        };
        if request_tx.send(request).is_err() {
            warn!(voice = voice_id, "Sample loader is gone");
            return;
        }
        self.pending += 1;
        self.loads_issued += 1;
        debug!(voice = voice_id, source, generation, "Load requested");
    }

    fn unload(&mut self, voice_id: &str) {
        self.playbacks.lock().stop_voice(voice_id);
        if self.slots.remove(voice_id).is_some() {
            self.unloads += 1;
            debug!(voice = voice_id, "Sample unloaded");
        }
    }

    /// Blocks until every requested load has completed or the timeout passes.
    /// Returns true if the player is idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.drain_results();
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.result_rx.recv_timeout(remaining) {
                Ok(result) => self.apply_result(result),
                Err(_) => return false,
            }
        }
        true
    }

    /// Returns true if the voice's asset is loaded and playable.
    pub fn is_loaded(&self, voice_id: &str) -> bool {
        self.slots
            .get(voice_id)
            .is_some_and(|slot| slot.sample.is_some())
    }

    /// Returns the live gain of a cached voice.
    pub fn gain(&self, voice_id: &str) -> Option<f32> {
        self.slots.get(voice_id).map(|slot| slot.gain.get())
    }

    /// Total loads requested since creation.
    pub fn loads_issued(&self) -> u64 {
        self.loads_issued
    }

    /// Total cached assets released since creation.
    pub fn unloads(&self) -> u64 {
        self.unloads
    }

    /// Number of cached voices.
    pub fn cached_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of this player's playbacks still sounding.
    pub fn active_playbacks(&self) -> usize {
        let playbacks = self.playbacks.lock();
        self.slots
            .keys()
            .map(|voice_id| playbacks.active_for(voice_id))
            .sum()
    }

    #[cfg(test)]
    fn frames(&self, voice_id: &str) -> Option<usize> {
        self.slots
            .get(voice_id)
            .and_then(|slot| slot.sample.as_ref())
            .map(LoadedSample::frames)
    }
}

impl Playable for SamplePlayer {
    /// Evicts voices that are gone, reloads voices whose source changed and updates
    /// live gains in place.
    fn sync(&mut self, voices: &[Voice]) {
        self.drain_results();

        let wanted: Vec<(&str, String, f32)> = voices
            .iter()
            .filter_map(|voice| match voice.playback_source() {
                Some(VoiceSource::Sampled(source)) => {
                    Some((voice.id(), source, voice.effective_gain()))
                }
                _ => None,
            })
            .collect();

        let evicted: Vec<String> = self
            .slots
            .keys()
            .filter(|id| !wanted.iter().any(|(wanted_id, ..)| *wanted_id == id.as_str()))
            .cloned()
            .collect();
        for voice_id in evicted {
            self.unload(&voice_id);
        }

        for (voice_id, source, gain) in wanted {
            let is_current = self.slots.get(voice_id).map(|slot| slot.source == source);
            match is_current {
                Some(true) => {
                    if let Some(slot) = self.slots.get_mut(voice_id) {
                        if (slot.gain.get() - gain).abs() > GAIN_EPSILON {
                            slot.gain.set(gain);
                            debug!(voice = voice_id, gain, "Gain updated");
                        }
                    }
                }
                Some(false) => {
                    self.unload(voice_id);
                    self.request_load(voice_id, &source, gain);
                }
                None => self.request_load(voice_id, &source, gain),
            }
        }
    }

    fn play(&mut self, voice_id: &str) -> bool {
        self.drain_results();

        let Some(slot) = self.slots.get(voice_id) else {
            debug!(voice = voice_id, "No sample for voice");
            return false;
        };
        let Some(sample) = &slot.sample else {
            debug!(voice = voice_id, "Sample not loaded yet, ignoring trigger");
            return false;
        };

        let source = sample.create_source(slot.gain.clone());
        let Some(playback) = self.mixer.add_source(voice_id, Box::new(source)) else {
            return false;
        };
        self.playbacks.lock().add(playback);
        debug!(voice = voice_id, "Sample triggered");
        true
    }

    fn stop(&mut self, voice_id: &str) -> usize {
        let stopped = self.playbacks.lock().stop_voice(voice_id);
        if stopped > 0 {
            debug!(voice = voice_id, stopped, "Sample stopped");
        }
        stopped
    }
}

impl Drop for SamplePlayer {
    fn drop(&mut self) {
        for voice_id in self.slots.keys() {
            self.playbacks.lock().stop_voice(voice_id);
        }
        // Queued loads are skipped; at most the one in flight finishes.
        self.shutdown.store(true, Ordering::Release);
        self.request_tx.take();
        if let Some(loader_thread) = self.loader_thread.take() {
            if loader_thread.join().is_err() {
                warn!("Sample loader thread panicked");
            }
        }
        info!(loads = self.loads_issued, "Sample player shut down");
    }
}

impl std::fmt::Debug for SamplePlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplePlayer")
            .field("cached_voices", &self.slots.len())
            .field("pending_loads", &self.pending)
            .field("active_playbacks", &self.active_playbacks())
            .finish()
    }
}
