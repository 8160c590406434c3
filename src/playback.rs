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

//! Tracking of in-flight playbacks.
//!
//! Every trigger starts a new playback; triggers of the same voice overlap instead of
//! cutting each other off. A playback ends when its source finishes or when it is
//! stopped by a choke. Hosts may opt into a polyphony ceiling, which steals the
//! oldest playback of another voice once it is reached.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::kit::Voice;
use crate::playsync::CancelHandle;

/// A backend that sounds voices by id. Choke and trigger dispatch go through
/// this interface so they never depend on how a voice produces audio.
pub trait Playable {
    /// Reconciles the backend's per-voice state with the current voice list.
    fn sync(&mut self, voices: &[Voice]);

    /// Starts one playback of the voice. Returns false if the voice can't sound yet.
    fn play(&mut self, voice_id: &str) -> bool;

    /// Stops every in-flight playback of the voice. Returns how many were stopped.
    fn stop(&mut self, voice_id: &str) -> usize;
}

/// Global playback ID counter.
static NEXT_PLAYBACK_ID: AtomicU64 = AtomicU64::new(1);

/// One sounding instance of a voice.
pub struct Playback {
    /// Unique ID for this playback.
    id: u64,
    /// The voice this playback belongs to.
    voice_id: String,
    /// When this playback started.
    start_time: Instant,
    /// Cancel handle shared with the mixer source.
    cancel_handle: CancelHandle,
    /// Set by the mixer once the source has run out.
    finished: Arc<AtomicBool>,
}

impl Playback {
    /// Creates a new playback.
    pub fn new(voice_id: &str, cancel_handle: CancelHandle, finished: Arc<AtomicBool>) -> Self {
        Self {
            id: NEXT_PLAYBACK_ID.fetch_add(1, Ordering::SeqCst),
            voice_id: voice_id.to_string(),
            start_time: Instant::now(),
            cancel_handle,
            finished,
        }
    }

    /// Returns the voice id.
    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// Returns true while the playback is neither finished nor cancelled.
    pub fn is_live(&self) -> bool {
        !self.finished.load(Ordering::Acquire) && !self.cancel_handle.is_cancelled()
    }

    /// Cuts the playback off at the mixer's next frame.
    pub fn stop(&self) {
        self.cancel_handle.cancel();
    }
}

/// A tracker shared by every playback backend, so the ceiling is global.
pub type SharedTracker = Arc<Mutex<PlaybackTracker>>;

/// Tracks live playbacks and enforces the optional polyphony ceiling.
pub struct PlaybackTracker {
    playbacks: Vec<Playback>,
    max_voices: Option<u32>,
}

impl PlaybackTracker {
    /// Creates a new tracker. Without a ceiling, polyphony is unbounded.
    pub fn new(max_voices: Option<u32>) -> Self {
        Self {
            playbacks: Vec::new(),
            max_voices: max_voices.map(|max| max.max(1)),
        }
    }

    /// Creates a tracker that can be shared between backends.
    pub fn shared(max_voices: Option<u32>) -> SharedTracker {
        Arc::new(Mutex::new(Self::new(max_voices)))
    }

    /// Adds a playback. If a ceiling is set and reached, the oldest live playback of
    /// another voice is stolen; earlier hits of the same voice are never cut off.
    /// Returns the number of playbacks stolen.
    pub fn add(&mut self, playback: Playback) -> usize {
        self.prune();

        let mut stolen = 0;
        if let Some(max_voices) = self.max_voices {
            while self.playbacks.len() >= max_voices as usize {
                let Some(oldest) = self
                    .playbacks
                    .iter()
                    .filter(|p| p.voice_id != playback.voice_id)
                    .min_by_key(|p| p.start_time)
                else {
                    debug!(
                        voice = playback.voice_id,
                        max_voices,
                        "Voice limit held by one voice, nothing to steal"
                    );
                    break;
                };
                oldest.stop();
                let oldest_id = oldest.id;
                self.playbacks.retain(|p| p.id != oldest_id);
                stolen += 1;
                warn!(max_voices, "Voice limit reached, stealing oldest");
            }
        }

        self.playbacks.push(playback);
        stolen
    }

    /// Stops every live playback of the given voice. Returns how many were stopped.
    pub fn stop_voice(&mut self, voice_id: &str) -> usize {
        let mut stopped = 0;
        self.playbacks.retain(|p| {
            if p.voice_id != voice_id {
                return true;
            }
            if p.is_live() {
                stopped += 1;
            }
            p.stop();
            false
        });
        stopped
    }

    /// Returns the number of live playbacks.
    pub fn active_count(&self) -> usize {
        self.playbacks.iter().filter(|p| p.is_live()).count()
    }

    /// Returns the number of live playbacks of the given voice.
    pub fn active_for(&self, voice_id: &str) -> usize {
        self.playbacks
            .iter()
            .filter(|p| p.voice_id == voice_id && p.is_live())
            .count()
    }

    fn prune(&mut self) {
        self.playbacks.retain(Playback::is_live);
    }
}

impl std::fmt::Debug for PlaybackTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackTracker")
            .field("active_playbacks", &self.active_count())
            .field("max_voices", &self.max_voices)
            .finish()
    }
}
