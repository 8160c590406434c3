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
//! Procedural drums for voices without a sample.

use std::collections::HashMap;

use rand::rngs::StdRng;
use tracing::debug;

use crate::audio::MixerHandle;
use crate::kit::{category_for_id, Voice, VoiceSource};
use crate::playback::{Playable, SharedTracker};

pub mod biquad;
pub mod drums;
pub mod oscillator;
pub mod ramp;

/// Tom pitches by position in the kit.
const TOM_FREQUENCIES: [f32; 3] = [200.0, 150.0, 100.0];

/// The pitch of a tom whose position can't be told from its id.
const DEFAULT_TOM_FREQUENCY: f32 = 150.0;

/// A synthesized drum timbre.
#[derive(Debug, Clone, PartialEq)]
pub enum DrumKind {
    Kick,
    Snare,
    HiHat { open: bool },
    Tom { frequency: f32 },
    Cymbal,
}

impl DrumKind {
    /// Infers the drum a voice id names, e.g. "hat_open" or "tom2". Crash, ride
    /// and clap voices all play the cymbal.
    pub fn infer(id: &str) -> Option<DrumKind> {
        let id = id.to_ascii_lowercase();
        let kind = match category_for_id(&id)? {
            "KICKS" => DrumKind::Kick,
            "SNARES" => DrumKind::Snare,
            "HATS" => DrumKind::HiHat {
                open: id.contains("open"),
            },
            "TOMS" => DrumKind::Tom {
                frequency: tom_frequency(&id),
            },
            _ => DrumKind::Cymbal,
        };
        Some(kind)
    }
}

/// Reads the kit position from the digit right after "tom".
fn tom_frequency(id: &str) -> f32 {
    id.find("tom")
        .and_then(|at| id[at + 3..].chars().next())
        .and_then(|c| c.to_digit(10))
        .and_then(|digit| TOM_FREQUENCIES.get((digit as usize).checked_sub(1)?))
        .copied()
        .unwrap_or(DEFAULT_TOM_FREQUENCY)
}

/// Plays synthesized voices. Every trigger renders a fresh hit, and hits are
/// tracked so they can be choked like samples.
pub struct Synthesizer {
    voices: HashMap<String, (DrumKind, f32)>,
    mixer: MixerHandle,
    playbacks: SharedTracker,
    rng: StdRng,
}

impl Synthesizer {
    pub fn new(mixer: MixerHandle, playbacks: SharedTracker, rng: StdRng) -> Synthesizer {
        Synthesizer {
            voices: HashMap::new(),
            mixer,
            playbacks,
            rng,
        }
    }

    /// Returns the drum a voice plays, if it is synthesized.
    pub fn kind(&self, voice_id: &str) -> Option<&DrumKind> {
        self.voices.get(voice_id).map(|(kind, _)| kind)
    }

    /// Number of this synthesizer's hits still sounding.
    pub fn active_playbacks(&self) -> usize {
        let playbacks = self.playbacks.lock();
        self.voices
            .keys()
            .map(|voice_id| playbacks.active_for(voice_id))
            .sum()
    }
}

impl Playable for Synthesizer {
    fn sync(&mut self, voices: &[Voice]) {
        let current: HashMap<String, (DrumKind, f32)> = voices
            .iter()
            .filter_map(|voice| match voice.playback_source() {
                Some(VoiceSource::Synthesized(kind)) => {
                    Some((voice.id().to_string(), (kind, voice.effective_gain())))
                }
                _ => None,
            })
            .collect();

        let removed: Vec<String> = self
            .voices
            .keys()
            .filter(|id| !current.contains_key(*id))
            .cloned()
            .collect();
        for voice_id in removed {
            self.playbacks.lock().stop_voice(&voice_id);
        }
        self.voices = current;
    }

    fn play(&mut self, voice_id: &str) -> bool {
        let Some((kind, gain)) = self.voices.get(voice_id) else {
            debug!(voice = voice_id, "No synthesized drum for voice");
            return false;
        };

        let hit = drums::render(kind, self.mixer.sample_rate(), &mut self.rng).with_gain(*gain);
        let Some(playback) = self.mixer.add_source(voice_id, Box::new(hit)) else {
            return false;
        };
        self.playbacks.lock().add(playback);
        debug!(voice = voice_id, kind = ?kind, "Synth triggered");
        true
    }

    fn stop(&mut self, voice_id: &str) -> usize {
        let stopped = self.playbacks.lock().stop_voice(voice_id);
        if stopped > 0 {
            debug!(voice = voice_id, stopped, "Synth stopped");
        }
        stopped
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::audio::impulse::Impulse;
    use crate::audio::AudioMixer;
    use crate::playback::PlaybackTracker;

    #[test]
    fn test_infer() {
        assert_eq!(DrumKind::infer("kick"), Some(DrumKind::Kick));
        assert_eq!(DrumKind::infer("snare_1700000000000"), Some(DrumKind::Snare));
        assert_eq!(
            DrumKind::infer("hat_close"),
            Some(DrumKind::HiHat { open: false })
        );
        assert_eq!(
            DrumKind::infer("hat_open"),
            Some(DrumKind::HiHat { open: true })
        );
        assert_eq!(
            DrumKind::infer("tom1"),
            Some(DrumKind::Tom { frequency: 200.0 })
        );
        assert_eq!(
            DrumKind::infer("tom2"),
            Some(DrumKind::Tom { frequency: 150.0 })
        );
        assert_eq!(
            DrumKind::infer("TOM3"),
            Some(DrumKind::Tom { frequency: 100.0 })
        );
        assert_eq!(
            DrumKind::infer("tom_floor"),
            Some(DrumKind::Tom { frequency: 150.0 })
        );
        assert_eq!(
            DrumKind::infer("tom_1712345678901"),
            Some(DrumKind::Tom { frequency: 150.0 })
        );
        assert_eq!(DrumKind::infer("crash2"), Some(DrumKind::Cymbal));
        assert_eq!(DrumKind::infer("ride"), Some(DrumKind::Cymbal));
        assert_eq!(DrumKind::infer("clap_1"), Some(DrumKind::Cymbal));
        assert_eq!(DrumKind::infer("cowbell"), None);
    }

    fn setup() -> (Synthesizer, AudioMixer) {
        let impulse = Impulse::from_channels(vec![vec![1.0], vec![1.0]], 8000);
        let (mixer, handle) = AudioMixer::new(8000, &impulse);
        let synth = Synthesizer::new(
            handle,
            PlaybackTracker::shared(None),
            StdRng::seed_from_u64(4),
        );
        (synth, mixer)
    }

    #[test]
    fn test_plays_and_stops() {
        let (mut synth, mut mixer) = setup();
        synth.sync(&[
            Voice::new("hat_open", None, "Hi-Hat Op", None),
            Voice::new("snare", Some("snare.wav".to_string()), "Snare", None),
        ]);
        assert_eq!(synth.kind("hat_open"), Some(&DrumKind::HiHat { open: true }));
        assert_eq!(synth.kind("snare"), None);
        assert!(!synth.play("snare"));

        assert!(synth.play("hat_open"));
        assert!(synth.play("hat_open"));
        let mut output = vec![0.0; 64];
        mixer.process_into_output(&mut output, 2);
        assert_eq!(synth.active_playbacks(), 2);

        assert_eq!(synth.stop("hat_open"), 2);
        mixer.process_into_output(&mut output, 2);
        assert!(output.iter().all(|s| *s == 0.0));
        assert_eq!(mixer.active_source_count(), 0);
    }

    #[test]
    fn test_hits_end_on_their_own() {
        let (mut synth, mut mixer) = setup();
        synth.sync(&[Voice::new("hat_close", None, "Hi-Hat Cl", None)]);
        assert!(synth.play("hat_close"));

        // A closed hat lasts 400 frames at 8 kHz.
        let mut output = vec![0.0; 1000];
        mixer.process_into_output(&mut output, 2);
        assert_eq!(mixer.active_source_count(), 0);
        assert_eq!(synth.active_playbacks(), 0);
    }

    #[test]
    fn test_removed_voice_is_stopped() {
        let (mut synth, mut mixer) = setup();
        synth.sync(&[Voice::new("crash1", None, "Crash 1", None)]);
        assert!(synth.play("crash1"));
        let mut output = vec![0.0; 2];
        mixer.process_into_output(&mut output, 2);

        synth.sync(&[]);
        assert!(!synth.play("crash1"));
        mixer.process_into_output(&mut output, 2);
        assert_eq!(mixer.active_source_count(), 0);
    }

    #[test]
    fn test_volume_taper_applies() {
        let (mut synth, _mixer) = setup();
        synth.sync(&[Voice::new("kick", None, "Kick", None).with_volume(0.5)]);
        assert_eq!(synth.voices.get("kick").map(|(_, gain)| *gain), Some(0.25));
    }
}
