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
//! The drum engine: one entry point for triggering voices plus the editing
//! operations a host needs.
//!
//! A trigger resolves the voice, chokes the other members of its mute group and
//! then starts the voice on the backend that sounds it. Every registry mutation
//! is followed by a sync of both backends, so the sample cache and synthesized
//! voices always reflect the registry.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, span, Level};

use crate::audio::reverb::ReverbControl;
use crate::audio::MixerHandle;
use crate::kit::{
    Preset, PresetBank, SampleCatalog, Voice, VoiceRegistry, VoiceSource, VoiceUpdate,
};
use crate::playback::{Playable, PlaybackTracker, SharedTracker};
use crate::sampler::{AssetLoader, SamplePlayer};
use crate::store::Store;
use crate::synth::Synthesizer;

pub mod choke;

pub struct DrumEngine {
    registry: VoiceRegistry,
    presets: PresetBank,
    catalog: SampleCatalog,
    sampler: SamplePlayer,
    synth: Synthesizer,
    reverb: ReverbControl,
    playbacks: SharedTracker,
}

impl DrumEngine {
    /// Creates the engine. Saved voices, presets and the reverb amount are read from
    /// the store; without a saved kit the default kit is built from the catalog.
    /// Polyphony is unbounded unless `max_voices` sets a ceiling.
    pub fn new(
        mixer: MixerHandle,
        store: Arc<dyn Store>,
        catalog: SampleCatalog,
        loader: Arc<dyn AssetLoader>,
        max_voices: Option<u32>,
    ) -> DrumEngine {
        let registry = VoiceRegistry::open(store.clone(), &catalog);
        let presets = PresetBank::open(store.clone());
        let reverb = ReverbControl::open(mixer.reverb_gains().clone(), store);
        let playbacks = PlaybackTracker::shared(max_voices);
        let sampler = SamplePlayer::new(loader, mixer.clone(), playbacks.clone());
        let synth = Synthesizer::new(mixer, playbacks.clone(), StdRng::from_entropy());

        let mut engine = DrumEngine {
            registry,
            presets,
            catalog,
            sampler,
            synth,
            reverb,
            playbacks,
        };
        engine.sync();
        info!(
            voices = engine.registry.list().len(),
            wet_amount = engine.reverb.wet_amount(),
            "Drum engine ready."
        );
        engine
    }

    /// Triggers a voice. Unknown ids are ignored. Voices sharing the mute group
    /// are stopped before the voice starts.
    pub fn trigger(&mut self, voice_id: &str) {
        let span = span!(Level::DEBUG, "trigger", voice = voice_id);
        let _enter = span.enter();

        let Some(voice) = self.registry.get(voice_id) else {
            debug!("Trigger for unknown voice ignored");
            return;
        };
        let source = voice.playback_source();
        let choked: Vec<(String, Option<VoiceSource>)> =
            choke::targets(voice, self.registry.list())
                .into_iter()
                .map(|other| (other.id().to_string(), other.playback_source()))
                .collect();

        for (other_id, other_source) in choked {
            if let Some(backend) = self.backend(other_source.as_ref()) {
                backend.stop(&other_id);
            }
        }

        match self.backend(source.as_ref()) {
            Some(backend) => {
                backend.play(voice_id);
            }
            None => debug!("Voice has nothing to play"),
        }
    }

    /// Triggers the voice bound to a key. Returns the id of the triggered voice.
    pub fn trigger_key(&mut self, key: &str) -> Option<String> {
        let voice_id = self.registry.voice_for_key(key)?.id().to_string();
        self.trigger(&voice_id);
        Some(voice_id)
    }

    fn backend(&mut self, source: Option<&VoiceSource>) -> Option<&mut dyn Playable> {
        match source? {
            VoiceSource::Sampled(_) => Some(&mut self.sampler),
            VoiceSource::Synthesized(_) => Some(&mut self.synth),
        }
    }

    /// Reconciles both backends with the registry.
    pub fn sync(&mut self) {
        let voices = self.registry.list();
        self.sampler.sync(voices);
        self.synth.sync(voices);
    }

    pub fn voices(&self) -> &[Voice] {
        self.registry.list()
    }

    pub fn voice(&self, voice_id: &str) -> Option<&Voice> {
        self.registry.get(voice_id)
    }

    /// Adds a voice and returns its id.
    pub fn add_voice(
        &mut self,
        template_type: &str,
        source: Option<String>,
        file_name: Option<String>,
    ) -> String {
        let voice_id = self.registry.add(template_type, source, file_name);
        self.sync();
        voice_id
    }

    /// Updates a voice. Returns false if the id is unknown.
    pub fn update_voice(&mut self, voice_id: &str, update: &VoiceUpdate) -> bool {
        let updated = self.registry.update(voice_id, update);
        if updated {
            self.sync();
        }
        updated
    }

    /// Removes a voice. Returns false if the id is unknown.
    pub fn remove_voice(&mut self, voice_id: &str) -> bool {
        let removed = self.registry.remove(voice_id);
        if removed {
            self.sync();
        }
        removed
    }

    pub fn clear_voices(&mut self) {
        self.registry.clear();
        self.sync();
    }

    /// Replaces the kit with the starter kit.
    pub fn reset_to_default(&mut self) {
        self.registry.reset_to_default(&self.catalog);
        self.sync();
    }

    /// Saves the current kit under a name. Returns false for a blank name.
    pub fn save_preset(&mut self, name: &str) -> bool {
        self.presets.save(name, self.registry.list())
    }

    /// Replaces the kit with a saved preset. Returns false if there is no such preset.
    pub fn load_preset(&mut self, name: &str) -> bool {
        let Some(preset) = self.presets.get(name) else {
            debug!(preset = name, "No such preset");
            return false;
        };
        self.registry.replace_all(preset.voices);
        self.sync();
        info!(preset = %preset.name, "Preset loaded");
        true
    }

    pub fn delete_preset(&mut self, name: &str) -> bool {
        self.presets.delete(name)
    }

    /// Returns the saved presets ordered by name.
    pub fn presets(&self) -> Vec<Preset> {
        self.presets.list()
    }

    /// Sets the reverb wet amount, clamped to [0, 100]. Returns the applied amount.
    pub fn set_reverb(&mut self, wet_amount: f32) -> f32 {
        self.reverb.set_wet_amount(wet_amount)
    }

    pub fn reverb(&self) -> f32 {
        self.reverb.wet_amount()
    }

    pub fn catalog(&self) -> &SampleCatalog {
        &self.catalog
    }

    pub fn sampler(&self) -> &SamplePlayer {
        &self.sampler
    }

    /// Blocks until pending sample loads finish. Returns false on timeout.
    pub fn wait_for_samples(&mut self, timeout: Duration) -> bool {
        self.sampler.wait_idle(timeout)
    }

    /// Number of live playbacks of a voice.
    pub fn active_playbacks(&self, voice_id: &str) -> usize {
        self.playbacks.lock().active_for(voice_id)
    }

    /// Number of live playbacks across all voices.
    pub fn total_playbacks(&self) -> usize {
        self.playbacks.lock().active_count()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::Path;

    use super::*;
    use crate::audio::impulse::Impulse;
    use crate::audio::AudioMixer;
    use crate::store::MemoryStore;
    use crate::testutil::CountingLoader;

    const WAIT: Duration = Duration::from_secs(3);

    struct Harness {
        engine: DrumEngine,
        mixer: AudioMixer,
        handle: MixerHandle,
        loader: Arc<CountingLoader>,
        store: Arc<dyn Store>,
    }

    impl Harness {
        fn render(&mut self, frames: usize) -> Vec<f32> {
            let mut output = vec![0.0; frames * 2];
            self.mixer.process_into_output(&mut output, 2);
            output
        }
    }

    fn catalog() -> SampleCatalog {
        let mut categories = BTreeMap::new();
        for (category, files) in [
            ("KICKS", vec!["kick.wav"]),
            ("SNARES", vec!["snare.wav"]),
            ("HATS", vec!["closed.wav", "open.wav"]),
            ("TOMS", vec!["t1.wav", "t2.wav", "t3.wav"]),
            ("CRASHES", vec!["c1.wav", "c2.wav"]),
            ("RIDES", vec!["ride.wav"]),
        ] {
            categories.insert(
                category.to_string(),
                files.into_iter().map(str::to_string).collect(),
            );
        }
        SampleCatalog::new(Path::new("sounds"), categories)
    }

    fn harness_with(store: Arc<dyn Store>, catalog: SampleCatalog) -> Harness {
        let impulse = Impulse::from_channels(vec![vec![1.0], vec![1.0]], 44100);
        let (mixer, handle) = AudioMixer::new(44100, &impulse);
        let loader = Arc::new(CountingLoader::new());
        let mut engine = DrumEngine::new(
            handle.clone(),
            store.clone(),
            catalog,
            loader.clone(),
            None,
        );
        assert!(engine.wait_for_samples(WAIT));
        Harness {
            engine,
            mixer,
            handle,
            loader,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(MemoryStore::new()), catalog())
    }

    #[test]
    fn test_default_kit_loads() {
        let h = harness();
        assert_eq!(h.engine.voices().len(), 10);
        assert_eq!(h.engine.sampler().cached_count(), 10);
        assert_eq!(h.loader.load_count(), 10);
    }

    #[test]
    fn test_hat_choke() {
        let mut h = harness();

        h.engine.trigger("hat_open");
        h.render(8);
        assert_eq!(h.engine.active_playbacks("hat_open"), 1);

        h.engine.trigger("hat_close");
        assert_eq!(h.engine.active_playbacks("hat_open"), 0);
        assert_eq!(h.engine.active_playbacks("hat_close"), 1);

        // Only the closed hat reaches the output.
        let output = h.render(1);
        assert!((output[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_retrigger_overlaps() {
        let mut h = harness();
        h.engine.trigger("snare");
        h.engine.trigger("snare");
        let output = h.render(1);
        assert_eq!(h.engine.active_playbacks("snare"), 2);
        assert!((output[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_voice_is_ignored() {
        let mut h = harness();
        h.engine.trigger("nope");
        h.render(1);
        assert_eq!(h.engine.total_playbacks(), 0);
        assert_eq!(h.mixer.active_source_count(), 0);
    }

    #[test]
    fn test_volume_updates_gain_without_reload() {
        let mut h = harness();
        assert!(h
            .engine
            .update_voice("kick", &VoiceUpdate::new().volume(0.5)));
        assert_eq!(h.engine.sampler().gain("kick"), Some(0.25));

        assert!(h
            .engine
            .update_voice("kick", &VoiceUpdate::new().volume(1.0)));
        assert_eq!(h.engine.sampler().gain("kick"), Some(1.0));
        assert_eq!(h.engine.sampler().loads_issued(), 10);
        assert_eq!(h.loader.loads_of("sounds/KICKS/kick.wav"), 1);
    }

    #[test]
    fn test_sync_twice_is_idempotent() {
        let mut h = harness();
        h.engine.sync();
        h.engine.sync();
        assert!(h.engine.wait_for_samples(WAIT));
        assert_eq!(h.engine.sampler().loads_issued(), 10);
        assert_eq!(h.engine.sampler().unloads(), 0);
    }

    #[test]
    fn test_source_change_reloads() {
        let mut h = harness();
        let update = VoiceUpdate::new().source(Some("sounds/KICKS/other.wav".to_string()));
        assert!(h.engine.update_voice("kick", &update));
        assert!(h.engine.wait_for_samples(WAIT));
        assert_eq!(h.engine.sampler().loads_issued(), 11);
        assert_eq!(h.engine.sampler().unloads(), 1);
        assert_eq!(h.loader.loads_of("sounds/KICKS/other.wav"), 1);
    }

    #[test]
    fn test_remove_voice_evicts() {
        let mut h = harness();
        h.engine.trigger("ride");
        assert!(h.engine.remove_voice("ride"));
        assert_eq!(h.engine.active_playbacks("ride"), 0);
        assert_eq!(h.engine.sampler().cached_count(), 9);
        assert!(!h.engine.remove_voice("ride"));

        h.engine.trigger("ride");
        assert_eq!(h.engine.total_playbacks(), 0);
    }

    #[test]
    fn test_reverb() {
        let mut h = harness();
        assert_eq!(h.engine.reverb(), 0.0);

        assert_eq!(h.engine.set_reverb(50.0), 50.0);
        assert!((h.handle.reverb_gains().dry() - 0.75).abs() < 1e-6);
        assert!((h.handle.reverb_gains().wet() - 0.4).abs() < 1e-6);

        assert_eq!(h.engine.set_reverb(150.0), 100.0);
        assert!((h.handle.reverb_gains().dry() - 0.5).abs() < 1e-6);
        assert!((h.handle.reverb_gains().wet() - 0.8).abs() < 1e-6);

        // The amount survives a restart.
        let h = harness_with(h.store.clone(), catalog());
        assert_eq!(h.engine.reverb(), 100.0);
    }

    #[test]
    fn test_preset_round_trip() {
        let mut h = harness();
        let update = VoiceUpdate::new()
            .volume(0.3)
            .default_key(Some("k".to_string()));
        assert!(h.engine.update_voice("kick", &update));
        let before = h.engine.voices().to_vec();

        assert!(h.engine.save_preset("gig"));
        h.engine.clear_voices();
        assert!(h.engine.voices().is_empty());
        assert_eq!(h.engine.sampler().cached_count(), 0);

        assert!(h.engine.load_preset("gig"));
        assert_eq!(h.engine.voices(), before.as_slice());
        assert!(h.engine.wait_for_samples(WAIT));
        assert_eq!(h.engine.sampler().cached_count(), 10);

        assert!(!h.engine.load_preset("missing"));
        assert_eq!(h.engine.voices(), before.as_slice());

        let names: Vec<String> = h.engine.presets().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["gig".to_string()]);
        assert!(h.engine.delete_preset("gig"));
        assert!(h.engine.presets().is_empty());
    }

    #[test]
    fn test_kit_survives_restart() {
        let mut h = harness();
        let id = h
            .engine
            .add_voice("Clap", Some("sounds/CLAPS/clap.wav".to_string()), None);
        assert!(id.starts_with("clap_"));

        let h = harness_with(h.store.clone(), catalog());
        assert_eq!(h.engine.voices().len(), 11);
        assert!(h.engine.voice(&id).is_some());
    }

    #[test]
    fn test_synth_fallback_and_choke() {
        let mut h = harness_with(
            Arc::new(MemoryStore::new()),
            SampleCatalog::empty(Path::new("sounds")),
        );
        assert_eq!(h.engine.sampler().cached_count(), 0);
        assert_eq!(h.loader.load_count(), 0);

        h.engine.trigger("hat_open");
        h.render(8);
        assert_eq!(h.engine.active_playbacks("hat_open"), 1);

        h.engine.trigger("hat_close");
        assert_eq!(h.engine.active_playbacks("hat_open"), 0);
        assert_eq!(h.engine.active_playbacks("hat_close"), 1);
    }

    #[test]
    fn test_voice_without_sound_is_silent() {
        let mut h = harness();
        let id = h.engine.add_voice("Cowbell", None, None);
        h.engine.trigger(&id);
        assert_eq!(h.engine.total_playbacks(), 0);
    }

    #[test]
    fn test_trigger_key() {
        let mut h = harness();
        assert_eq!(h.engine.trigger_key(" "), Some("kick".to_string()));
        assert_eq!(h.engine.trigger_key("SPACE"), Some("kick".to_string()));
        assert_eq!(h.engine.trigger_key("F"), Some("snare".to_string()));
        assert_eq!(h.engine.trigger_key("q"), None);
        assert_eq!(h.engine.active_playbacks("kick"), 2);
    }

    #[test]
    fn test_roll_keeps_every_hit() {
        let mut h = harness();
        for _ in 0..33 {
            h.engine.trigger("crash1");
            h.render(1);
        }
        assert_eq!(h.engine.active_playbacks("crash1"), 33);
        assert_eq!(h.mixer.active_source_count(), 33);
    }

    #[test]
    fn test_polyphony_ceiling_spares_the_triggered_voice() {
        let impulse = Impulse::from_channels(vec![vec![1.0], vec![1.0]], 44100);
        let (_mixer, handle) = AudioMixer::new(44100, &impulse);
        let mut engine = DrumEngine::new(
            handle,
            Arc::new(MemoryStore::new()),
            catalog(),
            Arc::new(CountingLoader::new()),
            Some(4),
        );
        assert!(engine.wait_for_samples(WAIT));

        engine.trigger("kick");
        for _ in 0..6 {
            engine.trigger("tom1");
        }
        assert_eq!(engine.active_playbacks("kick"), 0);
        assert_eq!(engine.active_playbacks("tom1"), 6);
    }
}
