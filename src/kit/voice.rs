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
use serde::{Deserialize, Serialize};

use crate::synth::DrumKind;

fn default_volume() -> f32 {
    1.0
}

/// One independently triggerable sound.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Voice {
    /// Stable identifier, unique within the registry.
    id: String,

    /// Path of the sample asset. Absent means the voice is synthesized.
    #[serde(default)]
    source: Option<String>,

    /// Display label.
    #[serde(default)]
    label: String,

    /// Display name of the sample file.
    #[serde(default)]
    file_name: Option<String>,

    /// Normalized volume in [0, 1].
    #[serde(default = "default_volume")]
    volume: f32,

    /// Mute group. 0 or absent means no choking.
    #[serde(default)]
    mute_group: Option<u32>,

    /// Key binding, a single character or "space".
    #[serde(default)]
    default_key: Option<String>,

    /// Display stacking order.
    #[serde(default)]
    z_index: i32,
}

/// How a voice produces sound.
#[derive(Clone, Debug, PartialEq)]
pub enum VoiceSource {
    /// Played from a decoded sample asset.
    Sampled(String),
    /// Rendered by the procedural synthesizer.
    Synthesized(DrumKind),
}

impl Voice {
    /// Creates a voice at full volume with no key and no mute group.
    pub fn new(id: &str, source: Option<String>, label: &str, file_name: Option<String>) -> Voice {
        Voice {
            id: id.to_string(),
            source,
            label: label.to_string(),
            file_name,
            volume: default_volume(),
            mute_group: None,
            default_key: None,
            z_index: 0,
        }
    }

    /// Sets the mute group.
    pub fn with_mute_group(mut self, group: Option<u32>) -> Voice {
        self.mute_group = group;
        self
    }

    /// Sets the key binding.
    pub fn with_default_key(mut self, key: &str) -> Voice {
        self.default_key = Some(key.to_string());
        self
    }

    /// Sets the volume, clamped to [0, 1].
    pub fn with_volume(mut self, volume: f32) -> Voice {
        self.volume = clamp_volume(volume);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Returns the configured volume, clamped to [0, 1].
    pub fn volume(&self) -> f32 {
        clamp_volume(self.volume)
    }

    /// Returns the gain applied at playback. The squared taper gives finer control
    /// at low settings than a linear mapping.
    pub fn effective_gain(&self) -> f32 {
        let volume = self.volume();
        volume * volume
    }

    /// Returns the mute group, treating 0 as "no group".
    pub fn mute_group(&self) -> Option<u32> {
        self.mute_group.filter(|group| *group > 0)
    }

    pub fn default_key(&self) -> Option<&str> {
        self.default_key.as_deref()
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    /// Resolves how this voice plays. A voice without a sample falls back to the
    /// synthesizer when its id names a known drum; otherwise it is silent.
    pub fn playback_source(&self) -> Option<VoiceSource> {
        match &self.source {
            Some(source) if !source.is_empty() => Some(VoiceSource::Sampled(source.clone())),
            _ => DrumKind::infer(&self.id).map(VoiceSource::Synthesized),
        }
    }

    /// Returns true if the pressed key triggers this voice.
    pub fn matches_key(&self, key: &str) -> bool {
        let Some(bound) = self.default_key() else {
            return false;
        };
        if bound.is_empty() {
            return false;
        }
        let is_space = |k: &str| k == " " || k.eq_ignore_ascii_case("space");
        if is_space(bound) {
            return is_space(key);
        }
        bound.eq_ignore_ascii_case(key)
    }

    /// Merges the fields present in `update` into this voice.
    pub fn apply(&mut self, update: &VoiceUpdate) {
        if let Some(source) = &update.source {
            self.source = source.clone();
        }
        if let Some(label) = &update.label {
            self.label = label.clone();
        }
        if let Some(file_name) = &update.file_name {
            self.file_name = file_name.clone();
        }
        if let Some(volume) = update.volume {
            self.volume = clamp_volume(volume);
        }
        if let Some(mute_group) = update.mute_group {
            self.mute_group = mute_group;
        }
        if let Some(default_key) = &update.default_key {
            self.default_key = default_key.clone();
        }
        if let Some(z_index) = update.z_index {
            self.z_index = z_index;
        }
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return default_volume();
    }
    volume.clamp(0.0, 1.0)
}

/// A partial update to a voice. Unset fields are left untouched; the nested options
/// allow clearing optional fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoiceUpdate {
    pub source: Option<Option<String>>,
    pub label: Option<String>,
    pub file_name: Option<Option<String>>,
    pub volume: Option<f32>,
    pub mute_group: Option<Option<u32>>,
    pub default_key: Option<Option<String>>,
    pub z_index: Option<i32>,
}

impl VoiceUpdate {
    pub fn new() -> VoiceUpdate {
        VoiceUpdate::default()
    }

    pub fn source(mut self, source: Option<String>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn file_name(mut self, file_name: Option<String>) -> Self {
        self.file_name = Some(file_name);
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn mute_group(mut self, mute_group: Option<u32>) -> Self {
        self.mute_group = Some(mute_group);
        self
    }

    pub fn default_key(mut self, key: Option<String>) -> Self {
        self.default_key = Some(key);
        self
    }

    pub fn z_index(mut self, z_index: i32) -> Self {
        self.z_index = Some(z_index);
        self
    }
}

/// Maps a voice id to its sample catalog category.
pub fn category_for_id(id: &str) -> Option<&'static str> {
    let id = id.to_ascii_lowercase();
    [
        ("kick", "KICKS"),
        ("snare", "SNARES"),
        ("hat", "HATS"),
        ("tom", "TOMS"),
        ("crash", "CRASHES"),
        ("ride", "RIDES"),
        ("clap", "CLAPS"),
    ]
    .into_iter()
    .find(|(needle, _)| id.contains(needle))
    .map(|(_, category)| category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_gain_is_squared() {
        let voice = Voice::new("kick", None, "Kick", None).with_volume(0.5);
        assert!((voice.effective_gain() - 0.25).abs() < f32::EPSILON);

        let mut previous = 0.0;
        for step in 0..=100 {
            let volume = step as f32 / 100.0;
            let gain = Voice::new("kick", None, "Kick", None)
                .with_volume(volume)
                .effective_gain();
            assert!((gain - volume * volume).abs() < 1e-6);
            assert!(gain >= previous);
            previous = gain;
        }
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut voice = Voice::new("kick", None, "Kick", None);
        voice.apply(&VoiceUpdate::new().volume(3.0));
        assert_eq!(voice.volume(), 1.0);
        voice.apply(&VoiceUpdate::new().volume(-1.0));
        assert_eq!(voice.volume(), 0.0);

        // Out-of-range values that sneak in through storage are clamped on use.
        let stored: Voice = serde_json::from_str(r#"{"id":"kick","volume":2.5}"#).unwrap();
        assert_eq!(stored.volume(), 1.0);
        assert_eq!(stored.effective_gain(), 1.0);
    }

    #[test]
    fn test_mute_group_zero_means_none() {
        let voice = Voice::new("hat", None, "Hat", None).with_mute_group(Some(0));
        assert_eq!(voice.mute_group(), None);

        let voice = Voice::new("hat", None, "Hat", None).with_mute_group(Some(2));
        assert_eq!(voice.mute_group(), Some(2));
    }

    #[test]
    fn test_apply_leaves_unset_fields() {
        let mut voice = Voice::new("snare", Some("a.wav".to_string()), "Snare", None)
            .with_default_key("f")
            .with_mute_group(Some(3));

        voice.apply(&VoiceUpdate::new().volume(0.4).z_index(7));

        assert_eq!(voice.source(), Some("a.wav"));
        assert_eq!(voice.default_key(), Some("f"));
        assert_eq!(voice.mute_group(), Some(3));
        assert_eq!(voice.label(), "Snare");
        assert_eq!(voice.z_index(), 7);
        assert!((voice.volume() - 0.4).abs() < f32::EPSILON);

        voice.apply(&VoiceUpdate::new().mute_group(None).default_key(None));
        assert_eq!(voice.mute_group(), None);
        assert_eq!(voice.default_key(), None);
    }

    #[test]
    fn test_playback_source() {
        let sampled = Voice::new("kick", Some("/sounds/KICKS/k.wav".to_string()), "Kick", None);
        assert_eq!(
            sampled.playback_source(),
            Some(VoiceSource::Sampled("/sounds/KICKS/k.wav".to_string()))
        );

        let synthesized = Voice::new("kick", None, "Kick", None);
        assert_eq!(
            synthesized.playback_source(),
            Some(VoiceSource::Synthesized(DrumKind::Kick))
        );

        let unknown = Voice::new("cowbell_1", None, "Cowbell", None);
        assert_eq!(unknown.playback_source(), None);
    }

    #[test]
    fn test_matches_key() {
        let kick = Voice::new("kick", None, "Kick", None).with_default_key("space");
        assert!(kick.matches_key(" "));
        assert!(kick.matches_key("Space"));
        assert!(!kick.matches_key("s"));

        let legacy = Voice::new("kick", None, "Kick", None).with_default_key(" ");
        assert!(legacy.matches_key("space"));

        let snare = Voice::new("snare", None, "Snare", None).with_default_key("f");
        assert!(snare.matches_key("F"));
        assert!(!snare.matches_key(" "));

        let unbound = Voice::new("tom_1", None, "Tom", None).with_default_key("");
        assert!(!unbound.matches_key(""));
    }

    #[test]
    fn test_category_for_id() {
        assert_eq!(category_for_id("kick"), Some("KICKS"));
        assert_eq!(category_for_id("hat_open"), Some("HATS"));
        assert_eq!(category_for_id("tom_1700000000000"), Some("TOMS"));
        assert_eq!(category_for_id("crash2"), Some("CRASHES"));
        assert_eq!(category_for_id("Clap_1"), Some("CLAPS"));
        assert_eq!(category_for_id("cowbell"), None);
    }
}
