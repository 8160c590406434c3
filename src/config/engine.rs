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

use serde::Deserialize;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_SOUNDS_DIR: &str = "sounds";
const DEFAULT_STATE_DIR: &str = ".padkit";

/// A YAML representation of the engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    /// The audio output device. Names starting with "mock" select the mock output.
    device: Option<String>,

    /// Output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Root directory of the sample library. Each subdirectory is a category.
    sounds: Option<PathBuf>,

    /// Optional JSON manifest mapping categories to file names. When unset the
    /// sounds directory is scanned instead.
    manifest: Option<PathBuf>,

    /// Directory used for durable state (voices, presets, reverb).
    state_dir: Option<PathBuf>,

    /// Optional global polyphony ceiling. Unset means unbounded; when set, the
    /// oldest playback of another voice is stolen once the ceiling is reached.
    max_voices: Option<u32>,
}

impl EngineConfig {
    /// Returns the audio output device name.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the sample library root.
    pub fn sounds(&self) -> &Path {
        self.sounds
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_SOUNDS_DIR))
    }

    /// Returns the manifest path, if one is configured.
    pub fn manifest(&self) -> Option<&Path> {
        self.manifest.as_deref()
    }

    /// Returns the durable state directory.
    pub fn state_dir(&self) -> &Path {
        self.state_dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_STATE_DIR))
    }

    /// Returns the polyphony ceiling, if one is set. A set ceiling is at least 1.
    pub fn max_voices(&self) -> Option<u32> {
        self.max_voices.map(|max| max.max(1))
    }

    /// Overrides the output device.
    pub fn with_device(mut self, device: &str) -> Self {
        self.device = Some(device.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_engine_config_deserialize() {
        let yaml = r#"
            device: mock-device
            sample_rate: 48000
            sounds: /srv/sounds
            manifest: /srv/sounds-manifest.json
            state_dir: /var/lib/padkit
            max_voices: 16
        "#;

        let config: EngineConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.device(), "mock-device");
        assert_eq!(config.sample_rate(), 48000);
        assert_eq!(config.sounds(), Path::new("/srv/sounds"));
        assert_eq!(
            config.manifest(),
            Some(Path::new("/srv/sounds-manifest.json"))
        );
        assert_eq!(config.state_dir(), Path::new("/var/lib/padkit"));
        assert_eq!(config.max_voices(), Some(16));
    }

    #[test]
    fn test_engine_config_defaults() {
        let config: EngineConfig = Config::builder()
            .add_source(File::from_str("max_voices: 0", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.device(), "default");
        assert_eq!(config.sample_rate(), 44100);
        assert_eq!(config.sounds(), Path::new("sounds"));
        assert!(config.manifest().is_none());
        assert_eq!(config.state_dir(), Path::new(".padkit"));
        assert_eq!(config.max_voices(), Some(1));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padkit.yaml");
        std::fs::write(&path, "device: mock\nsample_rate: 22050\n").unwrap();

        let config = crate::config::load(&path).unwrap();
        assert_eq!(config.device(), "mock");
        assert_eq!(config.sample_rate(), 22050);
        assert_eq!(config.max_voices(), None);
    }

    #[test]
    fn test_with_device() {
        let config = EngineConfig::default().with_device("mock-cli");
        assert_eq!(config.device(), "mock-cli");
        assert_eq!(config.sample_rate(), 44100);
    }
}
