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
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::voice::Voice;
use crate::store::{self, Store, PRESETS_KEY};

/// A stored snapshot of the voice registry.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
struct PresetRecord {
    voices: Vec<Voice>,
    /// Milliseconds since the Unix epoch.
    saved_at: u64,
}

/// A named snapshot of the voice registry.
#[derive(Clone, Debug, PartialEq)]
pub struct Preset {
    pub name: String,
    pub voices: Vec<Voice>,
    pub saved_at: u64,
}

/// Named registry snapshots, persisted in full under a single key on every change.
pub struct PresetBank {
    presets: BTreeMap<String, PresetRecord>,
    store: Arc<dyn Store>,
}

impl PresetBank {
    /// Opens the bank. Unreadable or malformed data yields an empty bank.
    pub fn open(store: Arc<dyn Store>) -> PresetBank {
        let presets = match store::load_json(store.as_ref(), PRESETS_KEY) {
            Ok(presets) => presets.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to read presets, starting empty");
                BTreeMap::new()
            }
        };
        PresetBank { presets, store }
    }

    /// Saves `voices` under `name`, replacing any preset with the same name.
    /// Returns false for a blank name.
    pub fn save(&mut self, name: &str, voices: &[Voice]) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }

        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.presets.insert(
            name.to_string(),
            PresetRecord {
                voices: voices.to_vec(),
                saved_at,
            },
        );
        info!(preset = name, voices = voices.len(), "Preset saved");
        self.persist();
        true
    }

    /// Returns the preset with the given name.
    pub fn get(&self, name: &str) -> Option<Preset> {
        self.presets.get(name.trim()).map(|record| Preset {
            name: name.trim().to_string(),
            voices: record.voices.clone(),
            saved_at: record.saved_at,
        })
    }

    /// Deletes a preset. Returns false if no preset had that name.
    pub fn delete(&mut self, name: &str) -> bool {
        if self.presets.remove(name.trim()).is_none() {
            return false;
        }
        info!(preset = name, "Preset deleted");
        self.persist();
        true
    }

    /// Returns all presets ordered by name.
    pub fn list(&self) -> Vec<Preset> {
        self.presets
            .iter()
            .map(|(name, record)| Preset {
                name: name.clone(),
                voices: record.voices.clone(),
                saved_at: record.saved_at,
            })
            .collect()
    }

    fn persist(&self) {
        if let Err(e) = store::save_json(self.store.as_ref(), PRESETS_KEY, &self.presets) {
            warn!(error = %e, "Failed to persist presets");
        }
    }
}

impl std::fmt::Debug for PresetBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresetBank")
            .field("presets", &self.presets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn voices() -> Vec<Voice> {
        vec![
            Voice::new("kick", Some("k.wav".to_string()), "Kick", Some("k.wav".to_string()))
                .with_volume(0.7)
                .with_default_key("space"),
            Voice::new("hat_open", None, "Hi-Hat Op", None).with_mute_group(Some(1)),
        ]
    }

    #[test]
    fn test_save_get_delete() {
        let mut bank = PresetBank::open(Arc::new(MemoryStore::new()));

        assert!(bank.save("Rock", &voices()));
        let preset = bank.get("Rock").unwrap();
        assert_eq!(preset.voices, voices());
        assert!(preset.saved_at > 0);

        assert!(bank.delete("Rock"));
        assert!(!bank.delete("Rock"));
        assert!(bank.get("Rock").is_none());
    }

    #[test]
    fn test_save_replaces_same_name() {
        let mut bank = PresetBank::open(Arc::new(MemoryStore::new()));
        bank.save("Jazz", &voices());
        bank.save("Jazz", &voices()[..1]);

        assert_eq!(bank.list().len(), 1);
        assert_eq!(bank.get("Jazz").unwrap().voices.len(), 1);
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut bank = PresetBank::open(Arc::new(MemoryStore::new()));
        assert!(!bank.save("   ", &voices()));
        assert!(bank.list().is_empty());
    }

    #[test]
    fn test_presets_persist() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut bank = PresetBank::open(store.clone());
            bank.save("b-side", &voices());
            bank.save("a-side", &[]);
        }

        let bank = PresetBank::open(store);
        let names: Vec<String> = bank.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["a-side".to_string(), "b-side".to_string()]);
        assert_eq!(bank.get("b-side").unwrap().voices, voices());
    }

    #[test]
    fn test_corrupt_presets_start_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(PRESETS_KEY, "not json").unwrap();
        let bank = PresetBank::open(store);
        assert!(bank.list().is_empty());
    }
}
