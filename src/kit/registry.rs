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
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use super::catalog::SampleCatalog;
use super::default_kit::build_default_kit;
use super::voice::{Voice, VoiceUpdate};
use crate::store::{self, Store, KIT_KEY};

/// The authoritative list of configured voices.
///
/// Every mutation writes the full list to the store before returning. Write failures
/// are logged and not retried.
pub struct VoiceRegistry {
    voices: Vec<Voice>,
    store: Arc<dyn Store>,
    /// Last timestamp component handed out by `add`. Strictly increasing, so ids are
    /// never reused within a session.
    last_stamp: u64,
}

impl VoiceRegistry {
    /// Opens the registry from the store. A missing, unreadable or malformed snapshot
    /// is treated as "no saved state" and the default kit is built from the catalog.
    pub fn open(store: Arc<dyn Store>, catalog: &SampleCatalog) -> VoiceRegistry {
        let saved = match store::load_json::<Vec<Voice>>(store.as_ref(), KIT_KEY) {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "Failed to read saved kit, using defaults");
                None
            }
        };

        let mut registry = VoiceRegistry {
            voices: Vec::new(),
            store,
            last_stamp: 0,
        };
        match saved {
            Some(voices) => {
                registry.voices = dedupe(voices);
                info!(voices = registry.voices.len(), "Loaded saved kit");
            }
            None => registry.reset_to_default(catalog),
        }
        registry
    }

    /// Returns the configured voices in order.
    pub fn list(&self) -> &[Voice] {
        &self.voices
    }

    /// Returns the voice with the given id.
    pub fn get(&self, id: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.id() == id)
    }

    /// Returns the first voice bound to the pressed key.
    pub fn voice_for_key(&self, key: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.matches_key(key))
    }

    /// Adds a voice built from a template type (e.g. "Kick") and returns its new id.
    pub fn add(
        &mut self,
        template_type: &str,
        source: Option<String>,
        file_name: Option<String>,
    ) -> String {
        let prefix = template_type.trim().to_lowercase().replace(' ', "_");
        let id = loop {
            let candidate = format!("{}_{}", prefix, self.next_stamp());
            if self.get(&candidate).is_none() {
                break candidate;
            }
        };

        self.voices
            .push(Voice::new(&id, source, template_type, file_name));
        debug!(voice = id, "Voice added");
        self.persist();
        id
    }

    /// Merges `update` into the voice with the given id. Returns false (and changes
    /// nothing) if the id is unknown.
    pub fn update(&mut self, id: &str, update: &VoiceUpdate) -> bool {
        let Some(voice) = self.voices.iter_mut().find(|v| v.id() == id) else {
            debug!(voice = id, "Update for unknown voice ignored");
            return false;
        };
        voice.apply(update);
        self.persist();
        true
    }

    /// Removes the voice with the given id. Returns false if the id is unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.voices.len();
        self.voices.retain(|v| v.id() != id);
        if self.voices.len() == before {
            return false;
        }
        debug!(voice = id, "Voice removed");
        self.persist();
        true
    }

    /// Replaces the whole voice list.
    pub fn replace_all(&mut self, voices: Vec<Voice>) {
        self.voices = dedupe(voices);
        info!(voices = self.voices.len(), "Kit replaced");
        self.persist();
    }

    /// Removes every voice.
    pub fn clear(&mut self) {
        self.replace_all(Vec::new());
    }

    /// Rebuilds the 10-voice starter kit from the catalog.
    pub fn reset_to_default(&mut self, catalog: &SampleCatalog) {
        self.replace_all(build_default_kit(catalog));
    }

    fn next_stamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.last_stamp = now.max(self.last_stamp + 1);
        self.last_stamp
    }

    fn persist(&self) {
        if let Err(e) = store::save_json(self.store.as_ref(), KIT_KEY, &self.voices) {
            warn!(error = %e, "Failed to persist kit");
        }
    }
}

/// Drops voices whose id was already seen, keeping the first occurrence.
fn dedupe(voices: Vec<Voice>) -> Vec<Voice> {
    let mut seen = HashSet::new();
    voices
        .into_iter()
        .filter(|v| {
            let fresh = seen.insert(v.id().to_string());
            if !fresh {
                warn!(voice = v.id(), "Dropping voice with duplicate id");
            }
            fresh
        })
        .collect()
}

impl std::fmt::Debug for VoiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceRegistry")
            .field("voices", &self.voices.len())
            .finish()
    }
}
