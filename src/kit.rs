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

//! The voice registry and everything it persists.
//!
//! This module provides:
//! - The `Voice` data model and partial updates
//! - The registry, the single source of truth for configured voices
//! - Preset snapshots of the registry
//! - The read-only sample catalog used to build the default kit

mod catalog;
mod default_kit;
mod presets;
mod registry;
mod voice;

pub use catalog::{CatalogError, SampleCatalog};
pub use default_kit::{build_default_kit, DefaultSlot, DEFAULT_KIT};
pub use presets::{Preset, PresetBank};
pub use registry::VoiceRegistry;
pub use voice::{category_for_id, Voice, VoiceSource, VoiceUpdate};
