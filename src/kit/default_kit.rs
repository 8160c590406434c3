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
use tracing::warn;

use super::catalog::SampleCatalog;
use super::voice::Voice;

/// One slot of the starter kit.
#[derive(Clone, Copy, Debug)]
pub struct DefaultSlot {
    pub id: &'static str,
    pub category: &'static str,
    /// Preferred catalog index. Falls back to entry 0 when absent.
    pub index: usize,
    pub label: &'static str,
    pub key: &'static str,
    pub mute_group: Option<u32>,
}

/// The 10-voice starter kit. The two hats share mute group 1.
pub const DEFAULT_KIT: [DefaultSlot; 10] = [
    DefaultSlot {
        id: "kick",
        category: "KICKS",
        index: 0,
        label: "Kick",
        key: "space",
        mute_group: None,
    },
    DefaultSlot {
        id: "snare",
        category: "SNARES",
        index: 0,
        label: "Snare",
        key: "f",
        mute_group: None,
    },
    DefaultSlot {
        id: "hat_close",
        category: "HATS",
        index: 0,
        label: "Hi-Hat Cl",
        key: "d",
        mute_group: Some(1),
    },
    DefaultSlot {
        id: "hat_open",
        category: "HATS",
        index: 1,
        label: "Hi-Hat Op",
        key: "s",
        mute_group: Some(1),
    },
    DefaultSlot {
        id: "tom1",
        category: "TOMS",
        index: 0,
        label: "Tom 1",
        key: "g",
        mute_group: None,
    },
    DefaultSlot {
        id: "tom2",
        category: "TOMS",
        index: 1,
        label: "Tom 2",
        key: "h",
        mute_group: None,
    },
    DefaultSlot {
        id: "tom3",
        category: "TOMS",
        index: 2,
        label: "Tom 3",
        key: "j",
        mute_group: None,
    },
    DefaultSlot {
        id: "crash1",
        category: "CRASHES",
        index: 0,
        label: "Crash 1",
        key: "r",
        mute_group: None,
    },
    DefaultSlot {
        id: "crash2",
        category: "CRASHES",
        index: 1,
        label: "Crash 2",
        key: "y",
        mute_group: None,
    },
    DefaultSlot {
        id: "ride",
        category: "RIDES",
        index: 0,
        label: "Ride",
        key: "u",
        mute_group: None,
    },
];

/// Builds the starter kit by resolving each slot against the catalog.
pub fn build_default_kit(catalog: &SampleCatalog) -> Vec<Voice> {
    DEFAULT_KIT
        .iter()
        .map(|slot| {
            let files = catalog.files(slot.category);
            let file = files.get(slot.index).or_else(|| files.first());
            if file.is_none() {
                warn!(
                    voice = slot.id,
                    category = slot.category,
                    "No sample available for default voice"
                );
            }

            Voice::new(
                slot.id,
                file.map(|f| catalog.path_for(slot.category, f)),
                slot.label,
                file.cloned(),
            )
            .with_default_key(slot.key)
            .with_mute_group(slot.mute_group)
        })
        .collect()
}
