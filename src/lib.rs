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

//! A drum pad voice engine.
//!
//! The engine keeps a registry of configured voices, plays decoded samples (or
//! synthesized drum timbres when a voice has no sample), chokes voices that share a
//! mute group and routes everything through a global dry/wet reverb bus.

pub mod audio;
pub mod config;
pub mod engine;
pub mod kit;
pub mod playback;
pub mod playsync;
pub mod sampler;
pub mod store;
pub mod synth;
#[cfg(test)]
mod testutil;

pub use engine::DrumEngine;
