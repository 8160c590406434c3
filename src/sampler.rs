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
//! Sample-backed voices.
//!
//! Assets are decoded fully into memory on a background loader thread and cached
//! per voice, so a trigger only has to hand a shared buffer to the mixer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

mod decode;
mod loader;
mod player;
mod source;

pub use decode::{decode_file, DecodedAudio};
pub use loader::{AssetLoader, FileLoader, LoadedSample};
pub use player::SamplePlayer;
pub use source::SampleSource;

/// Errors raised while loading a sample asset.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("unable to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("{0} has no audio track")]
    NoTrack(PathBuf),

    #[error("{0} does not declare a sample rate")]
    UnknownSampleRate(PathBuf),

    #[error("{0} contains no audio")]
    Empty(PathBuf),
}
