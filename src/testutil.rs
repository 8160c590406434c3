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
use std::{
    path::{Path, PathBuf},
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::sampler::{AssetLoader, LoadedSample, SampleError};

/// Wait for the given predicate to return true or fail.
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes interleaved 16 bit samples to a wav file.
pub fn write_wav(path: &Path, samples: &[i16], channels: u16, sample_rate: u32) {
    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )
    .expect("unable to create wav");

    for sample in samples {
        writer.write_sample(*sample).expect("unable to write sample");
    }
    writer.finalize().expect("unable to finalize wav");
}

/// An in-memory asset loader that records every load. Sources containing
/// "missing" fail; everything else loads as a constant 0.5 mono buffer whose
/// length depends on the source name.
#[derive(Default)]
pub struct CountingLoader {
    loads: Mutex<Vec<String>>,
}

impl CountingLoader {
    pub fn new() -> CountingLoader {
        CountingLoader::default()
    }

    /// The number of frames loaded for a source.
    pub fn frames_for(source: &str) -> usize {
        source.len() * 64
    }

    pub fn load_count(&self) -> usize {
        self.loads.lock().len()
    }

    pub fn loads_of(&self, source: &str) -> usize {
        self.loads.lock().iter().filter(|s| *s == source).count()
    }
}

impl AssetLoader for CountingLoader {
    fn load(&self, source: &str) -> Result<LoadedSample, SampleError> {
        self.loads.lock().push(source.to_string());
        if source.contains("missing") {
            return Err(SampleError::Empty(PathBuf::from(source)));
        }
        Ok(LoadedSample::new(
            vec![0.5; CountingLoader::frames_for(source)],
            1,
            44100,
        ))
    }
}
