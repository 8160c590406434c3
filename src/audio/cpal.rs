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
use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use tracing::{error, info, span, Level};

use super::{AudioMixer, OutputError};

/// An output stream on a cpal device. The mixer runs inside the stream's
/// callback; dropping the output closes the stream.
pub struct Output {
    name: String,
    host_id: cpal::HostId,
    channels: u16,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl Output {
    /// Opens the named device ("default" selects the host's default output) and
    /// starts rendering the mixer into it.
    pub fn open(name: &str, mixer: AudioMixer) -> Result<Output, OutputError> {
        let span = span!(Level::INFO, "open output");
        let _enter = span.enter();

        let (host_id, device) = find_device(name)?;
        let default_config = device.default_output_config()?;
        let channels = default_config.channels();
        let sample_rate = mixer.sample_rate();
        let config = cpal::StreamConfig {
            channels,
            sample_rate: sample_rate as cpal::SampleRate,
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer)?,
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, mixer)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer)?,
            format => return Err(OutputError::UnsupportedFormat(format.to_string())),
        };
        stream.play()?;

        info!(
            device = name,
            host = host_id.name(),
            channels,
            sample_rate,
            "Output stream started."
        );

        Ok(Output {
            name: name.to_string(),
            host_id,
            channels,
            sample_rate,
            _stream: stream,
        })
    }
}

impl super::Output for Output {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.channels,
            self.host_id.name()
        )
    }
}

/// Builds a stream for one sample type. Float streams are mixed in place; other
/// types are mixed into a scratch buffer and converted.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: AudioMixer,
) -> Result<cpal::Stream, OutputError>
where
    T: SizedSample + FromSample<f32> + 'static,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0.0);
            }
            let mixed = &mut scratch[..data.len()];
            mixer.process_into_output(mixed, channels);
            for (dst, &src) in data.iter_mut().zip(mixed.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!(err = err.to_string(), "Output stream error"),
        None,
    )?;
    Ok(stream)
}

fn find_device(name: &str) -> Result<(cpal::HostId, cpal::Device), OutputError> {
    if name == "default" {
        let host = cpal::default_host();
        return host
            .default_output_device()
            .map(|device| (host.id(), device))
            .ok_or_else(|| OutputError::NotFound(name.to_string()));
    }

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        for device in host.output_devices()? {
            if device.name().is_ok_and(|device_name| device_name.trim() == name) {
                return Ok((host_id, device));
            }
        }
    }

    Err(OutputError::NotFound(name.to_string()))
}

/// Lists the names of every output device across all available hosts.
pub fn list_devices() -> Result<Vec<String>, OutputError> {
    let mut names = Vec::new();
    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(host) => host,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to open host"
                );
                continue;
            }
        };
        let devices = match host.output_devices() {
            Ok(devices) => devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
    }

    names.sort();
    names.dedup();
    Ok(names)
}
