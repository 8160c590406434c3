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
//! Drum timbres built from oscillators, noise and filters.
//!
//! Every trigger builds a fresh [DrumVoice]; nothing is cached between hits. Each
//! timbre is one or more layers, and a layer is a generator run through a filter
//! chain and an exponential gain envelope for a fixed length. The voice ends once
//! its longest layer has run out.

use rand::Rng;

use super::biquad::{Biquad, DEFAULT_BANDPASS_Q, DEFAULT_HIGHPASS_Q};
use super::oscillator::{noise_buffer, Oscillator, Waveform};
use super::ramp::ExponentialRamp;
use super::DrumKind;
use crate::audio::{Source, CHANNELS};

/// Envelopes decay towards this level rather than zero.
const FLOOR: f32 = 0.01;

const KICK_FREQUENCY: f32 = 150.0;
const KICK_SECONDS: f32 = 0.5;

const SNARE_HIGHPASS: f32 = 1000.0;
const SNARE_NOISE_SECONDS: f32 = 0.2;
const SNARE_TONE_FREQUENCY: f32 = 100.0;
const SNARE_TONE_LEVEL: f32 = 0.7;
const SNARE_TONE_DECAY: f32 = 0.1;
const SNARE_SECONDS: f32 = 0.2;

const HAT_BANDPASS: f32 = 10000.0;
const HAT_HIGHPASS: f32 = 7000.0;
const HAT_LEVEL: f32 = 0.6;
const HAT_CLOSED_SECONDS: f32 = 0.05;
const HAT_OPEN_SECONDS: f32 = 0.4;

const TOM_LEVEL: f32 = 0.9;
const TOM_SECONDS: f32 = 0.4;

const CYMBAL_HIGHPASS: f32 = 5000.0;
const CYMBAL_LEVEL: f32 = 0.5;
const CYMBAL_SECONDS: f32 = 2.0;

/// Noise buffers for the short noise timbres hold one second of audio.
const NOISE_SECONDS: f32 = 1.0;

fn frames(seconds: f32, sample_rate: u32) -> usize {
    (seconds * sample_rate as f32).round() as usize
}

enum Generator {
    Tone {
        oscillator: Oscillator,
        frequency: ExponentialRamp,
    },
    Noise {
        buffer: Vec<f32>,
        position: usize,
    },
}

impl Generator {
    fn tone(waveform: Waveform, frequency: ExponentialRamp, sample_rate: u32) -> Generator {
        Generator::Tone {
            oscillator: Oscillator::new(waveform, sample_rate),
            frequency,
        }
    }

    fn noise<R: Rng + ?Sized>(seconds: f32, sample_rate: u32, rng: &mut R) -> Generator {
        Generator::Noise {
            buffer: noise_buffer(frames(seconds, sample_rate), rng),
            position: 0,
        }
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        match self {
            Generator::Tone {
                oscillator,
                frequency,
            } => oscillator.next_sample(frequency.next_value()),
            Generator::Noise { buffer, position } => {
                let sample = buffer.get(*position).copied().unwrap_or(0.0);
                *position += 1;
                sample
            }
        }
    }
}

struct Layer {
    generator: Generator,
    filters: Vec<Biquad>,
    envelope: ExponentialRamp,
    remaining: usize,
}

impl Layer {
    fn new(generator: Generator, envelope: ExponentialRamp, length: usize) -> Layer {
        Layer {
            generator,
            filters: Vec::new(),
            envelope,
            remaining: length,
        }
    }

    fn through(mut self, filter: Biquad) -> Layer {
        self.filters.push(filter);
        self
    }

    #[inline]
    fn next_sample(&mut self) -> Option<f32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let mut sample = self.generator.next_sample();
        for filter in self.filters.iter_mut() {
            sample = filter.process(sample);
        }
        Some(sample * self.envelope.next_value())
    }
}

/// One synthesized hit. Mono, rendered to both sides.
pub struct DrumVoice {
    layers: Vec<Layer>,
    gain: f32,
}

impl DrumVoice {
    fn new(layers: Vec<Layer>) -> DrumVoice {
        DrumVoice { layers, gain: 1.0 }
    }

    /// Scales the whole hit.
    pub fn with_gain(mut self, gain: f32) -> DrumVoice {
        self.gain = gain;
        self
    }

    /// Frames left before the voice ends.
    pub fn remaining_frames(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.remaining)
            .max()
            .unwrap_or(0)
    }
}

impl Source for DrumVoice {
    fn next_frame(&mut self, frame: &mut [f32; CHANNELS]) -> bool {
        let mut sample = 0.0;
        let mut sounding = false;
        for layer in self.layers.iter_mut() {
            if let Some(layer_sample) = layer.next_sample() {
                sample += layer_sample;
                sounding = true;
            }
        }
        if !sounding {
            return false;
        }

        let sample = sample * self.gain;
        *frame = [sample; CHANNELS];
        true
    }
}

/// Builds a fresh hit of the given drum.
pub fn render<R: Rng + ?Sized>(kind: &DrumKind, sample_rate: u32, rng: &mut R) -> DrumVoice {
    match kind {
        DrumKind::Kick => kick(sample_rate),
        DrumKind::Snare => snare(sample_rate, rng),
        DrumKind::HiHat { open } => hihat(sample_rate, *open, rng),
        DrumKind::Tom { frequency } => tom(sample_rate, *frequency),
        DrumKind::Cymbal => cymbal(sample_rate, rng),
    }
}

/// A sine that sweeps down from 150 Hz while its level falls over half a second.
pub fn kick(sample_rate: u32) -> DrumVoice {
    let sweep = ExponentialRamp::new(KICK_FREQUENCY, FLOOR, KICK_SECONDS, sample_rate);
    DrumVoice::new(vec![Layer::new(
        Generator::tone(Waveform::Sine, sweep, sample_rate),
        ExponentialRamp::new(1.0, FLOOR, KICK_SECONDS, sample_rate),
        frames(KICK_SECONDS, sample_rate),
    )])
}

/// Highpassed noise for the wires over a short triangle body.
pub fn snare<R: Rng + ?Sized>(sample_rate: u32, rng: &mut R) -> DrumVoice {
    let length = frames(SNARE_SECONDS, sample_rate);
    let wires = Layer::new(
        Generator::noise(NOISE_SECONDS, sample_rate, rng),
        ExponentialRamp::new(1.0, FLOOR, SNARE_NOISE_SECONDS, sample_rate),
        length,
    )
    .through(Biquad::highpass(
        SNARE_HIGHPASS,
        DEFAULT_HIGHPASS_Q,
        sample_rate,
    ));
    let body = Layer::new(
        Generator::tone(
            Waveform::Triangle,
            ExponentialRamp::constant(SNARE_TONE_FREQUENCY),
            sample_rate,
        ),
        ExponentialRamp::new(SNARE_TONE_LEVEL, FLOOR, SNARE_TONE_DECAY, sample_rate),
        length,
    );
    DrumVoice::new(vec![wires, body])
}

/// Noise through a bandpass and a highpass. Open and closed differ only in decay.
pub fn hihat<R: Rng + ?Sized>(sample_rate: u32, open: bool, rng: &mut R) -> DrumVoice {
    let decay = if open {
        HAT_OPEN_SECONDS
    } else {
        HAT_CLOSED_SECONDS
    };
    DrumVoice::new(vec![Layer::new(
        Generator::noise(NOISE_SECONDS, sample_rate, rng),
        ExponentialRamp::new(HAT_LEVEL, FLOOR, decay, sample_rate),
        frames(decay, sample_rate),
    )
    .through(Biquad::bandpass(
        HAT_BANDPASS,
        DEFAULT_BANDPASS_Q,
        sample_rate,
    ))
    .through(Biquad::highpass(
        HAT_HIGHPASS,
        DEFAULT_HIGHPASS_Q,
        sample_rate,
    ))])
}

/// A sine that drops an octave from `frequency` as it decays.
pub fn tom(sample_rate: u32, frequency: f32) -> DrumVoice {
    let sweep = ExponentialRamp::new(frequency, frequency * 0.5, TOM_SECONDS, sample_rate);
    DrumVoice::new(vec![Layer::new(
        Generator::tone(Waveform::Sine, sweep, sample_rate),
        ExponentialRamp::new(TOM_LEVEL, FLOOR, TOM_SECONDS, sample_rate),
        frames(TOM_SECONDS, sample_rate),
    )])
}

/// Two seconds of highpassed noise with a long decay. Crash, ride and clap
/// voices all share it.
pub fn cymbal<R: Rng + ?Sized>(sample_rate: u32, rng: &mut R) -> DrumVoice {
    DrumVoice::new(vec![Layer::new(
        Generator::noise(CYMBAL_SECONDS, sample_rate, rng),
        ExponentialRamp::new(CYMBAL_LEVEL, FLOOR, CYMBAL_SECONDS, sample_rate),
        frames(CYMBAL_SECONDS, sample_rate),
    )
    .through(Biquad::highpass(
        CYMBAL_HIGHPASS,
        DEFAULT_HIGHPASS_Q,
        sample_rate,
    ))])
}
