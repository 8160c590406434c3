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
/// An exponential ramp from one positive value to another over a fixed number of
/// frames. Past the end the ramp holds its target.
#[derive(Clone, Debug)]
pub struct ExponentialRamp {
    value: f32,
    multiplier: f32,
    remaining: usize,
    target: f32,
}

impl ExponentialRamp {
    /// Creates a ramp. Both values must be positive; non-positive values are
    /// raised to a small floor so the curve stays defined.
    pub fn new(start: f32, target: f32, duration: f32, sample_rate: u32) -> ExponentialRamp {
        let start = start.max(f32::MIN_POSITIVE);
        let target = target.max(f32::MIN_POSITIVE);
        let frames = (duration.max(0.0) * sample_rate as f32).round() as usize;
        let multiplier = if frames == 0 {
            1.0
        } else {
            (target / start).powf(1.0 / frames as f32)
        };

        ExponentialRamp {
            value: if frames == 0 { target } else { start },
            multiplier,
            remaining: frames,
            target,
        }
    }

    /// A ramp that never moves.
    pub fn constant(value: f32) -> ExponentialRamp {
        ExponentialRamp {
            value,
            multiplier: 1.0,
            remaining: 0,
            target: value,
        }
    }

    /// Returns the current value and advances one frame.
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        let current = self.value;
        if self.remaining > 1 {
            self.value *= self.multiplier;
            self.remaining -= 1;
        } else {
            self.value = self.target;
            self.remaining = 0;
        }
        current
    }
}
