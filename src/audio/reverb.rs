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
use std::sync::Arc;

use tracing::{info, warn};

use super::convolver::Convolver;
use super::impulse::Impulse;
use super::{SharedGain, CHANNELS};
use crate::store::{self, Store, REVERB_KEY};

/// The largest accepted wet amount.
pub const MAX_WET_AMOUNT: f32 = 100.0;

/// Maps a wet amount in [0, 100] to the (dry, wet) gain pair.
pub fn gains_for(wet_amount: f32) -> (f32, f32) {
    let fraction = clamp_wet_amount(wet_amount) / MAX_WET_AMOUNT;
    (1.0 - fraction * 0.5, fraction * 0.8)
}

fn clamp_wet_amount(wet_amount: f32) -> f32 {
    if wet_amount.is_nan() {
        return 0.0;
    }
    wet_amount.clamp(0.0, MAX_WET_AMOUNT)
}

/// The dry and wet bus gains, shared with the audio callback.
#[derive(Clone, Debug)]
pub struct ReverbGains {
    dry: SharedGain,
    wet: SharedGain,
}

impl ReverbGains {
    /// Creates gains for a fully dry mix.
    pub fn new() -> ReverbGains {
        let (dry, wet) = gains_for(0.0);
        ReverbGains {
            dry: SharedGain::new(dry),
            wet: SharedGain::new(wet),
        }
    }

    fn apply(&self, wet_amount: f32) {
        let (dry, wet) = gains_for(wet_amount);
        self.dry.set(dry);
        self.wet.set(wet);
    }

    pub fn dry(&self) -> f32 {
        self.dry.get()
    }

    pub fn wet(&self) -> f32 {
        self.wet.get()
    }
}

impl Default for ReverbGains {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the persisted wet amount. Missing or unreadable values read as 0.
pub fn load_wet_amount(store: &dyn Store) -> f32 {
    match store::load_json::<f32>(store, REVERB_KEY) {
        Ok(Some(wet_amount)) => clamp_wet_amount(wet_amount),
        Ok(None) => 0.0,
        Err(e) => {
            warn!(err = e.to_string(), "Unable to read reverb amount, using 0");
            0.0
        }
    }
}

/// Control side of the reverb bus: owns the wet amount and persists it.
pub struct ReverbControl {
    wet_amount: f32,
    gains: ReverbGains,
    store: Arc<dyn Store>,
}

impl ReverbControl {
    /// Creates the control with an initial wet amount and applies it to the bus.
    pub fn new(wet_amount: f32, gains: ReverbGains, store: Arc<dyn Store>) -> ReverbControl {
        let wet_amount = clamp_wet_amount(wet_amount);
        gains.apply(wet_amount);
        ReverbControl {
            wet_amount,
            gains,
            store,
        }
    }

    /// Creates the control from the amount persisted in the store.
    pub fn open(gains: ReverbGains, store: Arc<dyn Store>) -> ReverbControl {
        let wet_amount = load_wet_amount(store.as_ref());
        ReverbControl::new(wet_amount, gains, store)
    }

    /// Clamps the amount to [0, 100], updates the bus gains and persists the amount.
    /// Returns the amount that was applied.
    pub fn set_wet_amount(&mut self, wet_amount: f32) -> f32 {
        self.wet_amount = clamp_wet_amount(wet_amount);
        self.gains.apply(self.wet_amount);
        info!(
            wet_amount = self.wet_amount,
            dry = self.gains.dry(),
            wet = self.gains.wet(),
            "Reverb amount set."
        );

        if let Err(e) = store::save_json(self.store.as_ref(), REVERB_KEY, &self.wet_amount) {
            warn!(err = e.to_string(), "Unable to persist reverb amount");
        }
        self.wet_amount
    }

    pub fn wet_amount(&self) -> f32 {
        self.wet_amount
    }

    pub fn gains(&self) -> &ReverbGains {
        &self.gains
    }
}

/// Audio side of the reverb bus. Every voice feeds both the dry path and the
/// convolver; the two are summed with the shared gains.
pub struct ReverbProcessor {
    convolvers: Vec<Convolver>,
    gains: ReverbGains,
}

impl ReverbProcessor {
    pub fn new(impulse: &Impulse, gains: ReverbGains, block_size: usize) -> ReverbProcessor {
        let scale = impulse.normalization_scale();
        let convolvers = (0..CHANNELS)
            .map(|channel| {
                // A mono impulse feeds both sides.
                let source = channel.min(impulse.channel_count().saturating_sub(1));
                let scaled: Vec<f32> = impulse
                    .channel(source)
                    .iter()
                    .map(|sample| sample * scale)
                    .collect();
                Convolver::new(&scaled, block_size)
            })
            .collect();

        ReverbProcessor { convolvers, gains }
    }

    /// Routes one frame of the master bus through the dry and wet paths.
    #[inline]
    pub fn process(&mut self, frame: &mut [f32; CHANNELS]) {
        let dry = self.gains.dry();
        let wet = self.gains.wet();
        for (sample, convolver) in frame.iter_mut().zip(self.convolvers.iter_mut()) {
            let convolved = convolver.process(*sample);
            *sample = *sample * dry + convolved * wet;
        }
    }
}
