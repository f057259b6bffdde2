// Copyright 2021-2026 Jacob Alexander
// Copyright 2021-2026 Zion Koyl
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// Direction the Rapid Trigger state machine currently believes the key is
/// travelling in (§4.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum KeyDir {
    Inactive,
    Down,
    Up,
}

impl Default for KeyDir {
    fn default() -> Self {
        KeyDir::Inactive
    }
}

/// Per-key actuation configuration, read out of the active profile's
/// `actuation_map[NUM_KEYS]` (§3). Owned by configuration, passed in to
/// every `Matrix::scan` call; the matrix engine never mutates it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, defmt::Format)]
pub struct Actuation {
    /// Normalized actuation point, 0..255.
    pub actuation_point: u8,
    /// Rapid Trigger press sensitivity. 0 disables Rapid Trigger entirely
    /// (fixed-threshold actuation only).
    pub rt_down: u8,
    /// Rapid Trigger release sensitivity. 0 reuses `rt_down` for both
    /// directions.
    pub rt_up: u8,
    /// When set, the reset point (the depth at which `Down`/`Up` collapse
    /// back to `Inactive`) is 0 instead of `actuation_point`.
    pub continuous: bool,
}

impl Actuation {
    /// Rapid Trigger is active for this key only when `rt_down != 0`
    /// (§4.1) and no per-key runtime override has disabled it.
    pub const fn rapid_trigger_enabled(&self) -> bool {
        self.rt_down != 0
    }

    /// `rt_up` falls back to `rt_down` when unset (§4.1).
    pub const fn rt_up_effective(&self) -> u8 {
        if self.rt_up == 0 {
            self.rt_down
        } else {
            self.rt_up
        }
    }

    pub const fn reset_point(&self) -> u8 {
        if self.continuous {
            0
        } else {
            self.actuation_point
        }
    }
}

/// Per-key runtime state (§3 `KeyState`).
///
/// Uniquely owned by the matrix engine; initialized by
/// [`crate::Matrix::recalibrate`], mutated only by
/// [`crate::Matrix::scan`], and read by the layout engine.
#[derive(Copy, Clone, Debug, Default, defmt::Format)]
pub struct KeyState {
    /// 16-bit EMA of raw ADC samples.
    pub adc_filtered: u16,
    /// Auto-calibrated rest envelope (shallowest observed position).
    pub adc_rest_value: u16,
    /// Auto-calibrated bottom-out envelope (deepest observed position).
    pub adc_bottom_out_value: u16,
    /// Normalized travel distance, 0..255.
    pub distance: u8,
    /// Deepest (Down) or shallowest (Up) point since the last direction
    /// change, used by the Rapid Trigger hysteresis.
    pub extremum: u8,
    pub key_dir: KeyDir,
    pub is_pressed: bool,
    /// Millisecond timestamp of the last rising/falling edge.
    pub event_time: u32,

    /// Bottom-out envelope has changed since it was last flushed to
    /// persistent storage.
    pub(crate) bottom_out_dirty: bool,
    /// Time of the most recent bottom-out envelope change, used to gate
    /// the `MATRIX_INACTIVITY_TIMEOUT` flush window.
    pub(crate) bottom_out_changed_at: u32,
    /// Runtime override: Rapid Trigger force-disabled via
    /// `Matrix::disable_rapid_trigger`, independent of the profile's
    /// `rt_down` setting.
    pub(crate) rt_disabled: bool,
}

impl KeyState {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}
