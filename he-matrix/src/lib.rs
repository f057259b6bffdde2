// Copyright 2021-2026 Jacob Alexander
// Copyright 2021-2026 Zion Koyl
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Hall-effect matrix engine.
//!
//! Converts a per-scan array of raw ADC samples into per-key travel distance
//! and `is_pressed` state: EMA filtering, online rest/bottom-out calibration,
//! and the Rapid Trigger direction state machine. Every key is processed
//! independently except for the same-scan press-ordering pass at the end of
//! [`Matrix::scan`].

#![no_std]

mod rapid_trigger;
mod state;


pub use rapid_trigger::EdgeResult;
pub use state::{Actuation, KeyDir, KeyState};

use heapless::Vec;

/// EMA smoothing exponent. `new = (raw + filtered*((1<<a)-1)) >> a`; a
/// power-of-two constant avoids division on target.
pub const MATRIX_EMA_ALPHA_EXPONENT: u8 = 3;

/// Hysteresis band, in raw ADC counts, a filtered sample must clear before
/// the rest or bottom-out envelope moves.
pub const MATRIX_CALIBRATION_EPSILON: u16 = 4;

/// Duration, in milliseconds, that `recalibrate` keeps the rest envelope
/// open to downward adjustment.
pub const MATRIX_CALIBRATION_DURATION_MS: u32 = 2_000;

/// Idle window, in milliseconds, a key's bottom-out envelope must hold
/// steady before it is eligible to flush to persistent storage.
pub const MATRIX_INACTIVITY_TIMEOUT_MS: u32 = 1_000;

/// Saturating bound for raw ADC samples before filtering (12-bit ADC).
pub const ADC_MAX_VALUE: u16 = 4_095;

/// Runtime options for a [`Matrix`], set once at `init` and by configuration
/// writes (§6 "options get/set").
#[derive(Copy, Clone, Debug, Default, defmt::Format)]
pub struct MatrixOptions {
    /// Readings are sample-inverted before filtering (compile-time board
    /// polarity, exposed as a runtime option so one firmware image can
    /// support both sensor orientations).
    pub invert: bool,
    /// Gates the periodic bottom-out persistence flush (§4.1, §15).
    pub save_bottom_out_threshold: bool,
}

/// A key whose bottom-out envelope has settled and is due for persistence.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct BottomOutFlush {
    pub key: usize,
    pub adc_bottom_out_value: u16,
}

fn ema_update(filtered: u16, raw: u16, alpha: u8) -> u16 {
    let multiplier = (1u32 << alpha) - 1;
    (((raw as u32) + (filtered as u32) * multiplier) >> alpha) as u16
}

fn distance(filtered: u16, rest: u16, bottom_out: u16) -> u8 {
    if bottom_out <= rest || filtered <= rest {
        return 0;
    }
    let range = (bottom_out - rest) as u32;
    let raw = ((filtered - rest) as u32) * 255 / range;
    if raw > 255 {
        255
    } else {
        raw as u8
    }
}

/// The matrix engine for a compile-time-known key count.
///
/// Owns every [`KeyState`]; the active profile's `actuation_map` is borrowed
/// in on each [`Matrix::scan`] call rather than stored, since it belongs to
/// configuration (§3 "Ownership").
pub struct Matrix<const NUM_KEYS: usize> {
    state: [KeyState; NUM_KEYS],
    options: MatrixOptions,
    /// Millisecond deadline until which the rest envelope may still be
    /// lowered; set by `recalibrate`, cleared once elapsed.
    calibrating_until: u32,
}

impl<const NUM_KEYS: usize> Matrix<NUM_KEYS> {
    pub fn new(options: MatrixOptions) -> Self {
        Matrix {
            state: [KeyState::new(); NUM_KEYS],
            options,
            calibrating_until: 0,
        }
    }

    /// Seeds every key's envelope from the persisted global calibration
    /// (`initial_rest_value`, `initial_bottom_out_threshold` in §6's EEPROM
    /// image), prior to the first `scan`.
    pub fn init(&mut self, initial_rest: u16, initial_bottom_out: u16) {
        for key in self.state.iter_mut() {
            key.adc_rest_value = initial_rest;
            key.adc_bottom_out_value = initial_bottom_out.max(initial_rest);
            // Seed the filter at rest so the first scans after boot don't
            // read as a spurious deep press while the EMA catches up.
            key.adc_filtered = initial_rest;
        }
    }

    pub fn key(&self, key: usize) -> &KeyState {
        &self.state[key]
    }

    /// Opens a calibration window and, if `reset_bottom_out`, collapses
    /// every key's bottom-out delta back to zero (§8 "After
    /// `recalibrate(true)`, all `bottom_out_threshold[k] == 0`").
    pub fn recalibrate(&mut self, reset_bottom_out: bool, now: u32) {
        self.calibrating_until = now.wrapping_add(MATRIX_CALIBRATION_DURATION_MS);
        if reset_bottom_out {
            for key in self.state.iter_mut() {
                key.adc_bottom_out_value = key.adc_rest_value;
                key.bottom_out_dirty = true;
                key.bottom_out_changed_at = now;
            }
            log::debug!("matrix recalibrate: bottom-out reset for all keys");
        } else {
            log::debug!("matrix recalibrate: rest envelope reopened");
        }
    }

    /// Directly overrides one key's rest/bottom-out envelope (§6
    /// `CalibrationSet` command). `false` if `key` is out of range.
    pub fn set_calibration(&mut self, key: usize, rest: u16, bottom_out: u16, now: u32) -> bool {
        if let Some(state) = self.state.get_mut(key) {
            state.adc_rest_value = rest;
            state.adc_bottom_out_value = bottom_out;
            state.bottom_out_dirty = true;
            state.bottom_out_changed_at = now;
            true
        } else {
            false
        }
    }

    /// Forces Rapid Trigger off for one key regardless of its
    /// `actuation_map` entry, independent of the profile (§4.1).
    pub fn disable_rapid_trigger(&mut self, key: usize, flag: bool) {
        if let Some(state) = self.state.get_mut(key) {
            state.rt_disabled = flag;
        }
    }

    fn calibrating(&self, now: u32) -> bool {
        now.wrapping_sub(self.calibrating_until) >= u32::MAX / 2
    }

    /// Runs one scan period: filter, calibrate, compute distance, advance
    /// Rapid Trigger, and resolve same-scan concurrent presses.
    ///
    /// `readings` and `actuation` are indexed by key; `now` is the current
    /// millisecond timer value from the `TimeSource` collaborator.
    pub fn scan(
        &mut self,
        readings: &[u16; NUM_KEYS],
        actuation: &[Actuation; NUM_KEYS],
        now: u32,
    ) {
        let calibrating = self.calibrating(now);
        let mut rising: Vec<(usize, u8), NUM_KEYS> = Vec::new();

        for key in 0..NUM_KEYS {
            let mut raw = readings[key];
            if self.options.invert {
                raw = ADC_MAX_VALUE.saturating_sub(raw);
            }
            if raw > ADC_MAX_VALUE {
                raw = ADC_MAX_VALUE;
            }

            let st = &mut self.state[key];
            st.adc_filtered = ema_update(st.adc_filtered, raw, MATRIX_EMA_ALPHA_EXPONENT);

            if calibrating
                && st.adc_rest_value >= st.adc_filtered + MATRIX_CALIBRATION_EPSILON
            {
                st.adc_rest_value = st.adc_filtered;
                log::trace!("matrix[{}] rest lowered to {}", key, st.adc_rest_value);
            }
            if st.adc_filtered >= st.adc_bottom_out_value + MATRIX_CALIBRATION_EPSILON {
                st.adc_bottom_out_value = st.adc_filtered;
                st.bottom_out_dirty = true;
                st.bottom_out_changed_at = now;
                log::trace!(
                    "matrix[{}] bottom-out raised to {}",
                    key,
                    st.adc_bottom_out_value
                );
            }

            let dist = distance(st.adc_filtered, st.adc_rest_value, st.adc_bottom_out_value);
            let was_pressed = st.is_pressed;
            let edge = rapid_trigger::advance(st, &actuation[key], dist, now);
            if edge.rose {
                debug_assert!(!was_pressed);
                let overshoot = dist.saturating_sub(actuation[key].actuation_point);
                // Queue full only if NUM_KEYS presses rose in the same scan,
                // which cannot exceed NUM_KEYS; push cannot fail.
                let _ = rising.push((key, overshoot));
            } else if edge.fell {
                log::debug!("matrix[{}] released at distance {}", key, dist);
            }
        }

        if rising.len() > 1 {
            rising.sort_unstable_by(|a, b| b.1.cmp(&a.1));
            for &(key, _) in rising.iter().skip(1) {
                let st = &mut self.state[key];
                st.is_pressed = false;
                st.key_dir = KeyDir::Inactive;
                log::debug!("matrix[{}] deferred to next scan (concurrent press)", key);
            }
        }
    }

    /// Drains keys whose bottom-out envelope has been stable for
    /// `MATRIX_INACTIVITY_TIMEOUT_MS` and is due to be written to
    /// persistent storage (§15 "Bottom-out persistence batching").
    ///
    /// Returns an empty vector when `options.save_bottom_out_threshold` is
    /// unset, matching §6's "controlled by `options.save_bottom_out_threshold`".
    pub fn drain_bottom_out_flush(&mut self, now: u32) -> Vec<BottomOutFlush, NUM_KEYS> {
        let mut out = Vec::new();
        if !self.options.save_bottom_out_threshold {
            return out;
        }
        for (key, st) in self.state.iter_mut().enumerate() {
            if st.bottom_out_dirty
                && now.wrapping_sub(st.bottom_out_changed_at) >= MATRIX_INACTIVITY_TIMEOUT_MS
            {
                st.bottom_out_dirty = false;
                // Vec capacity equals NUM_KEYS, so this cannot overflow.
                let _ = out.push(BottomOutFlush {
                    key,
                    adc_bottom_out_value: st.adc_bottom_out_value,
                });
            }
        }
        out
    }
}
