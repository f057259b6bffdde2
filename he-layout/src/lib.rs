// Copyright 2021-2026 Jacob Alexander
// Copyright 2021-2026 Zion Koyl
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The layout engine (§4.2).
//!
//! Transparent multi-layer keymap lookup, per-key event dispatch,
//! chronological event ordering, and the pending-event buffer that defers
//! non-hold-tap presses while a Tap-Hold decision is outstanding. Owns the
//! [`LayerMask`], the `advanced_key_indices` table, per-key lock state, and
//! drives the combo and advanced-key engines to quiescence each tick, the
//! way `kiibohd-keyscanning::Matrix::sense` turns raw edges into `KeyEvent`s
//! for a higher layer to dispatch.

#![no_std]

mod pending;

#[cfg(test)]
mod test;

pub use pending::{PendingEvent, PENDING_EVENT_CAPACITY};

use he_advanced_keys::{
    AdvancedKeyEngine, ComboEngine, ComboOffer, ComboReplay, ComboSlot, COMBO_QUEUE_LEN,
};
use he_config::{
    AdvancedKey, AdvancedKeyVariant, ComboConfig, LayerMask, MacroDef, Options, Profile,
};
use he_deferred_action::{DeferredActionQueue, HidSink};
use he_hid::{GamepadButton, Keyboard, Keycode, KeycodeClass};
use he_matrix::{KeyState, Matrix};
use heapless::Vec;

/// Collaborator for the XInput gamepad path (§4.2 "XInput interaction").
/// The core never assembles a gamepad report itself (§1 Non-goals); this
/// trait is the interface boundary it is specified at.
pub trait XInputSink {
    fn xinput_button(&mut self, button: GamepadButton, pressed: bool);
}

/// A side effect that only the configuration collaborator can perform,
/// since the profile table and bootloader entry live outside this crate
/// (§3 "Ownership", §6 "`board_enter_bootloader()`").
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum ProfileRequest {
    /// `SP_PROFILE_SWAP` / direct `ProfileSelect` keycode range.
    Select(u8),
    /// `SP_PROFILE_SWAP`: toggle between current and the last non-default
    /// profile.
    Swap,
    /// `SP_PROFILE_NEXT`: advance, wrapping at `NUM_PROFILES`.
    Next,
}

/// Accumulated side effects from one [`LayoutEngine::task`] call that the
/// glue driver (outside this crate) must act on.
#[derive(Copy, Clone, Debug, Default, defmt::Format)]
pub struct TickOutcome {
    pub profile_request: Option<ProfileRequest>,
    pub enter_bootloader: bool,
}

/// One gathered key edge, scratch state for the chronological dispatch
/// pass (§4.2 tick algorithm, steps 1-2).
#[derive(Copy, Clone, Debug)]
struct ScratchEvent {
    key: u8,
    pressed: bool,
    time: u32,
}

type ReplayBuf = Vec<ComboReplay, COMBO_QUEUE_LEN>;

fn empty_combo() -> ComboConfig {
    ComboConfig {
        keys: [0; 4],
        num_keys: 0,
        term_ms: 0,
        output_keycode: Keycode::NONE,
    }
}

/// The layout engine for a compile-time-known layer/key/advanced-key count.
///
/// `NUM_ADVANCED_KEYS` doubles as the upper bound on the number of Combo
/// slots, since a combo is just one more tagged variant in the same flat
/// `Profile::advanced_keys` array (§4.2 "Combos are NOT installed [into
/// `advanced_key_indices`]... they use the flat advanced-key list").
pub struct LayoutEngine<const NUM_LAYERS: usize, const NUM_KEYS: usize, const NUM_ADVANCED_KEYS: usize>
{
    layer_mask: LayerMask,
    /// `ak_slot + 1`, or 0 if no binding (§4.2 "Advanced-key indexing").
    advanced_key_indices: [[u8; NUM_KEYS]; NUM_LAYERS],
    combo_slots: [ComboSlot; NUM_ADVANCED_KEYS],
    combo_engine: ComboEngine<NUM_ADVANCED_KEYS>,
    key_locked: [bool; NUM_KEYS],
    last_seen_pressed: [bool; NUM_KEYS],
    last_non_modifier_key_time: u32,
    pending: Vec<PendingEvent, PENDING_EVENT_CAPACITY>,
}

impl<const NUM_LAYERS: usize, const NUM_KEYS: usize, const NUM_ADVANCED_KEYS: usize>
    LayoutEngine<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS>
{
    pub fn new(default_layer: u8) -> Self {
        LayoutEngine {
            layer_mask: LayerMask::new(default_layer),
            advanced_key_indices: [[0; NUM_KEYS]; NUM_LAYERS],
            combo_slots: core::array::from_fn(|_| ComboSlot {
                layer: 0,
                config: empty_combo(),
            }),
            combo_engine: ComboEngine::new(),
            key_locked: [false; NUM_KEYS],
            last_seen_pressed: [false; NUM_KEYS],
            last_non_modifier_key_time: 0,
            pending: Vec::new(),
        }
    }

    /// Resets runtime layout state (layer mask, locks, pending buffer) back
    /// to a freshly-booted profile's starting point, keeping the current
    /// default layer.
    pub fn init(&mut self) {
        let default_layer = self.layer_mask.default_layer();
        *self = Self::new(default_layer);
    }

    pub const fn get_current_layer(&self) -> u8 {
        self.layer_mask.current()
    }

    pub fn get_keycode(
        &self,
        profile: &Profile<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS>,
        key: usize,
    ) -> Keycode {
        profile.get_keycode(self.layer_mask.current(), key)
    }

    /// Rebuilds `advanced_key_indices` and the combo participation cache
    /// from the newly active profile (§4.2 "rebuilt by `load_advanced_keys`
    /// on every config-changing path"). Must follow
    /// `AdvancedKeyEngine::clear()` + `load()` (§3, §6).
    pub fn load_advanced_keys(
        &mut self,
        profile: &Profile<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS>,
    ) {
        self.advanced_key_indices = [[0; NUM_KEYS]; NUM_LAYERS];
        for (slot, ak) in profile.advanced_keys.iter().enumerate() {
            self.combo_slots[slot] = ComboSlot {
                layer: ak.layer,
                config: match ak.variant {
                    AdvancedKeyVariant::Combo(c) => c,
                    _ => empty_combo(),
                },
            };

            if !ak.indexes_into_layout() {
                continue;
            }
            let layer = ak.layer as usize;
            if layer >= NUM_LAYERS {
                continue;
            }
            if (ak.key as usize) < NUM_KEYS {
                self.advanced_key_indices[layer][ak.key as usize] = slot as u8 + 1;
            }
            if let Some(secondary) = ak.secondary_key() {
                if (secondary as usize) < NUM_KEYS {
                    self.advanced_key_indices[layer][secondary as usize] = slot as u8 + 1;
                }
            }
        }
        self.combo_engine.invalidate_cache();
    }

    /// Toggles `SP_KEY_LOCK`'s target (§4.2 "disables one key until
    /// re-toggled"); exposed so a HID configuration write can also clear a
    /// stuck lock out of band.
    pub fn set_key_locked(&mut self, key: usize, locked: bool) {
        if key < NUM_KEYS {
            self.key_locked[key] = locked;
        }
    }

    /// Readback for a HID configuration query (§6) and for tests.
    pub fn is_key_locked(&self, key: usize) -> bool {
        key < NUM_KEYS && self.key_locked[key]
    }

    fn advanced_slot(&self, key: u8) -> Option<usize> {
        let layer = self.layer_mask.current() as usize;
        let raw = self.advanced_key_indices[layer][key as usize];
        if raw == 0 {
            None
        } else {
            Some(raw as usize - 1)
        }
    }

    /// One tick (§4.2 "Tick algorithm").
    #[allow(clippy::too_many_arguments)]
    pub fn task<const NUM_MACROS: usize, const NH: usize>(
        &mut self,
        profile: &Profile<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS>,
        options: &Options,
        matrix: &Matrix<NUM_KEYS>,
        macros: &[MacroDef; NUM_MACROS],
        advanced: &mut AdvancedKeyEngine<NUM_ADVANCED_KEYS>,
        now: u32,
        hid: &mut impl HidSink,
        xinput: &mut impl XInputSink,
        deferred: &mut DeferredActionQueue<NH>,
    ) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        // Step 1: gather edges; dispatch continuing holds immediately
        // (no ordering effect, §4.2 step 1).
        let mut scratch: Vec<ScratchEvent, NUM_KEYS> = Vec::new();
        for key in 0..NUM_KEYS {
            let st: &KeyState = matrix.key(key);
            let now_pressed = st.is_pressed;
            let was_pressed = self.last_seen_pressed[key];
            if now_pressed != was_pressed {
                self.last_seen_pressed[key] = now_pressed;
                let _ = scratch.push(ScratchEvent {
                    key: key as u8,
                    pressed: now_pressed,
                    time: st.event_time,
                });
            } else if now_pressed {
                if let Some(slot) = self.advanced_slot(key as u8) {
                    advanced.on_distance(slot, &profile.advanced_keys[slot], key as u8, st.distance, hid, deferred);
                }
            }
        }

        // Step 2: insertion sort by event_time ascending (wraparound-safe:
        // a smaller `wrapping_sub` against the running front means earlier).
        for i in 1..scratch.len() {
            let mut j = i;
            while j > 0 && scratch[j].time.wrapping_sub(scratch[j - 1].time) >= u32::MAX / 2 {
                scratch.swap(j - 1, j);
                j -= 1;
            }
        }

        // Step 3: chronological dispatch.
        let mut replay: ReplayBuf = Vec::new();
        for i in 0..scratch.len() {
            let ev = scratch[i];
            if ev.pressed {
                let layer = self.layer_mask.current();
                let offer = self.combo_engine.offer_press(
                    &self.combo_slots,
                    layer,
                    ev.key,
                    ev.time,
                    hid,
                    deferred,
                    &mut replay,
                );
                self.drain_replay(&mut replay, profile, options, matrix, advanced, now, hid, xinput, deferred, &mut outcome);
                if offer == ComboOffer::Queued {
                    continue;
                }

                let is_tap_hold_key = self
                    .advanced_slot(ev.key)
                    .map(|slot| matches!(profile.advanced_keys[slot].variant, AdvancedKeyVariant::TapHold(_)))
                    .unwrap_or(false);

                if !is_tap_hold_key && advanced.has_undecided() {
                    if self.pending.push(PendingEvent { key: ev.key, pressed: true }).is_err() {
                        // Pending buffer full: processed inline (§7).
                        self.process_key(ev.key, true, now, profile, options, matrix, advanced, hid, xinput, deferred, &mut outcome);
                    } else {
                        // Staged for later dispatch, but every Pending
                        // Tap-Hold slot still needs to see this as an
                        // interrupting press *now*: permissive_hold,
                        // hold_on_other_key_press, Balanced and
                        // TapUnlessInterrupted all key off "another key was
                        // pressed", not off when that key's HID effect is
                        // actually dispatched (§4.3.1).
                        advanced.notify_other_key_event(true);
                    }
                } else {
                    self.process_key(ev.key, true, now, profile, options, matrix, advanced, hid, xinput, deferred, &mut outcome);
                }
            } else {
                self.combo_engine.offer_release(ev.key);
                if let Some(pos) = self.pending.iter().position(|pe| pe.key == ev.key && pe.pressed) {
                    // The matching press is still sitting undispatched in
                    // the pending buffer. Dispatching this release through
                    // `process_key` now would unregister a keycode that was
                    // never registered, and the buffered press would later
                    // drain into a register with no release ever following
                    // it, leaving the key stuck in the HID report. Cancel
                    // the pair instead of letting either reach the HID path,
                    // but still let Pending Tap-Hold slots observe the
                    // interrupt's release the way `process_key` would have
                    // (§4.3.1 permissive-hold resolves off the release).
                    self.pending.remove(pos);
                    advanced.notify_other_key_event(false);
                } else {
                    // Release events are never deferred (§4.2 step 3b parenthetical).
                    self.process_key(ev.key, false, now, profile, options, matrix, advanced, hid, xinput, deferred, &mut outcome);
                }
            }
        }

        // Step 4: progress time-based combo decisions.
        let layer = self.layer_mask.current();
        self.combo_engine.task(&self.combo_slots, layer, now, hid, deferred, &mut replay);
        self.drain_replay(&mut replay, profile, options, matrix, advanced, now, hid, xinput, deferred, &mut outcome);

        // Step 5: tick every advanced-key slot unconditionally so Toggle's
        // term-elapse revert and Macro playback keep progressing even on
        // ticks with no undecided Tap-Hold (see DESIGN.md open question);
        // only the pending-event drain is actually gated on `has_undecided`.
        advanced.tick(&profile.advanced_keys, macros, now, hid, deferred);
        if !advanced.has_undecided() {
            while !self.pending.is_empty() {
                let pe = self.pending.remove(0);
                self.process_key(pe.key, pe.pressed, now, profile, options, matrix, advanced, hid, xinput, deferred, &mut outcome);
            }
        }

        outcome
    }

    /// Dispatches every key a combo flush left unconsumed, in original
    /// order (§4.3.5 "unconsumed ones are replayed through
    /// `layout.process_key`").
    #[allow(clippy::too_many_arguments)]
    fn drain_replay<const NH: usize>(
        &mut self,
        replay: &mut ReplayBuf,
        profile: &Profile<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS>,
        options: &Options,
        matrix: &Matrix<NUM_KEYS>,
        advanced: &mut AdvancedKeyEngine<NUM_ADVANCED_KEYS>,
        now: u32,
        hid: &mut impl HidSink,
        xinput: &mut impl XInputSink,
        deferred: &mut DeferredActionQueue<NH>,
        outcome: &mut TickOutcome,
    ) {
        if replay.is_empty() {
            return;
        }
        let flushed: Vec<u8, COMBO_QUEUE_LEN> = replay.iter().map(|r| r.key).collect();
        replay.clear();
        for key in flushed {
            self.process_key(key, true, now, profile, options, matrix, advanced, hid, xinput, deferred, outcome);
        }
    }

    /// Dispatches one key edge: either directly (normal keycode) or into
    /// the advanced-key engine (§4.2 step 3c "`process_key`").
    #[allow(clippy::too_many_arguments)]
    pub fn process_key<const NH: usize>(
        &mut self,
        key: u8,
        pressed: bool,
        now: u32,
        profile: &Profile<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS>,
        options: &Options,
        matrix: &Matrix<NUM_KEYS>,
        advanced: &mut AdvancedKeyEngine<NUM_ADVANCED_KEYS>,
        hid: &mut impl HidSink,
        xinput: &mut impl XInputSink,
        deferred: &mut DeferredActionQueue<NH>,
        outcome: &mut TickOutcome,
    ) {
        if key as usize >= NUM_KEYS {
            log::error!("process_key: out-of-range key {}", key);
            return;
        }
        let layer = self.layer_mask.current();
        let keycode = profile.get_keycode(layer, key as usize);

        // §7 "Invalid ak_index / out-of-range key: silently ignored" —
        // a locked key is a no-op for everything except the keycode that
        // toggled the lock, so the same physical key can unlock itself.
        if self.key_locked[key as usize] && keycode != Keycode::SP_KEY_LOCK {
            return;
        }

        if layer == 0 && options.xinput_enabled {
            let button = profile.gamepad_buttons[key as usize];
            if button != GamepadButton::None {
                xinput.xinput_button(button, pressed);
            }
            let gamepad_override = profile.gamepad_options.override_keyboard && button != GamepadButton::None;
            if gamepad_override || !options.keyboard_enabled {
                return;
            }
        }

        if let Some(slot) = self.advanced_slot(key) {
            let cfg: &AdvancedKey = &profile.advanced_keys[slot];
            let is_tap_hold = matches!(cfg.variant, AdvancedKeyVariant::TapHold(_));
            let distance = matrix.key(key as usize).distance;
            if pressed {
                advanced.press(slot, cfg, key, now, distance, self.last_non_modifier_key_time, hid, deferred);
            } else {
                advanced.release(slot, cfg, key, now, distance, hid, deferred);
            }
            if !is_tap_hold {
                advanced.notify_other_key_event(pressed);
            }
            return;
        }

        match keycode.class() {
            KeycodeClass::Standard(code) => {
                if pressed {
                    hid.register(key, keycode);
                    if !Keyboard::from(code).is_modifier() {
                        self.last_non_modifier_key_time = now;
                    }
                } else {
                    hid.unregister(key, keycode);
                }
                advanced.notify_other_key_event(pressed);
            }
            KeycodeClass::MomentaryLayer(layer_bit) => {
                self.layer_mask.set(layer_bit, pressed);
            }
            KeycodeClass::ProfileSelect(p) => {
                if pressed {
                    outcome.profile_request = Some(ProfileRequest::Select(p));
                }
            }
            KeycodeClass::Special(_) => {
                if !pressed {
                    return;
                }
                if keycode == Keycode::SP_KEY_LOCK {
                    self.key_locked[key as usize] = !self.key_locked[key as usize];
                } else if keycode == Keycode::SP_LAYER_LOCK {
                    self.layer_mask.lock_current_as_default();
                } else if keycode == Keycode::SP_PROFILE_SWAP {
                    outcome.profile_request = Some(ProfileRequest::Swap);
                } else if keycode == Keycode::SP_PROFILE_NEXT {
                    outcome.profile_request = Some(ProfileRequest::Next);
                } else if keycode == Keycode::SP_BOOT {
                    outcome.enter_bootloader = true;
                }
            }
            KeycodeClass::Transparent | KeycodeClass::None => {}
        }
    }
}
