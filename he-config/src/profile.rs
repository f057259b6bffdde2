// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The active profile (§3 `ActiveProfile`).

use crate::advanced_key::AdvancedKey;
use he_hid::{GamepadButton, Keycode};
use he_matrix::Actuation;

/// Per-profile XInput behavior (§3 `ActiveProfile` "`gamepad_options`").
///
/// Distinct from the global [`crate::Options::xinput_enabled`] gate: this
/// controls what happens to a key that *does* have a `gamepad_buttons` entry
/// once XInput delivery is already in effect (§4.2 "XInput interaction").
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, defmt::Format)]
pub struct GamepadOptions {
    /// When set, a key with a non-`None` `gamepad_buttons` entry is not
    /// also delivered to the keyboard path (§4.2 "If `gamepad_override`,
    /// the key is not delivered to the keyboard path").
    pub override_keyboard: bool,
}

/// One of `NUM_PROFILES` configured profiles.
///
/// Read-only to runtime code (§3 "Ownership"): mutated only through a
/// configuration-update path that first calls `advanced_key.clear()`, then
/// `layout.load_advanced_keys()` (§3 `ActiveProfile` invariant, §6 HID
/// protocol obligation).
#[derive(Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct Profile<const NUM_LAYERS: usize, const NUM_KEYS: usize, const NUM_ADVANCED_KEYS: usize>
{
    pub keymap: [[Keycode; NUM_KEYS]; NUM_LAYERS],
    pub actuation_map: [Actuation; NUM_KEYS],
    pub advanced_keys: [AdvancedKey; NUM_ADVANCED_KEYS],
    pub gamepad_buttons: [GamepadButton; NUM_KEYS],
    pub gamepad_options: GamepadOptions,
    /// Layer the profile starts on and falls back to once every momentary
    /// layer bit clears (§3 `LayerMask`).
    pub default_layer: u8,
}

impl<const NUM_LAYERS: usize, const NUM_KEYS: usize, const NUM_ADVANCED_KEYS: usize> Default
    for Profile<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS>
{
    fn default() -> Self {
        Profile {
            keymap: [[Keycode::TRANSPARENT; NUM_KEYS]; NUM_LAYERS],
            actuation_map: [Actuation::default(); NUM_KEYS],
            advanced_keys: core::array::from_fn(|_| AdvancedKey::default()),
            gamepad_buttons: [GamepadButton::None; NUM_KEYS],
            gamepad_options: GamepadOptions::default(),
            default_layer: 0,
        }
    }
}

impl<const NUM_LAYERS: usize, const NUM_KEYS: usize, const NUM_ADVANCED_KEYS: usize>
    Profile<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS>
{
    /// Transparent lookup (§4.2): scans active layers from `current` down
    /// to 0; the first layer whose entry is not `TRANSPARENT` wins,
    /// otherwise the default layer's entry.
    pub fn get_keycode(&self, current: u8, key: usize) -> Keycode {
        let top = (current as usize).min(NUM_LAYERS.saturating_sub(1));
        for layer in (0..=top).rev() {
            let kc = self.keymap[layer][key];
            if !kc.is_transparent() {
                return kc;
            }
        }
        self.keymap[self.default_layer as usize % NUM_LAYERS.max(1)][key]
    }
}
