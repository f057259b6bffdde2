// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Configuration data model (§3).
//!
//! Owns everything that is read-only to runtime code and mutated only
//! through a configuration-update path: the active profile (keymap,
//! actuation map, advanced-key bindings, gamepad buttons), the layer mask,
//! and the persistent EEPROM image. `he-matrix` and `he-layout` borrow this
//! data in; neither crate stores a copy.

#![no_std]

mod advanced_key;
mod layer_mask;
mod macro_def;
mod persist;
mod profile;

#[cfg(test)]
mod test;

pub use advanced_key::{
    AdvancedKey, AdvancedKeyVariant, ComboConfig, DksAction, DksConfig, DksEvent, DksSubBinding,
    MacroBinding, NbBehavior, NullBindConfig, TapHoldConfig, TapHoldFlavor, ToggleConfig,
};
pub use layer_mask::LayerMask;
pub use macro_def::{MacroAction, MacroDef, MacroEvent, MAX_MACRO_EVENTS};
pub use persist::{Image, KeyMode, Options};
pub use profile::{GamepadOptions, Profile};

pub use he_hid::{GamepadButton, Keycode};
pub use he_matrix::Actuation;

/// Default combo term, used when a [`ComboConfig::term_ms`] is left at 0
/// (§8 "`combo.term = 0` uses `DEFAULT_COMBO_TERM = 50 ms`").
pub const DEFAULT_COMBO_TERM_MS: u16 = 50;

/// Reserved virtual key index combo commits register/unregister against
/// (§4.3.5 "key 255 is the virtual combo key").
pub const COMBO_VIRTUAL_KEY: u8 = 255;
