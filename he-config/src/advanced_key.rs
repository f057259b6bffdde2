// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The `AdvancedKey` tagged union (§3, §4.3).
//!
//! The source packs this as a C union; here it is a Rust sum type with a
//! per-variant config record, the way `kll-core`'s `Capability`/
//! `TriggerCondition` are sum types over a fixed small set of variants. Only
//! the *configuration* lives here — each variant's runtime state machine is
//! owned by `he-advanced-keys`, which indexes into this table by slot.

use he_hid::Keycode;

/// One configured advanced-key slot (§3 `AdvancedKey`).
///
/// `layer`/`key` are the common fields every variant carries; `NONE` reuses
/// them as a disabled placeholder so `advanced_keys[NUM_ADVANCED_KEYS]` can
/// stay a flat fixed-size array with no `Option` wrapper.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct AdvancedKey {
    pub layer: u8,
    pub key: u8,
    pub variant: AdvancedKeyVariant,
}

impl Default for AdvancedKey {
    fn default() -> Self {
        AdvancedKey {
            layer: 0,
            key: 0,
            variant: AdvancedKeyVariant::None,
        }
    }
}

impl AdvancedKey {
    /// Combos are excluded from `advanced_key_indices` by construction
    /// (§4.2 "Combos are NOT installed here"); this is the predicate
    /// `load_advanced_keys` uses to skip them.
    pub const fn indexes_into_layout(&self) -> bool {
        !matches!(
            self.variant,
            AdvancedKeyVariant::None | AdvancedKeyVariant::Combo(_)
        )
    }

    /// Null-Bind slots install the index under both the primary key (the
    /// common `key` field) and this secondary key (§4.2).
    pub const fn secondary_key(&self) -> Option<u8> {
        match self.variant {
            AdvancedKeyVariant::NullBind(cfg) => Some(cfg.secondary_key),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum AdvancedKeyVariant {
    None,
    NullBind(NullBindConfig),
    DynamicKeystroke(DksConfig),
    TapHold(TapHoldConfig),
    Toggle(ToggleConfig),
    Combo(ComboConfig),
    Macro(MacroBinding),
}

/// Tap-Hold resolution flavor (§4.3.1 "Tick").
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum TapHoldFlavor {
    /// Resolve HOLD as soon as `tapping_term` elapses, tap otherwise.
    HoldPreferred,
    /// Resolve HOLD only if another key is both pressed and released
    /// before the term elapses.
    Balanced,
    /// Resolve TAP unless interrupted by another key's press; HOLD on term
    /// elapse with no interrupt.
    TapPreferred,
    /// Resolve HOLD as soon as another key is pressed before the term
    /// elapses; TAP on term elapse with no interrupt.
    TapUnlessInterrupted,
}

/// Config for a Tap-Hold slot (§4.3.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct TapHoldConfig {
    pub tap_keycode: Keycode,
    pub hold_keycode: Keycode,
    pub tapping_term_ms: u16,
    pub flavor: TapHoldFlavor,
    pub retro_tapping: bool,
    pub hold_on_other_key_press: bool,
    pub permissive_hold: bool,
    /// Milliseconds; 0 disables the quick-tap repeat-as-tap shortcut.
    pub quick_tap_ms: u16,
    /// Milliseconds; 0 disables the prior-idle bypass.
    pub require_prior_idle_ms: u16,
    /// Sent instead of `tap_keycode` on a recognized double-tap; `Keycode::NONE`
    /// disables the feature (not modeled further — see DESIGN.md).
    pub double_tap_keycode: Keycode,
}

/// Config for a Toggle slot (§4.3.2).
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct ToggleConfig {
    pub keycode: Keycode,
    /// Milliseconds the TOGGLE stage is held before reverting to NORMAL.
    pub tapping_term_ms: u16,
}

/// The four event classes a Dynamic Keystroke sub-binding can react to
/// (§4.3.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum DksEvent {
    Press = 0,
    BottomOut = 1,
    ReleaseFromBottomOut = 2,
    Release = 3,
}

/// The 2-bit action a sub-binding's bitmap maps an event class to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum DksAction {
    Hold = 0,
    Press = 1,
    Release = 2,
    Tap = 3,
}

impl DksAction {
    pub const fn from_bits(bits: u8) -> DksAction {
        match bits & 0b11 {
            0 => DksAction::Hold,
            1 => DksAction::Press,
            2 => DksAction::Release,
            _ => DksAction::Tap,
        }
    }
}

/// One of a DKS slot's four independent sub-bindings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct DksSubBinding {
    pub keycode: Keycode,
    /// Packed 2-bit actions, one per [`DksEvent`], LSB-first.
    pub action_bitmap: u8,
}

impl DksSubBinding {
    pub const fn action_for(&self, event: DksEvent) -> DksAction {
        DksAction::from_bits(self.action_bitmap >> ((event as u8) * 2))
    }
}

/// Config for a Dynamic Keystroke slot (§4.3.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct DksConfig {
    pub sub_bindings: [DksSubBinding; 4],
    /// Normalized travel depth (0..255) at which this key is considered
    /// bottomed-out for DKS event remapping purposes.
    pub bottom_out_point: u8,
}

/// Null-Bind reconciliation policy (§4.3.4).
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum NbBehavior {
    Distance,
    Last,
    Primary,
    Secondary,
    Neutral,
}

/// Config for a Null Bind slot (§4.3.4). The common `key`/`layer` fields on
/// the enclosing [`AdvancedKey`] name the primary key; `secondary_key` is
/// the other half of the pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct NullBindConfig {
    pub secondary_key: u8,
    /// `[primary_keycode, secondary_keycode]` (§3 `NullBind` state
    /// `keycodes[2]`) — distinct so e.g. left/right steering SOCD pairs
    /// register the correct physical direction, not a single shared output.
    pub keycodes: [Keycode; 2],
    pub behavior: NbBehavior,
    /// 0 disables the "both exceed bottom-out" override (§4.3.4).
    pub bottom_out_point: u8,
}

/// Config for a Combo slot (§4.3.5). Up to 4 required keys, grounded on the
/// pack's `chord_engine.rs` fixed-size chord definitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct ComboConfig {
    pub keys: [u8; 4],
    /// Number of significant entries in `keys` (0 is a malformed combo,
    /// treated as permanent no-match per §7).
    pub num_keys: u8,
    /// Milliseconds; 0 uses [`crate::DEFAULT_COMBO_TERM_MS`].
    pub term_ms: u16,
    pub output_keycode: Keycode,
}

impl ComboConfig {
    pub fn required_keys(&self) -> &[u8] {
        &self.keys[..self.num_keys as usize]
    }

    pub fn effective_term_ms(&self) -> u16 {
        if self.term_ms == 0 {
            crate::DEFAULT_COMBO_TERM_MS
        } else {
            self.term_ms
        }
    }
}

/// References one of the persistent image's `macros[NUM_MACROS]` slots
/// (§4.3.6); the macro's event sequence lives in [`crate::MacroDef`], not
/// here, since several advanced-key slots may legally share one macro.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct MacroBinding {
    pub macro_index: u8,
}
