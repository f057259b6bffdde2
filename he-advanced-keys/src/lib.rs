// Copyright 2021-2026 Jacob Alexander
// Copyright 2021-2026 Zion Koyl
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The advanced-key engine (§4.3).
//!
//! Five concurrent per-binding state machines (Tap-Hold, Toggle, Dynamic
//! Keystroke, Null Bind, Macro) addressed by a flat slot array that mirrors
//! `he_config::Profile::advanced_keys`, plus the Combo engine, which is
//! addressed separately since combo bindings are never installed into the
//! layout's `advanced_key_indices` (§4.2).

#![no_std]

mod combo;
mod dks;
mod macro_engine;
mod null_bind;
mod tap_hold;
mod toggle;


pub use combo::{ComboSlot, Engine as ComboEngine, Offer as ComboOffer, Replay as ComboReplay, COMBO_QUEUE_LEN};
pub use he_deferred_action::HidSink;
pub use tap_hold::Stage as TapHoldStage;

use he_config::{AdvancedKey, AdvancedKeyVariant, MacroDef};
use he_deferred_action::DeferredActionQueue;

#[derive(Copy, Clone, Debug, defmt::Format)]
pub enum SlotState {
    None,
    NullBind(null_bind::State),
    Dks(dks::State),
    TapHold(tap_hold::State),
    Toggle(toggle::State),
    Macro(macro_engine::State),
}

impl Default for SlotState {
    fn default() -> Self {
        SlotState::None
    }
}

/// Owns every advanced-key slot's runtime state.
///
/// `NUM_ADVANCED_KEYS` must match `he_config::Profile`'s const generic of
/// the same name — the slot index here *is* the index into
/// `Profile::advanced_keys`.
pub struct AdvancedKeyEngine<const NUM_ADVANCED_KEYS: usize> {
    slots: [SlotState; NUM_ADVANCED_KEYS],
}

impl<const N: usize> Default for AdvancedKeyEngine<N> {
    fn default() -> Self {
        AdvancedKeyEngine {
            slots: core::array::from_fn(|_| SlotState::None),
        }
    }
}

impl<const NUM_ADVANCED_KEYS: usize> AdvancedKeyEngine<NUM_ADVANCED_KEYS> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every slot to its inert state (§3 "profile switch must call
    /// `advanced_key.clear()`"). Must be followed by [`Self::load`] before
    /// the next tick.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = SlotState::None;
        }
    }

    /// Initializes each slot's state machine to match the newly active
    /// profile's configured variant (companion of `layout.load_advanced_keys`,
    /// §6 "MUST trigger `advanced_key.clear()` and `layout.load_advanced_keys()`
    /// before the next tick").
    pub fn load(&mut self, configs: &[AdvancedKey; NUM_ADVANCED_KEYS]) {
        for (slot, cfg) in self.slots.iter_mut().zip(configs.iter()) {
            *slot = match cfg.variant {
                AdvancedKeyVariant::None | AdvancedKeyVariant::Combo(_) => SlotState::None,
                AdvancedKeyVariant::NullBind(_) => SlotState::NullBind(null_bind::State::new()),
                AdvancedKeyVariant::DynamicKeystroke(_) => SlotState::Dks(dks::State::new()),
                AdvancedKeyVariant::TapHold(_) => SlotState::TapHold(tap_hold::State::new()),
                AdvancedKeyVariant::Toggle(_) => SlotState::Toggle(toggle::State::new()),
                AdvancedKeyVariant::Macro(_) => SlotState::Macro(macro_engine::State::new()),
            };
        }
    }

    /// OR across every Tap-Hold slot's undecided state (§4.3.1 "A Tap-Hold
    /// slot is 'undecided' iff `stage == TAP`"), used by the layout engine's
    /// pending-event gate.
    pub fn has_undecided(&self) -> bool {
        self.slots
            .iter()
            .any(|s| matches!(s, SlotState::TapHold(st) if st.is_undecided()))
    }

    /// §4.3.3 "While any sub-binding is active, Rapid Trigger is disabled
    /// for this key."
    pub fn disables_rapid_trigger(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(SlotState::Dks(st)) if st.disables_rapid_trigger())
    }

    /// Press dispatch for one slot (§4.3.1-§4.3.4, §4.3.6 "on trigger").
    #[allow(clippy::too_many_arguments)]
    pub fn press<const NH: usize>(
        &mut self,
        slot: usize,
        cfg: &AdvancedKey,
        key: u8,
        now: u32,
        distance: u8,
        last_non_modifier_key_time: u32,
        hid: &mut impl HidSink,
        deferred: &mut DeferredActionQueue<NH>,
    ) {
        match (self.slots.get_mut(slot), &cfg.variant) {
            (Some(SlotState::TapHold(st)), AdvancedKeyVariant::TapHold(c)) => {
                tap_hold::press(st, c, now, last_non_modifier_key_time, deferred, key);
            }
            (Some(SlotState::Toggle(st)), AdvancedKeyVariant::Toggle(c)) => {
                toggle::press(st, c, now, hid, key);
            }
            (Some(SlotState::Dks(st)), AdvancedKeyVariant::DynamicKeystroke(c)) => {
                dks::press(st, c, distance, hid, deferred, key);
            }
            (Some(SlotState::NullBind(st)), AdvancedKeyVariant::NullBind(c)) => {
                let side = if key == cfg.key { 0 } else { 1 };
                null_bind::update(st, c, side, true, distance, hid, [cfg.key, c.secondary_key]);
            }
            (Some(SlotState::Macro(st)), AdvancedKeyVariant::Macro(_)) => {
                macro_engine::trigger(st);
            }
            _ => {
                log::error!("advanced-key press on out-of-range or mismatched slot {}", slot);
            }
        }
    }

    /// Release dispatch for one slot (§4.3.1-§4.3.4).
    #[allow(clippy::too_many_arguments)]
    pub fn release<const NH: usize>(
        &mut self,
        slot: usize,
        cfg: &AdvancedKey,
        key: u8,
        now: u32,
        distance: u8,
        hid: &mut impl HidSink,
        deferred: &mut DeferredActionQueue<NH>,
    ) {
        match (self.slots.get_mut(slot), &cfg.variant) {
            (Some(SlotState::TapHold(st)), AdvancedKeyVariant::TapHold(c)) => match st.stage.0 {
                tap_hold::Stage::Pending => tap_hold::release_from_tap(st, c, now, deferred, key),
                tap_hold::Stage::Hold => tap_hold::release_from_hold(st, c, hid, deferred, key),
                tap_hold::Stage::Tapped => tap_hold::release_from_tapped(st),
                tap_hold::Stage::None => {}
            },
            (Some(SlotState::Toggle(st)), AdvancedKeyVariant::Toggle(c)) => {
                toggle::release(st, c, hid, key);
            }
            (Some(SlotState::Dks(st)), AdvancedKeyVariant::DynamicKeystroke(c)) => {
                dks::release(st, c, hid, deferred, key);
            }
            (Some(SlotState::NullBind(st)), AdvancedKeyVariant::NullBind(c)) => {
                let side = if key == cfg.key { 0 } else { 1 };
                null_bind::update(st, c, side, false, distance, hid, [cfg.key, c.secondary_key]);
            }
            _ => {
                log::error!("advanced-key release on out-of-range or mismatched slot {}", slot);
            }
        }
    }

    /// Mid-hold distance sample for a key that is continuously pressed.
    /// Dynamic Keystroke uses this for its bottom-out crossing detection
    /// (§4.3.3); Null Bind re-runs its resolution so `NbBehavior::Distance`
    /// keeps tracking "whichever has greater distance" for the whole
    /// duration both sides are held, not just at the press/release edges
    /// (§4.3.4).
    pub fn on_distance<const NH: usize>(
        &mut self,
        slot: usize,
        cfg: &AdvancedKey,
        key: u8,
        distance: u8,
        hid: &mut impl HidSink,
        deferred: &mut DeferredActionQueue<NH>,
    ) {
        match (self.slots.get_mut(slot), &cfg.variant) {
            (Some(SlotState::Dks(st)), AdvancedKeyVariant::DynamicKeystroke(c)) => {
                dks::on_distance(st, c, distance, hid, deferred, cfg.key);
            }
            (Some(SlotState::NullBind(st)), AdvancedKeyVariant::NullBind(c)) => {
                let side = if key == cfg.key { 0 } else { 1 };
                null_bind::update(st, c, side, true, distance, hid, [cfg.key, c.secondary_key]);
            }
            _ => {}
        }
    }

    /// Every non-slot key event observed while any Tap-Hold is undecided,
    /// for the Balanced/permissive-hold/hold-on-other-key-press conditions
    /// (§4.3.1).
    pub fn notify_other_key_event(&mut self, pressed: bool) {
        for slot in self.slots.iter_mut() {
            if let SlotState::TapHold(st) = slot {
                tap_hold::notify_other_event(st, pressed);
            }
        }
    }

    /// Ticks every slot with time-based behavior (§4.3.1 tick,
    /// §4.3.2 tick, §4.3.6 "execution is driver-ticked").
    pub fn tick<const NH: usize, const NUM_MACROS: usize>(
        &mut self,
        configs: &[AdvancedKey; NUM_ADVANCED_KEYS],
        macros: &[MacroDef; NUM_MACROS],
        now: u32,
        hid: &mut impl HidSink,
        deferred: &mut DeferredActionQueue<NH>,
    ) {
        for (slot, cfg) in self.slots.iter_mut().zip(configs.iter()) {
            match (slot, &cfg.variant) {
                (SlotState::TapHold(st), AdvancedKeyVariant::TapHold(c)) => {
                    tap_hold::tick(st, c, now, hid, cfg.key);
                }
                (SlotState::Toggle(st), AdvancedKeyVariant::Toggle(c)) => {
                    toggle::tick(st, c, now, cfg.key);
                }
                (SlotState::Macro(st), AdvancedKeyVariant::Macro(mb)) => {
                    if let Some(def) = macros.get(mb.macro_index as usize) {
                        macro_engine::tick(st, def, now, deferred, hid, cfg.key);
                    } else {
                        log::error!("macro slot references out-of-range macro {}", mb.macro_index);
                    }
                }
                _ => {}
            }
        }
    }
}
