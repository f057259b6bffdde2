// Copyright 2021-2026 Jacob Alexander
// Copyright 2021-2026 Zion Koyl
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Tap-Hold (§4.3.1).
//!
//! The tagged phase and per-flavor resolution rules follow the shape of the
//! pack's `keyrx_core` tap-hold module (`TapHoldPhase`/`TapHoldConfig`), but
//! the phase set and transition predicates are this spec's richer variant:
//! four flavors, `permissive_hold`, `hold_on_other_key_press`,
//! `retro_tapping`, `quick_tap_ms` and `require_prior_idle_ms`.

use he_config::{TapHoldConfig, TapHoldFlavor};
use he_deferred_action::{DeferredActionQueue, HidSink};

#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum Stage {
    None,
    /// Undecided: tap vs hold (§3 "stage == TAP").
    Pending,
    Hold,
    /// Resolved as a tap via quick-tap or prior-idle bypass; the physical
    /// key is still down but the HID effect already completed, so the
    /// matching physical release is a no-op.
    Tapped,
}

#[derive(Copy, Clone, Debug, Default, defmt::Format)]
pub struct State {
    pub stage: StageStorage,
    since: u32,
    interrupted: bool,
    other_pressed: bool,
    other_released: bool,
    has_last_tap: bool,
    last_tap_time: u32,
}

/// `Stage` wrapped so `State` can derive `Default`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct StageStorage(pub Stage);

impl Default for StageStorage {
    fn default() -> Self {
        StageStorage(Stage::None)
    }
}

impl State {
    pub const fn new() -> State {
        State {
            stage: StageStorage(Stage::None),
            since: 0,
            interrupted: false,
            other_pressed: false,
            other_released: false,
            has_last_tap: false,
            last_tap_time: 0,
        }
    }

    pub fn is_undecided(&self) -> bool {
        self.stage.0 == Stage::Pending
    }

    fn reset_interrupt_tracking(&mut self) {
        self.interrupted = false;
        self.other_pressed = false;
        self.other_released = false;
    }
}

/// Press on a Tap-Hold slot (§4.3.1 "Press").
pub fn press<const N: usize>(
    state: &mut State,
    cfg: &TapHoldConfig,
    now: u32,
    last_non_modifier_key_time: u32,
    deferred: &mut DeferredActionQueue<N>,
    key: u8,
) {
    state.since = now;
    state.reset_interrupt_tracking();

    if cfg.require_prior_idle_ms > 0
        && now.wrapping_sub(last_non_modifier_key_time) < cfg.require_prior_idle_ms as u32
    {
        resolve_tap(state, cfg, now, deferred, key);
        log::debug!("tap-hold[{}] bypass: prior idle not met, resolved TAP", key);
        return;
    }
    if cfg.quick_tap_ms > 0
        && state.has_last_tap
        && now.wrapping_sub(state.last_tap_time) < cfg.quick_tap_ms as u32
    {
        resolve_tap(state, cfg, now, deferred, key);
        log::debug!("tap-hold[{}] bypass: quick tap repeat, resolved TAP", key);
        return;
    }

    state.stage = StageStorage(Stage::Pending);
}

fn resolve_tap<const N: usize>(
    state: &mut State,
    cfg: &TapHoldConfig,
    now: u32,
    deferred: &mut DeferredActionQueue<N>,
    key: u8,
) {
    state.stage = StageStorage(Stage::Tapped);
    state.has_last_tap = true;
    state.last_tap_time = now;
    let _ = deferred.push_tap(key, cfg.tap_keycode);
}

/// Any non-slot key event observed while this slot is `Pending`, used by
/// the Balanced/permissive-hold/hold-on-other-key-press conditions.
pub fn notify_other_event(state: &mut State, pressed: bool) {
    if state.stage.0 != Stage::Pending {
        return;
    }
    if pressed {
        state.other_pressed = true;
        state.interrupted = true;
    } else if state.other_pressed {
        state.other_released = true;
    }
}

/// Tick a Pending slot; returns `true` if it resolved to HOLD this call.
pub fn tick<const N: usize>(
    state: &mut State,
    cfg: &TapHoldConfig,
    now: u32,
    hid: &mut impl HidSink,
    key: u8,
) -> bool {
    if state.stage.0 != Stage::Pending {
        return false;
    }
    let elapsed = now.wrapping_sub(state.since);
    let term_elapsed = cfg.tapping_term_ms == 0 || elapsed >= cfg.tapping_term_ms as u32;

    let resolve_hold = match cfg.flavor {
        TapHoldFlavor::HoldPreferred => term_elapsed,
        TapHoldFlavor::Balanced => state.other_pressed && state.other_released,
        TapHoldFlavor::TapPreferred => term_elapsed && !state.interrupted,
        TapHoldFlavor::TapUnlessInterrupted => state.other_pressed || term_elapsed,
    } || (cfg.hold_on_other_key_press && state.other_pressed)
        || (cfg.permissive_hold && state.other_released);

    if resolve_hold {
        hid.register(key, cfg.hold_keycode);
        state.stage = StageStorage(Stage::Hold);
        log::debug!("tap-hold[{}] resolved HOLD", key);
        true
    } else {
        false
    }
}

/// Release while the slot is `Pending` (§4.3.1 "Release from TAP").
pub fn release_from_tap<const N: usize>(
    state: &mut State,
    cfg: &TapHoldConfig,
    now: u32,
    deferred: &mut DeferredActionQueue<N>,
    key: u8,
) {
    if deferred.push_tap(key, cfg.tap_keycode) {
        state.has_last_tap = true;
        state.last_tap_time = now;
    }
    state.stage = StageStorage(Stage::None);
}

/// Release while the slot is `Hold` (§4.3.1 "Release from HOLD").
///
/// When `retro_tapping` is set and no other key was pressed while this slot
/// was held, the hold is retroactively converted into a tap instead of a
/// plain unregister (§4.3.1 "If `retro_tapping` and held... without
/// interruption, still register the tap").
pub fn release_from_hold<const N: usize>(
    state: &mut State,
    cfg: &TapHoldConfig,
    hid: &mut impl HidSink,
    deferred: &mut DeferredActionQueue<N>,
    key: u8,
) {
    hid.unregister(key, cfg.hold_keycode);
    if cfg.retro_tapping && !state.other_pressed {
        let _ = deferred.push_tap(key, cfg.tap_keycode);
        log::debug!("tap-hold[{}] retro-tap: substituting tap for hold release", key);
    }
    state.stage = StageStorage(Stage::None);
}

/// Release while the slot is `Tapped` (bypassed): the virtual tap already
/// completed at press time, so this is a no-op.
pub fn release_from_tapped(state: &mut State) {
    state.stage = StageStorage(Stage::None);
}
