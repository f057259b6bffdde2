// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Dynamic Keystroke (§4.3.3).
//!
//! Four independent sub-bindings share one distance-derived event stream:
//! a press/release of the physical key plus a crossing of `bottom_out_point`
//! remapped into `{PRESS, BOTTOM_OUT, RELEASE_FROM_BOTTOM_OUT, RELEASE}`.

use he_config::{DksAction, DksConfig, DksEvent};
use he_deferred_action::{DeferredActionQueue, HidSink};

#[derive(Copy, Clone, Debug, Default, defmt::Format)]
pub struct State {
    is_bottomed_out: bool,
    is_pressed: bool,
    /// Which sub-bindings are currently in a register-holding state, so
    /// `HOLD` can no-op and `RELEASE` only unregisters what was actually
    /// registered.
    active: [bool; 4],
}

impl State {
    pub const fn new() -> State {
        State {
            is_bottomed_out: false,
            is_pressed: false,
            active: [false; 4],
        }
    }

    /// Whether this slot currently disables Rapid Trigger for its key
    /// (§4.3.3 "While any sub-binding is active, Rapid Trigger is disabled
    /// for this key").
    pub fn disables_rapid_trigger(&self) -> bool {
        self.active.iter().any(|&a| a)
    }
}

fn apply<const N: usize>(
    state: &mut State,
    sub: usize,
    action: DksAction,
    keycode: he_config::Keycode,
    hid: &mut impl HidSink,
    deferred: &mut DeferredActionQueue<N>,
    key: u8,
) {
    match action {
        DksAction::Hold => {}
        DksAction::Press => {
            hid.register(key, keycode);
            state.active[sub] = true;
        }
        DksAction::Release => {
            if state.active[sub] {
                hid.unregister(key, keycode);
                state.active[sub] = false;
            }
        }
        DksAction::Tap => {
            let _ = deferred.push_tap(key, keycode);
        }
    }
}

fn dispatch<const N: usize>(
    state: &mut State,
    cfg: &DksConfig,
    event: DksEvent,
    hid: &mut impl HidSink,
    deferred: &mut DeferredActionQueue<N>,
    key: u8,
) {
    for (i, sub) in cfg.sub_bindings.iter().enumerate() {
        let action = sub.action_for(event);
        apply(state, i, action, sub.keycode, hid, deferred, key);
    }
}

/// Press event (§4.3.3): remapped to `PRESS`, or `BOTTOM_OUT` if the key's
/// travel is already past `bottom_out_point` at the moment of the press.
pub fn press<const N: usize>(
    state: &mut State,
    cfg: &DksConfig,
    distance: u8,
    hid: &mut impl HidSink,
    deferred: &mut DeferredActionQueue<N>,
    key: u8,
) {
    state.is_pressed = true;
    let event = if cfg.bottom_out_point > 0 && distance >= cfg.bottom_out_point {
        state.is_bottomed_out = true;
        DksEvent::BottomOut
    } else {
        DksEvent::Press
    };
    dispatch(state, cfg, event, hid, deferred, key);
}

/// Release event (§4.3.3): always takes priority over a pending
/// release-from-bottom-out.
pub fn release<const N: usize>(
    state: &mut State,
    cfg: &DksConfig,
    hid: &mut impl HidSink,
    deferred: &mut DeferredActionQueue<N>,
    key: u8,
) {
    state.is_pressed = false;
    state.is_bottomed_out = false;
    dispatch(state, cfg, DksEvent::Release, hid, deferred, key);
}

/// Distance update while the key is held, used to detect bottom-out
/// crossings between the press and release edges.
pub fn on_distance<const N: usize>(
    state: &mut State,
    cfg: &DksConfig,
    distance: u8,
    hid: &mut impl HidSink,
    deferred: &mut DeferredActionQueue<N>,
    key: u8,
) {
    if !state.is_pressed || cfg.bottom_out_point == 0 {
        return;
    }
    let bottomed = distance >= cfg.bottom_out_point;
    if bottomed && !state.is_bottomed_out {
        state.is_bottomed_out = true;
        dispatch(state, cfg, DksEvent::BottomOut, hid, deferred, key);
    } else if !bottomed && state.is_bottomed_out {
        state.is_bottomed_out = false;
        dispatch(state, cfg, DksEvent::ReleaseFromBottomOut, hid, deferred, key);
    }
}
