// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Macro playback (§4.3.6).

use he_config::{Keycode, MacroAction, MacroDef};
use he_deferred_action::{DeferredActionQueue, HidSink};
use he_hid::Keyboard;

fn keycode_of(raw: u8) -> Keycode {
    Keycode::standard(Keyboard::from(raw))
}

#[derive(Copy, Clone, Debug, Default, defmt::Format)]
pub struct State {
    is_playing: bool,
    event_index: u16,
    delay_until: u32,
    waiting_on_delay: bool,
}

impl State {
    pub const fn new() -> State {
        State {
            is_playing: false,
            event_index: 0,
            delay_until: 0,
            waiting_on_delay: false,
        }
    }
}

/// Trigger a macro (§4.3.6 "on trigger, `{event_index <- 0, is_playing <-
/// true}`"). Re-triggering an already-playing macro restarts it.
pub fn trigger(state: &mut State) {
    state.is_playing = true;
    state.event_index = 0;
    state.waiting_on_delay = false;
}

/// Execute actions until a DELAY, END, or the event cap is hit (§4.3.6).
pub fn tick<const N: usize>(
    state: &mut State,
    def: &MacroDef,
    now: u32,
    deferred: &mut DeferredActionQueue<N>,
    hid: &mut impl HidSink,
    key: u8,
) {
    if !state.is_playing {
        return;
    }
    if state.waiting_on_delay {
        // `now - delay_until` (mod 2^32) stays huge while the deadline is
        // still ahead and only drops below half the ring once it passes
        // (§9 "Timer wrap").
        if now.wrapping_sub(state.delay_until) >= u32::MAX / 2 {
            return;
        }
        state.waiting_on_delay = false;
    }

    while (state.event_index as usize) < he_config::MAX_MACRO_EVENTS {
        let event = def.event(state.event_index as usize);
        match event.action {
            MacroAction::End => {
                state.is_playing = false;
                return;
            }
            MacroAction::Press => {
                hid.register(key, keycode_of(event.keycode));
                state.event_index += 1;
            }
            MacroAction::Release => {
                hid.unregister(key, keycode_of(event.keycode));
                state.event_index += 1;
            }
            MacroAction::Tap => {
                let _ = deferred.push_tap(key, keycode_of(event.keycode));
                state.event_index += 1;
            }
            MacroAction::Delay => {
                state.delay_until = now.wrapping_add(event.keycode as u32 * 10);
                state.waiting_on_delay = true;
                state.event_index += 1;
                return;
            }
        }
    }
    // Ran out of the compile-time event cap without an explicit END.
    state.is_playing = false;
    log::warn!("macro[{}] hit MAX_MACRO_EVENTS without an END action", key);
}

pub fn is_playing(state: &State) -> bool {
    state.is_playing
}
