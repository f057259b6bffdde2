// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Toggle (§4.3.2).

use he_config::ToggleConfig;
use he_deferred_action::HidSink;

#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum Stage {
    None,
    Toggle,
    Normal,
}

#[derive(Copy, Clone, Debug, defmt::Format)]
pub struct State {
    pub stage: Stage,
    since: u32,
    pub is_toggled: bool,
}

impl Default for State {
    fn default() -> Self {
        State {
            stage: Stage::None,
            since: 0,
            is_toggled: false,
        }
    }
}

impl State {
    pub const fn new() -> State {
        State {
            stage: Stage::None,
            since: 0,
            is_toggled: false,
        }
    }
}

/// Press (§4.3.2 "On press"): register, flip `is_toggled`.
pub fn press(state: &mut State, cfg: &ToggleConfig, now: u32, hid: &mut impl HidSink, key: u8) {
    hid.register(key, cfg.keycode);
    state.is_toggled = !state.is_toggled;
    if state.is_toggled {
        state.stage = Stage::Toggle;
        state.since = now;
    }
    log::debug!("toggle[{}] press, is_toggled={}", key, state.is_toggled);
}

/// Release (§4.3.2 "On release"): unregister only if this wasn't a toggle-on.
pub fn release(state: &mut State, cfg: &ToggleConfig, hid: &mut impl HidSink, key: u8) {
    if !state.is_toggled {
        hid.unregister(key, cfg.keycode);
    }
}

/// Tick (§4.3.2 "On tick"): force back to momentary once the toggle window
/// elapses. Does not itself unregister — if the physical key is still held,
/// the key stays registered until a real release event reaches
/// [`release`], which now sees `is_toggled == false` and unregisters as a
/// plain momentary key (§4.3.2 "held keys revert to momentary").
pub fn tick(state: &mut State, cfg: &ToggleConfig, now: u32, key: u8) {
    if state.stage != Stage::Toggle {
        return;
    }
    if now.wrapping_sub(state.since) >= cfg.tapping_term_ms as u32 {
        state.stage = Stage::Normal;
        state.is_toggled = false;
        log::debug!("toggle[{}] reverted to momentary after term elapsed", key);
    }
}
