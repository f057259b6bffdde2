// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Null Bind / SOCD resolution (§4.3.4).

use he_config::{NbBehavior, NullBindConfig};
use he_deferred_action::HidSink;

#[derive(Copy, Clone, Debug, Default, defmt::Format)]
pub struct State {
    is_pressed: [bool; 2],
    distance: [u8; 2],
    registered: [bool; 2],
    last_event_side: u8,
}

impl State {
    pub const fn new() -> State {
        State {
            is_pressed: [false; 2],
            distance: [0, 0],
            registered: [false, false],
            last_event_side: 0,
        }
    }
}

/// `side`: 0 for the primary key (the slot's common `key` field), 1 for
/// `secondary_key`. `keys`: `[primary_key, secondary_key]`, used only to
/// identify the physical origin of each register/unregister call.
pub fn update(
    state: &mut State,
    cfg: &NullBindConfig,
    side: u8,
    pressed: bool,
    distance: u8,
    hid: &mut impl HidSink,
    keys: [u8; 2],
) {
    let idx = side as usize;
    state.is_pressed[idx] = pressed;
    state.distance[idx] = distance;
    if pressed {
        state.last_event_side = side;
    }

    let want: [bool; 2] = if state.is_pressed[0] && state.is_pressed[1] {
        if cfg.bottom_out_point > 0
            && state.distance[0] >= cfg.bottom_out_point
            && state.distance[1] >= cfg.bottom_out_point
        {
            [true, true]
        } else {
            match cfg.behavior {
                NbBehavior::Distance => {
                    if state.distance[0] == state.distance[1] {
                        [state.last_event_side == 0, state.last_event_side == 1]
                    } else {
                        [
                            state.distance[0] > state.distance[1],
                            state.distance[1] > state.distance[0],
                        ]
                    }
                }
                NbBehavior::Last => [state.last_event_side == 0, state.last_event_side == 1],
                NbBehavior::Primary => [true, false],
                NbBehavior::Secondary => [false, true],
                NbBehavior::Neutral => [false, false],
            }
        }
    } else {
        [state.is_pressed[0], state.is_pressed[1]]
    };

    for i in 0..2 {
        if want[i] && !state.registered[i] {
            hid.register(keys[i], cfg.keycodes[i]);
            state.registered[i] = true;
        } else if !want[i] && state.registered[i] {
            hid.unregister(keys[i], cfg.keycodes[i]);
            state.registered[i] = false;
        }
    }
}
