// Copyright 2021-2026 Jacob Alexander
// Copyright 2021-2026 Zion Koyl
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The Rapid Trigger direction state machine (§4.1).
//!
//! Kept separate from [`crate::Matrix::scan`] so the seven transition rules
//! can be read, tested and reasoned about on their own, the way
//! `kiibohd-hall-effect` separates `SenseAnalysis` from the raw sample loop.

use crate::state::{Actuation, KeyDir, KeyState};

/// Whether this call produced a rising edge of `is_pressed`, used by the
/// matrix engine's same-scan press-ordering pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct EdgeResult {
    pub rose: bool,
    pub fell: bool,
}

/// Advances one key's Rapid Trigger state machine by a single new `distance`
/// sample. Mirrors §4.1 "Rapid Trigger state machine" verbatim.
pub fn advance(state: &mut KeyState, actuation: &Actuation, distance: u8, now: u32) -> EdgeResult {
    let mut rose = false;
    let mut fell = false;

    let a = actuation.actuation_point;
    let reset_point = actuation.reset_point();
    let rt_enabled = actuation.rapid_trigger_enabled() && !state.rt_disabled;

    state.distance = distance;

    match state.key_dir {
        KeyDir::Inactive => {
            if distance > a {
                state.key_dir = KeyDir::Down;
                state.extremum = distance;
                if !state.is_pressed {
                    state.is_pressed = true;
                    rose = true;
                }
            }
        }
        KeyDir::Down => {
            if distance <= reset_point {
                state.key_dir = KeyDir::Inactive;
                if state.is_pressed {
                    state.is_pressed = false;
                    fell = true;
                }
            } else if rt_enabled
                && distance + actuation.rt_up_effective() < state.extremum
            {
                state.key_dir = KeyDir::Up;
                state.extremum = distance;
                if state.is_pressed {
                    state.is_pressed = false;
                    fell = true;
                }
            } else if distance > state.extremum {
                state.extremum = distance;
            }
        }
        KeyDir::Up => {
            if distance <= reset_point {
                state.key_dir = KeyDir::Inactive;
                if state.is_pressed {
                    state.is_pressed = false;
                    fell = true;
                }
            } else if rt_enabled && distance > state.extremum + actuation.rt_down {
                state.key_dir = KeyDir::Down;
                state.extremum = distance;
                if !state.is_pressed {
                    state.is_pressed = true;
                    rose = true;
                }
            } else if distance < state.extremum {
                state.extremum = distance;
            }
        }
    }

    if rose {
        state.event_time = now;
    } else if fell {
        state.event_time = now;
    }

    EdgeResult { rose, fell }
}
