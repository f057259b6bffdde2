// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::*;

#[test]
fn combo_advanced_keys_do_not_index_into_layout() {
    let ak = AdvancedKey {
        layer: 0,
        key: 1,
        variant: AdvancedKeyVariant::Combo(ComboConfig {
            keys: [1, 2, 0, 0],
            num_keys: 2,
            term_ms: 0,
            output_keycode: Keycode::NONE,
        }),
    };
    assert!(!ak.indexes_into_layout());
}

#[test]
fn tap_hold_advanced_key_indexes_into_layout() {
    let ak = AdvancedKey {
        layer: 0,
        key: 5,
        variant: AdvancedKeyVariant::TapHold(TapHoldConfig {
            tap_keycode: Keycode::NONE,
            hold_keycode: Keycode::NONE,
            tapping_term_ms: 200,
            flavor: TapHoldFlavor::HoldPreferred,
            retro_tapping: false,
            hold_on_other_key_press: false,
            permissive_hold: false,
            quick_tap_ms: 0,
            require_prior_idle_ms: 0,
            double_tap_keycode: Keycode::NONE,
        }),
    };
    assert!(ak.indexes_into_layout());
}

#[test]
fn null_bind_exposes_secondary_key() {
    let ak = AdvancedKey {
        layer: 0,
        key: 3,
        variant: AdvancedKeyVariant::NullBind(NullBindConfig {
            secondary_key: 4,
            keycodes: [Keycode::NONE, Keycode::NONE],
            behavior: NbBehavior::Neutral,
            bottom_out_point: 0,
        }),
    };
    assert_eq!(ak.secondary_key(), Some(4));
}

#[test]
fn combo_effective_term_falls_back_to_default() {
    let combo = ComboConfig {
        keys: [0, 1, 0, 0],
        num_keys: 2,
        term_ms: 0,
        output_keycode: Keycode::NONE,
    };
    assert_eq!(combo.effective_term_ms(), DEFAULT_COMBO_TERM_MS);
}

#[test]
fn dks_action_bitmap_decodes_all_four_slots() {
    // Press=Tap(3), BottomOut=Press(1), ReleaseFromBottomOut=Hold(0), Release=Release(2).
    let bitmap = 0b10_00_01_11u8;
    let sub = DksSubBinding {
        keycode: Keycode::NONE,
        action_bitmap: bitmap,
    };
    assert_eq!(sub.action_for(DksEvent::Press), DksAction::Tap);
    assert_eq!(sub.action_for(DksEvent::BottomOut), DksAction::Press);
    assert_eq!(sub.action_for(DksEvent::ReleaseFromBottomOut), DksAction::Hold);
    assert_eq!(sub.action_for(DksEvent::Release), DksAction::Release);
}
