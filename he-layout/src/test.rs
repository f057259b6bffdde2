// Copyright 2021-2026 Jacob Alexander
// Copyright 2021-2026 Zion Koyl
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#![cfg(test)]

use super::*;
use flexi_logger::Logger;
use he_config::{AdvancedKey, AdvancedKeyVariant, ComboConfig, MacroDef, TapHoldConfig, TapHoldFlavor};
use he_hid::Keyboard;
use he_matrix::{Actuation, MatrixOptions};
use std::vec::Vec as StdVec;

enum LogError {
    CouldNotStartLogger,
}

fn setup_logging_lite() -> Result<(), LogError> {
    match Logger::with_env_or_str("")
        .format(flexi_logger::colored_default_format)
        .format_for_files(flexi_logger::colored_detailed_format)
        .duplicate_to_stderr(flexi_logger::Duplicate::All)
        .start()
    {
        Err(_) => Err(LogError::CouldNotStartLogger),
        Ok(_) => Ok(()),
    }
}

struct Recorder {
    events: StdVec<(u8, Keycode, bool)>,
}

impl Recorder {
    fn new() -> Recorder {
        Recorder { events: StdVec::new() }
    }

    fn is_registered(&self, key: u8, keycode: Keycode) -> bool {
        let mut state = false;
        for &(k, kc, press) in &self.events {
            if k == key && kc == keycode {
                state = press;
            }
        }
        state
    }
}

impl HidSink for Recorder {
    fn register(&mut self, key: u8, keycode: Keycode) {
        self.events.push((key, keycode, true));
    }
    fn unregister(&mut self, key: u8, keycode: Keycode) {
        self.events.push((key, keycode, false));
    }
}

struct NullXInput;

impl XInputSink for NullXInput {
    fn xinput_button(&mut self, _button: GamepadButton, _pressed: bool) {}
}

struct GamepadRecorder {
    events: StdVec<(GamepadButton, bool)>,
}

impl XInputSink for GamepadRecorder {
    fn xinput_button(&mut self, button: GamepadButton, pressed: bool) {
        self.events.push((button, pressed));
    }
}

const NO_MACROS: [MacroDef; 0] = [];

#[test]
fn transparent_lookup_falls_through_layers() {
    setup_logging_lite().ok();

    let mut profile: Profile<2, 4, 0> = Profile::default();
    profile.keymap[0][2] = Keycode::standard(Keyboard::A);
    let layout: LayoutEngine<2, 4, 0> = LayoutEngine::new(0);

    assert_eq!(layout.get_keycode(&profile, 2), Keycode::standard(Keyboard::A));
}

#[test]
fn momentary_layer_switches_while_held_and_restores_default() {
    setup_logging_lite().ok();

    let mut profile: Profile<2, 4, 0> = Profile::default();
    profile.keymap[0][0] = Keycode::momentary_layer(1);
    let matrix: Matrix<4> = Matrix::new(MatrixOptions::default());
    let mut advanced: AdvancedKeyEngine<0> = AdvancedKeyEngine::new();
    let mut layout: LayoutEngine<2, 4, 0> = LayoutEngine::new(0);
    let mut hid = Recorder::new();
    let mut xinput = NullXInput;
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let options = Options::new();
    let mut outcome = TickOutcome::default();

    assert_eq!(layout.get_current_layer(), 0);
    layout.process_key(0, true, 0, &profile, &options, &matrix, &mut advanced, &mut hid, &mut xinput, &mut deferred, &mut outcome);
    assert_eq!(layout.get_current_layer(), 1);
    layout.process_key(0, false, 10, &profile, &options, &matrix, &mut advanced, &mut hid, &mut xinput, &mut deferred, &mut outcome);
    assert_eq!(layout.get_current_layer(), 0);
}

/// spec.md "Toggling SP_KEY_LOCK twice on a key restores its original
/// enable state."
#[test]
fn key_lock_toggles_and_restores_on_second_press() {
    setup_logging_lite().ok();

    let mut profile: Profile<1, 2, 0> = Profile::default();
    profile.keymap[0][0] = Keycode::SP_KEY_LOCK;
    let matrix: Matrix<2> = Matrix::new(MatrixOptions::default());
    let mut advanced: AdvancedKeyEngine<0> = AdvancedKeyEngine::new();
    let mut layout: LayoutEngine<1, 2, 0> = LayoutEngine::new(0);
    let mut hid = Recorder::new();
    let mut xinput = NullXInput;
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let options = Options::new();
    let mut outcome = TickOutcome::default();

    assert!(!layout.is_key_locked(0));
    layout.process_key(0, true, 0, &profile, &options, &matrix, &mut advanced, &mut hid, &mut xinput, &mut deferred, &mut outcome);
    assert!(layout.is_key_locked(0));
    layout.process_key(0, true, 10, &profile, &options, &matrix, &mut advanced, &mut hid, &mut xinput, &mut deferred, &mut outcome);
    assert!(!layout.is_key_locked(0));
}

#[test]
fn profile_select_keycode_reports_outcome() {
    setup_logging_lite().ok();

    let mut profile: Profile<1, 2, 0> = Profile::default();
    profile.keymap[0][0] = Keycode::profile_select(3);
    let matrix: Matrix<2> = Matrix::new(MatrixOptions::default());
    let mut advanced: AdvancedKeyEngine<0> = AdvancedKeyEngine::new();
    let mut layout: LayoutEngine<1, 2, 0> = LayoutEngine::new(0);
    let mut hid = Recorder::new();
    let mut xinput = NullXInput;
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let options = Options::new();
    let mut outcome = TickOutcome::default();

    layout.process_key(0, true, 0, &profile, &options, &matrix, &mut advanced, &mut hid, &mut xinput, &mut deferred, &mut outcome);
    assert_eq!(outcome.profile_request, Some(ProfileRequest::Select(3)));
}

#[test]
fn sp_boot_keycode_requests_bootloader_only_on_press() {
    setup_logging_lite().ok();

    let mut profile: Profile<1, 2, 0> = Profile::default();
    profile.keymap[0][0] = Keycode::SP_BOOT;
    let matrix: Matrix<2> = Matrix::new(MatrixOptions::default());
    let mut advanced: AdvancedKeyEngine<0> = AdvancedKeyEngine::new();
    let mut layout: LayoutEngine<1, 2, 0> = LayoutEngine::new(0);
    let mut hid = Recorder::new();
    let mut xinput = NullXInput;
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let options = Options::new();

    let mut release_outcome = TickOutcome::default();
    layout.process_key(0, false, 0, &profile, &options, &matrix, &mut advanced, &mut hid, &mut xinput, &mut deferred, &mut release_outcome);
    assert!(!release_outcome.enter_bootloader);

    let mut press_outcome = TickOutcome::default();
    layout.process_key(0, true, 0, &profile, &options, &matrix, &mut advanced, &mut hid, &mut xinput, &mut deferred, &mut press_outcome);
    assert!(press_outcome.enter_bootloader);
}

/// XInput interaction (§4.2): a gamepad-bound key with `override_keyboard`
/// set is not also delivered to the keyboard path.
#[test]
fn gamepad_override_suppresses_keyboard_delivery() {
    setup_logging_lite().ok();

    let mut profile: Profile<1, 2, 0> = Profile::default();
    profile.keymap[0][0] = Keycode::standard(Keyboard::A);
    profile.gamepad_buttons[0] = GamepadButton::A;
    profile.gamepad_options.override_keyboard = true;
    let matrix: Matrix<2> = Matrix::new(MatrixOptions::default());
    let mut advanced: AdvancedKeyEngine<0> = AdvancedKeyEngine::new();
    let mut layout: LayoutEngine<1, 2, 0> = LayoutEngine::new(0);
    let mut hid = Recorder::new();
    let mut xinput = GamepadRecorder { events: StdVec::new() };
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let mut options = Options::new();
    options.xinput_enabled = true;
    let mut outcome = TickOutcome::default();

    layout.process_key(0, true, 0, &profile, &options, &matrix, &mut advanced, &mut hid, &mut xinput, &mut deferred, &mut outcome);

    assert_eq!(xinput.events, StdVec::from([(GamepadButton::A, true)]));
    assert!(!hid.is_registered(0, Keycode::standard(Keyboard::A)));
}

/// Without `override_keyboard`, the same key is delivered to both paths.
#[test]
fn gamepad_button_without_override_still_reaches_keyboard() {
    setup_logging_lite().ok();

    let mut profile: Profile<1, 2, 0> = Profile::default();
    profile.keymap[0][0] = Keycode::standard(Keyboard::A);
    profile.gamepad_buttons[0] = GamepadButton::A;
    let matrix: Matrix<2> = Matrix::new(MatrixOptions::default());
    let mut advanced: AdvancedKeyEngine<0> = AdvancedKeyEngine::new();
    let mut layout: LayoutEngine<1, 2, 0> = LayoutEngine::new(0);
    let mut hid = Recorder::new();
    let mut xinput = GamepadRecorder { events: StdVec::new() };
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let mut options = Options::new();
    options.xinput_enabled = true;
    let mut outcome = TickOutcome::default();

    layout.process_key(0, true, 0, &profile, &options, &matrix, &mut advanced, &mut hid, &mut xinput, &mut deferred, &mut outcome);

    assert_eq!(xinput.events, StdVec::from([(GamepadButton::A, true)]));
    assert!(hid.is_registered(0, Keycode::standard(Keyboard::A)));
}

fn flat_actuation<const N: usize>(point: u8) -> [Actuation; N] {
    [Actuation {
        actuation_point: point,
        rt_down: 0,
        rt_up: 0,
        continuous: false,
    }; N]
}

/// A full `task()` pass: pressing a plain key through a settled `Matrix`
/// registers its keycode via the HID sink.
#[test]
fn task_dispatches_a_plain_key_press_through_the_matrix() {
    setup_logging_lite().ok();

    let mut profile: Profile<1, 1, 0> = Profile::default();
    profile.keymap[0][0] = Keycode::standard(Keyboard::A);
    let actuation = flat_actuation::<1>(40);
    profile.actuation_map = actuation;

    let mut matrix: Matrix<1> = Matrix::new(MatrixOptions::default());
    matrix.init(1000, 2000);
    let mut advanced: AdvancedKeyEngine<0> = AdvancedKeyEngine::new();
    let mut layout: LayoutEngine<1, 1, 0> = LayoutEngine::new(0);
    let mut hid = Recorder::new();
    let mut xinput = NullXInput;
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let options = Options::new();

    let mut now = 0u32;
    for _ in 0..64 {
        matrix.scan(&[2000], &profile.actuation_map, now);
        let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
        now += 1;
    }

    assert!(hid.is_registered(0, Keycode::standard(Keyboard::A)));
}

/// spec.md §8 scenario 5-style combo match, driven through `task()` so the
/// chronological ordering and replay plumbing are exercised end to end.
#[test]
fn task_commits_a_combo_across_two_ticks() {
    setup_logging_lite().ok();

    let mut profile: Profile<1, 2, 1> = Profile::default();
    profile.keymap[0][0] = Keycode::standard(Keyboard::A);
    profile.keymap[0][1] = Keycode::standard(Keyboard::B);
    profile.advanced_keys[0] = AdvancedKey {
        layer: 0,
        key: 0,
        variant: AdvancedKeyVariant::Combo(ComboConfig {
            keys: [0, 1, 0, 0],
            num_keys: 2,
            term_ms: 50,
            output_keycode: Keycode::standard(Keyboard::Esc),
        }),
    };
    let actuation = flat_actuation::<2>(40);
    profile.actuation_map = actuation;

    let mut matrix: Matrix<2> = Matrix::new(MatrixOptions::default());
    matrix.init(1000, 2000);
    let mut advanced: AdvancedKeyEngine<1> = AdvancedKeyEngine::new();
    advanced.load(&profile.advanced_keys);
    let mut layout: LayoutEngine<1, 2, 1> = LayoutEngine::new(0);
    layout.load_advanced_keys(&profile);
    let mut hid = Recorder::new();
    let mut xinput = NullXInput;
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let options = Options::new();

    let mut now = 0u32;
    for _ in 0..40 {
        matrix.scan(&[1000, 1000], &profile.actuation_map, now);
        let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
        now += 1;
    }
    assert!(!hid.is_registered(0, Keycode::standard(Keyboard::A)));
    assert!(!hid.is_registered(1, Keycode::standard(Keyboard::B)));

    // Both keys bottom out within the combo term.
    for _ in 0..64 {
        matrix.scan(&[2000, 2000], &profile.actuation_map, now);
        let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
        now += 1;
    }

    assert!(hid.is_registered(he_config::COMBO_VIRTUAL_KEY, Keycode::standard(Keyboard::Esc)));
}

/// Pressing a non-participating key while the pending buffer holds entries
/// for an undecided Tap-Hold defers it until the engine decides.
#[test]
fn non_hold_tap_press_is_deferred_while_tap_hold_undecided() {
    setup_logging_lite().ok();

    let mut profile: Profile<1, 2, 1> = Profile::default();
    profile.keymap[0][0] = Keycode::TRANSPARENT;
    profile.keymap[0][1] = Keycode::standard(Keyboard::B);
    profile.advanced_keys[0] = AdvancedKey {
        layer: 0,
        key: 0,
        variant: AdvancedKeyVariant::TapHold(TapHoldConfig {
            tap_keycode: Keycode::standard(Keyboard::A),
            hold_keycode: Keycode::standard(Keyboard::LeftShift),
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
    let actuation = flat_actuation::<2>(40);
    profile.actuation_map = actuation;

    let mut matrix: Matrix<2> = Matrix::new(MatrixOptions::default());
    matrix.init(1000, 2000);
    let mut advanced: AdvancedKeyEngine<1> = AdvancedKeyEngine::new();
    advanced.load(&profile.advanced_keys);
    let mut layout: LayoutEngine<1, 2, 1> = LayoutEngine::new(0);
    layout.load_advanced_keys(&profile);
    let mut hid = Recorder::new();
    let mut xinput = NullXInput;
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let options = Options::new();

    let mut now = 0u32;
    // Press key 0 (Tap-Hold) and let it settle into the pressed state.
    for _ in 0..64 {
        matrix.scan(&[2000, 1000], &profile.actuation_map, now);
        let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
        now += 1;
    }
    assert!(advanced.has_undecided());
    assert!(!hid.is_registered(1, Keycode::standard(Keyboard::B)));

    // Press key 1 while still undecided: it must not register yet.
    matrix.scan(&[2000, 2000], &profile.actuation_map, now);
    let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
    now += 1;
    assert!(!hid.is_registered(1, Keycode::standard(Keyboard::B)));

    // Advance past the tapping term: HOLD resolves, then the deferred press
    // of key 1 drains through.
    for _ in 0..200 {
        matrix.scan(&[2000, 2000], &profile.actuation_map, now);
        let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
        now += 1;
    }
    assert!(!advanced.has_undecided());
    assert!(hid.is_registered(1, Keycode::standard(Keyboard::B)));
}

/// spec.md §8 scenario 3: a key pressed then released while a Tap-Hold is
/// still Pending must not leave a dangling HID register/unregister pair —
/// since its press never reached the HID path, its release must not
/// either.
#[test]
fn interrupting_press_release_cancel_while_tap_hold_undecided() {
    setup_logging_lite().ok();

    let mut profile: Profile<1, 2, 1> = Profile::default();
    profile.keymap[0][0] = Keycode::TRANSPARENT;
    profile.keymap[0][1] = Keycode::standard(Keyboard::B);
    profile.advanced_keys[0] = AdvancedKey {
        layer: 0,
        key: 0,
        variant: AdvancedKeyVariant::TapHold(TapHoldConfig {
            tap_keycode: Keycode::standard(Keyboard::A),
            hold_keycode: Keycode::standard(Keyboard::LeftShift),
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
    let actuation = flat_actuation::<2>(40);
    profile.actuation_map = actuation;

    let mut matrix: Matrix<2> = Matrix::new(MatrixOptions::default());
    matrix.init(1000, 2000);
    let mut advanced: AdvancedKeyEngine<1> = AdvancedKeyEngine::new();
    advanced.load(&profile.advanced_keys);
    let mut layout: LayoutEngine<1, 2, 1> = LayoutEngine::new(0);
    layout.load_advanced_keys(&profile);
    let mut hid = Recorder::new();
    let mut xinput = NullXInput;
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let options = Options::new();

    let mut now = 0u32;
    // Press the Tap-Hold key; it settles into Pending immediately.
    matrix.scan(&[2000, 1000], &profile.actuation_map, now);
    let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
    now += 1;
    assert!(advanced.has_undecided());

    // Key 1 presses (staged into the pending buffer), then releases, both
    // while the Tap-Hold is still undecided.
    matrix.scan(&[2000, 2000], &profile.actuation_map, now);
    let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
    now += 1;
    matrix.scan(&[2000, 1000], &profile.actuation_map, now);
    let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
    now += 1;

    // Run out the tapping term so the Tap-Hold resolves to HOLD.
    for _ in 0..200 {
        matrix.scan(&[2000, 1000], &profile.actuation_map, now);
        let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
        now += 1;
    }
    assert!(!advanced.has_undecided());
    assert!(hid.is_registered(0, Keycode::standard(Keyboard::LeftShift)));

    // Key 1's press never reached the HID path, so neither did its release:
    // no register/unregister pair for it at all, and in particular no
    // unregister with no prior register and no dangling unreleased register.
    assert!(hid.events.iter().all(|&(k, _, _)| k != 1));
}

/// spec.md §8 scenario 4: permissive-hold resolves HOLD off the
/// interrupting key's *release*, even though that key's own press/release
/// is cancelled out of the pending buffer rather than reaching the HID
/// path.
#[test]
fn permissive_hold_resolves_on_interrupting_release() {
    setup_logging_lite().ok();

    let mut profile: Profile<1, 2, 1> = Profile::default();
    profile.keymap[0][0] = Keycode::TRANSPARENT;
    profile.keymap[0][1] = Keycode::standard(Keyboard::B);
    profile.advanced_keys[0] = AdvancedKey {
        layer: 0,
        key: 0,
        variant: AdvancedKeyVariant::TapHold(TapHoldConfig {
            tap_keycode: Keycode::standard(Keyboard::A),
            hold_keycode: Keycode::standard(Keyboard::LeftShift),
            tapping_term_ms: 200,
            flavor: TapHoldFlavor::TapPreferred,
            retro_tapping: false,
            hold_on_other_key_press: false,
            permissive_hold: true,
            quick_tap_ms: 0,
            require_prior_idle_ms: 0,
            double_tap_keycode: Keycode::NONE,
        }),
    };
    let actuation = flat_actuation::<2>(40);
    profile.actuation_map = actuation;

    let mut matrix: Matrix<2> = Matrix::new(MatrixOptions::default());
    matrix.init(1000, 2000);
    let mut advanced: AdvancedKeyEngine<1> = AdvancedKeyEngine::new();
    advanced.load(&profile.advanced_keys);
    let mut layout: LayoutEngine<1, 2, 1> = LayoutEngine::new(0);
    layout.load_advanced_keys(&profile);
    let mut hid = Recorder::new();
    let mut xinput = NullXInput;
    let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
    let options = Options::new();

    let mut now = 0u32;
    matrix.scan(&[2000, 1000], &profile.actuation_map, now);
    let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
    now += 1;
    assert!(advanced.has_undecided());

    // Key 1 presses, then releases, well before the 200ms tapping term.
    matrix.scan(&[2000, 2000], &profile.actuation_map, now);
    let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
    now += 1;
    matrix.scan(&[2000, 1000], &profile.actuation_map, now);
    let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
    now += 1;

    // permissive_hold resolves HOLD right on that release, long before the
    // tapping term would otherwise have elapsed.
    assert!(!advanced.has_undecided());
    assert!(hid.is_registered(0, Keycode::standard(Keyboard::LeftShift)));
    assert!(hid.events.iter().all(|&(k, _, _)| k != 1));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// §8 "a combo either consumes every one of its required keys' own
    /// output, or it consumes none of them" and "task() never panics":
    /// driving two keys configured as a combo through a randomized press
    /// gap, with both bottoming out and eventually releasing, must always
    /// leave exactly one of the two outcomes true, never a partial one
    /// (e.g. only one key's standard keycode registers while the combo
    /// also fires).
    #[test]
    fn combo_never_partially_consumes(
        press_gap_ticks in 0u32..80,
        term_ms in 10u16..100,
    ) {
        setup_logging_lite().ok();

        let mut profile: Profile<1, 2, 1> = Profile::default();
        profile.keymap[0][0] = Keycode::standard(Keyboard::A);
        profile.keymap[0][1] = Keycode::standard(Keyboard::B);
        profile.advanced_keys[0] = AdvancedKey {
            layer: 0,
            key: 0,
            variant: AdvancedKeyVariant::Combo(ComboConfig {
                keys: [0, 1, 0, 0],
                num_keys: 2,
                term_ms,
                output_keycode: Keycode::standard(Keyboard::Esc),
            }),
        };
        let actuation = flat_actuation::<2>(40);
        profile.actuation_map = actuation;

        let mut matrix: Matrix<2> = Matrix::new(MatrixOptions::default());
        matrix.init(1000, 2000);
        let mut advanced: AdvancedKeyEngine<1> = AdvancedKeyEngine::new();
        advanced.load(&profile.advanced_keys);
        let mut layout: LayoutEngine<1, 2, 1> = LayoutEngine::new(0);
        layout.load_advanced_keys(&profile);
        let mut hid = Recorder::new();
        let mut xinput = NullXInput;
        let mut deferred: DeferredActionQueue<8> = DeferredActionQueue::new();
        let options = Options::new();

        let mut now = 0u32;
        // Key 0 bottoms out immediately; key 1 follows after the random gap.
        for t in 0..press_gap_ticks {
            let key1_raw = if t == 0 { 1000 } else { 2000 };
            matrix.scan(&[2000, key1_raw], &profile.actuation_map, now);
            let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
            now += 1;
        }
        for _ in 0..64 {
            matrix.scan(&[2000, 2000], &profile.actuation_map, now);
            let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
            now += 1;
        }
        for _ in 0..64 {
            matrix.scan(&[1000, 1000], &profile.actuation_map, now);
            let _ = layout.task(&profile, &options, &matrix, &NO_MACROS, &mut advanced, now, &mut hid, &mut xinput, &mut deferred);
            now += 1;
        }

        let combo_fired = hid.is_registered(he_config::COMBO_VIRTUAL_KEY, Keycode::standard(Keyboard::Esc));
        let a_fired = hid.is_registered(0, Keycode::standard(Keyboard::A));
        let b_fired = hid.is_registered(1, Keycode::standard(Keyboard::B));
        prop_assert!(!(combo_fired && (a_fired || b_fired)));
    }
}
