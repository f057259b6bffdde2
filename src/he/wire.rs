/* Copyright (C) 2021 by Jacob Alexander */

//! Byte encoding for the persistent image and for HID configuration pages.
//!
//! Two distinct techniques, matched to how each is actually used:
//!
//! - The full [`he_config::persist::Image`] is encoded *streaming*, straight
//!   to the [`super::PersistentStore`] collaborator in small chunks, since a
//!   boot load or a persistence flush always touches the whole image
//!   sequentially and never needs to read it back mid-write.
//! - A single [`he_protocol::Section`] is encoded into a bounded scratch
//!   buffer, spliced at the write offset, and decoded back into the live
//!   profile — one technique for every section instead of bespoke
//!   byte-range logic per section kind (keymap, actuation map, advanced
//!   keys, gamepad buttons, macros all share it).

use he_config::{
    AdvancedKey, AdvancedKeyVariant, ComboConfig, DksConfig, DksSubBinding, GamepadOptions,
    MacroAction, MacroDef, MacroEvent, NbBehavior, NullBindConfig, Options, Profile,
    TapHoldConfig, TapHoldFlavor, ToggleConfig, MAX_MACRO_EVENTS,
};
use he_hid::{GamepadButton, Keycode};
use he_matrix::Actuation;
use heapless::Vec;

/// Upper bound on a single paged HID-configuration section's encoded size.
///
/// Sized for the largest section a typical Hall-effect board configures in
/// one page (one keymap layer, the full actuation map, or the advanced-key
/// table). A board with very large `NUM_KEYS`/`NUM_ADVANCED_KEYS` must raise
/// this (see DESIGN.md).
pub const MAX_SECTION_BYTES: usize = 2048;

/// Wire size of one `AdvancedKey` record: `layer(1) + key(1) + tag(1) +
/// payload(16)`. 16 is `TapHoldConfig`'s encoded size, the largest variant.
const ADVANCED_KEY_WIRE_LEN: usize = 19;
const ADVANCED_KEY_PAYLOAD_LEN: usize = 16;

/// Wire size of one `MacroDef`: `MAX_MACRO_EVENTS` events at 2 bytes each,
/// padded with `MacroAction::End` past the stored event count.
const MACRO_DEF_WIRE_LEN: usize = MAX_MACRO_EVENTS * 2;

fn push_u16(out: &mut Vec<u8, MAX_SECTION_BYTES>, value: u16) {
    let _ = out.extend_from_slice(&value.to_le_bytes());
}

fn read_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn push_keycode(out: &mut Vec<u8, MAX_SECTION_BYTES>, kc: Keycode) {
    push_u16(out, kc.0);
}

fn read_keycode(bytes: &[u8]) -> Keycode {
    Keycode(read_u16(bytes))
}

/// `GamepadButton` discriminants are contiguous (0..=17) but a wire byte is
/// untrusted input; out-of-range values fall back to `None` rather than
/// transmuting (§7 "out-of-range ... silently ignored" extended to the wire).
fn gamepad_button_from_u8(byte: u8) -> GamepadButton {
    use GamepadButton::*;
    const TABLE: [GamepadButton; 18] = [
        None, A, B, X, Y, LeftShoulder, RightShoulder, LeftThumb, RightThumb, Back, Start, Guide,
        DpadUp, DpadDown, DpadLeft, DpadRight, LeftTrigger, RightTrigger,
    ];
    TABLE.get(byte as usize).copied().unwrap_or(GamepadButton::None)
}

fn push_actuation(out: &mut Vec<u8, MAX_SECTION_BYTES>, a: Actuation) {
    let _ = out.push(a.actuation_point);
    let _ = out.push(a.rt_down);
    let _ = out.push(a.rt_up);
    let _ = out.push(a.continuous as u8);
}

fn read_actuation(bytes: &[u8]) -> Actuation {
    Actuation {
        actuation_point: bytes[0],
        rt_down: bytes[1],
        rt_up: bytes[2],
        continuous: bytes[3] != 0,
    }
}

fn push_advanced_key<const N: usize>(out: &mut Vec<u8, N>, ak: &AdvancedKey) {
    let _ = out.push(ak.layer);
    let _ = out.push(ak.key);
    let mut payload = [0u8; ADVANCED_KEY_PAYLOAD_LEN];
    let tag = match ak.variant {
        AdvancedKeyVariant::None => 0u8,
        AdvancedKeyVariant::NullBind(cfg) => {
            payload[0] = cfg.secondary_key;
            payload[1..3].copy_from_slice(&cfg.keycodes[0].0.to_le_bytes());
            payload[3..5].copy_from_slice(&cfg.keycodes[1].0.to_le_bytes());
            payload[5] = nb_behavior_to_u8(cfg.behavior);
            payload[6] = cfg.bottom_out_point;
            1
        }
        AdvancedKeyVariant::DynamicKeystroke(cfg) => {
            for (i, sub) in cfg.sub_bindings.iter().enumerate() {
                let base = i * 3;
                payload[base..base + 2].copy_from_slice(&sub.keycode.0.to_le_bytes());
                payload[base + 2] = sub.action_bitmap;
            }
            payload[12] = cfg.bottom_out_point;
            2
        }
        AdvancedKeyVariant::TapHold(cfg) => {
            payload[0..2].copy_from_slice(&cfg.tap_keycode.0.to_le_bytes());
            payload[2..4].copy_from_slice(&cfg.hold_keycode.0.to_le_bytes());
            payload[4..6].copy_from_slice(&cfg.tapping_term_ms.to_le_bytes());
            payload[6] = tap_hold_flavor_to_u8(cfg.flavor);
            payload[7] = cfg.retro_tapping as u8;
            payload[8] = cfg.hold_on_other_key_press as u8;
            payload[9] = cfg.permissive_hold as u8;
            payload[10..12].copy_from_slice(&cfg.quick_tap_ms.to_le_bytes());
            payload[12..14].copy_from_slice(&cfg.require_prior_idle_ms.to_le_bytes());
            payload[14..16].copy_from_slice(&cfg.double_tap_keycode.0.to_le_bytes());
            3
        }
        AdvancedKeyVariant::Toggle(cfg) => {
            payload[0..2].copy_from_slice(&cfg.keycode.0.to_le_bytes());
            payload[2..4].copy_from_slice(&cfg.tapping_term_ms.to_le_bytes());
            4
        }
        AdvancedKeyVariant::Combo(cfg) => {
            payload[0..4].copy_from_slice(&cfg.keys);
            payload[4] = cfg.num_keys;
            payload[5..7].copy_from_slice(&cfg.term_ms.to_le_bytes());
            payload[7..9].copy_from_slice(&cfg.output_keycode.0.to_le_bytes());
            5
        }
        AdvancedKeyVariant::Macro(mb) => {
            payload[0] = mb.macro_index;
            6
        }
    };
    let _ = out.push(tag);
    let _ = out.extend_from_slice(&payload);
}

fn nb_behavior_to_u8(b: NbBehavior) -> u8 {
    match b {
        NbBehavior::Distance => 0,
        NbBehavior::Last => 1,
        NbBehavior::Primary => 2,
        NbBehavior::Secondary => 3,
        NbBehavior::Neutral => 4,
    }
}

fn nb_behavior_from_u8(byte: u8) -> NbBehavior {
    match byte {
        1 => NbBehavior::Last,
        2 => NbBehavior::Primary,
        3 => NbBehavior::Secondary,
        4 => NbBehavior::Neutral,
        _ => NbBehavior::Distance,
    }
}

fn tap_hold_flavor_to_u8(f: TapHoldFlavor) -> u8 {
    match f {
        TapHoldFlavor::HoldPreferred => 0,
        TapHoldFlavor::Balanced => 1,
        TapHoldFlavor::TapPreferred => 2,
        TapHoldFlavor::TapUnlessInterrupted => 3,
    }
}

fn tap_hold_flavor_from_u8(byte: u8) -> TapHoldFlavor {
    match byte {
        1 => TapHoldFlavor::Balanced,
        2 => TapHoldFlavor::TapPreferred,
        3 => TapHoldFlavor::TapUnlessInterrupted,
        _ => TapHoldFlavor::HoldPreferred,
    }
}

fn read_advanced_key(bytes: &[u8]) -> AdvancedKey {
    let layer = bytes[0];
    let key = bytes[1];
    let tag = bytes[2];
    let payload = &bytes[3..3 + ADVANCED_KEY_PAYLOAD_LEN];
    let variant = match tag {
        1 => AdvancedKeyVariant::NullBind(NullBindConfig {
            secondary_key: payload[0],
            keycodes: [read_keycode(&payload[1..3]), read_keycode(&payload[3..5])],
            behavior: nb_behavior_from_u8(payload[5]),
            bottom_out_point: payload[6],
        }),
        2 => {
            let sub_bindings = core::array::from_fn(|i| {
                let base = i * 3;
                DksSubBinding {
                    keycode: read_keycode(&payload[base..base + 2]),
                    action_bitmap: payload[base + 2],
                }
            });
            AdvancedKeyVariant::DynamicKeystroke(DksConfig {
                sub_bindings,
                bottom_out_point: payload[12],
            })
        }
        3 => AdvancedKeyVariant::TapHold(TapHoldConfig {
            tap_keycode: read_keycode(&payload[0..2]),
            hold_keycode: read_keycode(&payload[2..4]),
            tapping_term_ms: read_u16(&payload[4..6]),
            flavor: tap_hold_flavor_from_u8(payload[6]),
            retro_tapping: payload[7] != 0,
            hold_on_other_key_press: payload[8] != 0,
            permissive_hold: payload[9] != 0,
            quick_tap_ms: read_u16(&payload[10..12]),
            require_prior_idle_ms: read_u16(&payload[12..14]),
            double_tap_keycode: read_keycode(&payload[14..16]),
        }),
        4 => AdvancedKeyVariant::Toggle(ToggleConfig {
            keycode: read_keycode(&payload[0..2]),
            tapping_term_ms: read_u16(&payload[2..4]),
        }),
        5 => {
            let mut keys = [0u8; 4];
            keys.copy_from_slice(&payload[0..4]);
            AdvancedKeyVariant::Combo(ComboConfig {
                keys,
                num_keys: payload[4],
                term_ms: read_u16(&payload[5..7]),
                output_keycode: read_keycode(&payload[7..9]),
            })
        }
        6 => AdvancedKeyVariant::Macro(he_config::MacroBinding {
            macro_index: payload[0],
        }),
        _ => AdvancedKeyVariant::None,
    };
    AdvancedKey { layer, key, variant }
}

fn push_macro_def<const N: usize>(out: &mut Vec<u8, N>, def: &MacroDef) {
    for i in 0..MAX_MACRO_EVENTS {
        let event = def.event(i);
        let _ = out.push(macro_action_to_u8(event.action));
        let _ = out.push(event.keycode);
    }
}

fn macro_action_to_u8(a: MacroAction) -> u8 {
    match a {
        MacroAction::End => 0,
        MacroAction::Tap => 1,
        MacroAction::Press => 2,
        MacroAction::Release => 3,
        MacroAction::Delay => 4,
    }
}

fn macro_action_from_u8(byte: u8) -> MacroAction {
    match byte {
        1 => MacroAction::Tap,
        2 => MacroAction::Press,
        3 => MacroAction::Release,
        4 => MacroAction::Delay,
        _ => MacroAction::End,
    }
}

fn read_macro_def(bytes: &[u8]) -> MacroDef {
    let mut def = MacroDef::default();
    for i in 0..MAX_MACRO_EVENTS {
        let action = macro_action_from_u8(bytes[i * 2]);
        if action == MacroAction::End {
            break;
        }
        let keycode = bytes[i * 2 + 1];
        if def.events.push(MacroEvent { action, keycode }).is_err() {
            break;
        }
    }
    def
}

/// Encodes one keymap layer (§6 `Section::Keymap { layer }`).
pub fn encode_keymap_layer<const NL: usize, const NK: usize, const NA: usize>(
    profile: &Profile<NL, NK, NA>,
    layer: u8,
) -> Vec<u8, MAX_SECTION_BYTES> {
    let mut out = Vec::new();
    if (layer as usize) < NL {
        for key in 0..NK {
            push_keycode(&mut out, profile.keymap[layer as usize][key]);
        }
    }
    out
}

pub fn decode_keymap_layer<const NL: usize, const NK: usize, const NA: usize>(
    profile: &mut Profile<NL, NK, NA>,
    layer: u8,
    bytes: &[u8],
) {
    if (layer as usize) >= NL {
        return;
    }
    for key in 0..NK {
        if bytes.len() >= (key + 1) * 2 {
            profile.keymap[layer as usize][key] = read_keycode(&bytes[key * 2..key * 2 + 2]);
        }
    }
}

pub fn encode_actuation_map<const NL: usize, const NK: usize, const NA: usize>(
    profile: &Profile<NL, NK, NA>,
) -> Vec<u8, MAX_SECTION_BYTES> {
    let mut out = Vec::new();
    for key in 0..NK {
        push_actuation(&mut out, profile.actuation_map[key]);
    }
    out
}

pub fn decode_actuation_map<const NL: usize, const NK: usize, const NA: usize>(
    profile: &mut Profile<NL, NK, NA>,
    bytes: &[u8],
) {
    for key in 0..NK {
        if bytes.len() >= (key + 1) * 4 {
            profile.actuation_map[key] = read_actuation(&bytes[key * 4..key * 4 + 4]);
        }
    }
}

pub fn encode_advanced_keys<const NL: usize, const NK: usize, const NA: usize>(
    profile: &Profile<NL, NK, NA>,
) -> Vec<u8, MAX_SECTION_BYTES> {
    let mut out = Vec::new();
    for ak in profile.advanced_keys.iter() {
        push_advanced_key(&mut out, ak);
    }
    out
}

pub fn decode_advanced_keys<const NL: usize, const NK: usize, const NA: usize>(
    profile: &mut Profile<NL, NK, NA>,
    bytes: &[u8],
) {
    for slot in 0..NA {
        let start = slot * ADVANCED_KEY_WIRE_LEN;
        if bytes.len() >= start + ADVANCED_KEY_WIRE_LEN {
            profile.advanced_keys[slot] = read_advanced_key(&bytes[start..start + ADVANCED_KEY_WIRE_LEN]);
        }
    }
}

pub fn encode_gamepad_buttons<const NL: usize, const NK: usize, const NA: usize>(
    profile: &Profile<NL, NK, NA>,
) -> Vec<u8, MAX_SECTION_BYTES> {
    let mut out = Vec::new();
    for button in profile.gamepad_buttons.iter() {
        let _ = out.push(*button as u8);
    }
    out
}

pub fn decode_gamepad_buttons<const NL: usize, const NK: usize, const NA: usize>(
    profile: &mut Profile<NL, NK, NA>,
    bytes: &[u8],
) {
    for key in 0..NK {
        if let Some(&byte) = bytes.get(key) {
            profile.gamepad_buttons[key] = gamepad_button_from_u8(byte);
        }
    }
}

pub fn encode_macros<const NM: usize>(macros: &[MacroDef; NM]) -> Vec<u8, MAX_SECTION_BYTES> {
    let mut out = Vec::new();
    for def in macros.iter() {
        push_macro_def(&mut out, def);
    }
    out
}

pub fn decode_macros<const NM: usize>(macros: &mut [MacroDef; NM], bytes: &[u8]) {
    for slot in 0..NM {
        let start = slot * MACRO_DEF_WIRE_LEN;
        if bytes.len() >= start + MACRO_DEF_WIRE_LEN {
            macros[slot] = read_macro_def(&bytes[start..start + MACRO_DEF_WIRE_LEN]);
        }
    }
}

/// Streaming destination for the full persistent image, one small chunk at a
/// time, so encoding never needs a buffer the size of the whole image.
pub trait ByteSink {
    /// `true` on success; `false` aborts the remaining encode (the caller
    /// must not consider the image persisted).
    fn write(&mut self, bytes: &[u8]) -> bool;
}

fn write_all(sink: &mut impl ByteSink, bytes: &[u8]) -> bool {
    sink.write(bytes)
}

/// Adapts a [`super::PersistentStore`] to [`ByteSink`], one
/// `wear_leveling_write` call per chunk — real EEPROM/flash wear-levelling
/// writes a page at a time, unlike the single bulk read a boot load does
/// (see [`MAX_IMAGE_SCRATCH`]).
pub struct StoreWriter<'a, S> {
    pub store: &'a mut S,
}

impl<'a, S: super::PersistentStore> ByteSink for StoreWriter<'a, S> {
    fn write(&mut self, bytes: &[u8]) -> bool {
        self.store.wear_leveling_write(bytes)
    }
}

/// Upper bound on the whole persistent image's encoded size, used only for
/// the single bulk read at boot (see `Core::boot_from_store`). A board with
/// large `NUM_KEYS`/`NUM_LAYERS`/`NUM_PROFILES`/`NUM_MACROS` must raise this
/// (see DESIGN.md).
pub const MAX_IMAGE_SCRATCH: usize = 16_384;

/// Encodes the whole persistent image (§6 "Persistent layout") in field
/// order, streaming each piece out through `sink` rather than building one
/// monolithic buffer.
pub fn encode_image<
    const NL: usize,
    const NK: usize,
    const NA: usize,
    const NP: usize,
    const NM: usize,
>(
    image: &he_config::Image<NL, NK, NA, NP, NM>,
    sink: &mut impl ByteSink,
) -> bool {
    let mut ok = write_all(sink, &image.initial_rest_value.to_le_bytes());
    ok &= write_all(sink, &image.initial_bottom_out_threshold.to_le_bytes());
    ok &= write_all(sink, &[encode_options(image.options)]);
    for &threshold in image.bottom_out_threshold.iter() {
        ok &= write_all(sink, &threshold.to_le_bytes());
    }
    ok &= write_all(sink, &[image.current_profile, image.last_non_default_profile]);
    for profile in image.profiles.iter() {
        ok &= encode_profile_streaming(profile, sink);
    }
    for def in image.macros.iter() {
        let mut buf: Vec<u8, MACRO_DEF_WIRE_LEN> = Vec::new();
        push_macro_def(&mut buf, def);
        ok &= write_all(sink, &buf);
    }
    ok &= write_all(sink, &image.tick_rate.to_le_bytes());
    ok
}

fn encode_profile_streaming<const NL: usize, const NK: usize, const NA: usize>(
    profile: &Profile<NL, NK, NA>,
    sink: &mut impl ByteSink,
) -> bool {
    let mut ok = true;
    for layer in 0..NL {
        for key in 0..NK {
            ok &= write_all(sink, &profile.keymap[layer][key].0.to_le_bytes());
        }
    }
    for key in 0..NK {
        let a = profile.actuation_map[key];
        ok &= write_all(sink, &[a.actuation_point, a.rt_down, a.rt_up, a.continuous as u8]);
    }
    for ak in profile.advanced_keys.iter() {
        let mut buf: Vec<u8, ADVANCED_KEY_WIRE_LEN> = Vec::new();
        push_advanced_key(&mut buf, ak);
        ok &= write_all(sink, &buf);
    }
    for button in profile.gamepad_buttons.iter() {
        ok &= write_all(sink, &[*button as u8]);
    }
    ok &= write_all(sink, &[profile.gamepad_options.override_keyboard as u8, profile.default_layer]);
    ok
}

/// Mirrors `he_protocol`'s private `encode_options`/`decode_options`
/// bitmap, since that pair isn't exported and the persistent image needs
/// the identical layout.
pub fn encode_options(options: Options) -> u8 {
    (options.xinput_enabled as u8)
        | ((options.keyboard_enabled as u8) << 1)
        | ((options.save_bottom_out_threshold as u8) << 2)
}

pub fn decode_options(byte: u8) -> Options {
    Options {
        xinput_enabled: byte & 0b001 != 0,
        keyboard_enabled: byte & 0b010 != 0,
        save_bottom_out_threshold: byte & 0b100 != 0,
    }
}

pub fn encode_gamepad_options(options: GamepadOptions) -> u8 {
    options.override_keyboard as u8
}

/// Reads the whole persistent image back from a linear byte source (boot
/// load). `src` must yield at least as many bytes as `encode_image` would
/// produce for the same const generics; short reads leave the remaining
/// fields at their `Default` value.
/// Linear reader over a byte slice; `take` never panics on a short buffer,
/// returning fewer bytes (or none) instead, so a truncated image decodes as
/// far as it can rather than panicking.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> &'a [u8] {
        let start = self.pos.min(self.bytes.len());
        let end = (self.pos + len).min(self.bytes.len());
        self.pos += len;
        &self.bytes[start..end]
    }
}

pub fn decode_image<
    const NL: usize,
    const NK: usize,
    const NA: usize,
    const NP: usize,
    const NM: usize,
>(
    bytes: &[u8],
) -> he_config::Image<NL, NK, NA, NP, NM> {
    let mut image = he_config::Image::default();
    let mut cursor = Cursor { bytes, pos: 0 };

    let chunk = cursor.take(2);
    if chunk.len() == 2 {
        image.initial_rest_value = read_u16(chunk);
    }
    let chunk = cursor.take(2);
    if chunk.len() == 2 {
        image.initial_bottom_out_threshold = read_u16(chunk);
    }
    let chunk = cursor.take(1);
    if let Some(&byte) = chunk.first() {
        image.options = decode_options(byte);
    }
    for threshold in image.bottom_out_threshold.iter_mut() {
        let chunk = cursor.take(2);
        if chunk.len() == 2 {
            *threshold = read_u16(chunk);
        }
    }
    let chunk = cursor.take(2);
    if chunk.len() == 2 {
        image.current_profile = chunk[0];
        image.last_non_default_profile = chunk[1];
    }
    for profile in image.profiles.iter_mut() {
        decode_profile_streaming(profile, &mut cursor);
    }
    for def in image.macros.iter_mut() {
        let chunk = cursor.take(MACRO_DEF_WIRE_LEN);
        if chunk.len() == MACRO_DEF_WIRE_LEN {
            *def = read_macro_def(chunk);
        }
    }
    let chunk = cursor.take(2);
    if chunk.len() == 2 {
        image.tick_rate = read_u16(chunk);
    }
    image
}

fn decode_profile_streaming<const NL: usize, const NK: usize, const NA: usize>(
    profile: &mut Profile<NL, NK, NA>,
    cursor: &mut Cursor,
) {
    for layer in 0..NL {
        for key in 0..NK {
            let chunk = cursor.take(2);
            if chunk.len() == 2 {
                profile.keymap[layer][key] = read_keycode(chunk);
            }
        }
    }
    for key in 0..NK {
        let chunk = cursor.take(4);
        if chunk.len() == 4 {
            profile.actuation_map[key] = read_actuation(chunk);
        }
    }
    for ak in profile.advanced_keys.iter_mut() {
        let chunk = cursor.take(ADVANCED_KEY_WIRE_LEN);
        if chunk.len() == ADVANCED_KEY_WIRE_LEN {
            *ak = read_advanced_key(chunk);
        }
    }
    for button in profile.gamepad_buttons.iter_mut() {
        let chunk = cursor.take(1);
        if let Some(&byte) = chunk.first() {
            *button = gamepad_button_from_u8(byte);
        }
    }
    let chunk = cursor.take(2);
    if chunk.len() == 2 {
        profile.gamepad_options.override_keyboard = chunk[0] != 0;
        profile.default_layer = chunk[1];
    }
}
