/* Copyright (C) 2021 by Jacob Alexander */

//! Bridges [`he_protocol::ConfigHost`] to live [`Core`] state.
//!
//! `ConfigHost`'s methods take no collaborator parameters, unlike
//! `Core::tick`'s borrowed-in style, so a board cannot reach its
//! [`super::BoardControl`] through an argument the way the tick loop does.
//! [`ConfigHostAdapter`] borrows `Core` and a `BoardControl` together for
//! the lifetime of one command dispatch instead, the way `kiibohd-hid-io`'s
//! `CommandInterface` owns its callback target for the call. Persistence is
//! deliberately unreachable here: every write only sets `Core::persist_dirty`;
//! the glue driver calls `Core::flush_persistence` on its own schedule (see
//! DESIGN.md "deferred persistence").

use core::fmt::Write as _;

use he_config::{GamepadOptions, Options, Profile};
use he_protocol::{ConfigHost, Section};
use pkg_version::*;

use super::{wire, BoardControl, Core};

/// Copies as much of `src[offset..]` into `out` as fits, returning the
/// count written. Returns 0 for an out-of-range offset rather than
/// failing the whole command (§7 "out-of-range key: silently ignored",
/// extended to paged reads).
fn copy_chunk(src: &[u8], offset: u16, out: &mut [u8]) -> u8 {
    let start = offset as usize;
    if start >= src.len() {
        return 0;
    }
    let len = (src.len() - start).min(out.len()).min(u8::MAX as usize);
    out[..len].copy_from_slice(&src[start..start + len]);
    len as u8
}

/// Wraps one [`Core`] and one [`BoardControl`] for the span of a single
/// [`he_protocol::CommandInterface::process`] call.
pub struct ConfigHostAdapter<
    'a,
    const NUM_LAYERS: usize,
    const NUM_KEYS: usize,
    const NUM_ADVANCED_KEYS: usize,
    const NUM_PROFILES: usize,
    const NUM_MACROS: usize,
    const NUM_DEFERRED: usize,
    B,
> {
    pub core: &'a mut Core<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS, NUM_PROFILES, NUM_MACROS, NUM_DEFERRED>,
    pub board: &'a mut B,
}

impl<
        'a,
        const NUM_LAYERS: usize,
        const NUM_KEYS: usize,
        const NUM_ADVANCED_KEYS: usize,
        const NUM_PROFILES: usize,
        const NUM_MACROS: usize,
        const NUM_DEFERRED: usize,
        B,
    >
    ConfigHostAdapter<'a, NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS, NUM_PROFILES, NUM_MACROS, NUM_DEFERRED, B>
{
    /// Re-syncs the advanced-key engine and layout's `advanced_key_indices`
    /// from the active profile (§3 `ActiveProfile` invariant: every write
    /// that can affect layers or advanced keys must be followed by
    /// `advanced_key.clear()` + `layout.load_advanced_keys()`).
    fn reload_active_profile(&mut self) {
        let idx = self.core.active_profile_index();
        self.core.advanced.clear();
        self.core.advanced.load(&self.core.image.profiles[idx].advanced_keys);
        self.core.layout.load_advanced_keys(&self.core.image.profiles[idx]);
    }
}

impl<
        'a,
        const NUM_LAYERS: usize,
        const NUM_KEYS: usize,
        const NUM_ADVANCED_KEYS: usize,
        const NUM_PROFILES: usize,
        const NUM_MACROS: usize,
        const NUM_DEFERRED: usize,
        B: BoardControl,
    > ConfigHost
    for ConfigHostAdapter<'a, NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS, NUM_PROFILES, NUM_MACROS, NUM_DEFERRED, B>
{
    fn firmware_version(&self) -> (u16, u16, u16) {
        (
            pkg_version_major!(),
            pkg_version_minor!(),
            pkg_version_patch!(),
        )
    }

    fn reboot(&mut self) {
        self.board.board_reboot();
    }

    fn enter_bootloader(&mut self) {
        self.board.board_enter_bootloader();
    }

    /// Re-boots `Core` from a fresh default image, the same path
    /// `Core::boot` takes at power-on.
    fn factory_reset(&mut self) {
        *self.core = Core::boot(he_config::Image::default());
        self.core.persist_dirty = true;
    }

    fn recalibrate(&mut self, reset_bottom_out: bool) {
        let now = self.core.last_tick_ms;
        self.core.matrix.recalibrate(reset_bottom_out, now);
        if reset_bottom_out {
            self.core.persist_dirty = true;
        }
    }

    fn analog_info(&self, key: u8) -> Option<u16> {
        if (key as usize) < NUM_KEYS {
            Some(self.core.matrix.key(key as usize).adc_filtered)
        } else {
            None
        }
    }

    fn calibration_get(&self, key: u8) -> Option<(u16, u16)> {
        if (key as usize) < NUM_KEYS {
            let state = self.core.matrix.key(key as usize);
            Some((state.adc_rest_value, state.adc_bottom_out_value))
        } else {
            None
        }
    }

    fn calibration_set(&mut self, key: u8, rest: u16, bottom_out: u16) -> bool {
        let now = self.core.last_tick_ms;
        let ok = self.core.matrix.set_calibration(key as usize, rest, bottom_out, now);
        if ok {
            self.core.persist_dirty = true;
        }
        ok
    }

    fn current_profile(&self) -> u8 {
        self.core.image.current_profile
    }

    fn options_get(&self) -> Options {
        self.core.image.options
    }

    fn options_set(&mut self, options: Options) {
        self.core.image.options = options;
        self.core.persist_dirty = true;
    }

    fn profile_reset(&mut self, profile: u8) -> bool {
        if profile as usize >= NUM_PROFILES {
            return false;
        }
        self.core.image.profiles[profile as usize] = Profile::default();
        if profile == self.core.image.current_profile {
            self.reload_active_profile();
        }
        self.core.persist_dirty = true;
        true
    }

    fn profile_duplicate(&mut self, src_profile: u8, dst_profile: u8) -> bool {
        if src_profile as usize >= NUM_PROFILES || dst_profile as usize >= NUM_PROFILES {
            return false;
        }
        self.core.image.profiles[dst_profile as usize] =
            self.core.image.profiles[src_profile as usize].clone();
        if dst_profile == self.core.image.current_profile {
            self.reload_active_profile();
        }
        self.core.persist_dirty = true;
        true
    }

    /// Chunks a small JSON blob describing the compiled board shape (§6
    /// "metadata (JSON chunked)"). There is no richer device-metadata
    /// collaborator in scope, so this is generated from the const generics
    /// and crate version rather than left unimplemented (see DESIGN.md).
    fn metadata_chunk(&self, offset: u16, out: &mut [u8]) -> u8 {
        let mut buf: heapless::String<160> = heapless::String::new();
        let _ = write!(
            buf,
            "{{\"layers\":{},\"keys\":{},\"advanced_keys\":{},\"profiles\":{},\"macros\":{},\"version\":\"{}.{}.{}\"}}",
            NUM_LAYERS,
            NUM_KEYS,
            NUM_ADVANCED_KEYS,
            NUM_PROFILES,
            NUM_MACROS,
            pkg_version_major!(),
            pkg_version_minor!(),
            pkg_version_patch!(),
        );
        copy_chunk(buf.as_bytes(), offset, out)
    }

    /// No serial-number collaborator is in scope; every call reports an
    /// empty string rather than failing the command (see DESIGN.md).
    fn serial_number(&self, _out: &mut [u8]) -> u8 {
        0
    }

    fn tick_rate_get(&self) -> u16 {
        self.core.image.tick_rate
    }

    fn tick_rate_set(&mut self, tick_rate_ms: u16) {
        self.core.image.tick_rate = tick_rate_ms;
        self.core.persist_dirty = true;
    }

    fn gamepad_options_get(&self) -> GamepadOptions {
        let idx = self.core.active_profile_index();
        self.core.image.profiles[idx].gamepad_options
    }

    fn gamepad_options_set(&mut self, options: GamepadOptions) {
        let idx = self.core.active_profile_index();
        self.core.image.profiles[idx].gamepad_options = options;
        self.core.persist_dirty = true;
    }

    fn read_page(&self, section: Section, offset: u16, out: &mut [u8]) -> u8 {
        let idx = self.core.active_profile_index();
        let encoded = match section {
            Section::Keymap { layer } => wire::encode_keymap_layer(&self.core.image.profiles[idx], layer),
            Section::ActuationMap => wire::encode_actuation_map(&self.core.image.profiles[idx]),
            Section::AdvancedKeys => wire::encode_advanced_keys(&self.core.image.profiles[idx]),
            Section::GamepadButtons => wire::encode_gamepad_buttons(&self.core.image.profiles[idx]),
            Section::Macros => wire::encode_macros(&self.core.image.macros),
        };
        copy_chunk(&encoded, offset, out)
    }

    fn write_page(&mut self, section: Section, offset: u16, data: &[u8]) -> bool {
        let idx = self.core.active_profile_index();
        let mut encoded = match section {
            Section::Keymap { layer } => wire::encode_keymap_layer(&self.core.image.profiles[idx], layer),
            Section::ActuationMap => wire::encode_actuation_map(&self.core.image.profiles[idx]),
            Section::AdvancedKeys => wire::encode_advanced_keys(&self.core.image.profiles[idx]),
            Section::GamepadButtons => wire::encode_gamepad_buttons(&self.core.image.profiles[idx]),
            Section::Macros => wire::encode_macros(&self.core.image.macros),
        };

        let start = offset as usize;
        let end = match start.checked_add(data.len()) {
            Some(end) if end <= encoded.len() => end,
            _ => return false,
        };
        encoded[start..end].copy_from_slice(data);

        match section {
            Section::Keymap { layer } => {
                wire::decode_keymap_layer(&mut self.core.image.profiles[idx], layer, &encoded)
            }
            Section::ActuationMap => wire::decode_actuation_map(&mut self.core.image.profiles[idx], &encoded),
            Section::AdvancedKeys => wire::decode_advanced_keys(&mut self.core.image.profiles[idx], &encoded),
            Section::GamepadButtons => {
                wire::decode_gamepad_buttons(&mut self.core.image.profiles[idx], &encoded)
            }
            Section::Macros => wire::decode_macros(&mut self.core.image.macros, &encoded),
        }

        if matches!(section, Section::AdvancedKeys) {
            self.reload_active_profile();
        }
        self.core.persist_dirty = true;
        true
    }
}
