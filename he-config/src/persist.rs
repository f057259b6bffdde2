// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Global (non-per-profile) persisted state (§6 "Persistent layout").
//!
//! [`Image`] is the record a board's persistent-store collaborator reads at
//! boot and rewrites (wear-levelled) on every configuration change: global
//! calibration, the options bitfield, per-key bottom-out thresholds, the
//! profile table, the macro table and the tick rate, matching the wire
//! layout `kiibohd-hid-io` uses for its own packet buffers — fixed field
//! order, no derived serialization.

/// Global runtime options (§6 "options bitfield").
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, defmt::Format)]
pub struct Options {
    pub xinput_enabled: bool,
    /// When false, every key is dropped from the keyboard HID path
    /// entirely (§4.2 "XInput interaction").
    pub keyboard_enabled: bool,
    pub save_bottom_out_threshold: bool,
}

impl Options {
    pub const fn new() -> Options {
        Options {
            xinput_enabled: false,
            keyboard_enabled: true,
            save_bottom_out_threshold: false,
        }
    }
}

/// Per-key wire/storage packing of actuation + the Rapid-Trigger-disable
/// flag (§15 "Key-mode bit encoding"), mirroring the `other_examples`
/// MonsGeek/Akko `KeyMode::from_u8` single-byte mode packing so the
/// persistent layout doesn't need a whole extra per-key array just to carry
/// one bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct KeyMode(pub u8);

const RAPID_TRIGGER_DISABLE_BIT: u8 = 0b1000_0000;

impl KeyMode {
    pub const fn new(rapid_trigger_disabled: bool) -> KeyMode {
        KeyMode(if rapid_trigger_disabled {
            RAPID_TRIGGER_DISABLE_BIT
        } else {
            0
        })
    }

    pub const fn rapid_trigger_disabled(self) -> bool {
        (self.0 & RAPID_TRIGGER_DISABLE_BIT) != 0
    }

    pub const fn from_u8(byte: u8) -> KeyMode {
        KeyMode(byte)
    }

    pub const fn to_u8(self) -> u8 {
        self.0
    }
}

/// The full persistent EEPROM image (§6 "Persistent layout").
///
/// `#[repr(C)]` fixes the field order so a board's persistent-store
/// collaborator can size and place this record deterministically; unlike
/// `kiibohd-hid-io`'s packet buffers this is never put on the wire a byte
/// at a time, so there is no `#[repr(packed)]` here — nested arrays of
/// [`crate::Profile`] and [`crate::MacroDef`] carry a `heapless::Vec`
/// length field apiece, and packing those would invite unaligned-access UB
/// for no benefit.
#[derive(Clone, Debug, PartialEq, Eq, defmt::Format)]
#[repr(C)]
pub struct Image<
    const NUM_LAYERS: usize,
    const NUM_KEYS: usize,
    const NUM_ADVANCED_KEYS: usize,
    const NUM_PROFILES: usize,
    const NUM_MACROS: usize,
> {
    /// Rest-position ADC reading captured by the last factory/shipped
    /// calibration (§4.1 "Calibration"), seeded into every key's
    /// `rest_value` before the first live calibration window runs.
    pub initial_rest_value: u16,
    /// Bottom-out ADC reading captured the same way.
    pub initial_bottom_out_threshold: u16,
    pub options: Options,
    /// Per-key bottom-out threshold, persisted independently of the
    /// shared `initial_bottom_out_threshold` once a key's own bottom-out
    /// has drifted and `options.save_bottom_out_threshold` is set
    /// (§15 "Bottom-out persistence batching").
    pub bottom_out_threshold: [u16; NUM_KEYS],
    pub current_profile: u8,
    /// The last profile selected before switching to the default
    /// (power-on) profile, restored by `SP_PROFILE_SWAP` (§4.2).
    pub last_non_default_profile: u8,
    pub profiles: [crate::Profile<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS>; NUM_PROFILES],
    pub macros: [crate::MacroDef; NUM_MACROS],
    pub tick_rate: u16,
}

impl<
        const NUM_LAYERS: usize,
        const NUM_KEYS: usize,
        const NUM_ADVANCED_KEYS: usize,
        const NUM_PROFILES: usize,
        const NUM_MACROS: usize,
    > Default for Image<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS, NUM_PROFILES, NUM_MACROS>
{
    fn default() -> Self {
        Image {
            initial_rest_value: 0,
            initial_bottom_out_threshold: 0,
            options: Options::new(),
            bottom_out_threshold: [0; NUM_KEYS],
            current_profile: 0,
            last_non_default_profile: 0,
            profiles: core::array::from_fn(|_| crate::Profile::default()),
            macros: core::array::from_fn(|_| crate::MacroDef::default()),
            tick_rate: 1_000,
        }
    }
}

impl<
        const NUM_LAYERS: usize,
        const NUM_KEYS: usize,
        const NUM_ADVANCED_KEYS: usize,
        const NUM_PROFILES: usize,
        const NUM_MACROS: usize,
    > Image<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS, NUM_PROFILES, NUM_MACROS>
{
    /// The profile that should be active right after a fresh boot: the
    /// last one saved as `current_profile`, clamped into range in case
    /// `NUM_PROFILES` shrank across a firmware update.
    pub fn boot_profile(&self) -> usize {
        (self.current_profile as usize).min(NUM_PROFILES.saturating_sub(1))
    }
}
