// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The command id table (§6 "Commands 0-14 ... Commands 128-141 ...").

/// A raw-HID configuration command. `#[repr(u8)]` and matched exhaustively
/// by [`crate::CommandInterface::dispatch`] rather than looked up in a
/// runtime table, since the command set is closed and known at compile
/// time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum CommandId {
    Version = 0,
    Reboot = 1,
    Bootloader = 2,
    FactoryReset = 3,
    Recalibrate = 4,
    AnalogInfo = 5,
    CalibrationGet = 6,
    CalibrationSet = 7,
    ProfileGet = 8,
    OptionsGet = 9,
    OptionsSet = 10,
    ProfileReset = 11,
    ProfileDuplicate = 12,
    Metadata = 13,
    Serial = 14,

    KeymapGet = 128,
    KeymapSet = 129,
    ActuationMapGet = 130,
    ActuationMapSet = 131,
    AdvancedKeysGet = 132,
    AdvancedKeysSet = 133,
    TickRateGet = 134,
    TickRateSet = 135,
    GamepadButtonsGet = 136,
    GamepadButtonsSet = 137,
    GamepadOptionsGet = 138,
    GamepadOptionsSet = 139,
    MacrosGet = 140,
    MacrosSet = 141,
}

impl CommandId {
    /// Human-readable name for logging, mirroring the `other_examples`
    /// MonsGeek/Akko `cmd::name()` lookup used for protocol tracing.
    pub const fn name(self) -> &'static str {
        use CommandId::*;
        match self {
            Version => "VERSION",
            Reboot => "REBOOT",
            Bootloader => "BOOTLOADER",
            FactoryReset => "FACTORY_RESET",
            Recalibrate => "RECALIBRATE",
            AnalogInfo => "ANALOG_INFO",
            CalibrationGet => "CALIBRATION_GET",
            CalibrationSet => "CALIBRATION_SET",
            ProfileGet => "PROFILE_GET",
            OptionsGet => "OPTIONS_GET",
            OptionsSet => "OPTIONS_SET",
            ProfileReset => "PROFILE_RESET",
            ProfileDuplicate => "PROFILE_DUPLICATE",
            Metadata => "METADATA",
            Serial => "SERIAL",
            KeymapGet => "KEYMAP_GET",
            KeymapSet => "KEYMAP_SET",
            ActuationMapGet => "ACTUATION_MAP_GET",
            ActuationMapSet => "ACTUATION_MAP_SET",
            AdvancedKeysGet => "ADVANCED_KEYS_GET",
            AdvancedKeysSet => "ADVANCED_KEYS_SET",
            TickRateGet => "TICK_RATE_GET",
            TickRateSet => "TICK_RATE_SET",
            GamepadButtonsGet => "GAMEPAD_BUTTONS_GET",
            GamepadButtonsSet => "GAMEPAD_BUTTONS_SET",
            GamepadOptionsGet => "GAMEPAD_OPTIONS_GET",
            GamepadOptionsSet => "GAMEPAD_OPTIONS_SET",
            MacrosGet => "MACROS_GET",
            MacrosSet => "MACROS_SET",
        }
    }
}

impl TryFrom<u8> for CommandId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        use CommandId::*;
        Ok(match value {
            0 => Version,
            1 => Reboot,
            2 => Bootloader,
            3 => FactoryReset,
            4 => Recalibrate,
            5 => AnalogInfo,
            6 => CalibrationGet,
            7 => CalibrationSet,
            8 => ProfileGet,
            9 => OptionsGet,
            10 => OptionsSet,
            11 => ProfileReset,
            12 => ProfileDuplicate,
            13 => Metadata,
            14 => Serial,
            128 => KeymapGet,
            129 => KeymapSet,
            130 => ActuationMapGet,
            131 => ActuationMapSet,
            132 => AdvancedKeysGet,
            133 => AdvancedKeysSet,
            134 => TickRateGet,
            135 => TickRateSet,
            136 => GamepadButtonsGet,
            137 => GamepadButtonsSet,
            138 => GamepadOptionsGet,
            139 => GamepadOptionsSet,
            140 => MacrosGet,
            141 => MacrosSet,
            _ => return Err(value),
        })
    }
}
