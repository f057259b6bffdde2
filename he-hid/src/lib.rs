// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! USB HID keyboard usage ids and the word-sized keymap keycode used by
//! `he-config`/`he-layout` to address standard keys, layers, profiles and
//! special firmware actions from a single 16-bit value.

#![no_std]

mod keycode;

pub use keycode::{Keycode, KeycodeClass};

/// USB HID Keyboard/Keypad usage ids (USB HID Usage Tables 1.12, page 53).
///
/// 0xA5-0xAF, 0xDE-0xDF and 0xE8-0xFF are reserved by the spec and omitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, defmt::Format)]
#[repr(u8)]
pub enum Keyboard {
    NoEvent = 0x00,
    ErrorRollOver = 0x01,
    PostFail = 0x02,
    ErrorUndefined = 0x03,
    A = 0x04,
    B = 0x05,
    C = 0x06,
    D = 0x07,
    E = 0x08,
    F = 0x09,
    G = 0x0A,
    H = 0x0B,
    I = 0x0C,
    J = 0x0D,
    K = 0x0E,
    L = 0x0F,
    M = 0x10,
    N = 0x11,
    O = 0x12,
    P = 0x13,
    Q = 0x14,
    R = 0x15,
    S = 0x16,
    T = 0x17,
    U = 0x18,
    V = 0x19,
    W = 0x1A,
    X = 0x1B,
    Y = 0x1C,
    Z = 0x1D,
    N1 = 0x1E,
    N2 = 0x1F,
    N3 = 0x20,
    N4 = 0x21,
    N5 = 0x22,
    N6 = 0x23,
    N7 = 0x24,
    N8 = 0x25,
    N9 = 0x26,
    N0 = 0x27,
    Enter = 0x28,
    Esc = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    Minus = 0x2D,
    Equal = 0x2E,
    LeftBracket = 0x2F,
    RightBracket = 0x30,
    Backslash = 0x31,
    Semicolon = 0x33,
    Quote = 0x34,
    Backtick = 0x35,
    Comma = 0x36,
    Period = 0x37,
    Slash = 0x38,
    CapsLock = 0x39,
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,
    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    Right = 0x4F,
    Left = 0x50,
    Down = 0x51,
    Up = 0x52,
    NumLock = 0x53,
    KeypadSlash = 0x54,
    KeypadAsterisk = 0x55,
    KeypadMinus = 0x56,
    KeypadPlus = 0x57,
    KeypadEnter = 0x58,
    Keypad1 = 0x59,
    Keypad2 = 0x5A,
    Keypad3 = 0x5B,
    Keypad4 = 0x5C,
    Keypad5 = 0x5D,
    Keypad6 = 0x5E,
    Keypad7 = 0x5F,
    Keypad8 = 0x60,
    Keypad9 = 0x61,
    Keypad0 = 0x62,
    KeypadPeriod = 0x63,
    Application = 0x65,
    Mute = 0x7F,
    VolumeUp = 0x80,
    VolumeDown = 0x81,

    LeftControl = 0xE0,
    LeftShift = 0xE1,
    LeftAlt = 0xE2,
    LeftGui = 0xE3,
    RightControl = 0xE4,
    RightShift = 0xE5,
    RightAlt = 0xE6,
    RightGui = 0xE7,
}

impl Keyboard {
    /// `true` for the eight standard HID modifier usages (0xE0-0xE7), which
    /// the layout/advanced-key engines treat as non-modifier-resetting for
    /// `require_prior_idle_ms` purposes (§4.3.1).
    pub const fn is_modifier(self) -> bool {
        (self as u8) >= (Keyboard::LeftControl as u8)
    }
}

impl From<u8> for Keyboard {
    /// A keymap or macro byte is untrusted input (it can arrive over the raw
    /// HID configuration protocol), and `Keyboard`'s discriminants are not
    /// contiguous, so this is an explicit match rather than a `transmute`.
    /// An unrecognized byte decodes to `ErrorUndefined`, matching §7's
    /// "out-of-range key: silently ignored" handling.
    fn from(value: u8) -> Self {
        match value {
            0x00 => Keyboard::NoEvent,
            0x01 => Keyboard::ErrorRollOver,
            0x02 => Keyboard::PostFail,
            0x04 => Keyboard::A,
            0x05 => Keyboard::B,
            0x06 => Keyboard::C,
            0x07 => Keyboard::D,
            0x08 => Keyboard::E,
            0x09 => Keyboard::F,
            0x0A => Keyboard::G,
            0x0B => Keyboard::H,
            0x0C => Keyboard::I,
            0x0D => Keyboard::J,
            0x0E => Keyboard::K,
            0x0F => Keyboard::L,
            0x10 => Keyboard::M,
            0x11 => Keyboard::N,
            0x12 => Keyboard::O,
            0x13 => Keyboard::P,
            0x14 => Keyboard::Q,
            0x15 => Keyboard::R,
            0x16 => Keyboard::S,
            0x17 => Keyboard::T,
            0x18 => Keyboard::U,
            0x19 => Keyboard::V,
            0x1A => Keyboard::W,
            0x1B => Keyboard::X,
            0x1C => Keyboard::Y,
            0x1D => Keyboard::Z,
            0x1E => Keyboard::N1,
            0x1F => Keyboard::N2,
            0x20 => Keyboard::N3,
            0x21 => Keyboard::N4,
            0x22 => Keyboard::N5,
            0x23 => Keyboard::N6,
            0x24 => Keyboard::N7,
            0x25 => Keyboard::N8,
            0x26 => Keyboard::N9,
            0x27 => Keyboard::N0,
            0x28 => Keyboard::Enter,
            0x29 => Keyboard::Esc,
            0x2A => Keyboard::Backspace,
            0x2B => Keyboard::Tab,
            0x2C => Keyboard::Space,
            0x2D => Keyboard::Minus,
            0x2E => Keyboard::Equal,
            0x2F => Keyboard::LeftBracket,
            0x30 => Keyboard::RightBracket,
            0x31 => Keyboard::Backslash,
            0x33 => Keyboard::Semicolon,
            0x34 => Keyboard::Quote,
            0x35 => Keyboard::Backtick,
            0x36 => Keyboard::Comma,
            0x37 => Keyboard::Period,
            0x38 => Keyboard::Slash,
            0x39 => Keyboard::CapsLock,
            0x3A => Keyboard::F1,
            0x3B => Keyboard::F2,
            0x3C => Keyboard::F3,
            0x3D => Keyboard::F4,
            0x3E => Keyboard::F5,
            0x3F => Keyboard::F6,
            0x40 => Keyboard::F7,
            0x41 => Keyboard::F8,
            0x42 => Keyboard::F9,
            0x43 => Keyboard::F10,
            0x44 => Keyboard::F11,
            0x45 => Keyboard::F12,
            0x46 => Keyboard::PrintScreen,
            0x47 => Keyboard::ScrollLock,
            0x48 => Keyboard::Pause,
            0x49 => Keyboard::Insert,
            0x4A => Keyboard::Home,
            0x4B => Keyboard::PageUp,
            0x4C => Keyboard::Delete,
            0x4D => Keyboard::End,
            0x4E => Keyboard::PageDown,
            0x4F => Keyboard::Right,
            0x50 => Keyboard::Left,
            0x51 => Keyboard::Down,
            0x52 => Keyboard::Up,
            0x53 => Keyboard::NumLock,
            0x54 => Keyboard::KeypadSlash,
            0x55 => Keyboard::KeypadAsterisk,
            0x56 => Keyboard::KeypadMinus,
            0x57 => Keyboard::KeypadPlus,
            0x58 => Keyboard::KeypadEnter,
            0x59 => Keyboard::Keypad1,
            0x5A => Keyboard::Keypad2,
            0x5B => Keyboard::Keypad3,
            0x5C => Keyboard::Keypad4,
            0x5D => Keyboard::Keypad5,
            0x5E => Keyboard::Keypad6,
            0x5F => Keyboard::Keypad7,
            0x60 => Keyboard::Keypad8,
            0x61 => Keyboard::Keypad9,
            0x62 => Keyboard::Keypad0,
            0x63 => Keyboard::KeypadPeriod,
            0x65 => Keyboard::Application,
            0x7F => Keyboard::Mute,
            0x80 => Keyboard::VolumeUp,
            0x81 => Keyboard::VolumeDown,
            0xE0 => Keyboard::LeftControl,
            0xE1 => Keyboard::LeftShift,
            0xE2 => Keyboard::LeftAlt,
            0xE3 => Keyboard::LeftGui,
            0xE4 => Keyboard::RightControl,
            0xE5 => Keyboard::RightShift,
            0xE6 => Keyboard::RightAlt,
            0xE7 => Keyboard::RightGui,
            _ => Keyboard::ErrorUndefined,
        }
    }
}

impl From<Keyboard> for u8 {
    fn from(value: Keyboard) -> Self {
        value as u8
    }
}

/// Gamepad button identifiers for the XInput mapper's keyboard-side
/// configuration (`gamepad_buttons[NUM_KEYS]`, §3). The core only stores
/// and forwards these; the XInput report itself is an external collaborator
/// (§1 Non-goals).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, defmt::Format)]
#[repr(u8)]
pub enum GamepadButton {
    None = 0,
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    LeftThumb,
    RightThumb,
    Back,
    Start,
    Guide,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    LeftTrigger,
    RightTrigger,
}

impl Default for GamepadButton {
    fn default() -> Self {
        GamepadButton::None
    }
}
