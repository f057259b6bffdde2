// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Raw-HID configuration protocol (§6 "External interfaces").
//!
//! This crate is a packet codec and command router only; it does not own a
//! transport (USB stack, RF dongle, ...). A collaborator wires 64-byte
//! packets in from whatever interface it owns and writes the response packet
//! back out. The router never mutates a profile directly — every command is
//! forwarded to a [`ConfigHost`] implementation, which owns the active
//! profile image and is responsible for calling `advanced_key.clear()` and
//! `layout.load_advanced_keys()` wherever a write affects layers or advanced
//! keys.
//!
//! Framing: byte 0 is the command id, the remaining 63 bytes are payload.
//! A successful response echoes the command id in byte 0; an unrecognized
//! command, an out-of-range offset, or a host-rejected write all produce the
//! single-byte [`FAILURE`] response.

#![no_std]

mod command;

pub use command::CommandId;
pub use he_config::{GamepadOptions, Options};

/// Fixed packet size for the raw-HID transport.
pub const PACKET_LEN: usize = 64;

/// Bytes available for payload once the command id occupies byte 0.
pub const PAYLOAD_LEN: usize = PACKET_LEN - 1;

/// Response byte 0 on any failure (unknown command, bad offset, rejected
/// write).
pub const FAILURE: u8 = 0xFF;

/// A fixed-size raw-HID packet: byte 0 is the command id, the rest payload.
pub type Packet = [u8; PACKET_LEN];

/// Which paged profile section a [`ConfigHost::read_page`]/
/// [`ConfigHost::write_page`] call addresses (§6 "paged by offset").
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum Section {
    /// `layer` selects which of `keymap[NUM_LAYERS][NUM_KEYS]` is paged.
    Keymap { layer: u8 },
    ActuationMap,
    AdvancedKeys,
    GamepadButtons,
    Macros,
}

/// Collaborator the router dispatches every command to. Implemented by the
/// glue crate against the live profile, matrix calibration state, and
/// persisted options; `he-protocol` itself holds none of that state.
pub trait ConfigHost {
    /// `(major, minor, patch)`.
    fn firmware_version(&self) -> (u16, u16, u16);

    fn reboot(&mut self);
    fn enter_bootloader(&mut self);
    fn factory_reset(&mut self);
    fn recalibrate(&mut self, reset_bottom_out: bool);

    /// Current EMA-filtered ADC reading for `key`, `None` if out of range.
    fn analog_info(&self, key: u8) -> Option<u16>;

    /// `(adc_rest_value, adc_bottom_out_value)`.
    fn calibration_get(&self, key: u8) -> Option<(u16, u16)>;
    fn calibration_set(&mut self, key: u8, rest: u16, bottom_out: u16) -> bool;

    fn current_profile(&self) -> u8;
    fn options_get(&self) -> Options;
    fn options_set(&mut self, options: Options);

    fn profile_reset(&mut self, profile: u8) -> bool;
    fn profile_duplicate(&mut self, src_profile: u8, dst_profile: u8) -> bool;

    /// Writes up to `out.len()` bytes of the device metadata JSON blob
    /// starting at `offset`, returns the number of bytes written.
    fn metadata_chunk(&self, offset: u16, out: &mut [u8]) -> u8;

    /// Writes the serial number string into `out`, returns its length.
    fn serial_number(&self, out: &mut [u8]) -> u8;

    fn tick_rate_get(&self) -> u16;
    fn tick_rate_set(&mut self, tick_rate_ms: u16);

    fn gamepad_options_get(&self) -> GamepadOptions;
    fn gamepad_options_set(&mut self, options: GamepadOptions);

    /// Reads up to `out.len()` bytes of `section` starting at `offset`,
    /// returns the number of bytes written. Returns 0 for an out-of-range
    /// offset rather than failing the whole command, matching §7's
    /// "out-of-range key: silently ignored" handling extended to pages.
    fn read_page(&self, section: Section, offset: u16, out: &mut [u8]) -> u8;

    /// Writes `data` into `section` at `offset`. Returns `false` if any byte
    /// of the write falls outside the section's compile-time bounds; the
    /// host must not partially apply a rejected write.
    fn write_page(&mut self, section: Section, offset: u16, data: &[u8]) -> bool;
}

fn failure_packet() -> Packet {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = FAILURE;
    packet
}

fn ack(id: CommandId) -> Packet {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = id as u8;
    packet
}

fn ack_with(id: CommandId, data: &[u8]) -> Packet {
    let mut packet = ack(id);
    let len = core::cmp::min(data.len(), PAYLOAD_LEN);
    packet[1..1 + len].copy_from_slice(&data[..len]);
    packet
}

fn read_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn write_u16(out: &mut [u8], value: u16) {
    out[..2].copy_from_slice(&value.to_le_bytes());
}

/// Owns the collaborator implementation and dispatches decoded packets to
/// it, mirroring `kiibohd-hid-io`'s `CommandInterface` ownership of its
/// `KiibohdCommandInterface` callback target.
pub struct CommandInterface<H: ConfigHost> {
    host: H,
}

impl<H: ConfigHost> CommandInterface<H> {
    pub fn new(host: H) -> Self {
        CommandInterface { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Decodes one request packet, dispatches it, and encodes the response.
    pub fn process(&mut self, request: &Packet) -> Packet {
        let payload = &request[1..];
        match CommandId::try_from(request[0]) {
            Ok(id) => self.dispatch(id, payload),
            Err(unknown) => {
                log::warn!("he-protocol: unrecognized command id {:#04x}", unknown);
                failure_packet()
            }
        }
    }

    fn dispatch(&mut self, id: CommandId, payload: &[u8]) -> Packet {
        use CommandId::*;
        log::trace!("he-protocol: dispatching {}", id.name());
        match id {
            Version => {
                let (major, minor, patch) = self.host.firmware_version();
                let mut buf = [0u8; 6];
                write_u16(&mut buf[0..2], major);
                write_u16(&mut buf[2..4], minor);
                write_u16(&mut buf[4..6], patch);
                ack_with(id, &buf)
            }
            Reboot => {
                self.host.reboot();
                ack(id)
            }
            Bootloader => {
                self.host.enter_bootloader();
                ack(id)
            }
            FactoryReset => {
                self.host.factory_reset();
                ack(id)
            }
            Recalibrate => {
                self.host.recalibrate(payload[0] != 0);
                ack(id)
            }
            AnalogInfo => match self.host.analog_info(payload[0]) {
                Some(value) => {
                    let mut buf = [0u8; 2];
                    write_u16(&mut buf, value);
                    ack_with(id, &buf)
                }
                None => failure_packet(),
            },
            CalibrationGet => match self.host.calibration_get(payload[0]) {
                Some((rest, bottom_out)) => {
                    let mut buf = [0u8; 4];
                    write_u16(&mut buf[0..2], rest);
                    write_u16(&mut buf[2..4], bottom_out);
                    ack_with(id, &buf)
                }
                None => failure_packet(),
            },
            CalibrationSet => {
                let key = payload[0];
                let rest = read_u16(&payload[1..3]);
                let bottom_out = read_u16(&payload[3..5]);
                if self.host.calibration_set(key, rest, bottom_out) {
                    ack(id)
                } else {
                    failure_packet()
                }
            }
            ProfileGet => ack_with(id, &[self.host.current_profile()]),
            OptionsGet => {
                let options = self.host.options_get();
                ack_with(id, &[encode_options(options)])
            }
            OptionsSet => {
                self.host.options_set(decode_options(payload[0]));
                ack(id)
            }
            ProfileReset => {
                if self.host.profile_reset(payload[0]) {
                    ack(id)
                } else {
                    failure_packet()
                }
            }
            ProfileDuplicate => {
                if self.host.profile_duplicate(payload[0], payload[1]) {
                    ack(id)
                } else {
                    failure_packet()
                }
            }
            Metadata => {
                let offset = read_u16(&payload[0..2]);
                let mut buf = [0u8; PAYLOAD_LEN - 1];
                let len = self.host.metadata_chunk(offset, &mut buf) as usize;
                let mut response = ack(id);
                response[1] = len as u8;
                response[2..2 + len].copy_from_slice(&buf[..len]);
                response
            }
            Serial => {
                let mut buf = [0u8; PAYLOAD_LEN - 1];
                let len = self.host.serial_number(&mut buf) as usize;
                let mut response = ack(id);
                response[1] = len as u8;
                response[2..2 + len].copy_from_slice(&buf[..len]);
                response
            }
            KeymapGet => {
                let section = Section::Keymap {
                    layer: payload[0],
                };
                let offset = read_u16(&payload[1..3]);
                self.read_paged(id, section, offset)
            }
            KeymapSet => {
                let section = Section::Keymap {
                    layer: payload[0],
                };
                let offset = read_u16(&payload[1..3]);
                let len = payload[3] as usize;
                self.write_paged(id, section, offset, &payload[4..], len)
            }
            ActuationMapGet => {
                let offset = read_u16(&payload[0..2]);
                self.read_paged(id, Section::ActuationMap, offset)
            }
            ActuationMapSet => {
                let offset = read_u16(&payload[0..2]);
                let len = payload[2] as usize;
                self.write_paged(id, Section::ActuationMap, offset, &payload[3..], len)
            }
            AdvancedKeysGet => {
                let offset = read_u16(&payload[0..2]);
                self.read_paged(id, Section::AdvancedKeys, offset)
            }
            AdvancedKeysSet => {
                let offset = read_u16(&payload[0..2]);
                let len = payload[2] as usize;
                self.write_paged(id, Section::AdvancedKeys, offset, &payload[3..], len)
            }
            TickRateGet => {
                let mut buf = [0u8; 2];
                write_u16(&mut buf, self.host.tick_rate_get());
                ack_with(id, &buf)
            }
            TickRateSet => {
                self.host.tick_rate_set(read_u16(&payload[0..2]));
                ack(id)
            }
            GamepadButtonsGet => {
                let offset = read_u16(&payload[0..2]);
                self.read_paged(id, Section::GamepadButtons, offset)
            }
            GamepadButtonsSet => {
                let offset = read_u16(&payload[0..2]);
                let len = payload[2] as usize;
                self.write_paged(id, Section::GamepadButtons, offset, &payload[3..], len)
            }
            GamepadOptionsGet => {
                let options = self.host.gamepad_options_get();
                ack_with(id, &[options.override_keyboard as u8])
            }
            GamepadOptionsSet => {
                self.host.gamepad_options_set(GamepadOptions {
                    override_keyboard: payload[0] != 0,
                });
                ack(id)
            }
            MacrosGet => {
                let offset = read_u16(&payload[0..2]);
                self.read_paged(id, Section::Macros, offset)
            }
            MacrosSet => {
                let offset = read_u16(&payload[0..2]);
                let len = payload[2] as usize;
                self.write_paged(id, Section::Macros, offset, &payload[3..], len)
            }
        }
    }

    fn read_paged(&mut self, id: CommandId, section: Section, offset: u16) -> Packet {
        let mut buf = [0u8; PAYLOAD_LEN - 1];
        let len = self.host.read_page(section, offset, &mut buf) as usize;
        let mut response = ack(id);
        response[1] = len as u8;
        response[2..2 + len].copy_from_slice(&buf[..len]);
        response
    }

    fn write_paged(
        &mut self,
        id: CommandId,
        section: Section,
        offset: u16,
        data: &[u8],
        len: usize,
    ) -> Packet {
        let len = core::cmp::min(len, data.len());
        if self.host.write_page(section, offset, &data[..len]) {
            ack(id)
        } else {
            log::warn!("he-protocol: rejected write to {:?} at offset {}", section, offset);
            failure_packet()
        }
    }
}

fn encode_options(options: Options) -> u8 {
    (options.xinput_enabled as u8)
        | ((options.keyboard_enabled as u8) << 1)
        | ((options.save_bottom_out_threshold as u8) << 2)
}

fn decode_options(byte: u8) -> Options {
    Options {
        xinput_enabled: byte & 0b001 != 0,
        keyboard_enabled: byte & 0b010 != 0,
        save_bottom_out_threshold: byte & 0b100 != 0,
    }
}

#[cfg(test)]
mod test;
