// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::*;
use flexi_logger::Logger;

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

struct FakeHost {
    keymap: [u8; 8],
    rebooted: bool,
    bootloader: bool,
    factory_reset: bool,
    recalibrated: Option<bool>,
    analog: [u16; 4],
    calibration: [(u16, u16); 4],
    profile: u8,
    options: Options,
    gamepad_options: GamepadOptions,
    tick_rate: u16,
    duplicated: Option<(u8, u8)>,
    reset_profile: Option<u8>,
}

impl FakeHost {
    fn new() -> Self {
        FakeHost {
            keymap: [0; 8],
            rebooted: false,
            bootloader: false,
            factory_reset: false,
            recalibrated: None,
            analog: [100, 200, 300, 400],
            calibration: [(10, 900), (20, 800), (30, 700), (40, 600)],
            profile: 0,
            options: Options::new(),
            gamepad_options: GamepadOptions::default(),
            tick_rate: 1000,
            duplicated: None,
            reset_profile: None,
        }
    }
}

impl ConfigHost for FakeHost {
    fn firmware_version(&self) -> (u16, u16, u16) {
        (1, 2, 3)
    }

    fn reboot(&mut self) {
        self.rebooted = true;
    }

    fn enter_bootloader(&mut self) {
        self.bootloader = true;
    }

    fn factory_reset(&mut self) {
        self.factory_reset = true;
    }

    fn recalibrate(&mut self, reset_bottom_out: bool) {
        self.recalibrated = Some(reset_bottom_out);
    }

    fn analog_info(&self, key: u8) -> Option<u16> {
        self.analog.get(key as usize).copied()
    }

    fn calibration_get(&self, key: u8) -> Option<(u16, u16)> {
        self.calibration.get(key as usize).copied()
    }

    fn calibration_set(&mut self, key: u8, rest: u16, bottom_out: u16) -> bool {
        match self.calibration.get_mut(key as usize) {
            Some(slot) => {
                *slot = (rest, bottom_out);
                true
            }
            None => false,
        }
    }

    fn current_profile(&self) -> u8 {
        self.profile
    }

    fn options_get(&self) -> Options {
        self.options
    }

    fn options_set(&mut self, options: Options) {
        self.options = options;
    }

    fn profile_reset(&mut self, profile: u8) -> bool {
        self.reset_profile = Some(profile);
        profile < 4
    }

    fn profile_duplicate(&mut self, src_profile: u8, dst_profile: u8) -> bool {
        self.duplicated = Some((src_profile, dst_profile));
        src_profile < 4 && dst_profile < 4
    }

    fn metadata_chunk(&self, offset: u16, out: &mut [u8]) -> u8 {
        let json = b"{\"name\":\"test\"}";
        let offset = offset as usize;
        if offset >= json.len() {
            return 0;
        }
        let len = core::cmp::min(out.len(), json.len() - offset);
        out[..len].copy_from_slice(&json[offset..offset + len]);
        len as u8
    }

    fn serial_number(&self, out: &mut [u8]) -> u8 {
        let serial = b"SN1234";
        out[..serial.len()].copy_from_slice(serial);
        serial.len() as u8
    }

    fn tick_rate_get(&self) -> u16 {
        self.tick_rate
    }

    fn tick_rate_set(&mut self, tick_rate_ms: u16) {
        self.tick_rate = tick_rate_ms;
    }

    fn gamepad_options_get(&self) -> GamepadOptions {
        self.gamepad_options
    }

    fn gamepad_options_set(&mut self, options: GamepadOptions) {
        self.gamepad_options = options;
    }

    fn read_page(&self, section: Section, offset: u16, out: &mut [u8]) -> u8 {
        match section {
            Section::Keymap { layer: 0 } => {
                let offset = offset as usize;
                if offset >= self.keymap.len() {
                    return 0;
                }
                let len = core::cmp::min(out.len(), self.keymap.len() - offset);
                out[..len].copy_from_slice(&self.keymap[offset..offset + len]);
                len as u8
            }
            _ => 0,
        }
    }

    fn write_page(&mut self, section: Section, offset: u16, data: &[u8]) -> bool {
        match section {
            Section::Keymap { layer: 0 } => {
                let offset = offset as usize;
                if offset + data.len() > self.keymap.len() {
                    return false;
                }
                self.keymap[offset..offset + data.len()].copy_from_slice(data);
                true
            }
            _ => false,
        }
    }
}

fn packet(cmd: u8, payload: &[u8]) -> Packet {
    let mut p = [0u8; PACKET_LEN];
    p[0] = cmd;
    p[1..1 + payload.len()].copy_from_slice(payload);
    p
}

#[test]
fn unknown_command_returns_failure() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    let response = iface.process(&packet(200, &[]));
    assert_eq!(response[0], FAILURE);
}

#[test]
fn version_reports_major_minor_patch() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    let response = iface.process(&packet(CommandId::Version as u8, &[]));
    assert_eq!(response[0], CommandId::Version as u8);
    assert_eq!(read_u16(&response[1..3]), 1);
    assert_eq!(read_u16(&response[3..5]), 2);
    assert_eq!(read_u16(&response[5..7]), 3);
}

#[test]
fn reboot_and_bootloader_trigger_host_callbacks() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    iface.process(&packet(CommandId::Reboot as u8, &[]));
    assert!(iface.host().rebooted);
    iface.process(&packet(CommandId::Bootloader as u8, &[]));
    assert!(iface.host().bootloader);
}

#[test]
fn analog_info_in_range_succeeds_out_of_range_fails() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    let ok = iface.process(&packet(CommandId::AnalogInfo as u8, &[1]));
    assert_eq!(ok[0], CommandId::AnalogInfo as u8);
    assert_eq!(read_u16(&ok[1..3]), 200);

    let bad = iface.process(&packet(CommandId::AnalogInfo as u8, &[200]));
    assert_eq!(bad[0], FAILURE);
}

#[test]
fn calibration_round_trips_through_set_and_get() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    let mut set_payload = [0u8; 5];
    set_payload[0] = 2;
    set_payload[1..3].copy_from_slice(&50u16.to_le_bytes());
    set_payload[3..5].copy_from_slice(&950u16.to_le_bytes());
    let ack = iface.process(&packet(CommandId::CalibrationSet as u8, &set_payload));
    assert_eq!(ack[0], CommandId::CalibrationSet as u8);

    let get = iface.process(&packet(CommandId::CalibrationGet as u8, &[2]));
    assert_eq!(read_u16(&get[1..3]), 50);
    assert_eq!(read_u16(&get[3..5]), 950);
}

#[test]
fn options_round_trip_preserves_each_flag() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    let options = Options {
        xinput_enabled: true,
        keyboard_enabled: false,
        save_bottom_out_threshold: true,
    };
    iface.process(&packet(CommandId::OptionsSet as u8, &[encode_options(options)]));
    let response = iface.process(&packet(CommandId::OptionsGet as u8, &[]));
    assert_eq!(decode_options(response[1]), options);
}

#[test]
fn keymap_page_write_then_read_back_matches() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    let mut set_payload = [0u8; 7];
    set_payload[0] = 0; // layer
    set_payload[1..3].copy_from_slice(&2u16.to_le_bytes()); // offset
    set_payload[3] = 3; // len
    set_payload[4..7].copy_from_slice(&[9, 8, 7]);
    let ack = iface.process(&packet(CommandId::KeymapSet as u8, &set_payload));
    assert_eq!(ack[0], CommandId::KeymapSet as u8);

    let mut get_payload = [0u8; 3];
    get_payload[0] = 0;
    get_payload[1..3].copy_from_slice(&2u16.to_le_bytes());
    let response = iface.process(&packet(CommandId::KeymapGet as u8, &get_payload));
    let len = response[1] as usize;
    assert_eq!(&response[2..2 + len], &[9, 8, 7]);
}

#[test]
fn keymap_write_out_of_bounds_is_rejected() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    let mut set_payload = [0u8; 7];
    set_payload[0] = 0;
    set_payload[1..3].copy_from_slice(&7u16.to_le_bytes());
    set_payload[3] = 3;
    set_payload[4..7].copy_from_slice(&[1, 2, 3]);
    let response = iface.process(&packet(CommandId::KeymapSet as u8, &set_payload));
    assert_eq!(response[0], FAILURE);
}

#[test]
fn profile_reset_and_duplicate_forward_arguments() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    iface.process(&packet(CommandId::ProfileReset as u8, &[1]));
    assert_eq!(iface.host().reset_profile, Some(1));

    iface.process(&packet(CommandId::ProfileDuplicate as u8, &[1, 2]));
    assert_eq!(iface.host().duplicated, Some((1, 2)));

    let failed = iface.process(&packet(CommandId::ProfileDuplicate as u8, &[1, 9]));
    assert_eq!(failed[0], FAILURE);
}

#[test]
fn serial_and_metadata_chunks_report_their_length() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    let response = iface.process(&packet(CommandId::Serial as u8, &[]));
    let len = response[1] as usize;
    assert_eq!(&response[2..2 + len], b"SN1234");

    let mut meta_payload = [0u8; 2];
    meta_payload.copy_from_slice(&0u16.to_le_bytes());
    let response = iface.process(&packet(CommandId::Metadata as u8, &meta_payload));
    let len = response[1] as usize;
    assert_eq!(&response[2..2 + len], &b"{\"name\":\"test\"}"[..]);
}

#[test]
fn tick_rate_round_trips() {
    setup_logging_lite().ok();
    let mut iface = CommandInterface::new(FakeHost::new());
    let mut payload = [0u8; 2];
    payload.copy_from_slice(&500u16.to_le_bytes());
    iface.process(&packet(CommandId::TickRateSet as u8, &payload));
    let response = iface.process(&packet(CommandId::TickRateGet as u8, &[]));
    assert_eq!(read_u16(&response[1..3]), 500);
}
