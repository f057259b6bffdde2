/* Copyright (C) 2021 by Jacob Alexander */

//! The input-processing core (§2 "System overview", §5 "Concurrency model").
//!
//! [`Core`] wires the matrix, layout, advanced-key and deferred-action
//! engines to a profile image and drives one fixed-order tick:
//! `matrix.scan()` → `layout.task()` → `deferred_action.process()`, exactly
//! as `kiibohd-usb`'s old `Kiibohd` driver loop called into
//! `kiibohd-hall-effect-keyscanning` and `kll-core` in turn. Everything this
//! module needs from outside the core — ADC sampling, the millisecond
//! timer, HID report delivery, persistent storage, bootloader entry — is an
//! external collaborator trait, never a concrete board dependency.

mod config_host;
mod wire;

pub use config_host::ConfigHostAdapter;
pub use wire::{ByteSink, MAX_SECTION_BYTES};

use he_advanced_keys::AdvancedKeyEngine;
use he_config::{Image, Options, Profile};
use he_deferred_action::{DeferredActionQueue, HidSink};
use he_hid::Keycode;
use he_layout::{LayoutEngine, ProfileRequest, TickOutcome, XInputSink};
use he_matrix::{Matrix, MatrixOptions};

/// Per-key ADC sampler (§6 "`analog_read(key) -> u16`, `analog_task()`").
pub trait AnalogSource<const NUM_KEYS: usize> {
    /// Runs one sampling pass; called once per tick before any
    /// `analog_read`.
    fn analog_task(&mut self);
    fn analog_read(&mut self, key: usize) -> u16;
}

/// The millisecond timer (§6 "`timer_read() -> u32 ms`,
/// `timer_elapsed(since) -> u32 ms`").
pub trait TimeSource {
    fn timer_read(&self) -> u32;
    fn timer_elapsed(&self, since: u32) -> u32;
}

/// Bootloader entry and device reset (§6 "`board_enter_bootloader()`").
pub trait BoardControl {
    fn board_reboot(&mut self);
    fn board_enter_bootloader(&mut self);
}

/// Wear-levelled persistent storage for the EEPROM image (§6
/// "`wear_leveling_write(addr, data, len) -> bool`"). `read` is this core's
/// own addition, symmetric with `write`, since the image has to come from
/// somewhere at boot (see DESIGN.md).
pub trait PersistentStore {
    fn wear_leveling_write(&mut self, bytes: &[u8]) -> bool;
    fn wear_leveling_read(&mut self, out: &mut [u8]) -> bool;
}

/// HID report delivery (§6 "`hid_keycode_add/remove`, `hid_send_reports()`,
/// plus mouse-delta and XInput analogs"). `register`/`unregister` are
/// inherited from [`HidSink`]; this adds the report flush.
pub trait HidReportSink: HidSink {
    fn hid_send_reports(&mut self);
}

/// Wraps a [`HidReportSink`] and records whether any register/unregister
/// happened this tick, so [`Core::tick`] can call `hid_send_reports()`
/// exactly when something changed instead of every tick (§4.4 "the HID
/// collaborator is signaled to emit a report"). Mirrors `he-matrix`'s own
/// `bottom_out_dirty`-per-key dirty bit, one level up.
struct ReportTracker<'a, H> {
    inner: &'a mut H,
    dirty: bool,
}

impl<'a, H: HidSink> HidSink for ReportTracker<'a, H> {
    fn register(&mut self, key: u8, keycode: Keycode) {
        self.dirty = true;
        self.inner.register(key, keycode);
    }
    fn unregister(&mut self, key: u8, keycode: Keycode) {
        self.dirty = true;
        self.inner.unregister(key, keycode);
    }
}

/// The input-processing core for a compile-time-known board shape.
///
/// `NUM_DEFERRED` sizes the deferred-action queue independently of
/// `NUM_KEYS`, since its only load is Tap-Hold/Macro/DKS actions staged a
/// tick ahead, not one entry per key.
pub struct Core<
    const NUM_LAYERS: usize,
    const NUM_KEYS: usize,
    const NUM_ADVANCED_KEYS: usize,
    const NUM_PROFILES: usize,
    const NUM_MACROS: usize,
    const NUM_DEFERRED: usize,
> {
    image: Image<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS, NUM_PROFILES, NUM_MACROS>,
    matrix: Matrix<NUM_KEYS>,
    layout: LayoutEngine<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS>,
    advanced: AdvancedKeyEngine<NUM_ADVANCED_KEYS>,
    deferred: DeferredActionQueue<NUM_DEFERRED>,
    /// Set whenever a command write or a matrix bottom-out flush touches
    /// `image`; cleared by [`Core::flush_persistence`] on a successful
    /// write (see DESIGN.md "deferred persistence").
    persist_dirty: bool,
    /// Millisecond timestamp from the most recent [`Core::tick`], reused by
    /// [`config_host::ConfigHostAdapter::recalibrate`] and `calibration_set`
    /// since `ConfigHost`'s synchronous dispatch has no `TimeSource` of its
    /// own to call through.
    last_tick_ms: u32,
}

impl<
        const NUM_LAYERS: usize,
        const NUM_KEYS: usize,
        const NUM_ADVANCED_KEYS: usize,
        const NUM_PROFILES: usize,
        const NUM_MACROS: usize,
        const NUM_DEFERRED: usize,
    > Core<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS, NUM_PROFILES, NUM_MACROS, NUM_DEFERRED>
{
    /// Boots from an already-loaded image (§2 "boot sequence"): seeds the
    /// matrix from the global calibration, loads the active profile's
    /// advanced keys, and starts the layout engine on that profile's
    /// default layer.
    pub fn boot(
        image: Image<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS, NUM_PROFILES, NUM_MACROS>,
    ) -> Self {
        let matrix_options = MatrixOptions {
            invert: false,
            save_bottom_out_threshold: image.options.save_bottom_out_threshold,
        };
        let mut matrix: Matrix<NUM_KEYS> = Matrix::new(matrix_options);
        matrix.init(image.initial_rest_value, image.initial_bottom_out_threshold);

        let idx = image.boot_profile();
        let mut advanced: AdvancedKeyEngine<NUM_ADVANCED_KEYS> = AdvancedKeyEngine::new();
        advanced.load(&image.profiles[idx].advanced_keys);

        let mut layout: LayoutEngine<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS> =
            LayoutEngine::new(image.profiles[idx].default_layer);
        layout.load_advanced_keys(&image.profiles[idx]);

        Core {
            image,
            matrix,
            layout,
            advanced,
            deferred: DeferredActionQueue::new(),
            persist_dirty: false,
            last_tick_ms: 0,
        }
    }

    /// Loads the image from a [`PersistentStore`] and boots from it,
    /// falling back to [`Image::default`] on a read failure so the board is
    /// still usable with factory-default bindings (§7 error table has no
    /// explicit entry for a boot-time read failure; this is the safest
    /// reading of "no error ever halts the tick loop").
    pub fn boot_from_store(store: &mut impl PersistentStore) -> Self {
        let mut buf = [0u8; wire::MAX_IMAGE_SCRATCH];
        let image = if store.wear_leveling_read(&mut buf) {
            wire::decode_image(&buf)
        } else {
            log::warn!("he: persistent image read failed, booting factory defaults");
            Image::default()
        };
        Self::boot(image)
    }

    fn active_profile_index(&self) -> usize {
        (self.image.current_profile as usize).min(NUM_PROFILES.saturating_sub(1))
    }

    pub fn active_profile(&self) -> &Profile<NUM_LAYERS, NUM_KEYS, NUM_ADVANCED_KEYS> {
        &self.image.profiles[self.active_profile_index()]
    }

    pub fn options(&self) -> Options {
        self.image.options
    }

    /// Switches the active profile (§3 `ActiveProfile` invariant, §6 "every
    /// write command... MUST trigger `advanced_key.clear()` and
    /// `layout.load_advanced_keys()`"). `false` if `profile` is out of
    /// range; the active profile is left unchanged.
    pub fn set_profile(&mut self, profile: u8) -> bool {
        if profile as usize >= NUM_PROFILES {
            return false;
        }
        if self.image.current_profile != 0 {
            self.image.last_non_default_profile = self.image.current_profile;
        }
        self.image.current_profile = profile;
        self.advanced.clear();
        self.advanced.load(&self.active_profile().advanced_keys);
        // `LayoutEngine::init()` keeps whatever default layer it already
        // had, which is the *previous* profile's — a profile switch needs
        // a fresh engine built on the new profile's own default layer.
        self.layout = LayoutEngine::new(self.active_profile().default_layer);
        self.layout.load_advanced_keys(self.active_profile());
        self.persist_dirty = true;
        true
    }

    fn apply_profile_request(&mut self, request: ProfileRequest) {
        match request {
            ProfileRequest::Select(profile) => {
                self.set_profile(profile);
            }
            ProfileRequest::Swap => {
                let target = self.image.last_non_default_profile;
                self.set_profile(target);
            }
            ProfileRequest::Next => {
                let next = (self.active_profile_index() as u8 + 1) % NUM_PROFILES as u8;
                self.set_profile(next);
            }
        }
    }

    /// One full tick (§5 "the outermost loop invokes, in fixed order:
    /// `matrix.scan()` -> `layout.task()` -> `deferred_action.process()`").
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        analog: &mut impl AnalogSource<NUM_KEYS>,
        time: &impl TimeSource,
        hid: &mut impl HidReportSink,
        xinput: &mut impl XInputSink,
        board: &mut impl BoardControl,
    ) -> TickOutcome {
        analog.analog_task();
        let now = time.timer_read();
        self.last_tick_ms = now;

        let mut readings = [0u16; NUM_KEYS];
        for (key, reading) in readings.iter_mut().enumerate() {
            *reading = analog.analog_read(key);
        }

        let idx = self.active_profile_index();
        {
            let profile = &self.image.profiles[idx];
            self.matrix.scan(&readings, &profile.actuation_map, now);
        }

        for flush in self.matrix.drain_bottom_out_flush(now) {
            self.image.bottom_out_threshold[flush.key] = flush.adc_bottom_out_value;
            self.persist_dirty = true;
        }

        let mut tracker = ReportTracker {
            inner: &mut *hid,
            dirty: false,
        };
        let outcome = {
            let profile = &self.image.profiles[idx];
            let options = &self.image.options;
            let macros = &self.image.macros;
            self.layout.task(
                profile,
                options,
                &self.matrix,
                macros,
                &mut self.advanced,
                now,
                &mut tracker,
                xinput,
                &mut self.deferred,
            )
        };
        self.deferred.process(&mut tracker);
        let report_dirty = tracker.dirty;
        drop(tracker);

        if report_dirty {
            hid.hid_send_reports();
        }

        if let Some(request) = outcome.profile_request {
            self.apply_profile_request(request);
        }
        if outcome.enter_bootloader {
            board.board_enter_bootloader();
        }

        outcome
    }

    /// Writes the image out if anything has changed since the last
    /// successful flush (§6 "schedules a wear-levelled persist"). The glue
    /// driver calls this periodically, not every tick — `ConfigHost`'s
    /// synchronous dispatch has no storage collaborator to call through
    /// (see DESIGN.md "deferred persistence").
    pub fn flush_persistence(&mut self, store: &mut impl PersistentStore) -> bool {
        if !self.persist_dirty {
            return true;
        }
        let mut writer = wire::StoreWriter { store };
        if wire::encode_image(&self.image, &mut writer) {
            self.persist_dirty = false;
            true
        } else {
            log::warn!("he: persistence flush failed");
            false
        }
    }
}
