// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Logging shim shared by every `he-*` crate.
//!
//! Mirrors `kiibohd-log`'s role (a thin `log::Log` wrapper a board brings up
//! once at boot) but drops the cortex-m/RTT specifics, since this core is not
//! tied to one MCU family: on host/test builds the `std` feature re-exports
//! `log` so `flexi_logger` (or any other `log::Log` backend) drives it
//! unmodified; on-target builds without `std` are expected to install a
//! `defmt` logger instead, and every `he-*` crate's `log::trace!`/`debug!`/
//! `warn!`/`error!` calls compile down to nothing when neither feature is
//! enabled, exactly like an uninstalled `log::Log` backend.

#![no_std]

#[cfg(feature = "log")]
pub use log;

#[cfg(feature = "defmt")]
pub use defmt;

/// Installs `logger` as the global `log` backend, matching `kiibohd-log`'s
/// `Logger::new` + `log::set_logger` boilerplate so every board brings this
/// crate up the same way.
#[cfg(feature = "log")]
pub fn init(logger: &'static dyn log::Log, level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}
