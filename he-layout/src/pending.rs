// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The pending-event buffer (§3 `PendingEvent`).
//!
//! Presses of non-hold-tap keys are staged here while a Tap-Hold decision
//! is outstanding; releases are never deferred. Bounded at
//! [`PENDING_EVENT_CAPACITY`] entries (§3 "bounded queue of ≤8 entries").

/// Capacity of the pending-event buffer.
pub const PENDING_EVENT_CAPACITY: usize = 8;

/// A deferred press awaiting the pending-event buffer's drain (§4.2 step
/// 3b/5b).
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct PendingEvent {
    pub key: u8,
    pub pressed: bool,
}
