// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The deferred-action queue (§4.4).
//!
//! A bounded FIFO shared by the layout and advanced-key engines. Entries
//! enqueued during one tick's `layout.task()` are drained on the *next*
//! call to [`DeferredActionQueue::process`], immediately after all other
//! layout work for that tick — never during the tick that enqueued them.

#![no_std]


use heapless::spsc::Queue;

/// The operation a [`DeferredAction`] performs when drained.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum DeferredActionKind {
    Press,
    Release,
    Tap,
}

/// A register/unregister/tap staged for the next tick (§3 `DeferredAction`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct DeferredAction {
    pub kind: DeferredActionKind,
    pub key: u8,
    pub keycode: he_hid::Keycode,
}

/// What the queue did with one action as it was drained, so a caller that
/// needs to know (Tap-Hold's release-from-TAP path) can react.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum DrainedAction {
    Registered(u8, he_hid::Keycode),
    Unregistered(u8, he_hid::Keycode),
    /// A TAP drains in two parts: the press fires the first time it is
    /// drained, the matching release is re-enqueued for the tick after.
    Tapped(u8, he_hid::Keycode),
}

/// Collaborator the queue reports HID effects to when it drains
/// (§4.4 "the HID collaborator is signaled to emit a report").
pub trait HidSink {
    fn register(&mut self, key: u8, keycode: he_hid::Keycode);
    fn unregister(&mut self, key: u8, keycode: he_hid::Keycode);
}

/// A bounded FIFO of up to `N` staged actions.
pub struct DeferredActionQueue<const N: usize> {
    queue: Queue<DeferredAction, N>,
}

impl<const N: usize> Default for DeferredActionQueue<N> {
    fn default() -> Self {
        DeferredActionQueue { queue: Queue::new() }
    }
}

impl<const N: usize> DeferredActionQueue<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an action for the next tick.
    ///
    /// Returns `false` when the queue is full (§7 "Deferred-action queue
    /// full: caller skips the would-be register"); the caller must not
    /// advance its own state machine as though the action were queued.
    #[must_use]
    pub fn push(&mut self, action: DeferredAction) -> bool {
        match self.queue.enqueue(action) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("deferred action queue full, dropping {:?}", action.kind);
                false
            }
        }
    }

    pub fn push_press(&mut self, key: u8, keycode: he_hid::Keycode) -> bool {
        self.push(DeferredAction {
            kind: DeferredActionKind::Press,
            key,
            keycode,
        })
    }

    pub fn push_release(&mut self, key: u8, keycode: he_hid::Keycode) -> bool {
        self.push(DeferredAction {
            kind: DeferredActionKind::Release,
            key,
            keycode,
        })
    }

    pub fn push_tap(&mut self, key: u8, keycode: he_hid::Keycode) -> bool {
        self.push(DeferredAction {
            kind: DeferredActionKind::Tap,
            key,
            keycode,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.queue.len() == 0
    }

    /// Drains every staged action in FIFO order, performing the
    /// register/unregister/tap it describes against `hid`.
    ///
    /// A drained TAP registers immediately and re-enqueues its matching
    /// release for the following call, so the keypress is visible in
    /// exactly one HID report before it clears.
    pub fn process(&mut self, hid: &mut impl HidSink) {
        // Only drain what was staged before this call: a TAP requeues its
        // release half below, and that release must wait for the *next*
        // `process` call, not this one.
        let mut remaining = self.queue.len();
        while remaining > 0 {
            remaining -= 1;
            let action = match self.queue.dequeue() {
                Some(action) => action,
                None => break,
            };
            match action.kind {
                DeferredActionKind::Press => {
                    hid.register(action.key, action.keycode);
                    log::debug!("deferred press on key {}", action.key);
                }
                DeferredActionKind::Release => {
                    hid.unregister(action.key, action.keycode);
                    log::debug!("deferred release on key {}", action.key);
                }
                DeferredActionKind::Tap => {
                    hid.register(action.key, action.keycode);
                    log::debug!("deferred tap (press half) on key {}", action.key);
                    // The release half is requeued rather than performed
                    // inline: §3 specifies a tap still occupies exactly one
                    // tick of register before its release is staged.
                    let _ = self.queue.enqueue(DeferredAction {
                        kind: DeferredActionKind::Release,
                        key: action.key,
                        keycode: action.keycode,
                    });
                }
            }
        }
    }
}
