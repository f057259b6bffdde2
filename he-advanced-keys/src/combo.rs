// Copyright 2021-2026 Jacob Alexander
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The Combo engine (§4.3.5).
//!
//! A fixed-size ring buffer of press events plus longest-match arbitration,
//! grounded on the pack's `chord_engine.rs` chord-matching shape (a queue of
//! pending key events scored against a table of chord definitions) but
//! specialized to this spec's exact match/candidate/no-match rules and
//! flush semantics.

use he_config::{ComboConfig, COMBO_VIRTUAL_KEY};
use he_deferred_action::{DeferredActionQueue, HidSink};
use heapless::Vec;

/// Capacity of the combo event ring buffer (§3 `ComboEvent`, "ring buffer
/// of 16 entries").
pub const COMBO_QUEUE_LEN: usize = 16;

/// A configured combo slot paired with the layer it is bound on, since
/// §4.3.5 scopes matching to "every combo slot on the current layer".
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct ComboSlot {
    pub layer: u8,
    pub config: ComboConfig,
}

/// A queued press event (§3 `ComboEvent`). Releases never enter the queue
/// (§4.3.5 "releases bypass the queue").
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct ComboEvent {
    pub key: u8,
    pub time: u32,
    pub consumed: bool,
}

/// What the combo engine did with an offered event, so the layout engine
/// knows whether to continue dispatching it normally (§4.2 step 3a).
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum Offer {
    /// The event was queued; the caller must not process it further yet.
    Queued,
    /// The key does not participate in any combo on the current layer;
    /// caller should dispatch it normally.
    NotParticipating,
}

/// A flushed, unconsumed press that must be replayed through
/// `layout.process_key` in its original order (§4.3.5 "unconsumed ones are
/// replayed").
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct Replay {
    pub key: u8,
    pub time: u32,
}

type ReplayBuf = Vec<Replay, COMBO_QUEUE_LEN>;

pub struct Engine<const NUM_COMBOS: usize> {
    queue: Vec<ComboEvent, COMBO_QUEUE_LEN>,
    participation_cache: Option<(u8, [bool; 256])>,
    flushing: bool,
}

impl<const NUM_COMBOS: usize> Default for Engine<NUM_COMBOS> {
    fn default() -> Self {
        Engine {
            queue: Vec::new(),
            participation_cache: None,
            flushing: false,
        }
    }
}

impl<const NUM_COMBOS: usize> Engine<NUM_COMBOS> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single legal cache invalidation entry point (§9 "Combo bitmap
    /// cache"); every configuration-mutation route must call this.
    pub fn invalidate_cache(&mut self) {
        self.participation_cache = None;
    }

    fn participates(&mut self, combos: &[ComboSlot; NUM_COMBOS], layer: u8, key: u8) -> bool {
        let rebuild = match &self.participation_cache {
            Some((cached_layer, _)) => *cached_layer != layer,
            None => true,
        };
        if rebuild {
            let mut bitmap = [false; 256];
            for slot in combos.iter() {
                if slot.layer != layer || slot.config.num_keys == 0 {
                    continue;
                }
                for &k in slot.config.required_keys() {
                    bitmap[k as usize] = true;
                }
            }
            self.participation_cache = Some((layer, bitmap));
        }
        self.participation_cache.as_ref().unwrap().1[key as usize]
    }

    /// Offers one press event to the combo engine (§4.2 step 3a). A
    /// non-participating key flushes any pending queue first, preserving
    /// chronological order (§4.3.5 "A non-combo key press with a non-empty
    /// queue flushes the queue before being dispatched").
    pub fn offer_press<const N: usize>(
        &mut self,
        combos: &[ComboSlot; NUM_COMBOS],
        layer: u8,
        key: u8,
        time: u32,
        hid: &mut impl HidSink,
        deferred: &mut DeferredActionQueue<N>,
        replay: &mut ReplayBuf,
    ) -> Offer {
        if !self.participates(combos, layer, key) {
            if !self.queue.is_empty() {
                self.flush_all(replay);
            }
            return Offer::NotParticipating;
        }
        if self.queue.is_full() {
            // Combo queue full: oldest event is force-flushed (§7).
            self.queue.remove(0);
            log::warn!("combo queue full, force-flushed oldest event");
        }
        let _ = self.queue.push(ComboEvent {
            key,
            time,
            consumed: false,
        });
        self.process(combos, layer, time, hid, deferred, replay);
        Offer::Queued
    }

    /// A release bypasses the queue entirely but may retro-invalidate a
    /// pending candidate that required this key (§4.3.5).
    pub fn offer_release(&mut self, key: u8) {
        let mut i = 0;
        while i < self.queue.len() {
            if self.queue[i].key == key && !self.queue[i].consumed {
                self.queue.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Advances time-based combo decisions without a new event (§4.2 step 4,
    /// "`combo.task()`").
    pub fn task<const N: usize>(
        &mut self,
        combos: &[ComboSlot; NUM_COMBOS],
        layer: u8,
        now: u32,
        hid: &mut impl HidSink,
        deferred: &mut DeferredActionQueue<N>,
        replay: &mut ReplayBuf,
    ) {
        if !self.queue.is_empty() {
            self.process(combos, layer, now, hid, deferred, replay);
        }
    }

    fn oldest_time(&self) -> Option<u32> {
        self.queue.iter().filter(|e| !e.consumed).map(|e| e.time).min()
    }

    fn match_status(&self, slot: &ComboSlot, layer: u8, now: u32) -> MatchStatus {
        let combo = &slot.config;
        if slot.layer != layer || combo.num_keys == 0 {
            return MatchStatus::NoMatch;
        }
        let required = combo.required_keys();
        let mut present = 0usize;
        let mut min_time = u32::MAX;
        let mut max_time = 0u32;
        for &k in required {
            if let Some(ev) = self.queue.iter().find(|e| e.key == k && !e.consumed) {
                present += 1;
                min_time = min_time.min(ev.time);
                max_time = max_time.max(ev.time);
            }
        }
        let foreign = self
            .queue
            .iter()
            .any(|e| !e.consumed && !required.contains(&e.key));
        if foreign {
            return MatchStatus::NoMatch;
        }
        if present == required.len() {
            if max_time.wrapping_sub(min_time) <= combo.effective_term_ms() as u32 {
                MatchStatus::Full
            } else {
                MatchStatus::NoMatch
            }
        } else if present > 0 && now.wrapping_sub(min_time) <= combo.effective_term_ms() as u32 {
            MatchStatus::Candidate
        } else {
            MatchStatus::NoMatch
        }
    }

    fn process<const N: usize>(
        &mut self,
        combos: &[ComboSlot; NUM_COMBOS],
        layer: u8,
        now: u32,
        hid: &mut impl HidSink,
        deferred: &mut DeferredActionQueue<N>,
        replay: &mut ReplayBuf,
    ) {
        if self.flushing {
            // Re-entrancy guard (§9 "Recursion in flush"): skipped events
            // stay in the queue to be re-examined next tick.
            return;
        }

        let mut best: Option<(usize, &ComboConfig)> = None;
        let mut any_candidate = false;
        for (idx, slot) in combos.iter().enumerate() {
            match self.match_status(slot, layer, now) {
                MatchStatus::Full => {
                    let longer = match best {
                        Some((best_idx, best_combo)) => {
                            slot.config.num_keys > best_combo.num_keys
                                || (slot.config.num_keys == best_combo.num_keys && idx < best_idx)
                        }
                        None => true,
                    };
                    if longer {
                        best = Some((idx, &slot.config));
                    }
                }
                MatchStatus::Candidate => any_candidate = true,
                MatchStatus::NoMatch => {}
            }
        }

        let max_term = combos
            .iter()
            .filter(|s| s.layer == layer)
            .map(|s| s.config.effective_term_ms())
            .max()
            .unwrap_or(he_config::DEFAULT_COMBO_TERM_MS) as u32;

        if let Some((_idx, combo)) = best {
            // Age out against the longest live term on this layer, not just
            // the winning combo's own term: a superset combo with a longer
            // term may still be a legitimate candidate, and committing early
            // to a shorter subset combo would preempt it.
            let oldest_aged_out = self
                .oldest_time()
                .map(|t| now.wrapping_sub(t) > max_term)
                .unwrap_or(false);
            if !any_candidate || oldest_aged_out {
                self.commit(combo, hid, deferred, replay);
            }
            return;
        }

        if !any_candidate {
            self.flush_all(replay);
        } else if let Some(oldest) = self.oldest_time() {
            if now.wrapping_sub(oldest) > max_term {
                if let Some(pos) = self.queue.iter().position(|e| e.time == oldest) {
                    let ev = self.queue.remove(pos);
                    if !ev.consumed {
                        let _ = replay.push(Replay {
                            key: ev.key,
                            time: ev.time,
                        });
                    }
                }
            }
        }
    }

    fn commit<const N: usize>(
        &mut self,
        combo: &ComboConfig,
        hid: &mut impl HidSink,
        deferred: &mut DeferredActionQueue<N>,
        replay: &mut ReplayBuf,
    ) {
        self.flushing = true;
        let required = combo.required_keys();
        for ev in self.queue.iter_mut() {
            if required.contains(&ev.key) {
                ev.consumed = true;
            }
        }
        hid.register(COMBO_VIRTUAL_KEY, combo.output_keycode);
        let _ = deferred.push_release(COMBO_VIRTUAL_KEY, combo.output_keycode);
        log::debug!("combo committed, output {:?}", combo.output_keycode);
        self.flush_all(replay);
        self.flushing = false;
    }

    fn flush_all(&mut self, replay: &mut ReplayBuf) {
        for ev in self.queue.iter() {
            if !ev.consumed {
                let _ = replay.push(Replay {
                    key: ev.key,
                    time: ev.time,
                });
            }
        }
        self.queue.clear();
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum MatchStatus {
    Full,
    Candidate,
    NoMatch,
}
