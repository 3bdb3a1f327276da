//! Heads-up banner bookkeeping
//!
//! Tracks which notifications float as heads-up banners, which of those are
//! pinned above the status bar, which are on their way out, and which source
//! packages the user snoozed by flinging a banner away.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::collaborators::EntryKey;

/// Whether a heads-up floats above other content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Pinned,
    Unpinned,
}

/// A notification currently shown as a heads-up
#[derive(Debug, Clone)]
pub struct HeadsUpEntry {
    pub key: EntryKey,
    /// Source package, the unit of snoozing
    pub package: String,
    pub pin: PinState,
    /// The user expanded the banner in place
    pub expanded: bool,
    /// Removed but still animating away
    pub going_away: bool,
    pub shown_at: Instant,
}

impl HeadsUpEntry {
    pub fn is_pinned(&self) -> bool {
        self.pin == PinState::Pinned
    }
}

/// Pin changes, queued for whoever mirrors the pinned set (the scrim)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadsUpEvent {
    Pinned(EntryKey),
    Unpinned(EntryKey),
    Removed(EntryKey),
}

/// Registry of live heads-up entries
#[derive(Debug)]
pub struct HeadsUpRegistry {
    entries: Vec<HeadsUpEntry>,
    /// package -> snoozed until
    snoozed: HashMap<String, Instant>,
    snooze_length: Duration,
    tracking_heads_up: bool,
    events: Vec<HeadsUpEvent>,
}

impl HeadsUpRegistry {
    pub fn new(snooze_length: Duration) -> Self {
        Self {
            entries: Vec::new(),
            snoozed: HashMap::new(),
            snooze_length,
            tracking_heads_up: false,
            events: Vec::new(),
        }
    }

    /// Show a notification as a pinned heads-up.
    ///
    /// Returns false when the package is snoozed and nothing was shown.
    pub fn show(&mut self, key: EntryKey, package: &str, now: Instant) -> bool {
        if self.is_snoozed(package, now) {
            tracing::debug!(%key, package, "heads-up suppressed, package snoozed");
            return false;
        }

        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.shown_at = now;
            entry.going_away = false;
            if entry.pin == PinState::Unpinned {
                entry.pin = PinState::Pinned;
                self.events.push(HeadsUpEvent::Pinned(key));
            }
            return true;
        }

        tracing::info!(%key, package, "heads-up shown");
        self.entries.push(HeadsUpEntry {
            key: key.clone(),
            package: package.to_string(),
            pin: PinState::Pinned,
            expanded: false,
            going_away: false,
            shown_at: now,
        });
        self.events.push(HeadsUpEvent::Pinned(key));
        true
    }

    pub fn get(&self, key: &EntryKey) -> Option<&HeadsUpEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HeadsUpEntry> {
        self.entries.iter()
    }

    pub fn is_heads_up(&self, key: &EntryKey) -> bool {
        self.get(key).is_some()
    }

    pub fn is_pinned(&self, key: &EntryKey) -> bool {
        self.get(key).is_some_and(HeadsUpEntry::is_pinned)
    }

    pub fn pinned_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pinned()).count()
    }

    pub fn set_pinned(&mut self, key: &EntryKey, pinned: bool) {
        let Some(entry) = self.entries.iter_mut().find(|e| &e.key == key) else {
            return;
        };
        let pin = if pinned { PinState::Pinned } else { PinState::Unpinned };
        if entry.pin == pin {
            return;
        }
        entry.pin = pin;
        self.events.push(if pinned {
            HeadsUpEvent::Pinned(key.clone())
        } else {
            HeadsUpEvent::Unpinned(key.clone())
        });
    }

    pub fn set_expanded(&mut self, key: &EntryKey, expanded: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|e| &e.key == key) {
            entry.expanded = expanded;
        }
    }

    /// Unpin every banner, moving them into the shade. Returns how many changed.
    pub fn unpin_all(&mut self) -> usize {
        let mut count = 0;
        for entry in self.entries.iter_mut().filter(|e| e.is_pinned()) {
            entry.pin = PinState::Unpinned;
            self.events.push(HeadsUpEvent::Unpinned(entry.key.clone()));
            count += 1;
        }
        if count > 0 {
            tracing::debug!(count, "unpinned all heads-ups");
        }
        count
    }

    /// Start removing a banner. It stays listed (unpinned) until
    /// `finish_removal` so its exit animation can run.
    pub fn remove(&mut self, key: &EntryKey) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| &e.key == key) else {
            return false;
        };
        if entry.going_away {
            return false;
        }
        entry.going_away = true;
        if entry.is_pinned() {
            entry.pin = PinState::Unpinned;
            self.events.push(HeadsUpEvent::Unpinned(key.clone()));
        }
        true
    }

    /// Drop a banner for good. A banner that skipped `remove` (the
    /// notification was cancelled) is still pinned and gets unpinned first.
    pub fn finish_removal(&mut self, key: &EntryKey) {
        let Some(index) = self.entries.iter().position(|e| &e.key == key) else {
            return;
        };
        let entry = self.entries.remove(index);
        if entry.is_pinned() {
            self.events.push(HeadsUpEvent::Unpinned(entry.key.clone()));
        }
        self.events.push(HeadsUpEvent::Removed(entry.key));
    }

    /// Snooze the packages of every current banner
    pub fn snooze(&mut self, now: Instant) {
        let until = now + self.snooze_length;
        for entry in &self.entries {
            tracing::info!(package = %entry.package, "snoozing heads-ups");
            self.snoozed.insert(entry.package.clone(), until);
        }
    }

    pub fn is_snoozed(&self, package: &str, now: Instant) -> bool {
        self.snoozed.get(package).is_some_and(|until| now < *until)
    }

    pub fn set_tracking_heads_up(&mut self, tracking: bool) {
        self.tracking_heads_up = tracking;
    }

    pub fn is_tracking_heads_up(&self) -> bool {
        self.tracking_heads_up
    }

    pub fn drain_events(&mut self) -> Vec<HeadsUpEvent> {
        std::mem::take(&mut self.events)
    }
}
