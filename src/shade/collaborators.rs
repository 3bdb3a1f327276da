//! Interfaces to the parts of the shell the shade does not own
//!
//! The notification stack, the panel view, keyguard and the notification
//! service are all outside this crate. They hand the shade data through these
//! traits and receive its commands the same way.

use std::fmt;

use serde::Serialize;

use crate::error::{EffectError, SinkError};
use crate::input::Point;

use super::visibility::NotificationVisibility;

/// Opaque notification key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntryKey(String);

impl EntryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for EntryKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Where a row currently sits in the notification stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackLocation {
    /// Top slot used by a pinned heads-up
    FirstHeadsUp,
    /// Scrolled away above the visible area
    HiddenTop,
    /// Regular on-screen list area
    MainArea,
    /// Peeking at the bottom of the stack
    BottomStackPeeking,
    /// Collapsed into the bottom stack
    BottomStackHidden,
    /// Not laid out
    Gone,
}

impl StackLocation {
    /// Locations where the user can actually see the row
    pub fn is_visible(self) -> bool {
        matches!(self, StackLocation::FirstHeadsUp | StackLocation::MainArea)
    }
}

/// A notification row as the entry source reports it
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEntry {
    pub key: EntryKey,
    pub location: StackLocation,
    /// Current laid-out height in logical pixels
    pub height: f64,
}

/// Ordered list of active notification entries
pub trait EntrySource {
    fn active_entries(&self) -> Vec<ActiveEntry>;
}

/// Geometry queries against the panel view
pub trait PanelGeometry {
    /// Notification row under the given point, if any
    fn hit_test(&self, point: Point) -> Option<EntryKey>;
    fn is_shade_expanded(&self) -> bool;
    fn max_panel_height(&self) -> f64;
    /// Current height of a row. `None` when the row is not laid out.
    fn row_height(&self, key: &EntryKey) -> Option<f64>;
}

/// Lock screen / security prompt state
pub trait SecurityState {
    fn is_keyguard_showing(&self) -> bool;
    fn is_bouncer_showing(&self) -> bool;
}

/// Receives "notification seen" deltas
pub trait VisibilitySink {
    fn report_visibility_delta(
        &mut self,
        newly_visible: &[NotificationVisibility],
        no_longer_visible: &[NotificationVisibility],
    ) -> Result<(), SinkError>;
}

/// Fire-and-forget device side effects
pub trait DeviceEffects {
    /// Stop LED, vibration and ringing for posted notifications
    fn clear_notification_effects(&mut self) -> Result<(), EffectError>;
    fn acquire_gesture_wake_lock(&mut self) -> Result<(), EffectError>;
    fn release_gesture_wake_lock(&mut self) -> Result<(), EffectError>;
    /// Put panel views back into their resting layout
    fn reset_views(&mut self) -> Result<(), EffectError>;
    /// Drop a notification that was only kept alive for an inline reply
    fn remove_remote_input(&mut self, key: &EntryKey) -> Result<(), EffectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_locations() {
        assert!(StackLocation::FirstHeadsUp.is_visible());
        assert!(StackLocation::MainArea.is_visible());
        assert!(!StackLocation::HiddenTop.is_visible());
        assert!(!StackLocation::BottomStackPeeking.is_visible());
        assert!(!StackLocation::Gone.is_visible());
    }

    #[test]
    fn test_entry_key_serializes_as_string() {
        let key = EntryKey::from("0|com.example|7");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"0|com.example|7\"");
        assert_eq!(key.to_string(), "0|com.example|7");
        assert_eq!(key.as_str(), "0|com.example|7");
    }
}
