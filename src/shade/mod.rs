//! Notification shade
//!
//! `Shade` owns the panel state machine and drives the other pieces:
//! - `heads_up`: which banners float and which are pinned
//! - `scrim`: alpha of the dimming layers around the panel
//! - `visibility`: which notifications the user actually saw
//! - `crate::input::gestures`: heads-up drags that pull the panel down
//!
//! Everything runs on one thread. Inputs mutate state and mark work as
//! pending; `on_frame` is the frame boundary where scrim targets are
//! recomputed and visibility passes run.

pub mod animation;
pub mod collaborators;
pub mod heads_up;
pub mod scrim;
pub mod visibility;

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::config::ShadeConfig;
use crate::error::EffectError;
use crate::input::{GestureIntent, HeadsUpTouchTracker, MotionEvent, RecentlyShown, TouchContext};

use collaborators::{DeviceEffects, EntryKey, EntrySource, PanelGeometry, SecurityState, VisibilitySink};
use heads_up::{HeadsUpEvent, HeadsUpRegistry};
use scrim::{ScrimBlender, ScrimInputs, ScrimLayer};
use visibility::VisibilityReporter;

/// Length of the scrim animation when the lock screen opens into the shade
pub const GO_TO_FULL_SHADE_DURATION: Duration = Duration::from_millis(448);

/// Coarse panel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Collapsed,
    /// Being dragged or animating open
    Expanding,
    Expanded,
    /// Lock screen, shade closed
    Locked,
    /// Lock screen with the shade pulled down
    LockedShade,
}

impl PanelState {
    pub fn is_locked(self) -> bool {
        matches!(self, PanelState::Locked | PanelState::LockedShade)
    }

    /// Panel covers (part of) the screen
    pub fn is_open(self) -> bool {
        matches!(self, PanelState::Expanding | PanelState::Expanded | PanelState::LockedShade)
    }
}

/// Everything the shade talks to but does not own
pub struct Collaborators {
    pub geometry: Box<dyn PanelGeometry>,
    pub entries: Box<dyn EntrySource>,
    pub security: Box<dyn SecurityState>,
    pub sink: Option<Box<dyn VisibilitySink>>,
    pub effects: Option<Box<dyn DeviceEffects>>,
}

/// Deferred work that runs once the panel has closed
pub type PostCollapseAction = Box<dyn FnOnce()>;

/// The notification shade state machine
pub struct Shade {
    config: ShadeConfig,
    state: PanelState,
    panels_enabled: bool,
    expansion: f32,
    heads_up: HeadsUpRegistry,
    tracker: HeadsUpTouchTracker,
    scrim: ScrimBlender,
    reporter: VisibilityReporter,
    collaborators: Collaborators,
    post_collapse: Vec<PostCollapseAction>,
    /// Entries kept alive only for an inline reply
    remote_input_retained: BTreeSet<EntryKey>,
    launch_deadline: Option<Instant>,
    visible_to_user: bool,
}

impl Shade {
    pub fn new(config: ShadeConfig, collaborators: Collaborators) -> Self {
        let tracker = HeadsUpTouchTracker::new(
            config.gestures.touch_slop,
            Box::new(RecentlyShown {
                window: config.swallow_click_window(),
            }),
        );
        let state = if collaborators.security.is_keyguard_showing() {
            PanelState::Locked
        } else {
            PanelState::Collapsed
        };

        let mut shade = Self {
            heads_up: HeadsUpRegistry::new(config.snooze_length()),
            tracker,
            scrim: ScrimBlender::new(config.scrim.clone(), config.animation_duration()),
            reporter: VisibilityReporter::new(config.visibility_min_interval()),
            config,
            state,
            panels_enabled: true,
            expansion: 0.0,
            collaborators,
            post_collapse: Vec::new(),
            remote_input_retained: BTreeSet::new(),
            launch_deadline: None,
            visible_to_user: false,
        };
        shade.push_scrim_inputs();
        tracing::info!(state = ?shade.state, "shade created");
        shade
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn expansion(&self) -> f32 {
        self.expansion
    }

    pub fn config(&self) -> &ShadeConfig {
        &self.config
    }

    pub fn heads_up(&self) -> &HeadsUpRegistry {
        &self.heads_up
    }

    pub fn scrim(&self) -> &ScrimBlender {
        &self.scrim
    }

    /// For keyguard-driven scrim work (fade-out, wake-and-unlock)
    pub fn scrim_mut(&mut self) -> &mut ScrimBlender {
        &mut self.scrim
    }

    pub fn reporter(&self) -> &VisibilityReporter {
        &self.reporter
    }

    pub fn tracker(&self) -> &HeadsUpTouchTracker {
        &self.tracker
    }

    pub fn current_alpha(&self, layer: ScrimLayer) -> f32 {
        self.scrim.current_alpha(layer)
    }

    pub fn is_shade_empty(&self) -> bool {
        self.collaborators.entries.active_entries().is_empty()
    }

    pub fn is_visible_to_user(&self) -> bool {
        self.visible_to_user
    }

    pub fn set_panels_enabled(&mut self, enabled: bool) {
        if self.panels_enabled != enabled {
            tracing::info!(enabled, "panels enabled changed");
            self.panels_enabled = enabled;
        }
    }

    // --- heads-up lifecycle ---------------------------------------------

    /// A notification wants to float as a heads-up
    pub fn show_heads_up(&mut self, key: EntryKey, package: &str, now: Instant) -> bool {
        let shown = self.heads_up.show(key, package, now);
        self.dispatch_heads_up_events();
        shown
    }

    pub fn remove_heads_up(&mut self, key: &EntryKey) {
        self.heads_up.remove(key);
        self.dispatch_heads_up_events();
    }

    /// The exit animation of a removed banner finished
    pub fn finish_heads_up_removal(&mut self, key: &EntryKey) {
        self.heads_up.finish_removal(key);
        self.dispatch_heads_up_events();
    }

    /// How far a pinned banner is dragged sideways (0..=1)
    pub fn set_heads_up_drag_amount(&mut self, key: EntryKey, amount: f32) {
        self.scrim.set_dragged_heads_up_amount(key, amount);
    }

    fn dispatch_heads_up_events(&mut self) {
        for event in self.heads_up.drain_events() {
            match event {
                HeadsUpEvent::Pinned(_) => self.scrim.on_heads_up_pinned(),
                HeadsUpEvent::Unpinned(key) => self.scrim.on_heads_up_unpinned(&key),
                HeadsUpEvent::Removed(key) => tracing::debug!(%key, "heads-up gone"),
            }
        }
    }

    /// Keep an entry alive while the user types an inline reply
    pub fn retain_for_remote_input(&mut self, key: EntryKey) {
        self.remote_input_retained.insert(key);
    }

    pub fn remote_input_retained(&self) -> impl Iterator<Item = &EntryKey> {
        self.remote_input_retained.iter()
    }

    // --- transitions ----------------------------------------------------

    /// Open the panel programmatically
    pub fn expand(&mut self, now: Instant) {
        if !self.panels_enabled {
            tracing::debug!("expand ignored, panels disabled");
            return;
        }
        match self.state {
            PanelState::Collapsed => {
                self.scrim.request_animated();
                self.expansion = 1.0;
                self.transition(PanelState::Expanding, now);
                self.clear_notification_effects();
            }
            PanelState::Locked => self.go_to_locked_shade(now),
            _ => {}
        }
    }

    /// A heads-up drag started. The panel opens from the dragged row.
    pub fn start_expand_from_heads_up(&mut self, height: f64, min_fraction: f64, now: Instant) {
        if !self.panels_enabled {
            tracing::debug!("heads-up expand ignored, panels disabled");
            return;
        }
        tracing::debug!(height, min_fraction, "expanding from heads-up");
        self.scrim.on_tracking_started();
        self.expansion = (min_fraction as f32).clamp(0.0, 1.0);
        match self.state {
            PanelState::Collapsed | PanelState::Expanding => self.transition(PanelState::Expanding, now),
            PanelState::Locked => self.transition(PanelState::LockedShade, now),
            PanelState::Expanded | PanelState::LockedShade => self.push_scrim_inputs(),
        }
    }

    /// The panel view moved (drag or settle animation)
    pub fn set_expansion_fraction(&mut self, fraction: f32, now: Instant) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.expansion = fraction;
        if self.state == PanelState::Collapsed && fraction > 0.0 && self.panels_enabled {
            self.transition(PanelState::Expanding, now);
            self.clear_notification_effects();
        } else {
            self.scrim.set_panel_expansion(fraction);
        }
    }

    /// The open/close animation of the panel settled
    pub fn on_expansion_finished(&mut self, expanded: bool, now: Instant) {
        self.scrim.on_expanding_finished();
        if !expanded {
            self.collapse(now);
            return;
        }
        if self.state == PanelState::Expanding {
            self.transition(PanelState::Expanded, now);
        }
    }

    /// Close the panel
    pub fn collapse(&mut self, now: Instant) {
        self.expansion = 0.0;
        match self.state {
            PanelState::Expanding | PanelState::Expanded => {
                self.scrim.request_animated();
                self.transition(PanelState::Collapsed, now);
            }
            PanelState::LockedShade => {
                self.scrim.request_animated();
                self.transition(PanelState::Locked, now);
            }
            PanelState::Collapsed | PanelState::Locked => self.push_scrim_inputs(),
        }
    }

    /// The user let go with a fling
    pub fn fling(&mut self, collapse: bool, now: Instant) {
        self.tracker.notify_fling(collapse);
        self.process_intents(now);
        if collapse {
            self.collapse(now);
        } else {
            self.on_expansion_finished(true, now);
        }
    }

    /// The shade window went away; nothing is visible any more
    pub fn on_window_hidden(&mut self, now: Instant) {
        tracing::debug!(state = ?self.state, "shade window hidden");
        if matches!(self.state, PanelState::Expanding | PanelState::Expanded) {
            // Nothing is on screen to animate.
            self.expansion = 0.0;
            self.transition_with(PanelState::Collapsed, false, now);
        }
        self.set_visible_to_user(false, now);
    }

    /// Keyguard or bouncer visibility changed
    pub fn on_security_state_changed(&mut self, now: Instant) {
        let locked = self.collaborators.security.is_keyguard_showing();
        let next = match (self.state, locked) {
            (PanelState::Collapsed, true) => PanelState::Locked,
            (PanelState::Expanding | PanelState::Expanded, true) => {
                self.expansion = 0.0;
                PanelState::Locked
            }
            (PanelState::Locked, false) => PanelState::Collapsed,
            (PanelState::LockedShade, false) => PanelState::Expanded,
            (state, _) => state,
        };
        if next != self.state {
            self.transition(next, now);
        } else {
            self.push_scrim_inputs();
        }
    }

    /// From the lock screen, pull the shade fully open
    pub fn go_to_locked_shade(&mut self, now: Instant) {
        if self.state != PanelState::Locked || !self.panels_enabled {
            return;
        }
        self.expansion = 1.0;
        self.scrim.animate_going_to_full_shade(Duration::ZERO, GO_TO_FULL_SHADE_DURATION);
        self.transition(PanelState::LockedShade, now);
    }

    /// Run `action` after the panel has closed
    pub fn add_post_collapse_action(&mut self, action: impl FnOnce() + 'static) {
        self.post_collapse.push(Box::new(action));
    }

    pub fn pending_post_collapse_actions(&self) -> usize {
        self.post_collapse.len()
    }

    fn transition(&mut self, next: PanelState, now: Instant) {
        self.transition_with(next, true, now);
    }

    /// Move to `next`. With `animate`, a fraction change the state forces
    /// animates the scrims unless a keyguard fade-out or force-hide owns them.
    fn transition_with(&mut self, next: PanelState, animate: bool, now: Instant) {
        let prev = self.state;
        // Callers may already have moved `expansion`; compare against what
        // the scrim last saw.
        let shown_fraction = self.scrim.inputs().fraction;
        if prev != next {
            tracing::info!(from = ?prev, to = ?next, "panel state");
            self.state = next;
        }

        match next {
            PanelState::Expanded | PanelState::LockedShade => self.expansion = 1.0,
            PanelState::Collapsed | PanelState::Locked => self.expansion = 0.0,
            PanelState::Expanding => {}
        }

        // While expanding the fraction follows the finger.
        if animate
            && next != PanelState::Expanding
            && self.expansion != shown_fraction
            && !self.scrim_override_active()
        {
            self.scrim.request_animated();
        }

        if next.is_locked() && !prev.is_locked() {
            self.remove_remote_input_entries();
        }

        // Unlocked expansion clears effects at the call site, the drag
        // through its gesture intent.
        if next == PanelState::LockedShade && prev != PanelState::LockedShade {
            self.clear_notification_effects();
        }

        if prev.is_open() && !next.is_open() {
            self.on_panel_closed();
            self.set_visible_to_user(false, now);
        }
        if next.is_open() && !prev.is_open() {
            self.set_visible_to_user(true, now);
        }

        self.push_scrim_inputs();
    }

    fn on_panel_closed(&mut self) {
        self.scrim.on_expanding_finished();
        self.remove_remote_input_entries();
        self.run_post_collapse_actions();
    }

    fn run_post_collapse_actions(&mut self) {
        // Actions queued while these run wait for the next collapse.
        let actions = std::mem::take(&mut self.post_collapse);
        if !actions.is_empty() {
            tracing::debug!(count = actions.len(), "running post-collapse actions");
        }
        for action in actions {
            action();
        }
    }

    fn scrim_override_active(&self) -> bool {
        self.scrim.is_keyguard_fading_out() || self.scrim.inputs().force_hide
    }

    fn push_scrim_inputs(&mut self) {
        let inputs = ScrimInputs {
            fraction: self.expansion,
            locked: self.state.is_locked(),
            bouncer_showing: self.collaborators.security.is_bouncer_showing(),
            force_hide: self.scrim.inputs().force_hide,
        };
        self.scrim.set_state(inputs);
    }

    // --- touch ----------------------------------------------------------

    /// Touch seen before the panel's own handling. True claims the sequence.
    pub fn on_intercept_touch(&mut self, event: &MotionEvent, now: Instant) -> bool {
        let claimed = {
            let mut ctx = TouchContext {
                geometry: &*self.collaborators.geometry,
                heads_up: &mut self.heads_up,
                now,
            };
            self.tracker.on_intercept_touch(event, &mut ctx)
        };
        self.process_intents(now);
        claimed
    }

    /// Touch delivered after the sequence was claimed
    pub fn on_touch(&mut self, event: &MotionEvent, now: Instant) -> bool {
        let handled = {
            let mut ctx = TouchContext {
                geometry: &*self.collaborators.geometry,
                heads_up: &mut self.heads_up,
                now,
            };
            self.tracker.on_touch(event, &mut ctx)
        };
        self.process_intents(now);
        handled
    }

    fn process_intents(&mut self, now: Instant) {
        for intent in self.tracker.drain_intents() {
            match intent {
                GestureIntent::StartExpand {
                    initial_height,
                    min_fraction,
                    ..
                } => self.start_expand_from_heads_up(initial_height, min_fraction, now),
                GestureIntent::TrackingHeadsUp(tracking) => {
                    tracing::debug!(tracking, "heads-up tracking");
                }
                GestureIntent::ClearNotificationEffects => {
                    if !self.state.is_locked() {
                        self.clear_notification_effects();
                    }
                }
                GestureIntent::Snooze => self.heads_up.snooze(now),
            }
        }
        self.dispatch_heads_up_events();
    }

    // --- visibility -----------------------------------------------------

    /// Layout of the notification stack changed
    pub fn on_layout_changed(&mut self, now: Instant) {
        self.reporter.on_child_locations_changed(now);
    }

    /// The panel became visible or invisible to the user
    pub fn set_visible_to_user(&mut self, visible: bool, now: Instant) {
        if self.visible_to_user == visible {
            return;
        }
        self.visible_to_user = visible;
        tracing::debug!(visible, "visible to user");
        if visible {
            self.reporter.start(now);
        } else {
            let sink: Option<&mut dyn VisibilitySink> = match self.collaborators.sink.as_mut() {
                Some(sink) => Some(&mut **sink),
                None => None,
            };
            self.reporter.stop(sink);
        }
    }

    // --- launch transition ----------------------------------------------

    /// An app launch from the lock screen started
    pub fn start_launch_transition(&mut self, now: Instant) {
        let deadline = now + self.config.launch_transition_timeout();
        tracing::debug!("launch transition started");
        self.launch_deadline = Some(deadline);
        self.effect("acquire wake lock", |e| e.acquire_gesture_wake_lock());
    }

    pub fn on_launch_transition_finished(&mut self) {
        if self.launch_deadline.take().is_some() {
            tracing::debug!("launch transition finished");
            self.effect("release wake lock", |e| e.release_gesture_wake_lock());
        }
    }

    pub fn is_launch_transition_running(&self) -> bool {
        self.launch_deadline.is_some()
    }

    fn check_launch_timeout(&mut self, now: Instant) {
        let Some(deadline) = self.launch_deadline else {
            return;
        };
        if now < deadline {
            return;
        }
        tracing::warn!("Launch transition timed out, resetting views");
        self.launch_deadline = None;
        self.effect("reset views", |e| e.reset_views());
        self.effect("release wake lock", |e| e.release_gesture_wake_lock());
    }

    // --- frame ----------------------------------------------------------

    /// Frame boundary. Returns true while more frames are needed.
    pub fn on_frame(&mut self, now: Instant) -> bool {
        self.check_launch_timeout(now);
        self.dispatch_heads_up_events();
        let animating = self.scrim.on_frame(now);

        let sink: Option<&mut dyn VisibilitySink> = match self.collaborators.sink.as_mut() {
            Some(sink) => Some(&mut **sink),
            None => None,
        };
        self.reporter.run_if_due(now, &*self.collaborators.entries, sink);

        animating || self.reporter.next_deadline().is_some() || self.launch_deadline.is_some()
    }

    /// Earliest time `on_frame` has timed work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.reporter.next_deadline(), self.launch_deadline]
            .into_iter()
            .flatten()
            .min()
    }

    // --- effects --------------------------------------------------------

    fn clear_notification_effects(&mut self) {
        self.effect("clear notification effects", |e| e.clear_notification_effects());
    }

    fn remove_remote_input_entries(&mut self) {
        let keys = std::mem::take(&mut self.remote_input_retained);
        for key in keys {
            tracing::debug!(%key, "dropping remote input entry");
            self.effect("remove remote input", |e| e.remove_remote_input(&key));
        }
    }

    fn effect(&mut self, what: &str, f: impl FnOnce(&mut dyn DeviceEffects) -> Result<(), EffectError>) {
        let Some(effects) = self.collaborators.effects.as_mut() else {
            tracing::debug!("no device effects, skipping {}", what);
            return;
        };
        if let Err(e) = f(&mut **effects) {
            tracing::warn!("Failed to {}: {}", what, e);
        }
    }
}
