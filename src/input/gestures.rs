//! Heads-up drag recognition
//!
//! Decides whether a touch sequence that starts on a pinned heads-up banner
//! turns into a vertical drag that pulls the banner (and the whole shade)
//! down. Everything else passes through untouched.
//!
//! The tracker does not call into the shade directly. It queues
//! `GestureIntent`s which the shade drains after each event.

use std::time::{Duration, Instant};

use crate::shade::collaborators::{EntryKey, PanelGeometry};
use crate::shade::heads_up::{HeadsUpEntry, HeadsUpRegistry};

use super::touch::{MotionEvent, Point, TouchAction};

/// High-level result of a recognized gesture
#[derive(Debug, Clone, PartialEq)]
pub enum GestureIntent {
    /// Start expanding the shade from a dragged banner
    StartExpand {
        position: Point,
        /// Height of the dragged row, the expansion starts from here
        initial_height: f64,
        /// Scrim floor while the drag is in progress
        min_fraction: f64,
    },
    /// Heads-up tracking switched on or off
    TrackingHeadsUp(bool),
    /// Stop LED/sound/vibration for the notifications now in view
    ClearNotificationEffects,
    /// The user flung a dragged banner back up
    Snooze,
}

/// Decides whether a tap on a fresh banner should be ignored
pub trait SwallowClickPolicy {
    fn should_swallow_click(&self, entry: &HeadsUpEntry, now: Instant) -> bool;
}

/// Swallow taps that land within `window` of the banner appearing
#[derive(Debug, Clone, Copy)]
pub struct RecentlyShown {
    pub window: Duration,
}

impl SwallowClickPolicy for RecentlyShown {
    fn should_swallow_click(&self, entry: &HeadsUpEntry, now: Instant) -> bool {
        now < entry.shown_at + self.window
    }
}

impl<F> SwallowClickPolicy for F
where
    F: Fn(&HeadsUpEntry, Instant) -> bool,
{
    fn should_swallow_click(&self, entry: &HeadsUpEntry, now: Instant) -> bool {
        self(entry, now)
    }
}

/// What the tracker needs from the rest of the shade for one event
pub struct TouchContext<'a> {
    pub geometry: &'a dyn PanelGeometry,
    pub heads_up: &'a mut HeadsUpRegistry,
    pub now: Instant,
}

/// State of the current touch sequence
#[derive(Debug, Clone, PartialEq)]
pub struct GestureSession {
    pub tracking_pointer: i32,
    /// Reference point; moves when a drag starts or the pointer changes
    pub initial: Point,
    pub touching_heads_up: bool,
    /// Banner under the initial touch
    pub picked: Option<EntryKey>,
}

/// Recognizes drags that start on a pinned heads-up
pub struct HeadsUpTouchTracker {
    touch_slop: f64,
    session: Option<GestureSession>,
    tracking_heads_up: bool,
    /// Set when the drag went upward; a collapsing fling then snoozes.
    /// Outlives the session because the fling is reported after the up event.
    collapse_snoozes: bool,
    swallow_click: Box<dyn SwallowClickPolicy>,
    intents: Vec<GestureIntent>,
}

impl HeadsUpTouchTracker {
    pub fn new(touch_slop: f64, swallow_click: Box<dyn SwallowClickPolicy>) -> Self {
        Self {
            touch_slop,
            session: None,
            tracking_heads_up: false,
            collapse_snoozes: false,
            swallow_click,
            intents: Vec::new(),
        }
    }

    pub fn is_tracking_heads_up(&self) -> bool {
        self.tracking_heads_up
    }

    pub fn is_touching_heads_up(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.touching_heads_up)
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn drain_intents(&mut self) -> Vec<GestureIntent> {
        std::mem::take(&mut self.intents)
    }

    /// Returns true when this tracker takes over the touch sequence
    pub fn on_intercept_touch(&mut self, event: &MotionEvent, ctx: &mut TouchContext<'_>) -> bool {
        if self.tracking_heads_up {
            return self.on_touch(event, ctx);
        }
        if !self.is_touching_heads_up() && event.action != TouchAction::Down {
            return false;
        }
        debug_assert!(!event.pointers.is_empty(), "motion event without pointers");

        // Fall back to the first pointer when the tracked one vanished.
        let tracked = self.session.as_ref().map(|s| s.tracking_pointer);
        let index = tracked
            .and_then(|id| event.find_pointer_index(id))
            .unwrap_or(0);
        let (Some(pointer_id), Some(pos)) = (event.pointer_id(index), event.position(index)) else {
            return false;
        };
        if let Some(session) = self.session.as_mut() {
            session.tracking_pointer = pointer_id;
        }

        match event.action {
            TouchAction::Down => {
                self.set_tracking_heads_up(false, ctx);
                let picked = ctx.geometry.hit_test(pos).filter(|key| {
                    !ctx.geometry.is_shade_expanded()
                        && ctx
                            .heads_up
                            .get(key)
                            .is_some_and(|e| e.is_pinned() && !e.expanded)
                });
                tracing::debug!(x = pos.x, y = pos.y, picked = ?picked, "touch down");
                self.session = Some(GestureSession {
                    tracking_pointer: pointer_id,
                    initial: pos,
                    touching_heads_up: picked.is_some(),
                    picked,
                });
            }

            TouchAction::PointerUp { index: up_index } => {
                let Some(up_id) = event.pointer_id(up_index) else {
                    return false;
                };
                if let Some(session) = self.session.as_mut() {
                    if session.tracking_pointer == up_id {
                        // Gesture continues with another finger.
                        let new_index = if event.pointer_id(0) != Some(up_id) { 0 } else { 1 };
                        if let (Some(id), Some(p)) =
                            (event.pointer_id(new_index), event.position(new_index))
                        {
                            session.tracking_pointer = id;
                            session.initial = p;
                        }
                    }
                }
            }

            TouchAction::Move => {
                let Some(session) = self.session.as_mut() else {
                    return false;
                };
                let h = pos.y - session.initial.y;
                let w = pos.x - session.initial.x;
                if session.touching_heads_up && h.abs() > self.touch_slop && h.abs() > w.abs() {
                    session.initial = pos;
                    let picked = session.picked.clone();
                    self.collapse_snoozes = h < 0.0;
                    self.set_tracking_heads_up(true, ctx);
                    self.start_expand(pos, picked.as_ref(), ctx);
                    return true;
                }
            }

            TouchAction::Up | TouchAction::Cancel => {
                let picked = self
                    .session
                    .as_ref()
                    .filter(|s| s.touching_heads_up)
                    .and_then(|s| s.picked.clone());
                if let Some(key) = picked {
                    // A banner that just appeared should not be opened by a tap
                    // meant for whatever was under it.
                    let swallow = ctx
                        .heads_up
                        .get(&key)
                        .is_some_and(|e| self.swallow_click.should_swallow_click(e, ctx.now));
                    if swallow {
                        tracing::debug!(%key, "swallowing click on fresh heads-up");
                        self.end_motion();
                        return true;
                    }
                }
                self.end_motion();
            }

            TouchAction::PointerDown { .. } => {}
        }
        false
    }

    /// Touch events after the tracker claimed the sequence
    pub fn on_touch(&mut self, event: &MotionEvent, ctx: &mut TouchContext<'_>) -> bool {
        if !self.tracking_heads_up {
            return false;
        }
        if matches!(event.action, TouchAction::Up | TouchAction::Cancel) {
            self.end_motion();
            self.set_tracking_heads_up(false, ctx);
        }
        true
    }

    /// The panel finished a fling that started from a heads-up drag
    pub fn notify_fling(&mut self, collapse: bool) {
        if collapse && self.collapse_snoozes {
            self.intents.push(GestureIntent::Snooze);
        }
        self.collapse_snoozes = false;
    }

    fn start_expand(&mut self, pos: Point, picked: Option<&EntryKey>, ctx: &mut TouchContext<'_>) {
        let initial_height = picked
            .and_then(|key| ctx.geometry.row_height(key))
            .unwrap_or(0.0);
        let max_height = ctx.geometry.max_panel_height();
        let min_fraction = if max_height > 0.0 {
            (initial_height / max_height).clamp(0.0, 1.0)
        } else {
            0.0
        };
        tracing::info!(initial_height, min_fraction, "heads-up drag started");
        self.intents.push(GestureIntent::StartExpand {
            position: pos,
            initial_height,
            min_fraction,
        });
        // After the expansion request, or the banner flickers for a frame.
        ctx.heads_up.unpin_all();
        self.intents.push(GestureIntent::ClearNotificationEffects);
    }

    fn set_tracking_heads_up(&mut self, tracking: bool, ctx: &mut TouchContext<'_>) {
        ctx.heads_up.set_tracking_heads_up(tracking);
        if self.tracking_heads_up != tracking {
            self.tracking_heads_up = tracking;
            self.intents.push(GestureIntent::TrackingHeadsUp(tracking));
        }
    }

    fn end_motion(&mut self) {
        self.session = None;
    }
}
