//! Demo mode - a scripted session against in-memory collaborators
//!
//! Stands in for the notification stack, keyguard and device services so the
//! shade can run headless: a heads-up arrives, gets dragged into the shade,
//! the shade settles open, then closes and runs its post-collapse work.
//! Finally the device locks and the bouncer comes and goes.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;

use crate::error::{EffectError, SinkError};
use crate::input::{Point, TouchEvent};
use crate::shade::collaborators::{
    ActiveEntry, DeviceEffects, EntryKey, EntrySource, PanelGeometry, SecurityState, StackLocation,
    VisibilitySink,
};
use crate::shade::visibility::NotificationVisibility;
use crate::shade::Collaborators;

/// Logical screen height of the demo device
pub const SCREEN_HEIGHT: f64 = 1280.0;
/// Height of one notification row
pub const ROW_HEIGHT: f64 = 128.0;

#[derive(Debug, Default)]
struct World {
    rows: Vec<(EntryKey, StackLocation)>,
    keyguard: bool,
    bouncer: bool,
    expanded: bool,
}

/// Shared in-memory stand-in for the rest of the shell
#[derive(Debug, Clone, Default)]
pub struct DemoWorld(Rc<RefCell<World>>);

impl DemoWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rows(&self, rows: &[(&str, StackLocation)]) {
        self.0.borrow_mut().rows = rows.iter().map(|(k, loc)| ((*k).into(), *loc)).collect();
    }

    pub fn set_keyguard(&self, showing: bool) {
        self.0.borrow_mut().keyguard = showing;
    }

    pub fn set_bouncer(&self, showing: bool) {
        self.0.borrow_mut().bouncer = showing;
    }

    pub fn set_expanded(&self, expanded: bool) {
        self.0.borrow_mut().expanded = expanded;
    }

    /// Collaborator set backed by this world
    pub fn collaborators(&self, sink: Option<Box<dyn VisibilitySink>>) -> Collaborators {
        Collaborators {
            geometry: Box::new(self.clone()),
            entries: Box::new(self.clone()),
            security: Box::new(self.clone()),
            sink,
            effects: Some(Box::new(LoggingEffects)),
        }
    }
}

impl PanelGeometry for DemoWorld {
    fn hit_test(&self, point: Point) -> Option<EntryKey> {
        if point.y < 0.0 {
            return None;
        }
        let index = (point.y / ROW_HEIGHT) as usize;
        self.0.borrow().rows.get(index).map(|(key, _)| key.clone())
    }

    fn is_shade_expanded(&self) -> bool {
        self.0.borrow().expanded
    }

    fn max_panel_height(&self) -> f64 {
        SCREEN_HEIGHT
    }

    fn row_height(&self, key: &EntryKey) -> Option<f64> {
        self.0
            .borrow()
            .rows
            .iter()
            .any(|(k, _)| k == key)
            .then_some(ROW_HEIGHT)
    }
}

impl EntrySource for DemoWorld {
    fn active_entries(&self) -> Vec<ActiveEntry> {
        self.0
            .borrow()
            .rows
            .iter()
            .map(|(key, location)| ActiveEntry {
                key: key.clone(),
                location: *location,
                height: ROW_HEIGHT,
            })
            .collect()
    }
}

impl SecurityState for DemoWorld {
    fn is_keyguard_showing(&self) -> bool {
        self.0.borrow().keyguard
    }

    fn is_bouncer_showing(&self) -> bool {
        self.0.borrow().bouncer
    }
}

/// Device effects that only log
#[derive(Debug, Clone, Copy)]
pub struct LoggingEffects;

impl DeviceEffects for LoggingEffects {
    fn clear_notification_effects(&mut self) -> Result<(), EffectError> {
        tracing::info!("effect: clear notification effects");
        Ok(())
    }

    fn acquire_gesture_wake_lock(&mut self) -> Result<(), EffectError> {
        tracing::info!("effect: acquire gesture wake lock");
        Ok(())
    }

    fn release_gesture_wake_lock(&mut self) -> Result<(), EffectError> {
        tracing::info!("effect: release gesture wake lock");
        Ok(())
    }

    fn reset_views(&mut self) -> Result<(), EffectError> {
        tracing::info!("effect: reset views");
        Ok(())
    }

    fn remove_remote_input(&mut self, key: &EntryKey) -> Result<(), EffectError> {
        tracing::info!(%key, "effect: remove remote input entry");
        Ok(())
    }
}

/// One visibility delta as written to the JSON stream
#[derive(Debug, Serialize)]
struct VisibilityReport<'a> {
    timestamp: String,
    newly_visible: &'a [NotificationVisibility],
    no_longer_visible: &'a [NotificationVisibility],
}

/// Writes each visibility delta as one JSON line
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> VisibilitySink for JsonLinesSink<W> {
    fn report_visibility_delta(
        &mut self,
        newly_visible: &[NotificationVisibility],
        no_longer_visible: &[NotificationVisibility],
    ) -> Result<(), SinkError> {
        let report = VisibilityReport {
            timestamp: chrono::Local::now().to_rfc3339(),
            newly_visible,
            no_longer_visible,
        };
        serde_json::to_writer(&mut self.out, &report)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Visibility sink that logs instead of writing JSON
#[derive(Debug, Default)]
pub struct LogSink;

impl VisibilitySink for LogSink {
    fn report_visibility_delta(
        &mut self,
        newly_visible: &[NotificationVisibility],
        no_longer_visible: &[NotificationVisibility],
    ) -> Result<(), SinkError> {
        let keys = |list: &[NotificationVisibility]| {
            list.iter().map(|v| v.key.as_str()).collect::<Vec<_>>().join(",")
        };
        tracing::info!(
            newly = %keys(newly_visible),
            no_longer = %keys(no_longer_visible),
            "visibility delta"
        );
        Ok(())
    }
}

/// Something the script does to the shade
#[derive(Debug, Clone)]
pub enum Action {
    ShowHeadsUp { key: &'static str, package: &'static str },
    Rows(Vec<(&'static str, StackLocation)>),
    Touch(TouchEvent),
    Expansion(f32),
    Fling { collapse: bool },
    ExpansionFinished(bool),
    PostCollapse(&'static str),
    Collapse,
    Keyguard(bool),
    Bouncer(bool),
}

/// An action and when it fires, relative to the start of the run
#[derive(Debug, Clone)]
pub struct Step {
    pub at: Duration,
    pub action: Action,
}

/// Time-ordered list of steps
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<Step>,
    next: usize,
}

impl Script {
    pub fn new(mut steps: Vec<Step>) -> Self {
        steps.sort_by_key(|s| s.at);
        Self { steps, next: 0 }
    }

    /// Steps due at `elapsed`, in order; each is returned once
    pub fn due(&mut self, elapsed: Duration) -> Vec<Action> {
        let mut due = Vec::new();
        while let Some(step) = self.steps.get(self.next) {
            if step.at > elapsed {
                break;
            }
            due.push(step.action.clone());
            self.next += 1;
        }
        due
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.steps.len()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// A heads-up is dragged into the shade, the shade settles open, then
    /// closes and the queued action runs. The device then locks and the
    /// bouncer shows briefly.
    pub fn heads_up_drag() -> Self {
        use Action::*;
        use StackLocation::*;

        const HUN: &str = "0|org.flick.messages|42";
        const OLDER: &str = "0|org.flick.mail|7";
        let ms = Duration::from_millis;
        let touch = |y: f64| TouchEvent::Motion { slot: 0, position: Point::new(360.0, y) };

        Self::new(vec![
            Step { at: ms(0), action: Rows(vec![(HUN, FirstHeadsUp), (OLDER, Gone)]) },
            Step { at: ms(0), action: ShowHeadsUp { key: HUN, package: "org.flick.messages" } },
            Step { at: ms(400), action: Touch(TouchEvent::Down { slot: 0, position: Point::new(360.0, 60.0) }) },
            Step { at: ms(416), action: Touch(touch(70.0)) },
            Step { at: ms(432), action: Touch(touch(110.0)) },
            Step { at: ms(448), action: Rows(vec![(HUN, MainArea), (OLDER, BottomStackPeeking)]) },
            Step { at: ms(448), action: Expansion(0.3) },
            Step { at: ms(480), action: Touch(touch(400.0)) },
            Step { at: ms(480), action: Expansion(0.55) },
            Step { at: ms(512), action: Touch(touch(700.0)) },
            Step { at: ms(512), action: Rows(vec![(HUN, MainArea), (OLDER, MainArea)]) },
            Step { at: ms(512), action: Expansion(0.8) },
            Step { at: ms(528), action: Touch(TouchEvent::Up { slot: 0 }) },
            Step { at: ms(528), action: Fling { collapse: false } },
            Step { at: ms(700), action: ExpansionFinished(true) },
            Step { at: ms(1200), action: PostCollapse("open conversation") },
            Step { at: ms(1400), action: Collapse },
            Step { at: ms(1400), action: Rows(vec![(HUN, Gone), (OLDER, Gone)]) },
            Step { at: ms(2000), action: Expansion(0.0) },
            Step { at: ms(2300), action: Keyguard(true) },
            Step { at: ms(2500), action: Bouncer(true) },
            Step { at: ms(2900), action: Bouncer(false) },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_releases_steps_in_order() {
        let mut script = Script::heads_up_drag();
        let total = script.len();
        assert!(!script.is_empty());

        let first = script.due(Duration::ZERO);
        assert_eq!(first.len(), 2);
        assert!(script.due(Duration::from_millis(100)).is_empty());

        let rest = script.due(Duration::from_secs(10));
        assert_eq!(first.len() + rest.len(), total);
        assert!(script.is_finished());
    }

    #[test]
    fn test_world_hit_test_by_row() {
        let world = DemoWorld::new();
        world.set_rows(&[("a", StackLocation::MainArea), ("b", StackLocation::MainArea)]);
        assert_eq!(world.hit_test(Point::new(10.0, 10.0)), Some("a".into()));
        assert_eq!(world.hit_test(Point::new(10.0, ROW_HEIGHT + 1.0)), Some("b".into()));
        assert_eq!(world.hit_test(Point::new(10.0, 3.0 * ROW_HEIGHT)), None);
        assert_eq!(world.row_height(&"a".into()), Some(ROW_HEIGHT));
        assert_eq!(world.row_height(&"zz".into()), None);
    }

    #[test]
    fn test_world_reports_security_state() {
        let world = DemoWorld::new();
        assert!(!world.is_keyguard_showing());
        world.set_keyguard(true);
        world.set_bouncer(true);
        assert!(world.is_keyguard_showing());
        assert!(world.is_bouncer_showing());
    }

    #[test]
    fn test_json_lines_sink_writes_one_line_per_delta() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let newly = [NotificationVisibility::new("a".into(), 0, true)];
        sink.report_visibility_delta(&newly, &[]).unwrap();
        sink.report_visibility_delta(&[], &[NotificationVisibility::new("a".into(), 0, false)])
            .unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["newly_visible"][0]["key"], "a");
        assert_eq!(first["newly_visible"][0]["visible"], true);
        assert!(first["no_longer_visible"].as_array().unwrap().is_empty());
        assert!(first["timestamp"].is_string());
    }
}
