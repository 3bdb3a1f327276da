//! Driver state - the shade plus everything feeding it, run on calloop

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;

use crate::demo::{Action, DemoWorld, Script};
use crate::input::{MotionAssembler, TouchEvent};
use crate::shade::scrim::ScrimLayer;
use crate::shade::Shade;

/// How often the frame timer fires
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// State shared with the event loop callbacks
pub struct ShadeState {
    pub shade: Shade,
    pub world: DemoWorld,
    pub script: Script,
    pub assembler: MotionAssembler,
    pub start_time: Instant,
    pub frames: u64,
    /// Stop after this many frames, 0 = run until the script is done
    pub max_frames: u64,
    pub running: bool,
}

impl ShadeState {
    pub fn new(shade: Shade, world: DemoWorld, script: Script, max_frames: u64) -> Self {
        Self {
            shade,
            world,
            script,
            assembler: MotionAssembler::new(),
            start_time: Instant::now(),
            frames: 0,
            max_frames,
            running: true,
        }
    }

    /// Feed a raw touch event through to the shade
    pub fn handle_touch(&mut self, event: &TouchEvent, now: Instant) {
        let Some(motion) = self.assembler.push(event) else {
            return;
        };
        let claimed = if self.shade.tracker().is_tracking_heads_up() {
            self.shade.on_touch(&motion, now)
        } else {
            self.shade.on_intercept_touch(&motion, now)
        };
        tracing::debug!(action = ?motion.action, claimed, "touch");
    }

    fn apply(&mut self, action: Action, now: Instant) {
        match action {
            Action::ShowHeadsUp { key, package } => {
                self.shade.show_heads_up(key.into(), package, now);
            }
            Action::Rows(rows) => {
                self.world.set_rows(&rows);
                self.shade.on_layout_changed(now);
            }
            Action::Touch(event) => self.handle_touch(&event, now),
            Action::Expansion(fraction) => self.shade.set_expansion_fraction(fraction, now),
            Action::Fling { collapse } => self.shade.fling(collapse, now),
            Action::ExpansionFinished(expanded) => self.shade.on_expansion_finished(expanded, now),
            Action::PostCollapse(label) => {
                self.shade
                    .add_post_collapse_action(move || tracing::info!(action = label, "post-collapse action ran"));
            }
            Action::Collapse => self.shade.collapse(now),
            Action::Keyguard(showing) => {
                self.world.set_keyguard(showing);
                self.shade.on_security_state_changed(now);
            }
            Action::Bouncer(showing) => {
                self.world.set_bouncer(showing);
                self.shade.on_security_state_changed(now);
            }
        }
        self.world.set_expanded(self.shade.state().is_open());
    }

    /// One frame: run due script steps, then the shade's frame boundary
    pub fn tick(&mut self, now: Instant) {
        for action in self.script.due(now.saturating_duration_since(self.start_time)) {
            self.apply(action, now);
        }
        let busy = self.shade.on_frame(now);
        self.frames += 1;

        if self.frames % 8 == 0 {
            tracing::debug!(
                frame = self.frames,
                state = ?self.shade.state(),
                behind = self.shade.current_alpha(ScrimLayer::Behind),
                in_front = self.shade.current_alpha(ScrimLayer::InFront),
                heads_up = self.shade.current_alpha(ScrimLayer::HeadsUp),
                "frame"
            );
        }

        let out_of_frames = self.max_frames != 0 && self.frames >= self.max_frames;
        if out_of_frames || (self.script.is_finished() && !busy) {
            tracing::info!(frames = self.frames, state = ?self.shade.state(), "demo finished");
            self.running = false;
        }
    }
}

/// Run the frame loop until the script is done
pub fn run(state: &mut ShadeState) -> Result<()> {
    let mut event_loop: EventLoop<ShadeState> =
        EventLoop::try_new().context("Failed to create event loop")?;

    // 60fps frame timer
    event_loop
        .handle()
        .insert_source(Timer::immediate(), |deadline, _, state: &mut ShadeState| {
            state.tick(deadline);
            TimeoutAction::ToDuration(FRAME_INTERVAL)
        })
        .map_err(|e| anyhow!("Failed to insert frame timer: {}", e.error))?;

    tracing::info!(steps = state.script.len(), "Entering event loop");
    while state.running {
        event_loop
            .dispatch(Some(FRAME_INTERVAL), state)
            .context("Failed to dispatch event loop")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShadeConfig;
    use crate::demo::LogSink;
    use crate::shade::PanelState;

    fn state(script: Script) -> ShadeState {
        let world = DemoWorld::new();
        let shade = Shade::new(ShadeConfig::default(), world.collaborators(Some(Box::new(LogSink))));
        ShadeState::new(shade, world, script, 0)
    }

    #[test]
    fn test_scripted_session_ends_locked() {
        let mut state = state(Script::heads_up_drag());
        let start = state.start_time;
        let mut now = start;
        let mut saw_expanded = false;
        let mut saw_bouncer_scrim = false;
        while state.running && now < start + Duration::from_secs(10) {
            state.tick(now);
            saw_expanded |= state.shade.state() == PanelState::Expanded;
            saw_bouncer_scrim |= state.shade.scrim().target_alpha(ScrimLayer::InFront) > 0.0;
            now += FRAME_INTERVAL;
        }
        assert!(saw_expanded);
        assert!(saw_bouncer_scrim);
        assert!(!state.running);
        assert_eq!(state.shade.state(), PanelState::Locked);
        assert_eq!(state.shade.current_alpha(ScrimLayer::InFront), 0.0);
        assert_eq!(state.shade.pending_post_collapse_actions(), 0);
        assert!(state.shade.heads_up().is_heads_up(&"0|org.flick.messages|42".into()));
        assert_eq!(state.shade.scrim().pinned_count(), 0);
    }

    #[test]
    fn test_frame_limit_stops_loop() {
        let mut state = state(Script::heads_up_drag());
        state.max_frames = 3;
        let now = state.start_time;
        for _ in 0..3 {
            state.tick(now);
        }
        assert!(!state.running);
    }
}
