//! Scrim blending
//!
//! Three translucent layers dim content around the shade:
//! - `Behind`: under the notification panel, follows expansion
//! - `InFront`: over everything while the bouncer (security prompt) shows
//! - `HeadsUp`: a short gradient under pinned heads-up banners
//!
//! Inputs only mark an update as pending. The actual target computation runs
//! once per frame in `on_frame`, after animations were advanced to the frame
//! time and before anyone reads alpha for drawing.

use std::time::{Duration, Instant};

use crate::config::ScrimSettings;

use super::animation::{AlphaAnimation, Easing, KEYGUARD_FADE_OUT};
use super::collaborators::EntryKey;

/// A scrim layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrimLayer {
    Behind,
    InFront,
    HeadsUp,
}

impl ScrimLayer {
    pub const ALL: [ScrimLayer; 3] = [ScrimLayer::Behind, ScrimLayer::InFront, ScrimLayer::HeadsUp];

    fn index(self) -> usize {
        match self {
            ScrimLayer::Behind => 0,
            ScrimLayer::InFront => 1,
            ScrimLayer::HeadsUp => 2,
        }
    }
}

/// Per-layer alpha state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerState {
    /// Alpha as drawn this frame
    pub current: f32,
    pub target: f32,
    pub animation: Option<AlphaAnimation>,
    pub force_hidden: bool,
    /// Whether the layer swallows touches
    pub interactive: bool,
}

/// Panel and lock inputs the layer targets derive from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrimInputs {
    /// Panel expansion, 0 = collapsed, 1 = fully open
    pub fraction: f32,
    pub locked: bool,
    pub bouncer_showing: bool,
    pub force_hide: bool,
}

impl Default for ScrimInputs {
    fn default() -> Self {
        Self {
            fraction: 0.0,
            locked: false,
            bouncer_showing: false,
            force_hide: false,
        }
    }
}

fn same_alpha(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-6
}

/// Base alpha for the behind scrim in the current lock state
pub fn behind_base_alpha(settings: &ScrimSettings, locked: bool, bouncer_showing: bool) -> f32 {
    match (locked, bouncer_showing) {
        (false, _) => settings.behind_alpha,
        (true, false) => settings.behind_alpha_keyguard,
        (true, true) => settings.behind_alpha_unlocking,
    }
}

/// Behind scrim target.
///
/// Starts 20% of the way down the screen and eases in along a cosine curve.
pub fn behind_target(fraction: f32, base_alpha: f32, force_hide: bool) -> f32 {
    if force_hide {
        return 0.0;
    }
    let frac = (fraction * 1.2 - 0.2).clamp(0.0, 1.0);
    let k = 1.0 - 0.5 * (1.0 - (std::f32::consts::PI * (1.0 - frac).powi(2)).cos());
    (k * base_alpha).clamp(0.0, 1.0)
}

pub fn in_front_target(bouncer_showing: bool, force_hide: bool, in_front_alpha: f32) -> f32 {
    if force_hide || !bouncer_showing {
        0.0
    } else {
        in_front_alpha
    }
}

/// Heads-up scrim target: full for two or more banners, fading with the drag
/// of a single banner, and fading out as the shade opens.
pub fn heads_up_target(pinned_count: usize, drag_amount: f32, fraction: f32) -> f32 {
    let alpha = match pinned_count {
        0 => 0.0,
        1 => 1.0 - drag_amount.clamp(0.0, 1.0),
        _ => 1.0,
    };
    let expand_factor = (1.0 - fraction).max(0.0);
    (alpha * expand_factor).clamp(0.0, 1.0)
}

/// Animation state machine for the three scrim layers
pub struct ScrimBlender {
    settings: ScrimSettings,
    default_duration: Duration,
    inputs: ScrimInputs,
    show_behind: bool,
    expanding: bool,
    wake_and_unlocking: bool,
    /// Next pass forces behind/in-front to zero (keyguard going away)
    animate_fading_out: bool,
    fading_out_in_progress: bool,
    pinned_count: usize,
    dragged_heads_up: Option<EntryKey>,
    drag_amount: f32,
    layers: [LayerState; 3],
    update_pending: bool,
    animate_change: bool,
    animate_heads_up: bool,
    duration_override: Option<Duration>,
    animation_delay: Duration,
    skip_first_frame: bool,
    easing_override: Option<Easing>,
    on_animation_finished: Option<Box<dyn FnOnce()>>,
    updates_applied: u64,
}

impl ScrimBlender {
    pub fn new(settings: ScrimSettings, default_duration: Duration) -> Self {
        Self {
            settings,
            default_duration,
            inputs: ScrimInputs::default(),
            show_behind: true,
            expanding: false,
            wake_and_unlocking: false,
            animate_fading_out: false,
            fading_out_in_progress: false,
            pinned_count: 0,
            dragged_heads_up: None,
            drag_amount: 0.0,
            layers: Default::default(),
            update_pending: false,
            animate_change: false,
            animate_heads_up: false,
            duration_override: None,
            animation_delay: Duration::ZERO,
            skip_first_frame: false,
            easing_override: None,
            on_animation_finished: None,
            updates_applied: 0,
        }
    }

    // --- inputs -----------------------------------------------------------

    /// Replace all panel/lock inputs at once
    pub fn set_state(&mut self, inputs: ScrimInputs) {
        if inputs == self.inputs {
            return;
        }
        let old = self.inputs;
        self.inputs = ScrimInputs {
            fraction: inputs.fraction.clamp(0.0, 1.0),
            ..inputs
        };
        if old.bouncer_showing != inputs.bouncer_showing && !self.expanding {
            self.animate_change = true;
        }
        if old.force_hide != inputs.force_hide {
            self.animate_change = false;
        }
        if old.fraction != self.inputs.fraction && self.pinned_count != 0 {
            self.request_heads_up_update(false);
        }
        self.schedule_update();
    }

    pub fn set_panel_expansion(&mut self, fraction: f32) {
        self.set_state(ScrimInputs { fraction, ..self.inputs });
    }

    pub fn set_keyguard_showing(&mut self, locked: bool) {
        self.set_state(ScrimInputs { locked, ..self.inputs });
    }

    pub fn set_bouncer_showing(&mut self, bouncer_showing: bool) {
        self.set_state(ScrimInputs { bouncer_showing, ..self.inputs });
    }

    pub fn force_hide_scrims(&mut self, force_hide: bool) {
        self.set_state(ScrimInputs { force_hide, ..self.inputs });
    }

    /// Turn the behind scrim off entirely (e.g. a backdrop already dims)
    pub fn set_show_scrim_behind(&mut self, show: bool) {
        if self.show_behind != show {
            self.show_behind = show;
            self.schedule_update();
        }
    }

    pub fn on_tracking_started(&mut self) {
        self.expanding = true;
    }

    pub fn on_expanding_finished(&mut self) {
        self.expanding = false;
    }

    pub fn set_wake_and_unlocking(&mut self) {
        self.wake_and_unlocking = true;
        self.schedule_update();
    }

    pub fn on_heads_up_pinned(&mut self) {
        self.pinned_count += 1;
        self.request_heads_up_update(true);
    }

    pub fn on_heads_up_unpinned(&mut self, key: &EntryKey) {
        debug_assert!(self.pinned_count > 0, "unpin without matching pin");
        self.pinned_count = self.pinned_count.saturating_sub(1);
        if self.dragged_heads_up.as_ref() == Some(key) {
            self.dragged_heads_up = None;
            self.drag_amount = 0.0;
        }
        self.request_heads_up_update(true);
    }

    /// How far the top banner is dragged out: 0 at rest, 1 fully dragged
    pub fn set_dragged_heads_up_amount(&mut self, key: EntryKey, amount: f32) {
        self.dragged_heads_up = Some(key);
        self.drag_amount = amount.clamp(0.0, 1.0);
        self.request_heads_up_update(false);
    }

    /// Animate whatever the next update changes
    pub fn request_animated(&mut self) {
        self.animate_change = true;
    }

    pub fn animate_going_to_full_shade(&mut self, delay: Duration, duration: Duration) {
        self.duration_override = Some(duration);
        self.animation_delay = delay;
        self.animate_change = true;
        self.schedule_update();
    }

    /// Fade behind/in-front out while the keyguard goes away. The update runs
    /// right away instead of waiting for the next frame.
    pub fn animate_keyguard_fading_out(
        &mut self,
        delay: Duration,
        duration: Duration,
        on_finished: Option<Box<dyn FnOnce()>>,
        skip_first_frame: bool,
        now: Instant,
    ) {
        self.wake_and_unlocking = false;
        self.animate_fading_out = true;
        self.fading_out_in_progress = true;
        self.duration_override = Some(duration);
        self.animation_delay = delay;
        self.easing_override = Some(KEYGUARD_FADE_OUT);
        self.animate_change = true;
        self.skip_first_frame = skip_first_frame;
        self.on_animation_finished = on_finished;
        self.schedule_update();
        self.on_frame(now);
    }

    /// Stop a keyguard fade-out where it is
    pub fn abort_keyguard_fading_out(&mut self, now: Instant) {
        if !self.fading_out_in_progress {
            return;
        }
        tracing::debug!("aborting keyguard fade-out");
        for layer in [ScrimLayer::Behind, ScrimLayer::InFront] {
            let state = &mut self.layers[layer.index()];
            if let Some(anim) = state.animation.take() {
                state.current = anim.value_at(now);
                state.target = state.current;
            }
        }
        self.end_fading_out(true);
        self.schedule_update();
    }

    pub fn is_keyguard_fading_out(&self) -> bool {
        self.fading_out_in_progress
    }

    // --- frame ------------------------------------------------------------

    fn request_heads_up_update(&mut self, animate: bool) {
        self.animate_heads_up |= animate;
        self.schedule_update();
    }

    fn schedule_update(&mut self) {
        self.update_pending = true;
    }

    pub fn is_update_pending(&self) -> bool {
        self.update_pending
    }

    /// Frame boundary: advance animations, then apply at most one update.
    ///
    /// Returns true while any layer is still animating.
    pub fn on_frame(&mut self, now: Instant) -> bool {
        for state in &mut self.layers {
            if let Some(anim) = &state.animation {
                if anim.is_finished(now) {
                    state.current = anim.end;
                    state.animation = None;
                } else {
                    state.current = anim.value_at(now);
                }
            }
        }

        if self.update_pending {
            self.update_pending = false;
            self.update_scrims(now);
            self.duration_override = None;
            self.animation_delay = Duration::ZERO;
            self.skip_first_frame = false;
            self.easing_override = None;
            // The finish callback must run even when nothing animated.
            self.end_fading_out(false);
        }

        if !self.keyguard_layers_animating() {
            self.fading_out_in_progress = false;
            if let Some(on_finished) = self.on_animation_finished.take() {
                on_finished();
            }
        }
        self.any_animating()
    }

    fn end_fading_out(&mut self, force: bool) {
        self.animate_fading_out = false;
        if force || !self.keyguard_layers_animating() {
            if let Some(on_finished) = self.on_animation_finished.take() {
                on_finished();
            }
            self.fading_out_in_progress = false;
        }
    }

    fn any_animating(&self) -> bool {
        self.layers.iter().any(|l| l.animation.is_some())
    }

    /// The finish callback belongs to the behind and in-front layers only;
    /// banner animations never hold it back.
    fn keyguard_layers_animating(&self) -> bool {
        [ScrimLayer::Behind, ScrimLayer::InFront]
            .iter()
            .any(|layer| self.layers[layer.index()].animation.is_some())
    }

    fn update_scrims(&mut self, now: Instant) {
        self.updates_applied += 1;
        let animate = self.animate_change;
        let force_hide = self.inputs.force_hide;

        for layer in [ScrimLayer::Behind, ScrimLayer::InFront] {
            self.layers[layer.index()].force_hidden = force_hide;
        }

        if force_hide {
            // Snap, even over running animations.
            for layer in [ScrimLayer::Behind, ScrimLayer::InFront] {
                let state = &mut self.layers[layer.index()];
                state.animation = None;
                state.current = 0.0;
                state.target = 0.0;
            }
        } else {
            let (behind, in_front) = if self.animate_fading_out {
                (0.0, 0.0)
            } else if self.wake_and_unlocking {
                (0.0, 1.0)
            } else {
                let base = if self.show_behind {
                    behind_base_alpha(&self.settings, self.inputs.locked, self.inputs.bouncer_showing)
                } else {
                    0.0
                };
                (
                    behind_target(self.inputs.fraction, base, false),
                    in_front_target(self.inputs.bouncer_showing, false, self.settings.in_front_alpha),
                )
            };
            self.update_layer(ScrimLayer::Behind, behind, animate, now);
            self.update_layer(ScrimLayer::InFront, in_front, animate, now);
        }

        let in_front = &mut self.layers[ScrimLayer::InFront.index()];
        in_front.interactive = !force_hide && in_front.target > 0.0;

        let heads_up = heads_up_target(self.pinned_count, self.drag_amount, self.inputs.fraction);
        let animate_heads_up = self.animate_heads_up;
        self.update_layer(ScrimLayer::HeadsUp, heads_up, animate_heads_up, now);

        self.animate_change = false;
        self.animate_heads_up = false;

        tracing::debug!(
            behind = self.layers[0].target,
            in_front = self.layers[1].target,
            heads_up = self.layers[2].target,
            animate,
            "scrim targets updated"
        );
    }

    fn update_layer(&mut self, layer: ScrimLayer, alpha: f32, animate: bool, now: Instant) {
        let alpha = alpha.clamp(0.0, 1.0);
        let duration = self.duration_override.unwrap_or(self.default_duration);
        let delay = self.animation_delay;
        let easing = self.easing_override.unwrap_or(Easing::Decelerate);
        let skip_first_frame = self.skip_first_frame;

        let state = &mut self.layers[layer.index()];
        let current = state.current;

        let mut anim_end = None;
        if let Some(anim) = &state.animation {
            if animate || same_alpha(alpha, current) {
                state.animation = None;
            } else {
                anim_end = Some(anim.end);
            }
        }
        state.target = alpha;

        if same_alpha(alpha, current) || anim_end.is_some_and(|end| same_alpha(alpha, end)) {
            return;
        }

        if animate {
            let mut anim = AlphaAnimation::new(current, alpha, now, delay, duration).with_easing(easing);
            if skip_first_frame {
                anim = anim.skip_first_frame();
            }
            state.animation = Some(anim);
        } else if let Some(anim) = state.animation.as_mut() {
            // Keep the running transition, just move where it lands.
            anim.retarget(alpha, now);
        } else {
            state.current = alpha;
        }
    }

    // --- output -----------------------------------------------------------

    /// Alpha to draw this frame
    pub fn current_alpha(&self, layer: ScrimLayer) -> f32 {
        self.layers[layer.index()].current
    }

    pub fn target_alpha(&self, layer: ScrimLayer) -> f32 {
        self.layers[layer.index()].target
    }

    pub fn is_animating(&self, layer: ScrimLayer) -> bool {
        self.layers[layer.index()].animation.is_some()
    }

    pub fn is_interactive(&self, layer: ScrimLayer) -> bool {
        self.layers[layer.index()].interactive
    }

    pub fn layer(&self, layer: ScrimLayer) -> &LayerState {
        &self.layers[layer.index()]
    }

    pub fn inputs(&self) -> ScrimInputs {
        self.inputs
    }

    pub fn pinned_count(&self) -> usize {
        self.pinned_count
    }

    /// Number of target recomputations applied so far
    pub fn updates_applied(&self) -> u64 {
        self.updates_applied
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;
    use crate::shade::animation::ANIMATION_DURATION;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn blender() -> ScrimBlender {
        ScrimBlender::new(ScrimSettings::default(), ANIMATION_DURATION)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_heads_up_targets_follow_pinned_count() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.on_frame(t0);
        assert_eq!(scrim.target_alpha(ScrimLayer::HeadsUp), 0.0);

        let mut expected = Vec::new();
        scrim.on_heads_up_pinned();
        scrim.on_frame(t0);
        expected.push(scrim.target_alpha(ScrimLayer::HeadsUp));
        scrim.on_heads_up_pinned();
        scrim.on_frame(t0);
        expected.push(scrim.target_alpha(ScrimLayer::HeadsUp));
        scrim.on_heads_up_unpinned(&"b".into());
        scrim.on_frame(t0);
        expected.push(scrim.target_alpha(ScrimLayer::HeadsUp));
        scrim.on_heads_up_unpinned(&"a".into());
        scrim.on_frame(t0);
        expected.push(scrim.target_alpha(ScrimLayer::HeadsUp));

        assert_eq!(expected, vec![1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_heads_up_target_drag_and_expansion() {
        assert!(approx(heads_up_target(1, 0.4, 0.0), 0.6));
        assert!(approx(heads_up_target(2, 0.4, 0.0), 1.0));
        assert!(approx(heads_up_target(2, 0.0, 0.25), 0.75));
        assert_eq!(heads_up_target(3, 0.0, 1.0), 0.0);
        assert_eq!(heads_up_target(0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_unpinning_dragged_banner_resets_drag() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.on_heads_up_pinned();
        scrim.set_dragged_heads_up_amount("a".into(), 0.5);
        scrim.on_frame(t0);
        assert!(approx(scrim.target_alpha(ScrimLayer::HeadsUp), 0.5));

        scrim.on_heads_up_unpinned(&"a".into());
        scrim.on_heads_up_pinned();
        scrim.on_frame(t0 + ms(16));
        assert!(approx(scrim.target_alpha(ScrimLayer::HeadsUp), 1.0));
    }

    #[test]
    fn test_behind_curve_shape() {
        let base = ScrimSettings::default().behind_alpha;
        // Zero through the first sixth of the travel
        for i in 0..=16 {
            let f = i as f32 / 100.0;
            assert_eq!(behind_target(f, base, false), 0.0, "fraction {f}");
        }
        // Closing the shade: strictly decreasing until it reaches zero by 0.2
        let mut last = behind_target(1.0, base, false);
        assert!(approx(last, base));
        for i in (17..=95).rev() {
            let f = i as f32 / 100.0;
            let v = behind_target(f, base, false);
            assert!(v < last, "fraction {f}: {v} !< {last}");
            last = v;
        }
        assert_eq!(behind_target(0.8, base, true), 0.0);
    }

    #[test]
    fn test_behind_base_alpha_by_lock_state() {
        let s = ScrimSettings::default();
        assert_eq!(behind_base_alpha(&s, false, false), 0.62);
        assert_eq!(behind_base_alpha(&s, false, true), 0.62);
        assert_eq!(behind_base_alpha(&s, true, false), 0.45);
        assert_eq!(behind_base_alpha(&s, true, true), 0.2);
    }

    #[test]
    fn test_updates_coalesce_per_frame() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.request_animated();
        scrim.set_panel_expansion(0.5);
        scrim.set_panel_expansion(0.8);
        scrim.on_heads_up_pinned();
        scrim.set_bouncer_showing(false);
        assert!(scrim.is_update_pending());
        assert_eq!(scrim.updates_applied(), 0);

        scrim.on_frame(t0);
        assert_eq!(scrim.updates_applied(), 1);
        assert!(!scrim.is_update_pending());

        let anim = scrim.layer(ScrimLayer::Behind).animation.clone().unwrap();
        assert_eq!(anim.start, 0.0);
        assert!(approx(anim.end, behind_target(0.8, 0.62, false)));

        // Nothing new: the next frame does not recompute
        scrim.on_frame(t0 + ms(16));
        assert_eq!(scrim.updates_applied(), 1);
    }

    #[test]
    fn test_identical_non_animated_state_is_idempotent() {
        let mut scrim = blender();
        let t0 = Instant::now();
        let inputs = ScrimInputs { fraction: 0.7, ..Default::default() };
        scrim.set_state(inputs);
        scrim.on_frame(t0);
        let alpha = scrim.current_alpha(ScrimLayer::Behind);
        assert!(!scrim.is_animating(ScrimLayer::Behind));

        scrim.set_state(inputs);
        scrim.on_frame(t0 + ms(16));
        assert!(!scrim.is_animating(ScrimLayer::Behind));
        assert_eq!(scrim.current_alpha(ScrimLayer::Behind), alpha);
    }

    #[test]
    fn test_non_animated_update_retargets_running_animation() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.request_animated();
        scrim.set_panel_expansion(1.0);
        scrim.on_frame(t0);
        assert!(scrim.is_animating(ScrimLayer::Behind));

        let mid = t0 + ms(60);
        scrim.on_frame(mid);
        let before = scrim.current_alpha(ScrimLayer::Behind);

        scrim.set_panel_expansion(0.9);
        scrim.on_frame(mid);
        let layer = scrim.layer(ScrimLayer::Behind);
        let anim = layer.animation.clone().expect("animation kept");
        assert!(approx(anim.end, layer.target));
        assert!(approx(layer.current, before));
        assert!(approx(anim.value_at(mid), before));

        scrim.on_frame(t0 + ms(400));
        assert!(!scrim.is_animating(ScrimLayer::Behind));
        assert!(approx(scrim.current_alpha(ScrimLayer::Behind), behind_target(0.9, 0.62, false)));
    }

    #[test]
    fn test_retarget_back_to_start_round_trip() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.set_panel_expansion(0.5);
        scrim.on_frame(t0);
        let original = scrim.current_alpha(ScrimLayer::Behind);

        scrim.request_animated();
        scrim.set_panel_expansion(1.0);
        scrim.on_frame(t0 + ms(16));
        assert!(scrim.is_animating(ScrimLayer::Behind));

        // Immediately back, without animation
        scrim.set_panel_expansion(0.5);
        scrim.on_frame(t0 + ms(16));
        assert!(approx(scrim.current_alpha(ScrimLayer::Behind), original));

        scrim.on_frame(t0 + ms(500));
        assert!(approx(scrim.current_alpha(ScrimLayer::Behind), original));
    }

    #[test]
    fn test_bouncer_shows_in_front_scrim() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.set_state(ScrimInputs {
            fraction: 1.0,
            locked: true,
            bouncer_showing: true,
            force_hide: false,
        });
        scrim.on_frame(t0);
        assert_eq!(scrim.target_alpha(ScrimLayer::InFront), 0.75);
        assert!(scrim.is_interactive(ScrimLayer::InFront));
        // Bouncer change animates when not dragging
        assert!(scrim.is_animating(ScrimLayer::InFront));

        scrim.on_frame(t0 + ms(300));
        assert!(approx(scrim.current_alpha(ScrimLayer::InFront), 0.75));
        assert!(approx(scrim.current_alpha(ScrimLayer::Behind), 0.2));
    }

    #[test]
    fn test_force_hide_snaps_mid_animation_and_fires_callback() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.set_state(ScrimInputs { fraction: 1.0, locked: true, bouncer_showing: true, force_hide: false });
        scrim.on_frame(t0);
        assert!(scrim.is_animating(ScrimLayer::InFront));

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        scrim.animate_going_to_full_shade(Duration::ZERO, ms(500));
        scrim.on_frame(t0 + ms(50));
        scrim.on_animation_finished = Some(Box::new(move || flag.set(true)));

        scrim.force_hide_scrims(true);
        scrim.on_frame(t0 + ms(60));
        for layer in [ScrimLayer::Behind, ScrimLayer::InFront] {
            assert_eq!(scrim.current_alpha(layer), 0.0);
            assert!(!scrim.is_animating(layer));
            assert!(scrim.layer(layer).force_hidden);
        }
        assert!(!scrim.is_interactive(ScrimLayer::InFront));
        assert!(fired.get());
    }

    #[test]
    fn test_force_hide_fires_callback_while_banner_scrim_animates() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.set_state(ScrimInputs { locked: true, bouncer_showing: true, ..Default::default() });
        scrim.on_frame(t0);
        scrim.on_frame(t0 + ms(300));
        assert!(approx(scrim.current_alpha(ScrimLayer::InFront), 0.75));

        let fired = Rc::new(Cell::new(0));
        let count = fired.clone();
        let start = t0 + ms(300);
        scrim.animate_keyguard_fading_out(ms(0), ms(300), Some(Box::new(move || count.set(count.get() + 1))), false, start);
        assert!(scrim.is_animating(ScrimLayer::InFront));

        // A banner pins mid fade and its gradient starts animating in
        scrim.on_heads_up_pinned();
        scrim.on_frame(start + ms(50));
        assert!(scrim.is_animating(ScrimLayer::HeadsUp));
        assert_eq!(fired.get(), 0);

        scrim.force_hide_scrims(true);
        assert!(scrim.on_frame(start + ms(60)));
        assert!(scrim.is_animating(ScrimLayer::HeadsUp));
        assert!(!scrim.is_animating(ScrimLayer::InFront));
        assert_eq!(fired.get(), 1);
        assert!(!scrim.is_keyguard_fading_out());

        // The banner animation ending does not fire it again
        assert!(!scrim.on_frame(start + ms(400)));
        assert_eq!(fired.get(), 1);
        assert!(approx(scrim.current_alpha(ScrimLayer::HeadsUp), 1.0));
    }

    #[test]
    fn test_keyguard_fade_out_runs_immediately() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.set_state(ScrimInputs { fraction: 1.0, locked: true, ..Default::default() });
        scrim.on_frame(t0);
        assert!(approx(scrim.current_alpha(ScrimLayer::Behind), 0.45));

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let start = t0 + ms(16);
        scrim.animate_keyguard_fading_out(ms(0), ms(300), Some(Box::new(move || flag.set(true))), false, start);
        assert!(!scrim.is_update_pending());
        assert!(scrim.is_keyguard_fading_out());
        let anim = scrim.layer(ScrimLayer::Behind).animation.clone().unwrap();
        assert_eq!(anim.duration, ms(300));
        assert_eq!(anim.easing, KEYGUARD_FADE_OUT);
        assert!(!fired.get());

        scrim.on_frame(start + ms(150));
        assert!(!fired.get());
        scrim.on_frame(start + ms(300));
        assert!(fired.get());
        assert!(!scrim.is_keyguard_fading_out());
        assert_eq!(scrim.current_alpha(ScrimLayer::Behind), 0.0);
    }

    #[test]
    fn test_abort_keyguard_fade_out_stops_short() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.set_state(ScrimInputs { fraction: 1.0, locked: true, ..Default::default() });
        scrim.on_frame(t0);

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        scrim.animate_keyguard_fading_out(ms(0), ms(300), Some(Box::new(move || flag.set(true))), false, t0);
        scrim.abort_keyguard_fading_out(t0 + ms(100));
        assert!(fired.get());
        assert!(!scrim.is_animating(ScrimLayer::Behind));
        let stopped = scrim.current_alpha(ScrimLayer::Behind);
        assert!(stopped > 0.0 && stopped < 0.45);
    }

    #[test]
    fn test_wake_and_unlock_covers_screen() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.set_wake_and_unlocking();
        scrim.on_frame(t0);
        assert_eq!(scrim.current_alpha(ScrimLayer::InFront), 1.0);
        assert_eq!(scrim.current_alpha(ScrimLayer::Behind), 0.0);
    }

    #[test]
    fn test_hidden_scrim_behind() {
        let mut scrim = blender();
        let t0 = Instant::now();
        scrim.set_show_scrim_behind(false);
        scrim.set_panel_expansion(1.0);
        scrim.on_frame(t0);
        assert_eq!(scrim.current_alpha(ScrimLayer::Behind), 0.0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        State(f32, bool, bool, bool),
        Animate,
        Pin,
        Unpin,
        Drag(f32),
        Frame(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0.0f32..=1.0, any::<bool>(), any::<bool>(), any::<bool>())
                .prop_map(|(f, l, b, h)| Op::State(f, l, b, h)),
            Just(Op::Animate),
            Just(Op::Pin),
            Just(Op::Unpin),
            (0.0f32..=1.0).prop_map(Op::Drag),
            (0u64..400).prop_map(Op::Frame),
        ]
    }

    proptest! {
        #[test]
        fn prop_alpha_stays_in_unit_range(ops in prop::collection::vec(op(), 1..60)) {
            let mut scrim = blender();
            let mut now = Instant::now();
            for op in ops {
                match op {
                    Op::State(fraction, locked, bouncer_showing, force_hide) => {
                        scrim.set_state(ScrimInputs { fraction, locked, bouncer_showing, force_hide });
                    }
                    Op::Animate => scrim.request_animated(),
                    Op::Pin => scrim.on_heads_up_pinned(),
                    Op::Unpin => {
                        if scrim.pinned_count() > 0 {
                            scrim.on_heads_up_unpinned(&"a".into());
                        }
                    }
                    Op::Drag(amount) => scrim.set_dragged_heads_up_amount("a".into(), amount),
                    Op::Frame(step) => {
                        now += Duration::from_millis(step);
                        scrim.on_frame(now);
                    }
                }
                for layer in ScrimLayer::ALL {
                    let state = scrim.layer(layer);
                    prop_assert!((0.0..=1.0).contains(&state.current), "{:?} current {}", layer, state.current);
                    prop_assert!((0.0..=1.0).contains(&state.target));
                    if let Some(anim) = &state.animation {
                        prop_assert!((anim.end - state.target).abs() < 1e-6);
                        prop_assert!((0.0..=1.0).contains(&anim.value_at(now)));
                    }
                }
            }
        }
    }
}
