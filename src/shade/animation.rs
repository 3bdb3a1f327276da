//! Alpha transitions for scrim layers
//!
//! An `AlphaAnimation` is a plain value: start/end keyframes plus timing. It
//! is sampled with a timestamp rather than ticking itself, so a frame always
//! reads a consistent value.

use std::time::{Duration, Instant};

/// Default scrim transition length
pub const ANIMATION_DURATION: Duration = Duration::from_millis(220);

/// How far a skipped first frame advances an animation
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Timing curve applied to linear progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    /// Quadratic ease-out: fast start, slow landing
    Decelerate,
    /// Cubic bezier through (0,0), (x1,y1), (x2,y2), (1,1)
    CubicBezier { x1: f32, y1: f32, x2: f32, y2: f32 },
}

/// Curve used while the keyguard fades away
pub const KEYGUARD_FADE_OUT: Easing = Easing::CubicBezier {
    x1: 0.0,
    y1: 0.0,
    x2: 0.7,
    y2: 1.0,
};

impl Easing {
    /// Map linear time `t` in [0,1] to eased progress in [0,1]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Decelerate => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::CubicBezier { x1, y1, x2, y2 } => {
                let s = solve_bezier_x(t, x1, x2);
                bezier(s, y1, y2)
            }
        }
    }
}

fn bezier(s: f32, p1: f32, p2: f32) -> f32 {
    let inv = 1.0 - s;
    3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
}

fn bezier_slope(s: f32, p1: f32, p2: f32) -> f32 {
    let inv = 1.0 - s;
    3.0 * inv * inv * p1 + 6.0 * inv * s * (p2 - p1) + 3.0 * s * s * (1.0 - p2)
}

/// Find the curve parameter whose x equals `x`
fn solve_bezier_x(x: f32, x1: f32, x2: f32) -> f32 {
    // Newton first, bisection if the slope flattens out.
    let mut s = x;
    for _ in 0..8 {
        let err = bezier(s, x1, x2) - x;
        if err.abs() < 1e-5 {
            return s;
        }
        let slope = bezier_slope(s, x1, x2);
        if slope.abs() < 1e-6 {
            break;
        }
        s = (s - err / slope).clamp(0.0, 1.0);
    }

    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    s = x;
    for _ in 0..32 {
        let value = bezier(s, x1, x2);
        if (value - x).abs() < 1e-5 {
            break;
        }
        if value < x {
            lo = s;
        } else {
            hi = s;
        }
        s = (lo + hi) * 0.5;
    }
    s
}

/// New start keyframe for an animation whose end moves while it runs.
///
/// `progress` is the eased progress at the moment of the change. The value
/// shown at that progress stays the same and the remaining travel lands on
/// `new_end`.
pub fn retarget_start(old_start: f32, old_end: f32, new_end: f32, progress: f32) -> f32 {
    let progress = progress.clamp(0.0, 1.0);
    let current = lerp(old_start, old_end, progress);
    let remaining = 1.0 - progress;
    // Finished runs have nothing left to carry over.
    if remaining <= 0.0 {
        return new_end;
    }
    // Near the end the start lands far outside [0,1]; `lerp` scales it back
    // down by `remaining`.
    (current - new_end * progress) / remaining
}

/// Interpolate with both keyframes weighted, exact at either end
fn lerp(start: f32, end: f32, progress: f32) -> f32 {
    start * (1.0 - progress) + end * progress
}

/// An in-flight alpha transition
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaAnimation {
    pub start: f32,
    pub end: f32,
    pub started_at: Instant,
    pub delay: Duration,
    pub duration: Duration,
    pub easing: Easing,
}

impl AlphaAnimation {
    pub fn new(start: f32, end: f32, now: Instant, delay: Duration, duration: Duration) -> Self {
        Self {
            start,
            end,
            started_at: now,
            delay,
            duration,
            easing: Easing::Decelerate,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Pretend the first frame already ran
    pub fn skip_first_frame(mut self) -> Self {
        self.started_at = self
            .started_at
            .checked_sub(FRAME_INTERVAL)
            .unwrap_or(self.started_at);
        self
    }

    /// Linear time fraction in [0,1]
    pub fn time_fraction(&self, now: Instant) -> f32 {
        let begin = self.started_at + self.delay;
        let elapsed = now.saturating_duration_since(begin);
        if self.duration.is_zero() {
            return if now >= begin { 1.0 } else { 0.0 };
        }
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// Eased progress in [0,1]
    pub fn progress(&self, now: Instant) -> f32 {
        self.easing.apply(self.time_fraction(now))
    }

    pub fn value_at(&self, now: Instant) -> f32 {
        lerp(self.start, self.end, self.progress(now)).clamp(0.0, 1.0)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.time_fraction(now) >= 1.0
    }

    /// Move the end keyframe without restarting
    pub fn retarget(&mut self, new_end: f32, now: Instant) {
        let progress = self.progress(now);
        self.start = retarget_start(self.start, self.end, new_end, progress);
        self.end = new_end;
    }
}
