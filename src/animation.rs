//! Staggered, eased batch transitions.
//!
//! [`AnimationSystem::start_transition`] pairs start and end layouts by
//! index and gives window `i` of `n` a start delay of `(i / n) · max_stagger`.
//! The frame driver then calls [`AnimationSystem::update_animation`] once
//! per frame; each call interpolates every running transition and hands the
//! result to a [`WindowSink`].
//!
//! ```text
//!   Idle ──start_transition──▶ Running ──all complete──▶ Idle (callback)
//!                                 │
//!                                 └──stop_animation──▶ Idle (no callback)
//! ```

use crate::bezier::{lerp, BezierCurve};
use crate::command::WindowId;
use crate::layout::WindowLayout;
use crate::traits::{Clock, SystemClock, WindowSink};
use glam::Vec2;
use log::{debug, warn};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Frame time assumed before two frames have been observed.  Shorter
/// frames are widened to this for the velocity estimate.
const FALLBACK_FRAME_DT: f32 = 1.0 / 60.0;

/// Easing flavour of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    #[default]
    SmoothSlide,
    BounceIn,
    ElasticOut,
    CascadeWave,
    SpiralMotion,
    MagneticAttract,
    LiquidFlow,
}

impl TransitionStyle {
    pub const ALL: [TransitionStyle; 7] = [
        TransitionStyle::SmoothSlide,
        TransitionStyle::BounceIn,
        TransitionStyle::ElasticOut,
        TransitionStyle::CascadeWave,
        TransitionStyle::SpiralMotion,
        TransitionStyle::MagneticAttract,
        TransitionStyle::LiquidFlow,
    ];

    pub fn easing_curve(self) -> BezierCurve {
        match self {
            TransitionStyle::SmoothSlide | TransitionStyle::SpiralMotion => BezierCurve::ease_out(),
            TransitionStyle::BounceIn => BezierCurve::bounce(),
            TransitionStyle::ElasticOut => BezierCurve::elastic(),
            TransitionStyle::CascadeWave => BezierCurve::ease_in_out(),
            TransitionStyle::MagneticAttract => BezierCurve::ease_in(),
            TransitionStyle::LiquidFlow => BezierCurve::new(0.25, 0.46, 0.45, 0.94),
        }
    }

    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Accepts `snake_case`, `kebab-case` and `CamelCase` spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL.into_iter().find(|style| {
            let candidate: String = style.to_string().chars().filter(|c| *c != '_').collect();
            candidate == key
        })
    }
}

impl fmt::Display for TransitionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionStyle::SmoothSlide => "smooth_slide",
            TransitionStyle::BounceIn => "bounce_in",
            TransitionStyle::ElasticOut => "elastic_out",
            TransitionStyle::CascadeWave => "cascade_wave",
            TransitionStyle::SpiralMotion => "spiral_motion",
            TransitionStyle::MagneticAttract => "magnetic_attract",
            TransitionStyle::LiquidFlow => "liquid_flow",
        };
        f.write_str(name)
    }
}

/// The interpolated subset of a [`WindowLayout`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionState {
    pub position: Vec2,
    pub size: Vec2,
    pub rotation: f32,
    pub scale: f32,
    pub alpha: f32,
}

impl From<&WindowLayout> for TransitionState {
    fn from(layout: &WindowLayout) -> Self {
        Self {
            position: layout.position,
            size: layout.size,
            rotation: layout.rotation,
            scale: layout.scale,
            alpha: layout.alpha,
        }
    }
}

impl TransitionState {
    fn lerp(&self, to: &TransitionState, t: f32) -> TransitionState {
        TransitionState {
            position: Vec2::new(lerp(self.position.x, to.position.x, t), lerp(self.position.y, to.position.y, t)),
            size: Vec2::new(lerp(self.size.x, to.size.x, t), lerp(self.size.y, to.size.y, t)),
            rotation: lerp(self.rotation, to.rotation, t),
            scale: lerp(self.scale, to.scale, t),
            alpha: lerp(self.alpha, to.alpha, t),
        }
    }
}

/// One window's part of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowTransition {
    pub window: WindowId,
    pub start: TransitionState,
    pub end: TransitionState,
    /// Seconds after the batch start before this window begins to move.
    pub start_delay: f32,
    /// Z order of the target layout, carried through unchanged.
    pub z_index: i32,
    pub easing: BezierCurve,
    pub complete: bool,
}

/// What a call to [`AnimationSystem::update_animation`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationStatus {
    /// Nothing was running.
    Idle,
    /// At least one transition is still in flight (or waiting on its delay).
    Running,
    /// The batch completed during this call; the callback has fired.
    Finished,
}

pub type CompletionCallback = Box<dyn FnOnce()>;

pub struct AnimationSystem<C: Clock = SystemClock> {
    transitions: Vec<WindowTransition>,
    started_at: Option<Instant>,
    last_tick: Option<Instant>,
    base_duration: f32,
    max_stagger: f32,
    animating: bool,
    on_complete: Option<CompletionCallback>,
    motion_blur: bool,
    css_easing: bool,
    clock: C,
}

impl Default for AnimationSystem {
    fn default() -> Self {
        Self::new(0.8, 0.3)
    }
}

impl AnimationSystem {
    pub fn new(base_duration: f32, max_stagger: f32) -> Self {
        Self::with_clock(base_duration, max_stagger, SystemClock)
    }
}

impl<C: Clock> AnimationSystem<C> {
    pub fn with_clock(base_duration: f32, max_stagger: f32, clock: C) -> Self {
        Self {
            transitions: Vec::new(),
            started_at: None,
            last_tick: None,
            base_duration,
            max_stagger,
            animating: false,
            on_complete: None,
            motion_blur: true,
            css_easing: false,
            clock,
        }
    }

    /// Begin a new batch, hard-stopping any batch in flight.
    ///
    /// Layouts are paired by index; extra entries on either side are
    /// ignored.  The window handle comes from the start layout.
    pub fn start_transition(
        &mut self,
        start: &[WindowLayout],
        end: &[WindowLayout],
        style: TransitionStyle,
        on_complete: Option<CompletionCallback>,
    ) {
        if self.animating {
            self.stop_animation();
        }

        let count = start.len().min(end.len());
        let easing = style.easing_curve();
        self.transitions = start
            .iter()
            .zip(end)
            .enumerate()
            .map(|(i, (from, to))| WindowTransition {
                window: from.window,
                start: from.into(),
                end: to.into(),
                start_delay: i as f32 / count as f32 * self.max_stagger,
                z_index: to.z_index,
                easing,
                complete: false,
            })
            .collect();

        debug!(
            "starting {} transition for {} window(s) ({}s + {}s stagger)",
            style, count, self.base_duration, self.max_stagger
        );

        self.on_complete = on_complete;
        self.started_at = Some(self.clock.now());
        self.last_tick = None;
        self.animating = true;
    }

    /// Advance every running transition to the current time and forward the
    /// interpolated layouts to `sink`.
    ///
    /// Sink failures are logged and otherwise ignored.
    pub fn update_animation<S: WindowSink>(&mut self, sink: &S) -> AnimationStatus {
        if !self.animating {
            return AnimationStatus::Idle;
        }
        let Some(started_at) = self.started_at else {
            return AnimationStatus::Idle;
        };

        let now = self.clock.now();
        let total_elapsed = now.saturating_duration_since(started_at).as_secs_f32();
        let frame_dt = self
            .last_tick
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .map_or(FALLBACK_FRAME_DT, |dt| dt.max(FALLBACK_FRAME_DT));
        self.last_tick = Some(now);

        let mut all_complete = true;
        for i in 0..self.transitions.len() {
            let transition = &self.transitions[i];
            if transition.complete {
                continue;
            }

            let elapsed = total_elapsed - transition.start_delay;
            if elapsed < 0.0 {
                all_complete = false;
                continue;
            }

            let progress = if self.base_duration > 0.0 {
                (elapsed / self.base_duration).min(1.0)
            } else {
                1.0
            };
            if progress < 1.0 {
                all_complete = false;
            }

            let layout = self.frame_layout(transition, progress, frame_dt);
            self.transitions[i].complete = progress >= 1.0;

            if let Err(e) = sink.apply(&layout) {
                warn!("failed to apply layout to {}: {}", layout.window, e);
            }
        }

        if !all_complete {
            return AnimationStatus::Running;
        }

        self.animating = false;
        self.transitions.clear();
        self.started_at = None;
        self.last_tick = None;
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
        AnimationStatus::Finished
    }

    /// Cancel the current batch.  The completion callback is dropped without
    /// being called.  Safe to call when idle.
    pub fn stop_animation(&mut self) {
        self.animating = false;
        self.transitions.clear();
        self.on_complete = None;
        self.started_at = None;
        self.last_tick = None;
    }

    /// Overall batch progress in `[0, 1]`; `1.0` when idle.
    pub fn progress(&self) -> f32 {
        match self.started_at {
            Some(started_at) if self.animating && !self.transitions.is_empty() => {
                let total = self.base_duration + self.max_stagger;
                if total <= 0.0 {
                    return 1.0;
                }
                let elapsed = self.clock.now().saturating_duration_since(started_at).as_secs_f32();
                (elapsed / total).min(1.0)
            }
            _ => 1.0,
        }
    }

    fn ease(&self, curve: &BezierCurve, t: f32) -> f32 {
        if self.css_easing {
            curve.evaluate_css(t)
        } else {
            curve.evaluate(t)
        }
    }

    fn frame_layout(&self, transition: &WindowTransition, progress: f32, frame_dt: f32) -> WindowLayout {
        let eased = self.ease(&transition.easing, progress);
        let state = transition.start.lerp(&transition.end, eased);
        let velocity = if self.motion_blur {
            self.estimate_velocity(transition, progress, frame_dt)
        } else {
            Vec2::ZERO
        };
        WindowLayout {
            window: transition.window,
            position: state.position,
            size: state.size,
            rotation: state.rotation,
            scale: state.scale,
            alpha: state.alpha,
            z_index: transition.z_index,
            velocity,
        }
    }

    /// Finite difference of the eased position over one frame.
    fn estimate_velocity(&self, transition: &WindowTransition, progress: f32, dt: f32) -> Vec2 {
        if progress <= 0.0 || progress >= 1.0 || self.base_duration <= 0.0 {
            return Vec2::ZERO;
        }
        let future = (progress + dt / self.base_duration).min(1.0);
        let (from, to) = (transition.start.position, transition.end.position);
        let at = |t: f32| {
            let eased = self.ease(&transition.easing, t);
            Vec2::new(lerp(from.x, to.x, eased), lerp(from.y, to.y, eased))
        };
        (at(future) - at(progress)) / dt
    }

    //  Configuration

    pub fn set_duration(&mut self, seconds: f32) {
        self.base_duration = seconds;
    }

    pub fn set_max_stagger(&mut self, seconds: f32) {
        self.max_stagger = seconds;
    }

    pub fn set_motion_blur(&mut self, enabled: bool) {
        self.motion_blur = enabled;
    }

    pub fn set_css_easing(&mut self, enabled: bool) {
        self.css_easing = enabled;
    }

    pub fn duration(&self) -> f32 {
        self.base_duration
    }

    pub fn max_stagger(&self) -> f32 {
        self.max_stagger
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Number of transitions in the current batch.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn transitions(&self) -> &[WindowTransition] {
        &self.transitions
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
