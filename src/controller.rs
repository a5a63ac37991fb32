//! The orchestrator that ties the engines, the window manager and the
//! command sources together.
//!
//! [`StackController`] holds the current mode and reacts to [`Command`]s by
//! asking the [`LayoutCalculator`] for start and target layouts and handing
//! them to the [`AnimationSystem`].  The frame driver calls
//! [`tick`](StackController::tick) at a fixed cadence; that is where frames
//! reach the window sink and where the mode settles once a batch finishes.
//!
//! ```text
//!            toggle / peek                 batch finished
//!   Spread ─────────────────▶ Transitioning ─────────────▶ Stacked
//!     ▲                                                       │
//!     └──────────── batch finished ◀── Transitioning ◀────────┘
//!                                        toggle / peek timeout
//! ```

use crate::animation::{AnimationStatus, AnimationSystem};
use crate::command::{Command, WindowId, WindowInfo};
use crate::config::{Config, ConfigError};
use crate::layout::{LayoutCalculator, LayoutType, WindowLayout};
use crate::physics::PhysicsMotion;
use crate::traits::{Clock, SystemClock, WindowSink, WindowSource};
use glam::Vec2;
use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Minimum time between two user-triggered transitions.
pub const TOGGLE_COOLDOWN: Duration = Duration::from_millis(100);

/// Window-manager events refresh the window list at most this often.
pub const WINDOW_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Per-window spring and damping used for secondary motion are the global
/// values scaled by these factors.
const SECONDARY_STIFFNESS: f32 = 300.0;
const SECONDARY_DAMPING: f32 = 30.0;

/// Secondary motion never integrates more than this per frame.
const MAX_PHYSICS_DT: f32 = 0.1;

/// Longest single integration step.  Frames longer than this are split
/// into equal sub-steps so the stiff secondary spring stays stable.
const PHYSICS_STEP: f32 = 1.0 / 60.0;

/// Possible errors from the controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The window manager returned an error.
    #[error("window manager error: {0}")]
    Backend(String),

    /// Reloading the configuration failed; the previous one stays active.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Display mode of the managed windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Stacked,
    Transitioning,
    Spread,
}

impl fmt::Display for StackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackState::Stacked => write!(f, "stacked"),
            StackState::Transitioning => write!(f, "transitioning"),
            StackState::Spread => write!(f, "spread"),
        }
    }
}

/// Captures one animation frame so secondary motion can post-process it.
#[derive(Default)]
struct FrameBuffer {
    layouts: RefCell<Vec<WindowLayout>>,
}

impl WindowSink for FrameBuffer {
    type Error = Infallible;

    fn apply(&self, layout: &WindowLayout) -> Result<(), Infallible> {
        self.layouts.borrow_mut().push(*layout);
        Ok(())
    }
}

/// Physics-smoothed positions of the batch in flight.
struct SecondaryMotion {
    displayed: HashMap<WindowId, Vec2>,
    targets: Vec<WindowLayout>,
    last_frame: Instant,
}

/// Switches windows between the 3D stack and the spread layouts.
///
/// The controller is generic over the backend (anything that is both a
/// [`WindowSource`] and a [`WindowSink`]) and over the [`Clock`], so it can
/// be driven entirely from tests.
///
/// # Typical usage
///
/// ```ignore
/// let mut controller = StackController::new(HyprlandBackend::new(), config);
/// controller.handle(Command::Toggle)?;
/// loop {
///     controller.tick()?;
///     std::thread::sleep(controller.config().daemon.frame_interval());
/// }
/// ```
pub struct StackController<B, C = SystemClock>
where
    B: WindowSource + WindowSink,
    C: Clock + Clone,
{
    backend: B,
    config: Config,
    config_path: Option<PathBuf>,
    state: StackState,
    /// Mode entered once the running batch completes.
    target: StackState,
    layout_type: LayoutType,
    layout: LayoutCalculator,
    animation: AnimationSystem<C>,
    physics: PhysicsMotion,
    windows: Vec<WindowInfo>,
    /// Windows taken out of the window manager's layout and not yet
    /// handed back.
    detached: Vec<WindowId>,
    clock: C,
    last_transition: Option<Instant>,
    last_refresh: Option<Instant>,
    peek_until: Option<Instant>,
    secondary: Option<SecondaryMotion>,
}

impl<B> StackController<B, SystemClock>
where
    B: WindowSource + WindowSink,
{
    pub fn new(backend: B, config: Config) -> Self {
        Self::with_clock(backend, config, SystemClock)
    }
}

impl<B, C> StackController<B, C>
where
    B: WindowSource + WindowSink,
    C: Clock + Clone,
{
    /// Create a controller in spread mode with engines configured from
    /// `config`.
    pub fn with_clock(backend: B, config: Config, clock: C) -> Self {
        let layout = LayoutCalculator::new(
            config.layout.perspective,
            config.layout.eye_distance,
            config.layout.stack_depth_step,
            config.layout.spread_padding,
        );
        let animation =
            AnimationSystem::with_clock(config.animation.duration, config.animation.stagger_delay, clock.clone());
        let physics = PhysicsMotion::new(config.physics.spring_strength, config.physics.damping);

        let mut controller = Self {
            backend,
            layout_type: config.layout.default_layout,
            config: config.clone(),
            config_path: None,
            state: StackState::Spread,
            target: StackState::Spread,
            layout,
            animation,
            physics,
            windows: Vec::new(),
            detached: Vec::new(),
            clock,
            last_transition: None,
            last_refresh: None,
            peek_until: None,
            secondary: None,
        };
        controller.apply_config(config);
        controller
    }

    /// File that [`Command::Reload`] re-reads.
    pub fn set_config_path(&mut self, path: impl Into<PathBuf>) {
        self.config_path = Some(path.into());
    }

    /// Replace the configuration and push every value into the engines.
    ///
    /// The spread layout chosen with `Cycle` survives unless the configured
    /// default layout itself changed.
    pub fn apply_config(&mut self, config: Config) {
        self.layout
            .update_transform(config.layout.perspective, config.layout.eye_distance);
        self.layout.set_depth_step(config.layout.stack_depth_step);
        self.layout.set_padding(config.layout.spread_padding);

        self.animation.set_duration(config.animation.duration);
        self.animation.set_max_stagger(config.animation.stagger_delay);
        self.animation.set_motion_blur(config.animation.motion_blur);
        self.animation.set_css_easing(config.animation.css_easing);

        self.physics.set_global_spring(config.physics.spring_strength);
        self.physics.set_global_damping(config.physics.damping);

        if config.layout.default_layout != self.config.layout.default_layout {
            self.layout_type = config.layout.default_layout;
        }
        self.config = config;
    }

    //  Accessors

    pub fn state(&self) -> StackState {
        self.state
    }

    /// Spread arrangement currently selected.
    pub fn layout_type(&self) -> LayoutType {
        self.layout_type
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Windows considered by the last refresh, in stacking order.
    pub fn windows(&self) -> &[WindowInfo] {
        &self.windows
    }

    pub fn layout(&self) -> &LayoutCalculator {
        &self.layout
    }

    pub fn animation(&self) -> &AnimationSystem<C> {
        &self.animation
    }

    pub fn physics(&self) -> &PhysicsMotion {
        &self.physics
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_animating()
    }

    //  Commands

    /// Process a single [`Command`].
    pub fn handle(&mut self, cmd: Command) -> Result<(), ControllerError> {
        match cmd {
            Command::Toggle => {
                let Some(target) = self.toggle_target() else {
                    return Ok(());
                };
                info!("toggle: {} -> {}", self.state, target);
                self.peek_until = None;
                self.transition_to(target)?;
            }

            Command::Cycle => self.cycle()?,

            Command::Peek => self.peek(self.config.daemon.peek_duration())?,

            Command::PeekFor(ms) => self.peek(Duration::from_millis(ms))?,

            Command::Reload => self.reload()?,

            Command::WindowOpened(id) => {
                debug!("window opened: {}", id);
                self.refresh_windows(false)?;
            }

            Command::WindowClosed(id) => {
                debug!("window closed: {}", id);
                self.physics.remove_window(id);
                self.detached.retain(|w| *w != id);
                self.refresh_windows(false)?;
            }

            Command::WorkspaceChanged => {
                debug!("workspace changed");
                self.animation.stop_animation();
                self.secondary = None;
                self.peek_until = None;
                self.physics.clear();
                self.reattach_windows();
                if self.state != StackState::Spread {
                    info!("left {} mode after workspace change", self.state);
                }
                self.state = StackState::Spread;
                self.target = StackState::Spread;
                self.refresh_windows(false)?;
            }
        }
        Ok(())
    }

    /// Advance the running batch by one frame.
    ///
    /// Settles the mode when the batch completes and ends an expired peek.
    pub fn tick(&mut self) -> Result<AnimationStatus, ControllerError> {
        let status = if self.secondary.is_some() {
            self.tick_secondary()
        } else {
            self.animation.update_animation(&self.backend)
        };

        if status == AnimationStatus::Finished {
            self.state = self.target;
            self.secondary = None;
            if self.state == StackState::Spread {
                self.reattach_windows();
            }
        }

        if let Some(deadline) = self.peek_until {
            match self.state {
                StackState::Spread if self.clock.now() >= deadline => {
                    debug!("peek over");
                    self.peek_until = None;
                    self.transition_to(StackState::Stacked)?;
                }
                StackState::Stacked => self.peek_until = None,
                _ => {}
            }
        }

        Ok(status)
    }

    fn toggle_target(&self) -> Option<StackState> {
        if !self.config.enabled {
            debug!("toggle ignored: disabled");
            return None;
        }
        if !self.transition_allowed() {
            debug!("toggle ignored: cooldown");
            return None;
        }
        match self.state {
            StackState::Stacked => Some(StackState::Spread),
            StackState::Spread => Some(StackState::Stacked),
            StackState::Transitioning => {
                debug!("toggle ignored: transition in progress");
                None
            }
        }
    }

    fn transition_allowed(&self) -> bool {
        self.last_transition
            .map_or(true, |last| self.clock.now().saturating_duration_since(last) > TOGGLE_COOLDOWN)
    }

    fn cycle(&mut self) -> Result<(), ControllerError> {
        let previous = self.layout_type;
        self.layout_type = previous.next();
        info!("spread layout: {} -> {}", previous, self.layout_type);

        if self.state != StackState::Spread {
            return Ok(());
        }
        self.refresh_windows(true)?;
        if self.windows.is_empty() {
            return Ok(());
        }
        let start = self.layout.calculate_spread_layout(&self.windows, previous);
        let end = self.layout.calculate_spread_layout(&self.windows, self.layout_type);
        self.begin(start, end, StackState::Spread);
        Ok(())
    }

    fn peek(&mut self, duration: Duration) -> Result<(), ControllerError> {
        if self.state != StackState::Stacked {
            debug!("peek ignored: not stacked");
            return Ok(());
        }
        if !self.config.enabled || !self.transition_allowed() {
            debug!("peek ignored");
            return Ok(());
        }
        self.transition_to(StackState::Spread)?;
        if self.state == StackState::Transitioning {
            info!("peeking for {}ms", duration.as_millis());
            self.peek_until = Some(self.clock.now() + duration);
        }
        Ok(())
    }

    fn reload(&mut self) -> Result<(), ControllerError> {
        let Some(path) = self.config_path.clone() else {
            warn!("reload requested but no config file is set");
            return Ok(());
        };
        let config = Config::load(&path)?;
        info!("reloaded config from {}", path.display());
        self.apply_config(config);
        Ok(())
    }

    //  Transitions

    fn transition_to(&mut self, target: StackState) -> Result<(), ControllerError> {
        if self.state == target || self.state == StackState::Transitioning {
            return Ok(());
        }

        self.refresh_windows(true)?;
        if self.windows.is_empty() {
            debug!("no windows to animate");
            return Ok(());
        }

        let start = self.layouts_for(self.state);
        let end = self.layouts_for(target);
        self.begin(start, end, target);
        Ok(())
    }

    fn layouts_for(&self, state: StackState) -> Vec<WindowLayout> {
        match state {
            StackState::Stacked => self.layout.calculate_stack_layout(&self.windows),
            _ => self
                .layout
                .calculate_spread_layout(&self.windows, self.layout_type),
        }
    }

    fn begin(&mut self, start: Vec<WindowLayout>, end: Vec<WindowLayout>, target: StackState) {
        self.detach_windows(&end);
        let now = self.clock.now();
        self.state = StackState::Transitioning;
        self.target = target;
        self.last_transition = Some(now);

        self.secondary = None;
        if self.config.physics.secondary_motion {
            let spring = self.config.physics.spring_strength * SECONDARY_STIFFNESS;
            let damping = self.config.physics.damping * SECONDARY_DAMPING;
            for layout in &start {
                self.physics.reset_motion(layout.window);
                self.physics
                    .set_motion_properties(layout.window, spring, damping, 1.0);
            }
            self.secondary = Some(SecondaryMotion {
                displayed: start.iter().map(|l| (l.window, l.position)).collect(),
                targets: end.clone(),
                last_frame: now,
            });
        }

        let message = match target {
            StackState::Stacked => "entered 3D stack mode",
            _ => "entered spread mode",
        };
        self.animation.start_transition(
            &start,
            &end,
            self.config.animation.style,
            Some(Box::new(move || info!("{}", message))),
        );
    }

    /// One frame with the spring-damper pulling each window toward its
    /// eased position.  The batch ends on the exact target layouts.
    fn tick_secondary(&mut self) -> AnimationStatus {
        let frame = FrameBuffer::default();
        let status = self.animation.update_animation(&frame);

        let Some(secondary) = self.secondary.as_mut() else {
            return status;
        };

        let now = self.clock.now();
        let dt = now
            .saturating_duration_since(secondary.last_frame)
            .as_secs_f32()
            .clamp(0.0, MAX_PHYSICS_DT);
        secondary.last_frame = now;

        let mut layouts = frame.layouts.into_inner();
        if dt > 0.0 {
            let steps = (dt / PHYSICS_STEP).ceil().max(1.0);
            let step = dt / steps;
            for _ in 0..steps as usize {
                self.physics.update_motion(step);
                for layout in &layouts {
                    let current = secondary
                        .displayed
                        .get(&layout.window)
                        .copied()
                        .unwrap_or(layout.position);
                    self.physics
                        .add_spring_force(layout.window, layout.position, current);
                    self.physics.add_damping_force(layout.window);
                    let next = self.physics.get_next_position(layout.window, current, step);
                    secondary.displayed.insert(layout.window, next);
                }
            }
            for layout in &mut layouts {
                if let Some(position) = secondary.displayed.get(&layout.window) {
                    layout.position = *position;
                }
            }
        }
        for layout in &layouts {
            if let Err(e) = self.backend.apply(layout) {
                warn!("failed to apply layout to {}: {}", layout.window, e);
            }
        }

        if status == AnimationStatus::Finished {
            for layout in &secondary.targets {
                if let Err(e) = self.backend.apply(layout) {
                    warn!("failed to apply layout to {}: {}", layout.window, e);
                }
            }
        }
        status
    }

    //  Windows

    /// Detach the batch's windows that are still managed by the window
    /// manager's layout.
    fn detach_windows(&mut self, layouts: &[WindowLayout]) {
        let fresh: Vec<WindowId> = layouts
            .iter()
            .map(|l| l.window)
            .filter(|id| !self.detached.contains(id))
            .collect();
        if fresh.is_empty() {
            return;
        }
        debug!("detaching {} window(s)", fresh.len());
        if let Err(e) = self.backend.detach(&fresh) {
            warn!("failed to detach windows: {}", e);
        }
        self.detached.extend(fresh);
    }

    fn reattach_windows(&mut self) {
        if self.detached.is_empty() {
            return;
        }
        let windows = std::mem::take(&mut self.detached);
        debug!("reattaching {} window(s)", windows.len());
        if let Err(e) = self.backend.reattach(&windows) {
            warn!("failed to reattach windows: {}", e);
        }
    }

    /// Re-query the window list and workspace.
    ///
    /// Unless `force` is set, calls within [`WINDOW_REFRESH_INTERVAL`] of
    /// the previous refresh are skipped.  Windows that disappeared lose
    /// their physics state.
    fn refresh_windows(&mut self, force: bool) -> Result<(), ControllerError> {
        let now = self.clock.now();
        if !force {
            if let Some(last) = self.last_refresh {
                if now.saturating_duration_since(last) < WINDOW_REFRESH_INTERVAL {
                    return Ok(());
                }
            }
        }
        self.last_refresh = Some(now);

        let windows = self
            .backend
            .windows()
            .map_err(|e| ControllerError::Backend(e.to_string()))?;
        let workspace = self
            .backend
            .workspace()
            .map_err(|e| ControllerError::Backend(e.to_string()))?;
        self.layout.set_workspace(workspace);

        for gone in self
            .windows
            .iter()
            .filter(|old| !windows.iter().any(|w| w.id == old.id))
        {
            self.physics.remove_window(gone.id);
        }

        debug!("managing {} window(s)", windows.len());
        for window in &windows {
            debug!(
                "  {} {:?} at ({}, {})",
                window.id, window.title, window.position.x, window.position.y
            );
        }
        self.windows = windows;
        Ok(())
    }
}

/// Default location of the configuration file
/// (`$XDG_CONFIG_HOME/hyprstack/config.json`).
pub fn default_config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    Path::new(&base).join("hyprstack").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Workspace;
    use crate::traits::ManualClock;
    use std::cell::Cell;

    /// Record-keeping mock backend.
    #[derive(Debug, Default)]
    struct RecorderBackend {
        windows: RefCell<Vec<WindowInfo>>,
        applied: RefCell<Vec<WindowLayout>>,
        detached: RefCell<Vec<WindowId>>,
        reattached: RefCell<Vec<WindowId>>,
        queries: Cell<usize>,
        fail_queries: Cell<bool>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("recorder error")]
    struct RecorderErr;

    impl WindowSource for RecorderBackend {
        type Error = RecorderErr;

        fn windows(&self) -> Result<Vec<WindowInfo>, RecorderErr> {
            if self.fail_queries.get() {
                return Err(RecorderErr);
            }
            self.queries.set(self.queries.get() + 1);
            Ok(self.windows.borrow().clone())
        }

        fn workspace(&self) -> Result<Workspace, RecorderErr> {
            Ok(Workspace::default())
        }
    }

    impl WindowSink for RecorderBackend {
        type Error = RecorderErr;

        fn apply(&self, layout: &WindowLayout) -> Result<(), RecorderErr> {
            self.applied.borrow_mut().push(*layout);
            Ok(())
        }

        fn detach(&self, windows: &[WindowId]) -> Result<(), RecorderErr> {
            self.detached.borrow_mut().extend_from_slice(windows);
            Ok(())
        }

        fn reattach(&self, windows: &[WindowId]) -> Result<(), RecorderErr> {
            self.reattached.borrow_mut().extend_from_slice(windows);
            Ok(())
        }
    }

    impl RecorderBackend {
        fn with_windows(n: u64) -> Self {
            let backend = Self::default();
            *backend.windows.borrow_mut() = (1..=n)
                .map(|i| WindowInfo::new(WindowId(i), Vec2::ZERO, Vec2::new(800.0, 600.0)))
                .collect();
            backend
        }

        /// The most recent layout applied to every window.
        fn last_applied(&self) -> Vec<WindowLayout> {
            let applied = self.applied.borrow();
            let mut last: Vec<WindowLayout> = Vec::new();
            for layout in applied.iter() {
                match last.iter_mut().find(|l| l.window == layout.window) {
                    Some(slot) => *slot = *layout,
                    None => last.push(*layout),
                }
            }
            last
        }
    }

    fn quick_config() -> Config {
        let mut config = Config::default();
        config.animation.duration = 0.01;
        config.daemon.peek_duration_ms = 200;
        config
    }

    fn controller(
        backend: RecorderBackend,
        config: Config,
    ) -> (StackController<RecorderBackend, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (StackController::with_clock(backend, config, clock.clone()), clock)
    }

    //  Toggle

    #[test]
    fn starts_in_spread_mode() {
        let (ctl, _clock) = controller(RecorderBackend::with_windows(3), Config::default());
        assert_eq!(ctl.state(), StackState::Spread);
        assert_eq!(ctl.layout_type(), LayoutType::Grid);
        assert!(!ctl.is_animating());
    }

    #[test]
    fn toggle_enters_stack_after_ticks() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), Config::default());
        ctl.handle(Command::Toggle).unwrap();
        assert_eq!(ctl.state(), StackState::Transitioning);

        assert_eq!(ctl.tick().unwrap(), AnimationStatus::Running);
        assert_eq!(ctl.state(), StackState::Transitioning);

        clock.advance_secs(1.0);
        assert_eq!(ctl.tick().unwrap(), AnimationStatus::Finished);
        assert_eq!(ctl.state(), StackState::Stacked);

        let expected = ctl.layout().calculate_stack_layout(ctl.windows());
        assert_eq!(ctl.backend().last_applied(), expected);
    }

    #[test]
    fn toggle_back_to_spread() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(2), quick_config());
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.2);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);

        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.2);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Spread);
        let expected = ctl.layout().calculate_grid_layout(ctl.windows());
        assert_eq!(ctl.backend().last_applied(), expected);
    }

    #[test]
    fn toggle_inside_cooldown_is_ignored() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), quick_config());
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.05);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);

        ctl.handle(Command::Toggle).unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);

        clock.advance_secs(0.06);
        ctl.handle(Command::Toggle).unwrap();
        assert_eq!(ctl.state(), StackState::Transitioning);
    }

    #[test]
    fn toggle_while_transitioning_is_ignored() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), Config::default());
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.3);
        ctl.tick().unwrap();
        ctl.handle(Command::Toggle).unwrap();
        assert_eq!(ctl.state(), StackState::Transitioning);

        clock.advance_secs(1.0);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);
    }

    #[test]
    fn disabled_config_ignores_toggle() {
        let mut config = Config::default();
        config.enabled = false;
        let (mut ctl, _clock) = controller(RecorderBackend::with_windows(3), config);
        ctl.handle(Command::Toggle).unwrap();
        assert_eq!(ctl.state(), StackState::Spread);
        assert_eq!(ctl.backend().queries.get(), 0);
    }

    #[test]
    fn toggle_without_windows_stays_put() {
        let (mut ctl, _clock) = controller(RecorderBackend::default(), Config::default());
        ctl.handle(Command::Toggle).unwrap();
        assert_eq!(ctl.state(), StackState::Spread);
        assert!(!ctl.is_animating());
    }

    #[test]
    fn backend_failure_surfaces_as_error() {
        let backend = RecorderBackend::with_windows(3);
        backend.fail_queries.set(true);
        let (mut ctl, _clock) = controller(backend, Config::default());
        let err = ctl.handle(Command::Toggle).unwrap_err();
        assert!(matches!(err, ControllerError::Backend(_)));
        assert_eq!(ctl.state(), StackState::Spread);
    }

    //  Cycle

    #[test]
    fn cycle_walks_layouts_in_order() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(4), quick_config());
        let mut seen = Vec::new();
        for _ in 0..4 {
            ctl.handle(Command::Cycle).unwrap();
            assert_eq!(ctl.state(), StackState::Transitioning);
            clock.advance_secs(0.2);
            ctl.tick().unwrap();
            assert_eq!(ctl.state(), StackState::Spread);
            seen.push(ctl.layout_type());
        }
        assert_eq!(
            seen,
            vec![
                LayoutType::Circular,
                LayoutType::Spiral,
                LayoutType::Fibonacci,
                LayoutType::Grid
            ]
        );
    }

    #[test]
    fn cycle_in_spread_animates_to_new_layout() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), quick_config());
        ctl.handle(Command::Cycle).unwrap();
        clock.advance_secs(0.2);
        ctl.tick().unwrap();
        let expected = ctl.layout().calculate_circular_layout(ctl.windows());
        assert_eq!(ctl.backend().last_applied(), expected);
    }

    #[test]
    fn cycle_while_stacked_only_selects() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), quick_config());
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.2);
        ctl.tick().unwrap();

        ctl.handle(Command::Cycle).unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);
        assert_eq!(ctl.layout_type(), LayoutType::Circular);
        assert!(!ctl.is_animating());

        clock.advance_secs(0.2);
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.2);
        ctl.tick().unwrap();
        let expected = ctl.layout().calculate_circular_layout(ctl.windows());
        assert_eq!(ctl.backend().last_applied(), expected);
    }

    //  Peek

    #[test]
    fn peek_returns_to_stack() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), quick_config());
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.2);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);

        ctl.handle(Command::Peek).unwrap();
        assert_eq!(ctl.state(), StackState::Transitioning);
        clock.advance_secs(0.05);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Spread);

        // Peek lasts 200 ms from the request.
        clock.advance_secs(0.2);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Transitioning);
        clock.advance_secs(0.05);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);
    }

    #[test]
    fn peek_for_uses_explicit_duration() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(2), quick_config());
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.2);
        ctl.tick().unwrap();

        ctl.handle(Command::PeekFor(1000)).unwrap();
        clock.advance_secs(0.5);
        ctl.tick().unwrap();
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Spread);
        clock.advance_secs(0.6);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Transitioning);
    }

    #[test]
    fn peek_outside_stack_is_ignored() {
        let (mut ctl, _clock) = controller(RecorderBackend::with_windows(3), quick_config());
        ctl.handle(Command::Peek).unwrap();
        assert_eq!(ctl.state(), StackState::Spread);
        assert!(!ctl.is_animating());
    }

    #[test]
    fn toggle_during_peek_cancels_return() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(2), quick_config());
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.2);
        ctl.tick().unwrap();
        ctl.handle(Command::PeekFor(150)).unwrap();
        clock.advance_secs(0.12);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Spread);

        // Toggling now would go Spread -> Stacked anyway; what matters is
        // that the pending peek is dropped and does not fire later.
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.2);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);
        clock.advance_secs(0.5);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);
        assert!(!ctl.is_animating());
    }

    //  Window events

    #[test]
    fn window_close_evicts_physics_state() {
        let mut config = quick_config();
        config.physics.secondary_motion = true;
        let (mut ctl, _clock) = controller(RecorderBackend::with_windows(3), config);
        ctl.handle(Command::Toggle).unwrap();
        assert!(ctl.physics().motion_state(WindowId(2)).is_some());

        ctl.handle(Command::WindowClosed(WindowId(2))).unwrap();
        assert!(ctl.physics().motion_state(WindowId(2)).is_none());
        assert_eq!(ctl.physics().get_velocity(WindowId(2)), Vec2::ZERO);
    }

    #[test]
    fn vanished_windows_lose_physics_state_on_refresh() {
        let mut config = quick_config();
        config.physics.secondary_motion = true;
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), config);
        ctl.handle(Command::Toggle).unwrap();
        ctl.backend().windows.borrow_mut().retain(|w| w.id != WindowId(3));

        clock.advance_secs(0.2);
        ctl.handle(Command::WindowOpened(WindowId(9))).unwrap();
        assert!(ctl.physics().motion_state(WindowId(3)).is_none());
        assert_eq!(ctl.windows().len(), 2);
    }

    #[test]
    fn window_events_refresh_at_most_every_100ms() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(1), Config::default());
        ctl.handle(Command::WindowOpened(WindowId(5))).unwrap();
        ctl.handle(Command::WindowOpened(WindowId(6))).unwrap();
        assert_eq!(ctl.backend().queries.get(), 1);

        clock.advance(Duration::from_millis(150));
        ctl.handle(Command::WindowClosed(WindowId(6))).unwrap();
        assert_eq!(ctl.backend().queries.get(), 2);
    }

    #[test]
    fn workspace_change_resets_to_spread() {
        let mut config = quick_config();
        config.physics.secondary_motion = true;
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), config);
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.3);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);

        ctl.handle(Command::WorkspaceChanged).unwrap();
        assert_eq!(ctl.state(), StackState::Spread);
        assert!(ctl.physics().is_empty());
    }

    #[test]
    fn workspace_change_cancels_transition() {
        let (mut ctl, _clock) = controller(RecorderBackend::with_windows(3), Config::default());
        ctl.handle(Command::Toggle).unwrap();
        ctl.handle(Command::WorkspaceChanged).unwrap();
        assert_eq!(ctl.state(), StackState::Spread);
        assert!(!ctl.is_animating());
        assert_eq!(ctl.tick().unwrap(), AnimationStatus::Idle);
    }

    //  Detach / reattach

    #[test]
    fn batch_start_detaches_windows_once() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), quick_config());
        ctl.handle(Command::Toggle).unwrap();
        let ids = vec![WindowId(1), WindowId(2), WindowId(3)];
        assert_eq!(*ctl.backend().detached.borrow(), ids);

        clock.advance_secs(0.3);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);
        assert!(ctl.backend().reattached.borrow().is_empty());

        ctl.handle(Command::Toggle).unwrap();
        assert_eq!(*ctl.backend().detached.borrow(), ids);
    }

    #[test]
    fn settling_in_spread_reattaches_windows() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(2), quick_config());
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.3);
        ctl.tick().unwrap();
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.3);
        ctl.tick().unwrap();

        assert_eq!(ctl.state(), StackState::Spread);
        assert_eq!(*ctl.backend().reattached.borrow(), vec![WindowId(1), WindowId(2)]);
    }

    #[test]
    fn workspace_change_reattaches_stacked_windows() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(2), quick_config());
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.3);
        ctl.tick().unwrap();
        assert_eq!(ctl.state(), StackState::Stacked);

        ctl.handle(Command::WorkspaceChanged).unwrap();
        assert_eq!(*ctl.backend().reattached.borrow(), vec![WindowId(1), WindowId(2)]);
    }

    #[test]
    fn closed_windows_are_not_reattached() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(2), quick_config());
        ctl.handle(Command::Toggle).unwrap();
        clock.advance_secs(0.3);
        ctl.tick().unwrap();
        ctl.handle(Command::WindowClosed(WindowId(2))).unwrap();

        ctl.handle(Command::WorkspaceChanged).unwrap();
        assert_eq!(*ctl.backend().reattached.borrow(), vec![WindowId(1)]);
    }

    //  Secondary motion

    #[test]
    fn secondary_motion_lands_on_exact_targets() {
        let mut config = Config::default();
        config.animation.duration = 0.5;
        config.physics.secondary_motion = true;
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), config);
        ctl.handle(Command::Toggle).unwrap();

        let mut status = AnimationStatus::Running;
        for _ in 0..120 {
            clock.advance_secs(1.0 / 60.0);
            status = ctl.tick().unwrap();
            if status == AnimationStatus::Finished {
                break;
            }
        }
        assert_eq!(status, AnimationStatus::Finished);
        assert_eq!(ctl.state(), StackState::Stacked);
        let expected = ctl.layout().calculate_stack_layout(ctl.windows());
        assert_eq!(ctl.backend().last_applied(), expected);
    }

    #[test]
    fn secondary_motion_stays_bounded_at_low_frame_rates() {
        for frame in [0.075, 0.1, 0.25] {
            let mut config = Config::default();
            config.animation.duration = 2.0;
            config.physics.secondary_motion = true;
            let (mut ctl, clock) = controller(RecorderBackend::with_windows(3), config);
            ctl.handle(Command::Toggle).unwrap();

            for _ in 0..40 {
                clock.advance_secs(frame);
                if ctl.tick().unwrap() == AnimationStatus::Finished {
                    break;
                }
            }
            assert_eq!(ctl.state(), StackState::Stacked);

            let centre = Workspace::default().center();
            let furthest = ctl
                .backend()
                .applied
                .borrow()
                .iter()
                .map(|l| l.position.distance(centre))
                .fold(0.0f32, f32::max);
            assert!(furthest < 2000.0, "frame {}s reached {}px", frame, furthest);
        }
    }

    #[test]
    fn secondary_motion_uses_scaled_spring() {
        let mut config = quick_config();
        config.physics.secondary_motion = true;
        let (mut ctl, _clock) = controller(RecorderBackend::with_windows(1), config);
        ctl.handle(Command::Toggle).unwrap();
        let state = ctl.physics().motion_state(WindowId(1)).unwrap();
        assert!((state.spring - 0.8 * SECONDARY_STIFFNESS).abs() < 1e-3);
        assert!((state.damping - 0.92 * SECONDARY_DAMPING).abs() < 1e-3);
    }

    //  Configuration

    #[test]
    fn apply_config_pushes_engine_settings() {
        let (mut ctl, _clock) = controller(RecorderBackend::with_windows(1), Config::default());
        let mut config = Config::default();
        config.animation.duration = 1.5;
        config.animation.stagger_delay = 0.2;
        config.layout.spread_padding = 0.0;
        config.layout.perspective = 500.0;
        config.layout.eye_distance = 500.0;
        config.physics.damping = 0.5;
        ctl.apply_config(config);

        assert_eq!(ctl.animation().duration(), 1.5);
        assert_eq!(ctl.animation().max_stagger(), 0.2);
        assert_eq!(ctl.layout().transform().perspective, 500.0);
        assert_eq!(ctl.physics().global_damping(), 0.5);
        let windows = ctl.backend().windows.borrow().clone();
        assert_eq!(ctl.layout().calculate_grid_layout(&windows)[0].position, Vec2::ZERO);
    }

    #[test]
    fn reload_keeps_cycled_layout_unless_default_changes() {
        let (mut ctl, clock) = controller(RecorderBackend::with_windows(1), quick_config());
        ctl.handle(Command::Cycle).unwrap();
        clock.advance_secs(0.2);
        ctl.tick().unwrap();
        assert_eq!(ctl.layout_type(), LayoutType::Circular);

        ctl.apply_config(quick_config());
        assert_eq!(ctl.layout_type(), LayoutType::Circular);

        let mut config = quick_config();
        config.layout.default_layout = LayoutType::Spiral;
        ctl.apply_config(config);
        assert_eq!(ctl.layout_type(), LayoutType::Spiral);
    }

    #[test]
    fn reload_reads_config_file() {
        let path = std::env::temp_dir().join(format!("hyprstack-test-{}-reload.json", std::process::id()));
        std::fs::write(&path, r#"{ "animation": { "duration": 2.5, "style": "bounce_in" } }"#).unwrap();

        let (mut ctl, _clock) = controller(RecorderBackend::with_windows(1), Config::default());
        ctl.set_config_path(&path);
        ctl.handle(Command::Reload).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(ctl.config().animation.duration, 2.5);
        assert_eq!(ctl.animation().duration(), 2.5);
    }

    #[test]
    fn failed_reload_keeps_previous_config() {
        let mut config = Config::default();
        config.animation.duration = 0.4;
        let (mut ctl, _clock) = controller(RecorderBackend::with_windows(1), config.clone());
        ctl.set_config_path("/nonexistent/hyprstack/config.json");

        let err = ctl.handle(Command::Reload).unwrap_err();
        assert!(matches!(err, ControllerError::Config(_)));
        assert_eq!(ctl.config(), &config);
        assert_eq!(ctl.animation().duration(), 0.4);
    }

    #[test]
    fn reload_without_path_is_a_no_op() {
        let (mut ctl, _clock) = controller(RecorderBackend::with_windows(1), Config::default());
        ctl.handle(Command::Reload).unwrap();
        assert_eq!(ctl.config(), &Config::default());
    }
}
