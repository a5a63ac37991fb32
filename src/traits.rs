//! Core traits that decouple hyprstack from any specific window manager,
//! transport mechanism or time source.
//!
//! Every concrete backend (Hyprland IPC, a Unix-socket listener, a test
//! harness, …) implements one of these traits.  The
//! [`StackController`](crate::controller::StackController) and the engines
//! it owns only depend on these abstractions.

use crate::command::{Command, WindowId, WindowInfo};
use crate::layout::{WindowLayout, Workspace};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Supplies the windows that take part in a transition.
///
/// An implementation might query Hyprland over IPC, or it might return a
/// fixed list in tests.
pub trait WindowSource {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Ordered candidate windows of the active workspace (mapped, visible,
    /// and either tiled or detached by this sink).  The order is the
    /// stacking order: index 0 is the front.
    fn windows(&self) -> Result<Vec<WindowInfo>, Self::Error>;

    /// Area that layouts are computed in.
    fn workspace(&self) -> Result<Workspace, Self::Error>;
}

/// Applies computed transforms to real windows.
///
/// Called every frame with small incremental changes.  A failing apply
/// (e.g. the window was destroyed mid-animation) is logged by the caller
/// and never interrupts the animation; there are no retries.
pub trait WindowSink {
    /// The error type produced by this sink.
    type Error: std::error::Error + Send + 'static;

    fn apply(&self, layout: &WindowLayout) -> Result<(), Self::Error>;

    /// Take `windows` out of the window manager's own layout so that
    /// [`apply`](WindowSink::apply) can place them freely.  Called once
    /// before a batch starts.
    fn detach(&self, windows: &[WindowId]) -> Result<(), Self::Error> {
        let _ = windows;
        Ok(())
    }

    /// Hand `windows` back to the window manager's layout.
    fn reattach(&self, windows: &[WindowId]) -> Result<(), Self::Error> {
        let _ = windows;
        Ok(())
    }
}

//  Time

/// Monotonic time source sampled by the animation engine and controller.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A [`Clock`] that only moves when told to.
///
/// Clones share the same time, so a test can hand one clone to the engine
/// and keep another to advance it.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_secs(&self, secs: f32) {
        self.advance(Duration::from_secs_f32(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

//  Command Source

/// A source of [`Command`]s.
///
/// Implementations listen on some transport (a Unix socket, Hyprland's
/// event stream, an in-memory channel) and forward parsed commands into the
/// provided [`mpsc::Sender`].
///
/// # Contract
///
/// * [`run`](CommandSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Each received command must be sent through `sink` exactly once.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait CommandSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming [`Command`] into `sink`.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Self::Error>;
}
