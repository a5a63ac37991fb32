//! **hyprstack**: 3D stack and spread window animations for Hyprland.
//!
//! Windows of the active workspace switch between a perspective "stack"
//! (each window pushed back in depth, offset, tilted and faded) and a
//! "spread" layout (grid, circular, spiral or fibonacci).  The switch is
//! animated with staggered, eased transitions and optional spring-damper
//! secondary motion.
//!
//! # Architecture
//!
//! Three engines do the work, none of which knows about Hyprland:
//!
//! * [`layout::LayoutCalculator`] maps windows to target layouts.
//! * [`animation::AnimationSystem`] interpolates a batch of layouts over
//!   time using [`bezier::BezierCurve`] easing.
//! * [`physics::PhysicsMotion`] keeps per-window spring-damper state.
//!
//! [`controller::StackController`] owns them and reacts to
//! [`command::Command`]s.  It talks to the window manager only through
//! the traits in [`traits`]:
//!
//! * [`traits::WindowSource`] / [`traits::WindowSink`] read windows and
//!   apply layouts.
//! * [`traits::CommandSource`] delivers user intent and window-manager
//!   events.
//! * [`traits::Clock`] supplies time, so every engine can be driven from
//!   tests.
//!
//! Concrete implementations live in [`hyprland`] (Hyprland IPC and event
//! stream) and [`ipc`] (Unix-socket command listener).

pub mod animation;
pub mod bezier;
pub mod command;
pub mod config;
pub mod controller;
pub mod hyprland;
pub mod ipc;
pub mod layout;
pub mod physics;
pub mod traits;
