//! Hyprland-specific implementations.
//!
//! This module provides concrete backends for the
//! [`WindowSource`](crate::traits::WindowSource),
//! [`WindowSink`](crate::traits::WindowSink) and
//! [`CommandSource`](crate::traits::CommandSource) traits, powered by
//! Hyprland's IPC sockets.
//!
//! Nothing outside this module should reference Hyprland directly.

pub mod events;
pub mod wm;
