//! Commands and types used throughout hyprstack.
//!
//! This module defines the vocabulary that all components share:
//! [`Command`] describes every request the controller reacts to, and
//! [`WindowId`] / [`WindowInfo`] describe the windows it animates.
//!
//! Commands arrive as newline-delimited JSON, e.g. `"Toggle"`,
//! `{"PeekFor":800}` or `{"WindowClosed":"0x55d0c1a2b3c0"}`.

use glam::Vec2;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque handle of a window, as reported by the window manager.
///
/// Hyprland identifies windows by their address (`0x55d0c1a2b3c0`); the
/// handle stores the numeric value and prints it back in the same form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl WindowId {
    /// Parse a hex address with or without the `0x` prefix.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() {
            return None;
        }
        u64::from_str_radix(digits, 16).ok().map(WindowId)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl Serialize for WindowId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Wire format: accepts a hex address string or a plain integer.
impl<'de> Deserialize<'de> for WindowId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = WindowId;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "window address (\"0x…\") or non-negative integer")
            }
            fn visit_u64<E>(self, n: u64) -> Result<WindowId, E> {
                Ok(WindowId(n))
            }
            fn visit_str<E>(self, s: &str) -> Result<WindowId, E>
            where
                E: DeError,
            {
                WindowId::parse(s)
                    .ok_or_else(|| DeError::custom(format!("invalid window address: {:?}", s)))
            }
        }
        deserializer.deserialize_any(V)
    }
}

/// A window the controller may animate, as reported by the window source.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub id: WindowId,
    /// Human-readable title, only used for logging.
    pub title: String,
    /// Current top-left corner in layout coordinates.
    pub position: Vec2,
    /// Current size in pixels.
    pub size: Vec2,
}

impl WindowInfo {
    pub fn new(id: WindowId, position: Vec2, size: Vec2) -> Self {
        Self {
            id,
            title: String::new(),
            position,
            size,
        }
    }
}

/// Every request the [`StackController`](crate::controller::StackController)
/// understands.
///
/// Commands are produced by [`CommandSource`](crate::traits::CommandSource)
/// implementations (the Unix socket listener, the Hyprland event stream)
/// and consumed on the main thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Flip between the 3D stack and the spread layout.
    Toggle,

    /// Advance to the next spread layout
    /// (grid → circular → spiral → fibonacci → grid).
    Cycle,

    /// Briefly reveal the spread layout while stacked, using the configured
    /// peek duration.
    Peek,

    /// Same as [`Peek`](Command::Peek) with an explicit duration in
    /// milliseconds.
    PeekFor(u64),

    /// Re-read the configuration file.  On failure the current configuration
    /// is kept.
    Reload,

    //  Window-manager events

    WindowOpened(WindowId),

    /// A window closed; its physics state is dropped.
    WindowClosed(WindowId),

    /// The active workspace changed; any stack is abandoned.
    WorkspaceChanged,
}
