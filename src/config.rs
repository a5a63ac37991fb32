//! Application configuration.
//!
//! The configuration is loaded from `$XDG_CONFIG_HOME/hyprstack/config.json`
//! and grouped into sections, one per engine plus one for the daemon loop.
//! Every field is optional; a minimal `{}` file is valid.
//!
//! # Example
//!
//! ```json
//! {
//!   "enabled": true,
//!   "animation": {
//!     "duration": 0.8,
//!     "stagger_delay": 0.05,
//!     "style": "elastic_out",
//!     "motion_blur": true,
//!     "css_easing": false
//!   },
//!   "layout": {
//!     "default": "circular",
//!     "stack_depth_step": 100.0,
//!     "spread_padding": 20.0,
//!     "perspective": 800.0,
//!     "eye_distance": 1000.0
//!   },
//!   "physics": { "spring_strength": 0.8, "damping": 0.92, "secondary_motion": false },
//!   "daemon": { "peek_duration_ms": 1000, "frame_interval_ms": 16 }
//! }
//! ```
//!
//! `style` and `default` accept either a name or the integer index of the
//! variant.  Values that match nothing fall back to the default with a
//! warning instead of rejecting the whole file.

use crate::animation::TransitionStyle;
use crate::layout::LayoutType;
use log::warn;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// When `false`, toggle requests are ignored.
    pub enabled: bool,
    pub animation: AnimationConfig,
    pub layout: LayoutConfig,
    pub physics: PhysicsConfig,
    pub daemon: DaemonConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            animation: AnimationConfig::default(),
            layout: LayoutConfig::default(),
            physics: PhysicsConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

/// Transition timing and easing.  Durations are in **seconds**.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub duration: f32,
    /// Upper bound of the per-window start delay.
    pub stagger_delay: f32,
    #[serde(deserialize_with = "lenient_style")]
    pub style: TransitionStyle,
    /// Forward per-frame velocity to the window sink.
    pub motion_blur: bool,
    /// Solve the easing curve along X the way CSS does instead of using the
    /// progress directly as the curve parameter.
    pub css_easing: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration: 0.8,
            stagger_delay: 0.05,
            style: TransitionStyle::SmoothSlide,
            motion_blur: true,
            css_easing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Spread arrangement used until `Cycle` changes it.
    #[serde(rename = "default", deserialize_with = "lenient_layout")]
    pub default_layout: LayoutType,
    pub stack_depth_step: f32,
    pub spread_padding: f32,
    pub perspective: f32,
    pub eye_distance: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_layout: LayoutType::Grid,
            stack_depth_step: 100.0,
            spread_padding: 20.0,
            perspective: 800.0,
            eye_distance: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub spring_strength: f32,
    pub damping: f32,
    /// Run the spring-damper on top of the eased animation.
    pub secondary_motion: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            spring_strength: 0.8,
            damping: 0.92,
            secondary_motion: false,
        }
    }
}

/// Daemon loop settings.  Durations are in **milliseconds**.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// How long a plain `Peek` shows the spread layout.
    pub peek_duration_ms: u64,
    /// Upper bound on the time between two animation frames.
    pub frame_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            peek_duration_ms: 1000,
            frame_interval_ms: 16,
        }
    }
}

impl DaemonConfig {
    pub fn peek_duration(&self) -> Duration {
        Duration::from_millis(self.peek_duration_ms)
    }

    /// Never zero, so the frame loop cannot spin.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e.0)))
    }

    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError(e.to_string()))
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

//  Lenient enum fields

#[derive(Deserialize)]
#[serde(untagged)]
enum EnumValue {
    Index(i64),
    Name(String),
    Other(IgnoredAny),
}

fn lenient<'de, D, T>(
    deserializer: D,
    what: &str,
    by_index: fn(i64) -> Option<T>,
    by_name: fn(&str) -> Option<T>,
) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + std::fmt::Display,
{
    let value = EnumValue::deserialize(deserializer)?;
    let resolved = match &value {
        EnumValue::Index(i) => by_index(*i),
        EnumValue::Name(name) => by_name(name),
        EnumValue::Other(_) => None,
    };
    Ok(resolved.unwrap_or_else(|| {
        let fallback = T::default();
        match value {
            EnumValue::Index(i) => warn!("unknown {} index {}, using {}", what, i, fallback),
            EnumValue::Name(name) => warn!("unknown {} {:?}, using {}", what, name, fallback),
            EnumValue::Other(_) => warn!("invalid {} value, using {}", what, fallback),
        }
        fallback
    }))
}

fn lenient_style<'de, D>(deserializer: D) -> Result<TransitionStyle, D::Error>
where
    D: Deserializer<'de>,
{
    lenient(
        deserializer,
        "transition style",
        TransitionStyle::from_index,
        TransitionStyle::from_name,
    )
}

fn lenient_layout<'de, D>(deserializer: D) -> Result<LayoutType, D::Error>
where
    D: Deserializer<'de>,
{
    lenient(deserializer, "layout", LayoutType::from_index, LayoutType::from_name)
}
