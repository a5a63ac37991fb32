//! Target layouts for the 3D stack and the spread arrangements.
//!
//! [`LayoutCalculator`] is a pure mapping from an ordered list of windows to
//! an ordered list of [`WindowLayout`]s.  Output order always matches input
//! order, which is what lets the animation engine pair start and end layouts
//! by index.
//!
//! # Coordinates
//!
//! All positions are in the window manager's layout coordinates, offset by
//! the [`Workspace`] origin.  Grid and fibonacci layouts produce top-left
//! corners of the window rectangles.  The stack, circular and spiral layouts
//! produce *anchor points* around the workspace centre (the centre plus an
//! offset), exactly as their formulas are stated; they are not re-centred
//! on the window size.

use crate::command::{WindowId, WindowInfo};
use glam::{Vec2, Vec3};
use serde::Serialize;
use std::f32::consts::PI;
use std::fmt;

/// Per-index screen offset of stacked windows.
pub const STACK_OFFSET: Vec2 = Vec2::new(15.0, 10.0);
/// Per-index tilt of stacked windows, in degrees.
pub const STACK_ROTATION_STEP: f32 = 2.5;
/// Opacity lost per stacking level.
pub const STACK_ALPHA_STEP: f32 = 0.15;
/// Deepest stacked windows never fade below this.
pub const STACK_MIN_ALPHA: f32 = 0.4;

const CIRCULAR_RADIUS_FACTOR: f32 = 0.3;
const CIRCULAR_WINDOW_SIZE: Vec2 = Vec2::new(300.0, 200.0);

const SPIRAL_TURNS: f32 = 2.0;
const SPIRAL_MAX_RADIUS: f32 = 300.0;
const SPIRAL_MIN_SCALE: f32 = 0.7;
const SPIRAL_WINDOW_SIZE: Vec2 = Vec2::new(250.0, 180.0);

const GOLDEN_RATIO: f32 = 1.618_034;

/// Computed transform for one window.
///
/// Layouts are produced fresh by every calculation and never mutated in
/// place by the engines; consumers copy or interpolate into new values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowLayout {
    /// Identity of the window this layout belongs to.  Not owned.
    pub window: WindowId,
    pub position: Vec2,
    pub size: Vec2,
    /// Degrees.
    pub rotation: f32,
    pub scale: f32,
    pub alpha: f32,
    /// Higher values are drawn in front.
    pub z_index: i32,
    /// Derived during animation; not authoritative.
    pub velocity: Vec2,
}

impl WindowLayout {
    /// A neutral layout at the origin: zero size, no rotation, full scale
    /// and opacity.
    pub fn new(window: WindowId) -> Self {
        Self {
            window,
            position: Vec2::ZERO,
            size: Vec2::ZERO,
            rotation: 0.0,
            scale: 1.0,
            alpha: 1.0,
            z_index: 1,
            velocity: Vec2::ZERO,
        }
    }
}

/// Rows and columns chosen for the grid spread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
    pub cell_size: Vec2,
}

/// The rectangle layouts are computed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Workspace {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            origin: Vec2::ZERO,
            size: Vec2::new(1920.0, 1080.0),
        }
    }
}

impl Workspace {
    pub fn new(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    pub fn center(&self) -> Vec2 {
        self.origin + self.size / 2.0
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.size.x / self.size.y
    }
}

/// Perspective projection parameters.
///
/// A point at depth `z` is projected by dividing by `eye_distance + z` and
/// scaling by `perspective`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub perspective: f32,
    pub eye_distance: f32,
}

impl Transform3D {
    /// Project a 3D point onto the screen plane around `screen_center`.
    ///
    /// The stack layout does not call this; it uses a linear per-index
    /// offset instead.  Kept for layouts that want true foreshortening.
    pub fn project_3d_to_2d(&self, point: Vec3, screen_center: Vec2) -> Vec2 {
        let divisor = self.eye_distance + point.z;
        let projected = Vec2::new(point.x, point.y) * self.perspective / divisor;
        screen_center + projected
    }

    pub fn scale_for_depth(&self, z: f32) -> f32 {
        self.perspective / (self.eye_distance + z)
    }
}

/// Arrangement used in spread mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutType {
    #[default]
    Grid,
    Circular,
    Spiral,
    Fibonacci,
}

impl LayoutType {
    pub const ALL: [LayoutType; 4] = [
        LayoutType::Grid,
        LayoutType::Circular,
        LayoutType::Spiral,
        LayoutType::Fibonacci,
    ];

    /// The layout `cycle` moves to: grid → circular → spiral → fibonacci →
    /// grid.
    pub fn next(self) -> Self {
        match self {
            LayoutType::Grid => LayoutType::Circular,
            LayoutType::Circular => LayoutType::Spiral,
            LayoutType::Spiral => LayoutType::Fibonacci,
            LayoutType::Fibonacci => LayoutType::Grid,
        }
    }

    /// Look up a layout by its position in [`ALL`](Self::ALL).
    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Case-insensitive name lookup (`"grid"`, `"Circular"`, …).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "grid" => Some(LayoutType::Grid),
            "circular" | "circle" => Some(LayoutType::Circular),
            "spiral" => Some(LayoutType::Spiral),
            "fibonacci" => Some(LayoutType::Fibonacci),
            _ => None,
        }
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutType::Grid => write!(f, "grid"),
            LayoutType::Circular => write!(f, "circular"),
            LayoutType::Spiral => write!(f, "spiral"),
            LayoutType::Fibonacci => write!(f, "fibonacci"),
        }
    }
}

/// Computes stack and spread layouts.
///
/// Configuration (projection, depth step, padding, workspace) can be swapped
/// at any time through the setters; calculations only read it.
#[derive(Debug, Clone)]
pub struct LayoutCalculator {
    transform: Transform3D,
    depth_step: f32,
    padding: f32,
    workspace: Workspace,
}

impl Default for LayoutCalculator {
    fn default() -> Self {
        Self::new(800.0, 1000.0, 100.0, 20.0)
    }
}

impl LayoutCalculator {
    pub fn new(perspective: f32, eye_distance: f32, depth_step: f32, padding: f32) -> Self {
        Self {
            transform: Transform3D {
                perspective,
                eye_distance,
            },
            depth_step,
            padding,
            workspace: Workspace::default(),
        }
    }

    //  Configuration

    pub fn update_transform(&mut self, perspective: f32, eye_distance: f32) {
        self.transform = Transform3D {
            perspective,
            eye_distance,
        };
    }

    pub fn set_depth_step(&mut self, depth_step: f32) {
        self.depth_step = depth_step;
    }

    pub fn set_padding(&mut self, padding: f32) {
        self.padding = padding;
    }

    pub fn set_workspace(&mut self, workspace: Workspace) {
        self.workspace = workspace;
    }

    pub fn transform(&self) -> Transform3D {
        self.transform
    }

    pub fn workspace(&self) -> Workspace {
        self.workspace
    }

    pub fn workspace_center(&self) -> Vec2 {
        self.workspace.center()
    }

    pub fn workspace_size(&self) -> Vec2 {
        self.workspace.size
    }

    pub fn workspace_aspect_ratio(&self) -> f32 {
        self.workspace.aspect_ratio()
    }

    //  Stack

    /// Arrange `windows` as a perspective stack, index 0 in front.
    ///
    /// Window `i` sits at depth `i × depth_step`; its scale is the
    /// perspective divide for that depth and its on-screen size is its
    /// current size times that scale.  The screen position is the workspace
    /// centre plus [`STACK_OFFSET`] per index.
    pub fn calculate_stack_layout(&self, windows: &[WindowInfo]) -> Vec<WindowLayout> {
        let center = self.workspace_center();
        let count = windows.len() as i32;

        windows
            .iter()
            .enumerate()
            .map(|(i, window)| {
                let index = i as f32;
                let depth = index * self.depth_step;
                let scale = self.transform.scale_for_depth(depth);
                WindowLayout {
                    window: window.id,
                    position: center + STACK_OFFSET * index,
                    size: window.size * scale,
                    rotation: index * STACK_ROTATION_STEP,
                    scale,
                    alpha: (1.0 - index * STACK_ALPHA_STEP).max(STACK_MIN_ALPHA),
                    z_index: count - i as i32,
                    velocity: Vec2::ZERO,
                }
            })
            .collect()
    }

    //  Spread

    pub fn calculate_spread_layout(
        &self,
        windows: &[WindowInfo],
        layout_type: LayoutType,
    ) -> Vec<WindowLayout> {
        match layout_type {
            LayoutType::Grid => self.calculate_grid_layout(windows),
            LayoutType::Circular => self.calculate_circular_layout(windows),
            LayoutType::Spiral => self.calculate_spiral_layout(windows),
            LayoutType::Fibonacci => self.calculate_fibonacci_layout(windows),
        }
    }

    /// Row-major grid; every window fills its cell minus `padding` on each
    /// side.
    pub fn calculate_grid_layout(&self, windows: &[WindowInfo]) -> Vec<WindowLayout> {
        if windows.is_empty() {
            return Vec::new();
        }

        let grid = self.calculate_optimal_grid(windows.len());
        let cell = grid.cell_size;
        let padding = Vec2::splat(self.padding);

        windows
            .iter()
            .enumerate()
            .map(|(i, window)| {
                let row = (i / grid.cols) as f32;
                let col = (i % grid.cols) as f32;
                WindowLayout {
                    position: self.workspace.origin + Vec2::new(col * cell.x, row * cell.y) + padding,
                    size: cell - padding * 2.0,
                    ..WindowLayout::new(window.id)
                }
            })
            .collect()
    }

    /// Windows evenly spaced on a circle, each turned to face outward.
    pub fn calculate_circular_layout(&self, windows: &[WindowInfo]) -> Vec<WindowLayout> {
        if windows.is_empty() {
            return Vec::new();
        }

        let center = self.workspace_center();
        let size = self.workspace_size();
        let radius = size.x.min(size.y) * CIRCULAR_RADIUS_FACTOR;
        let count = windows.len() as f32;

        windows
            .iter()
            .enumerate()
            .map(|(i, window)| {
                let angle = 2.0 * PI * i as f32 / count;
                WindowLayout {
                    position: center + Vec2::new(angle.cos(), angle.sin()) * radius,
                    size: CIRCULAR_WINDOW_SIZE,
                    rotation: angle.to_degrees() + 90.0,
                    ..WindowLayout::new(window.id)
                }
            })
            .collect()
    }

    /// Two turns of an expanding spiral; windows shrink toward the outside.
    pub fn calculate_spiral_layout(&self, windows: &[WindowInfo]) -> Vec<WindowLayout> {
        if windows.is_empty() {
            return Vec::new();
        }

        let center = self.workspace_center();
        let count = windows.len() as f32;

        windows
            .iter()
            .enumerate()
            .map(|(i, window)| {
                let t = i as f32 / count;
                let angle = t * SPIRAL_TURNS * 2.0 * PI;
                let radius = t * SPIRAL_MAX_RADIUS;
                WindowLayout {
                    position: center + Vec2::new(angle.cos(), angle.sin()) * radius,
                    size: SPIRAL_WINDOW_SIZE,
                    rotation: angle.to_degrees(),
                    scale: 1.0 - t * (1.0 - SPIRAL_MIN_SCALE),
                    ..WindowLayout::new(window.id)
                }
            })
            .collect()
    }

    /// Golden-ratio subdivision.
    ///
    /// Even windows take the left `1/φ` of the remaining rectangle, odd
    /// windows take the top `1/φ`; the remainder shrinks each step.
    pub fn calculate_fibonacci_layout(&self, windows: &[WindowInfo]) -> Vec<WindowLayout> {
        if windows.is_empty() {
            return Vec::new();
        }

        let ratio = 1.0 / GOLDEN_RATIO;
        let mut cursor = self.workspace.origin;
        let mut remaining = self.workspace_size();

        windows
            .iter()
            .enumerate()
            .map(|(i, window)| {
                let position = cursor;
                let size = if i % 2 == 0 {
                    let piece = Vec2::new(remaining.x * ratio, remaining.y);
                    cursor.x += piece.x;
                    remaining.x -= piece.x;
                    piece
                } else {
                    let piece = Vec2::new(remaining.x, remaining.y * ratio);
                    cursor.y += piece.y;
                    remaining.y -= piece.y;
                    piece
                };
                WindowLayout {
                    position,
                    size,
                    ..WindowLayout::new(window.id)
                }
            })
            .collect()
    }

    /// Pick `rows × cols` for `count` windows.
    ///
    /// Up to twelve windows use a fixed table; beyond that the column count
    /// follows the workspace aspect ratio.
    pub fn calculate_optimal_grid(&self, count: usize) -> GridLayout {
        let (rows, cols) = match count {
            0..=1 => (1, 1),
            2..=4 => (2, 2),
            5..=6 => (2, 3),
            7..=9 => (3, 3),
            10..=12 => (3, 4),
            _ => {
                let cols = (count as f32 * self.workspace_aspect_ratio()).sqrt().ceil() as usize;
                let cols = cols.max(1);
                (count.div_ceil(cols), cols)
            }
        };
        GridLayout {
            rows,
            cols,
            cell_size: self.workspace_size() / Vec2::new(cols as f32, rows as f32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(n: usize) -> Vec<WindowInfo> {
        (0..n)
            .map(|i| WindowInfo::new(WindowId(i as u64 + 1), Vec2::ZERO, Vec2::new(800.0, 600.0)))
            .collect()
    }

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).abs().max_element() < 1e-3
    }

    //  Grid

    #[test]
    fn optimal_grid_lookup_table() {
        let calc = LayoutCalculator::default();
        let dims = |n| {
            let g = calc.calculate_optimal_grid(n);
            (g.rows, g.cols)
        };
        assert_eq!(dims(1), (1, 1));
        assert_eq!(dims(3), (2, 2));
        assert_eq!(dims(5), (2, 3));
        assert_eq!(dims(6), (2, 3));
        assert_eq!(dims(8), (3, 3));
        assert_eq!(dims(12), (3, 4));
    }

    #[test]
    fn optimal_grid_beyond_table_follows_aspect_ratio() {
        let calc = LayoutCalculator::default();
        // ceil(sqrt(13 · 16/9)) = 5, ceil(13 / 5) = 3
        let g = calc.calculate_optimal_grid(13);
        assert_eq!((g.rows, g.cols), (3, 5));
        assert!(g.rows * g.cols >= 13);
    }

    #[test]
    fn five_windows_grid_exact() {
        let calc = LayoutCalculator::new(800.0, 1000.0, 100.0, 20.0);
        let grid = calc.calculate_optimal_grid(5);
        assert_eq!(grid.cell_size, Vec2::new(640.0, 540.0));

        let layouts = calc.calculate_grid_layout(&windows(5));
        assert_eq!(layouts.len(), 5);
        assert_eq!(layouts[0].position, Vec2::new(20.0, 20.0));
        assert_eq!(layouts[0].size, Vec2::new(600.0, 500.0));
        // Window 4 is row 1, col 1.
        assert_eq!(layouts[4].position, Vec2::new(660.0, 560.0));
        assert!(layouts.iter().all(|l| l.rotation == 0.0 && l.scale == 1.0 && l.alpha == 1.0));
    }

    #[test]
    fn grid_respects_workspace_origin() {
        let mut calc = LayoutCalculator::default();
        calc.set_workspace(Workspace::new(Vec2::new(1920.0, 0.0), Vec2::new(1920.0, 1080.0)));
        let layouts = calc.calculate_grid_layout(&windows(1));
        assert_eq!(layouts[0].position, Vec2::new(1940.0, 20.0));
        assert_eq!(layouts[0].size, Vec2::new(1880.0, 1040.0));
    }

    #[test]
    fn padding_setter_applies() {
        let mut calc = LayoutCalculator::default();
        calc.set_padding(0.0);
        let layouts = calc.calculate_grid_layout(&windows(4));
        assert_eq!(layouts[3].position, Vec2::new(960.0, 540.0));
        assert_eq!(layouts[3].size, Vec2::new(960.0, 540.0));
    }

    //  Stack

    #[test]
    fn stack_alpha_floor() {
        let calc = LayoutCalculator::default();
        let layouts = calc.calculate_stack_layout(&windows(11));
        assert_eq!(layouts[0].alpha, 1.0);
        assert!((layouts[3].alpha - 0.55).abs() < 1e-6);
        assert_eq!(layouts[10].alpha, 0.4);
    }

    #[test]
    fn stack_perspective_scale_and_order() {
        let calc = LayoutCalculator::new(800.0, 1000.0, 100.0, 20.0);
        let layouts = calc.calculate_stack_layout(&windows(3));
        assert!((layouts[0].scale - 0.8).abs() < 1e-6);
        assert!((layouts[1].scale - 800.0 / 1100.0).abs() < 1e-6);
        assert!(approx(layouts[0].size, Vec2::new(640.0, 480.0)));
        assert_eq!(layouts.iter().map(|l| l.z_index).collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(layouts[2].rotation, 5.0);
    }

    #[test]
    fn stack_positions_offset_from_center() {
        let calc = LayoutCalculator::default();
        let layouts = calc.calculate_stack_layout(&windows(3));
        assert_eq!(layouts[0].position, Vec2::new(960.0, 540.0));
        assert_eq!(layouts[2].position, Vec2::new(990.0, 560.0));
    }

    #[test]
    fn stack_preserves_window_order() {
        let calc = LayoutCalculator::default();
        let input = windows(4);
        let ids: Vec<WindowId> = calc.calculate_stack_layout(&input).iter().map(|l| l.window).collect();
        let expected: Vec<WindowId> = input.iter().map(|w| w.id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn depth_step_setter_changes_scale() {
        let mut calc = LayoutCalculator::default();
        calc.set_depth_step(0.0);
        let layouts = calc.calculate_stack_layout(&windows(3));
        assert!(layouts.iter().all(|l| (l.scale - 0.8).abs() < 1e-6));
    }

    //  Circular / spiral / fibonacci

    #[test]
    fn circular_places_on_radius_facing_outward() {
        let calc = LayoutCalculator::default();
        let layouts = calc.calculate_circular_layout(&windows(4));
        let center = calc.workspace_center();
        for l in &layouts {
            assert!(((l.position - center).length() - 324.0).abs() < 1e-2);
            assert_eq!(l.size, Vec2::new(300.0, 200.0));
        }
        assert!(approx(layouts[0].position, Vec2::new(1284.0, 540.0)));
        assert!((layouts[0].rotation - 90.0).abs() < 1e-4);
        assert!((layouts[1].rotation - 180.0).abs() < 1e-3);
    }

    #[test]
    fn spiral_expands_and_shrinks() {
        let calc = LayoutCalculator::default();
        let layouts = calc.calculate_spiral_layout(&windows(4));
        let center = calc.workspace_center();
        assert_eq!(layouts[0].position, center);
        assert_eq!(layouts[0].scale, 1.0);
        // t = 0.5: half a radius, one full turn.
        assert!(approx(layouts[2].position, center + Vec2::new(150.0, 0.0)));
        assert!((layouts[3].scale - (1.0 - 0.75 * 0.3)).abs() < 1e-6);
        assert!(layouts.iter().all(|l| l.size == Vec2::new(250.0, 180.0)));
        assert!(layouts.windows(2).all(|w| w[1].scale < w[0].scale));
    }

    #[test]
    fn fibonacci_alternates_splits() {
        let calc = LayoutCalculator::default();
        let layouts = calc.calculate_fibonacci_layout(&windows(3));
        let r = 1.0 / GOLDEN_RATIO;

        assert_eq!(layouts[0].position, Vec2::ZERO);
        assert!(approx(layouts[0].size, Vec2::new(1920.0 * r, 1080.0)));

        let rest_x = 1920.0 * r;
        let rest_w = 1920.0 - rest_x;
        assert!(approx(layouts[1].position, Vec2::new(rest_x, 0.0)));
        assert!(approx(layouts[1].size, Vec2::new(rest_w, 1080.0 * r)));

        assert!(approx(layouts[2].position, Vec2::new(rest_x, 1080.0 * r)));
        assert!(approx(layouts[2].size, Vec2::new(rest_w * r, 1080.0 - 1080.0 * r)));
    }

    #[test]
    fn fibonacci_pieces_stay_inside_workspace() {
        let calc = LayoutCalculator::default();
        for l in calc.calculate_fibonacci_layout(&windows(8)) {
            let far = l.position + l.size;
            assert!(far.x <= 1920.0 + 1e-3 && far.y <= 1080.0 + 1e-3);
        }
    }

    #[test]
    fn spread_dispatches_by_type() {
        let calc = LayoutCalculator::default();
        let w = windows(3);
        assert_eq!(calc.calculate_spread_layout(&w, LayoutType::Grid), calc.calculate_grid_layout(&w));
        assert_eq!(
            calc.calculate_spread_layout(&w, LayoutType::Fibonacci),
            calc.calculate_fibonacci_layout(&w)
        );
    }

    #[test]
    fn empty_input_yields_empty_layouts() {
        let calc = LayoutCalculator::default();
        assert!(calc.calculate_stack_layout(&[]).is_empty());
        for ty in LayoutType::ALL {
            assert!(calc.calculate_spread_layout(&[], ty).is_empty());
        }
    }

    //  Projection

    #[test]
    fn projection_divides_by_depth() {
        let t = Transform3D {
            perspective: 800.0,
            eye_distance: 1000.0,
        };
        let center = Vec2::new(960.0, 540.0);
        assert_eq!(t.project_3d_to_2d(Vec3::new(100.0, 50.0, 0.0), center), Vec2::new(1040.0, 580.0));
        assert_eq!(t.project_3d_to_2d(Vec3::new(100.0, 0.0, 1000.0), center), Vec2::new(1000.0, 540.0));
        assert_eq!(t.scale_for_depth(600.0), 0.5);
    }

    #[test]
    fn update_transform_replaces_projection() {
        let mut calc = LayoutCalculator::default();
        calc.update_transform(500.0, 500.0);
        assert_eq!(calc.calculate_stack_layout(&windows(1))[0].scale, 1.0);
    }

    //  LayoutType

    #[test]
    fn layout_cycle_order() {
        let mut ty = LayoutType::Grid;
        let mut seen = vec![ty];
        for _ in 0..4 {
            ty = ty.next();
            seen.push(ty);
        }
        assert_eq!(
            seen,
            vec![
                LayoutType::Grid,
                LayoutType::Circular,
                LayoutType::Spiral,
                LayoutType::Fibonacci,
                LayoutType::Grid
            ]
        );
    }

    #[test]
    fn layout_type_lookup() {
        assert_eq!(LayoutType::from_name("Spiral"), Some(LayoutType::Spiral));
        assert_eq!(LayoutType::from_name("hexagon"), None);
        assert_eq!(LayoutType::from_index(3), Some(LayoutType::Fibonacci));
        assert_eq!(LayoutType::from_index(4), None);
        assert_eq!(LayoutType::from_index(-1), None);
    }
}
