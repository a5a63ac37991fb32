//! Cubic Bézier easing curves for transition progress.
//!
//! A [`BezierCurve`] describes the classic CSS-style easing shape with fixed
//! endpoints `(0,0)` and `(1,1)` and two control points `(x1,y1)`, `(x2,y2)`.
//!
//! [`BezierCurve::evaluate`] is the evaluator the animation engine uses by
//! default.  It treats the input progress directly as the curve parameter
//! and only looks at the Y control coordinates, so it is an *approximation*
//! of CSS easing: the X control points shape nothing.  Curves with
//! overshooting Y control points (bounce, elastic) still overshoot.
//!
//! [`BezierCurve::evaluate_css`] solves `x(s) = t` first and is what a
//! browser would compute.  It is only used when `css_easing` is enabled in
//! the configuration.

use serde::{Deserialize, Serialize};

/// An easing curve defined by two cubic Bézier control points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BezierCurve {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Default for BezierCurve {
    fn default() -> Self {
        Self::ease_out()
    }
}

impl BezierCurve {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// `cubic-bezier(0.25, 0.1, 0.25, 1.0)`, the CSS `ease` curve.
    pub const fn ease_out() -> Self {
        Self::new(0.25, 0.1, 0.25, 1.0)
    }

    pub const fn ease_in() -> Self {
        Self::new(0.42, 0.0, 1.0, 1.0)
    }

    pub const fn ease_in_out() -> Self {
        Self::new(0.42, 0.0, 0.58, 1.0)
    }

    /// Undershoots below 0 early on, then overshoots past 1.
    pub const fn bounce() -> Self {
        Self::new(0.68, -0.55, 0.265, 1.55)
    }

    pub const fn elastic() -> Self {
        Self::new(0.175, 0.885, 0.32, 1.275)
    }

    /// Evaluate the eased value for progress `t`.
    ///
    /// `t` is clamped to `[0, 1]` and used directly as the Bézier parameter:
    ///
    /// ```text
    /// y(t) = 3(1-t)²t·y1 + 3(1-t)t²·y2 + t³
    /// ```
    ///
    /// `evaluate(0) == 0` and `evaluate(1) == 1` exactly.
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        bernstein(t, self.y1, self.y2)
    }

    /// Evaluate the curve the way CSS `cubic-bezier()` does.
    ///
    /// Solves `x(s) = t` for the curve parameter `s` (Newton–Raphson with a
    /// bisection fallback) and returns `y(s)`.
    pub fn evaluate_css(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let s = self.solve_for_x(t);
        bernstein(s, self.y1, self.y2)
    }

    fn solve_for_x(&self, target: f32) -> f32 {
        // x(s) = ((ax*s + bx)*s + cx)*s
        let cx = 3.0 * self.x1;
        let bx = 3.0 * (self.x2 - self.x1) - cx;
        let ax = 1.0 - cx - bx;

        let mut s = target;
        for _ in 0..8 {
            let x = ((ax * s + bx) * s + cx) * s - target;
            if x.abs() < 1e-6 {
                return s;
            }
            let dx = (3.0 * ax * s + 2.0 * bx) * s + cx;
            if dx.abs() < 1e-6 {
                break;
            }
            s -= x / dx;
            if !(0.0..=1.0).contains(&s) {
                break;
            }
        }

        let mut lo = 0.0;
        let mut hi = 1.0;
        s = target;
        for _ in 0..24 {
            let x = ((ax * s + bx) * s + cx) * s;
            if (x - target).abs() < 1e-7 {
                return s;
            }
            if x < target {
                lo = s;
            } else {
                hi = s;
            }
            s = 0.5 * (lo + hi);
        }
        s
    }
}

/// Cubic Bernstein polynomial with `P0 = 0` and `P3 = 1`.
#[inline]
fn bernstein(t: f32, p1: f32, p2: f32) -> f32 {
    let u = 1.0 - t;
    3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t
}

/// Linear interpolation between two scalars.
///
/// Written as a weighted sum so that `t == 0` yields `a` and `t == 1`
/// yields `b` bit for bit.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}
