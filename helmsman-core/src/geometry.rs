//! Planar Angle and Bearing Utilities
//!
//! All angles are compass degrees: 0 is north (+y), 90 is east (+x), and
//! angles grow clockwise. Positions are local planar meters.
//!
//! Several helpers return exact values (0, 90, 180, 270) for axis-aligned
//! geometry rather than going through `atan2`. The CPA engine relies on that
//! to detect "ownship exactly on the bow-stern line" with `==`.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Position, heading and speed of one platform at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Kinematics {
    /// Local east coordinate in meters
    pub x: f64,
    /// Local north coordinate in meters
    pub y: f64,
    /// Heading in degrees, 0 = north, clockwise
    pub heading: f64,
    /// Speed in meters per second
    pub speed: f64,
}

impl Kinematics {
    pub fn new(x: f64, y: f64, heading: f64, speed: f64) -> Self {
        Self {
            x,
            y,
            heading,
            speed,
        }
    }

    /// Straight-line position after `dt` seconds on the current heading.
    pub fn projected(&self, dt: f64) -> (f64, f64) {
        let (ux, uy) = heading_vector(self.heading);
        (self.x + ux * self.speed * dt, self.y + uy * self.speed * dt)
    }

    /// Distance to another platform
    pub fn range_to(&self, other: &Kinematics) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// True when every field is a finite number
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite() && self.speed.is_finite()
    }
}

/// Convert degrees to radians
#[inline]
pub fn deg_to_rad(deg: f64) -> f64 {
    (deg / 180.0) * PI
}

/// Convert radians to degrees
#[inline]
pub fn rad_to_deg(rad: f64) -> f64 {
    (rad / PI) * 180.0
}

/// Wrap an angle into `[0, 360)`.
pub fn angle360(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let mut val = deg % 360.0;
    if val < 0.0 {
        val += 360.0;
    }
    // -1e-17 % 360 + 360 rounds to exactly 360
    if val >= 360.0 {
        val -= 360.0;
    }
    val
}

/// Wrap an angle into `(-180, 180]`.
pub fn angle180(deg: f64) -> f64 {
    let mut val = angle360(deg);
    if val > 180.0 {
        val -= 360.0;
    }
    val
}

/// Absolute angular difference between two headings, in `[0, 180]`.
pub fn ang_diff(a: f64, b: f64) -> f64 {
    angle180(a - b).abs()
}

/// Absolute angle of point B as seen from point A.
///
/// ```text
///                   0
///                   |
///         270 ----- A ----- 90
///                   |
///                  180
/// ```
///
/// Coincident points return 0.
pub fn rel_ang(xa: f64, ya: f64, xb: f64, yb: f64) -> f64 {
    let dx = xb - xa;
    let dy = yb - ya;

    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    if dx == 0.0 {
        return if dy > 0.0 { 0.0 } else { 180.0 };
    }
    if dy == 0.0 {
        return if dx > 0.0 { 90.0 } else { 270.0 };
    }

    angle360(rad_to_deg(dx.atan2(dy)))
}

/// Bearing of a target relative to the bow of a platform at `(x, y)`
/// with heading `heading`. Range `[0, 360)`.
pub fn rel_bearing(x: f64, y: f64, heading: f64, tx: f64, ty: f64) -> f64 {
    angle360(rel_ang(x, y, tx, ty) - heading)
}

/// Cosine of an angle in degrees with exact zeros at 90 and 270.
///
/// Converting 90 degrees to radians leaves cos() a hair off zero, which
/// would break sign tests on perpendicular headings.
pub fn cos_deg(deg: f64) -> f64 {
    let delta = ang_diff(deg, 0.0);
    if delta == 90.0 {
        return 0.0;
    }
    deg_to_rad(delta).cos()
}

/// Speed component of a platform moving `speed` along `heading`,
/// projected onto `direction`.
pub fn speed_in_heading(heading: f64, speed: f64, direction: f64) -> f64 {
    if speed == 0.0 {
        return 0.0;
    }
    let delta = ang_diff(heading, direction);
    if delta == 0.0 {
        return speed;
    }
    if delta == 180.0 {
        return -speed;
    }
    if delta == 90.0 {
        return 0.0;
    }
    deg_to_rad(delta).cos() * speed
}

/// Rate at which the range between two platforms is shrinking.
/// Positive when closing, negative when opening.
#[allow(clippy::too_many_arguments)]
pub fn closing_speed(
    osx: f64,
    osy: f64,
    osv: f64,
    osh: f64,
    cnx: f64,
    cny: f64,
    cnv: f64,
    cnh: f64,
) -> f64 {
    let os_to_cn = rel_ang(osx, osy, cnx, cny);
    let cn_to_os = rel_ang(cnx, cny, osx, osy);

    speed_in_heading(osh, osv, os_to_cn) + speed_in_heading(cnh, cnv, cn_to_os)
}

/// True if turning from `from` to `to` is a turn to starboard (right)
pub fn turns_right(from: f64, to: f64) -> bool {
    let delta = angle360(to - from);
    delta > 0.0 && delta < 180.0
}

/// True if turning from `from` to `to` is a turn to port (left)
pub fn turns_left(from: f64, to: f64) -> bool {
    angle360(to - from) > 180.0
}

/// Unit vector (x east, y north) for a compass heading.
pub fn heading_vector(heading: f64) -> (f64, f64) {
    let rad = deg_to_rad(heading);
    (rad.sin(), rad.cos())
}
