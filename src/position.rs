use std::fmt;

/// A 4-DOF pose: position in metres and yaw in degrees.
///
/// Yaw is accumulated without wrapping. A vehicle that turns left four times by 180° has a
/// yaw of 720°, not 0°. Only [`angle_to`](Position::angle_to) wraps, and only the difference.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64, yaw: f64) -> Self {
        Self { x, y, z, yaw }
    }

    /// Euclidean distance over `x`, `y` and `z`. Yaw is ignored.
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// Absolute yaw difference wrapped into `[0, 180]` degrees.
    pub fn angle_to(&self, other: &Position) -> f64 {
        ((self.yaw - other.yaw + 180.0).rem_euclid(360.0) - 180.0).abs()
    }

    pub fn yaw_radians(&self) -> f64 {
        self.yaw.to_radians()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.yaw.is_finite()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(x: {:.4}, y: {:.4}, z: {:.4}, yaw: {:.4})",
            self.x, self.y, self.z, self.yaw
        )
    }
}
