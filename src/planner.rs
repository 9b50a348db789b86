//! Relative-move planning: combining directional requests, rotating them into the world frame,
//! and turning distances into flight durations.

use std::time::Duration;

use bon::Builder;

use crate::config::SpeedProfile;
use crate::position::Position;

/// A relative movement request expressed as separate directional components.
///
/// Opposing components are netted against each other before planning, so
/// `forward(1.0).back(0.25)` is a 0.75 m forward move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Builder)]
pub struct MoveDelta {
    #[builder(default)]
    pub forward: f64,
    #[builder(default)]
    pub back: f64,
    #[builder(default)]
    pub left: f64,
    #[builder(default)]
    pub right: f64,
    #[builder(default)]
    pub up: f64,
    #[builder(default)]
    pub down: f64,
    /// Degrees, counter-clockwise seen from above.
    #[builder(default)]
    pub turn_left: f64,
    /// Degrees, clockwise seen from above.
    #[builder(default)]
    pub turn_right: f64,
}

impl MoveDelta {
    pub fn net(&self) -> RelativeMove {
        RelativeMove {
            forward: self.forward - self.back,
            left: self.left - self.right,
            up: self.up - self.down,
            yaw: self.turn_left - self.turn_right,
        }
    }
}

/// A net move in the body frame of the vehicle: metres along its heading, metres to its left,
/// metres up, and degrees of counter-clockwise yaw.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RelativeMove {
    pub forward: f64,
    pub left: f64,
    pub up: f64,
    pub yaw: f64,
}

impl RelativeMove {
    pub fn is_finite(&self) -> bool {
        self.forward.is_finite()
            && self.left.is_finite()
            && self.up.is_finite()
            && self.yaw.is_finite()
    }
}

/// Apply `relative` to `target`, rotating the horizontal components by the target heading.
///
/// The result builds on the intended pose rather than the measured one, so a sequence of moves
/// does not accumulate the tracking error of each individual move.
pub fn plan(target: &Position, relative: &RelativeMove) -> Position {
    let (sin, cos) = target.yaw_radians().sin_cos();

    Position {
        x: target.x + relative.forward * cos - relative.left * sin,
        y: target.y + relative.forward * sin + relative.left * cos,
        z: target.z + relative.up,
        yaw: target.yaw + relative.yaw,
    }
}

/// Time needed to cover `linear` metres and `angular` degrees at the given rates.
///
/// Both axes move simultaneously, so the slower one decides.
pub fn flight_duration(linear: f64, angular: f64, profile: &SpeedProfile) -> Duration {
    let for_distance = linear.abs() / profile.linear;
    let for_angle = angular.abs() / profile.angular;

    saturating_secs(for_distance.max(for_angle))
}

/// Time needed to climb or descend `distance` metres at `rate` metres per second.
pub fn vertical_duration(distance: f64, rate: f64) -> Duration {
    saturating_secs(distance.abs() / rate)
}

/// Durations too long to represent are clamped to [`Duration::MAX`], never shortened.
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}
