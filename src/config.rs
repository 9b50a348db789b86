use std::time::Duration;

use bon::Builder;

/// Shortest telemetry period the flight controller firmware accepts.
pub const MIN_TELEMETRY_PERIOD: Duration = Duration::from_millis(10);

/// A pair of rate limits used to turn a distance into a flight duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedProfile {
    /// Linear rate in metres per second.
    pub linear: f64,
    /// Angular rate in degrees per second.
    pub angular: f64,
}

impl SpeedProfile {
    pub const NORMAL: SpeedProfile = SpeedProfile {
        linear: 0.25,
        angular: 45.0,
    };

    pub const FAST: SpeedProfile = SpeedProfile {
        linear: 1.0,
        angular: 180.0,
    };

    fn is_valid(&self) -> bool {
        self.linear.is_finite()
            && self.linear > 0.0
            && self.angular.is_finite()
            && self.angular > 0.0
    }
}

/// Immutable tuning for a [`MotionController`](crate::controller::MotionController).
///
/// Every field has a default matching a Crazyflie 2.1 with a Flow deck, so
/// `MotionConfig::default()` is usually all that is needed.
///
/// ```ignore
/// let config = MotionConfig::builder()
///     .settle_timeout(Duration::from_secs(20))
///     .build();
/// ```
#[derive(Debug, Clone, Builder)]
pub struct MotionConfig {
    /// Rates used for relative moves while fast mode is off.
    #[builder(default = SpeedProfile::NORMAL)]
    pub normal: SpeedProfile,

    /// Rates used for relative moves while fast mode is on.
    #[builder(default = SpeedProfile::FAST)]
    pub fast: SpeedProfile,

    /// Fixed ascent rate of the first takeoff hop, in m/s.
    #[builder(default = 0.5)]
    pub takeoff_rate: f64,

    /// Height of the first takeoff hop above the current altitude, in metres.
    #[builder(default = 0.5)]
    pub takeoff_hop: f64,

    /// Fixed descent rate when landing, in m/s.
    #[builder(default = 0.5)]
    pub landing_rate: f64,

    /// Height above home at which the descent ends and the vehicle drops, in metres.
    #[builder(default = 0.04)]
    pub landing_fall_distance: f64,

    /// Extra wait after the landing descent so the vehicle comes to rest.
    #[builder(default = Duration::from_secs(1))]
    pub landing_cooldown: Duration,

    /// Maximum remaining distance, in metres, for a move to count as settled.
    #[builder(default = 0.075)]
    pub linear_threshold: f64,

    /// Maximum remaining yaw difference, in degrees, for a move to count as settled.
    #[builder(default = 2.5)]
    pub angular_threshold: f64,

    /// Interval between pose checks while waiting for a move to settle.
    #[builder(default = Duration::from_millis(10))]
    pub settle_poll_interval: Duration,

    /// Upper bound on the settle wait. `None` waits for as long as it takes.
    pub settle_timeout: Option<Duration>,

    /// Upper bound on the wait for the first telemetry sample. `None` waits forever.
    pub first_sample_timeout: Option<Duration>,

    /// Period requested for the pose telemetry subscription.
    #[builder(default = MIN_TELEMETRY_PERIOD)]
    pub telemetry_period: Duration,

    /// Name of the hardware module that must be present before flying.
    #[builder(default = "bcFlow2".to_string())]
    pub required_module: String,
}

impl MotionConfig {
    /// The active rate pair for the given mode.
    pub fn profile(&self, fast: bool) -> SpeedProfile {
        if fast { self.fast } else { self.normal }
    }

    /// Check that every rate and threshold is usable for duration and settle math.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, profile) in [("normal", &self.normal), ("fast", &self.fast)] {
            if !profile.is_valid() {
                return Err(ConfigError::InvalidProfile {
                    name,
                    profile: *profile,
                });
            }
        }

        for (name, value) in [
            ("takeoff_rate", self.takeoff_rate),
            ("landing_rate", self.landing_rate),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        for (name, value) in [
            ("takeoff_hop", self.takeoff_hop),
            ("landing_fall_distance", self.landing_fall_distance),
            ("linear_threshold", self.linear_threshold),
            ("angular_threshold", self.angular_threshold),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Negative { name, value });
            }
        }

        if self.settle_poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }

        if self.telemetry_period < MIN_TELEMETRY_PERIOD {
            return Err(ConfigError::TelemetryPeriodTooShort {
                period: self.telemetry_period,
            });
        }

        Ok(())
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Indicates a [`MotionConfig`] that cannot be flown with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} speed profile {profile:?} must have positive finite rates")]
    InvalidProfile {
        name: &'static str,
        profile: SpeedProfile,
    },

    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} must be non-negative and finite, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("settle poll interval must be longer than zero")]
    ZeroPollInterval,

    #[error("telemetry period {period:?} is shorter than the {:?} minimum", MIN_TELEMETRY_PERIOD)]
    TelemetryPeriodTooShort { period: Duration },
}
