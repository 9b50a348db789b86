//! The boundary between the motion controller and the vehicle.
//!
//! A [`FlightLink`] answers hardware queries, streams telemetry records and executes the
//! low-level flight primitives. Each primitive takes an absolute target and a duration chosen
//! by the caller. The link never decides timing on its own.

pub mod error;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use uuid::Uuid;

pub use self::error::LinkError;

/// State-estimate channel names, as exposed by the Crazyflie logging subsystem.
pub const CHANNEL_X: &str = "stateEstimate.x";
pub const CHANNEL_Y: &str = "stateEstimate.y";
pub const CHANNEL_Z: &str = "stateEstimate.z";
pub const CHANNEL_YAW: &str = "stateEstimate.yaw";

/// The channels a pose is assembled from.
pub const POSE_CHANNELS: [&str; 4] = [CHANNEL_X, CHANNEL_Y, CHANNEL_Z, CHANNEL_YAW];

/// One telemetry sample: channel name to value. Links may deliver records with only some of the
/// subscribed channels present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryRecord {
    values: HashMap<String, f64, ahash::RandomState>,
}

impl TelemetryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: impl Into<String>, value: f64) {
        self.values.insert(channel.into(), value);
    }

    pub fn get(&self, channel: &str) -> Option<f64> {
        self.values.get(channel).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for TelemetryRecord {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Identifies one telemetry subscription on a link.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct SubscriptionId(Arc<Uuid>);

impl SubscriptionId {
    pub fn generate() -> Self {
        Self(Arc::new(Uuid::new_v4()))
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An active telemetry subscription. The stream ends once the subscription is cancelled through
/// [`FlightLink::unsubscribe`] or the link goes away.
pub struct Subscription {
    pub id: SubscriptionId,
    pub records: BoxStream<'static, TelemetryRecord>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("records", &"<BoxStream>")
            .finish()
    }
}

/// Everything the motion controller needs from a vehicle.
pub trait FlightLink: Send + Sync {
    /// Whether the named hardware module (e.g. `bcFlow2`) is attached.
    fn has_module(&self, name: &str) -> impl Future<Output = Result<bool, LinkError>> + Send;

    /// Start streaming the given channels every `period`.
    fn subscribe(&self, period: Duration, channels: &[&str]) -> Result<Subscription, LinkError>;

    /// Stop a subscription started with [`subscribe`](FlightLink::subscribe).
    fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), LinkError>;

    /// Climb straight up to the absolute `height` over `duration`, keeping x, y and yaw.
    fn ascend_to(
        &self,
        height: f64,
        duration: Duration,
    ) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Descend straight down to the absolute `height` over `duration` and stop the motors.
    fn descend_to(
        &self,
        height: f64,
        duration: Duration,
    ) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Fly in a straight line to an absolute pose over `duration`. `yaw` is in radians.
    fn go_to(
        &self,
        x: f64,
        y: f64,
        z: f64,
        yaw: f64,
        duration: Duration,
    ) -> impl Future<Output = Result<(), LinkError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_pairs() {
        let record: TelemetryRecord = [(CHANNEL_X, 1.0), (CHANNEL_YAW, 90.0)].into_iter().collect();

        assert_eq!(record.len(), 2);
        assert_eq!(record.get(CHANNEL_X), Some(1.0));
        assert_eq!(record.get(CHANNEL_YAW), Some(90.0));
        assert_eq!(record.get(CHANNEL_Z), None);
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let a = SubscriptionId::generate();
        let b = SubscriptionId::generate();

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
