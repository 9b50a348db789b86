//! Error types for flight link operations.

use std::time::Duration;

use super::SubscriptionId;

/// Errors reported by a [`FlightLink`](super::FlightLink).
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The link to the vehicle is no longer open.
    #[error("link to the vehicle is closed")]
    Closed,

    /// A subscription asked for a channel the vehicle does not log.
    #[error("no telemetry channel named '{0}'")]
    UnknownChannel(String),

    /// A subscription asked for a faster period than the vehicle supports.
    #[error("telemetry period {period:?} is shorter than the {minimum:?} minimum")]
    PeriodTooShort { period: Duration, minimum: Duration },

    /// No subscription with this id is active.
    #[error("no active telemetry subscription {0}")]
    SubscriptionNotFound(SubscriptionId),
}
