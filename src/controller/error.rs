//! Error types for the motion controller.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::link::LinkError;
use crate::position::Position;
use crate::state_machine::flight::TransitionError;

/// Errors that can occur while activating or flying with a
/// [`MotionController`](super::MotionController).
#[derive(Debug, Error)]
pub enum FlightError {
    /// The hardware module needed for position estimation is not attached.
    #[error(
        "the {module} module is required, but it was not detected on the drone. \
         Is it attached, and attached the right way around?"
    )]
    RequiredModuleNotFound { module: String },

    /// The request does not fit the current flight state. Nothing was changed.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The configuration cannot be flown with.
    #[error("invalid motion configuration")]
    Config(#[from] ConfigError),

    /// The link to the vehicle failed.
    #[error("flight link error")]
    Link(#[from] LinkError),

    /// The telemetry stream ended before a pose could be read.
    #[error("telemetry stream closed before a pose was received")]
    TelemetryClosed,

    /// No complete pose arrived within the configured limit.
    #[error("no pose received within {limit:?}")]
    FirstSampleTimeout { limit: Duration },

    /// The measured pose did not converge to the target within the configured limit.
    #[error("pose did not settle at {target} within {limit:?}")]
    SettleTimeout { target: Position, limit: Duration },
}
